pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::database::models::{Annotation, Dragable, Team, User};

/// Errors surfaced by the entity store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} '{key}' already exists")]
    Duplicate { entity: &'static str, key: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Constraint(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Transactional relational store behind the resource handlers. Lookups are
/// field-filtered (name, hash, membership); writes are atomic per record.
/// Uniqueness enforcement on `username`, team `name` and the `hash` keys is
/// the store's job and the sole serialization point between requests.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Users
    async fn create_user(&self, user: User) -> Result<(), StoreError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    // Teams
    async fn create_team(&self, team: Team) -> Result<(), StoreError>;
    async fn team_by_name(&self, name: &str) -> Result<Option<Team>, StoreError>;
    async fn list_teams(&self) -> Result<Vec<Team>, StoreError>;
    /// Replace the team stored under `name` (which may be a rename).
    async fn update_team(&self, name: &str, team: Team) -> Result<(), StoreError>;
    async fn delete_team(&self, name: &str) -> Result<(), StoreError>;

    // Dragables
    async fn create_dragable(&self, dragable: Dragable) -> Result<(), StoreError>;
    async fn dragable_by_hash(&self, hash: &str) -> Result<Option<Dragable>, StoreError>;
    /// Dragables across every team the user belongs to, oldest first.
    async fn dragables_for_member(&self, username: &str) -> Result<Vec<Dragable>, StoreError>;
    async fn dragables_in_team(&self, team: &str) -> Result<Vec<Dragable>, StoreError>;
    async fn update_dragable(&self, dragable: Dragable) -> Result<(), StoreError>;
    async fn delete_dragable(&self, hash: &str) -> Result<(), StoreError>;

    // Annotations
    async fn create_annotation(&self, annotation: Annotation) -> Result<(), StoreError>;
    async fn annotation_by_hash(&self, hash: &str) -> Result<Option<Annotation>, StoreError>;
    /// Annotations on dragables in teams the user belongs to, oldest first.
    async fn annotations_for_member(&self, username: &str) -> Result<Vec<Annotation>, StoreError>;
    async fn annotations_for_dragable(&self, dragable: &str) -> Result<Vec<Annotation>, StoreError>;

    /// Connectivity probe for /health
    async fn ping(&self) -> Result<(), StoreError>;
}
