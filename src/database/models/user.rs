use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity record behind the authenticated principal. Only `username` is
/// ever serialized to clients; the digest is opaque to everything outside
/// the auth module.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_digest: String,
    pub created: DateTime<Utc>,
}
