use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A captured web fragment. The client-computed `hash` is the external key
/// and never changes; everything else may be rewritten by team members.
/// A dragable belongs to exactly one team at any time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Dragable {
    pub hash: String,
    pub created_by: String,
    pub team: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub url: String,
    pub title: String,
    pub text: String,
    pub xpath: String,
    /// Optional link to another dragable, by hash.
    pub connected_to: Option<String>,
}
