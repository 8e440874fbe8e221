use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::response::ApiResponse;

use super::{required, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /auth/register - create the identity record behind basic auth.
///
/// Public endpoint. Only the username is ever echoed back; the password is
/// digested before it reaches the store.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let username = required(body.username, "username")?.trim().to_string();
    let password = required(body.password, "password")?;

    let user = User {
        id: Uuid::new_v4(),
        username,
        email: body.email.unwrap_or_default(),
        password_digest: auth::password_digest(&password),
        created: Utc::now(),
    };

    state.store.create_user(user.clone()).await?;
    tracing::info!(user = %user.username, "user registered");

    Ok(ApiResponse::created(json!({ "username": user.username })))
}
