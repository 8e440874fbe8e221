use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::format::{team_to_api_value, teams_to_api_values};
use crate::auth::Principal;
use crate::database::models::Team;
use crate::error::ApiError;
use crate::middleware::response::ApiResponse;
use crate::policy;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub password: Option<String>,
    /// Replacement member roster. The owner stays a member regardless of
    /// what the roster says.
    pub members: Option<Vec<String>>,
}

/// GET /api/1.0/teams - list every team.
///
/// Listing is deliberately unfiltered: private teams are discoverable but not
/// enterable, and the password never leaves the server. Anonymous callers get
/// the reduced projection.
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<ApiResponse<Vec<Value>>, ApiError> {
    let teams = state.store.list_teams().await?;
    Ok(ApiResponse::success(teams_to_api_values(&teams, &principal)))
}

/// GET /api/1.0/teams/:name - resolve one team by name.
///
/// The read surface resolves by filter, not by key: an unknown name yields an
/// empty list, not an error.
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> Result<ApiResponse<Vec<Value>>, ApiError> {
    let teams: Vec<Team> = state.store.team_by_name(&name).await?.into_iter().collect();
    Ok(ApiResponse::success(teams_to_api_values(&teams, &principal)))
}

/// POST /api/1.0/teams - create a team.
///
/// A non-blank password makes the team private; otherwise it is public. The
/// creator becomes owner and first member in the same write.
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateTeamRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let user = principal.require_user()?;

    let name = super::required(body.name, "name")?;
    if state.store.team_by_name(&name).await?.is_some() {
        return Err(ApiError::conflict(format!("team '{}' already exists", name)));
    }

    let team = Team::new(
        name,
        body.description.unwrap_or_default(),
        &user.username,
        body.password,
    );

    // A concurrent create may still win the name; the store's unique
    // constraint reports it as the same conflict.
    state.store.create_team(team.clone()).await?;
    tracing::info!(team = %team.name, user = %user.username, "team created");

    Ok(ApiResponse::created(team_to_api_value(&team, &principal)))
}

/// PUT /api/1.0/teams/:name - update name, description, password and/or the
/// member roster. Owner only.
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    Json(body): Json<UpdateTeamRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    principal.require_user()?;

    let mut team = state
        .store
        .team_by_name(&name)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("no team named '{}'", name)))?;

    if !policy::can_mutate_team(&principal, &team) {
        return Err(ApiError::forbidden("only the team owner can modify it"));
    }

    if let Some(new_name) = body.name {
        let new_name = new_name.trim().to_string();
        if new_name.is_empty() {
            return Err(ApiError::bad_request("name cannot be blank"));
        }
        if new_name != team.name && state.store.team_by_name(&new_name).await?.is_some() {
            return Err(ApiError::conflict(format!(
                "team '{}' already exists",
                new_name
            )));
        }
        team.name = new_name;
    }
    if let Some(description) = body.description {
        team.description = description;
    }
    if let Some(password) = body.password {
        team.set_password(&password);
    }
    if let Some(members) = body.members {
        let mut roster = Vec::new();
        for username in members {
            let username = username.trim().to_string();
            if username.is_empty() {
                continue;
            }
            if state.store.user_by_username(&username).await?.is_none() {
                return Err(ApiError::bad_request(format!("no user named '{}'", username)));
            }
            if !roster.contains(&username) {
                roster.push(username);
            }
        }
        team.members = roster;
    }
    team.ensure_owner_membership();

    state.store.update_team(&name, team.clone()).await?;
    tracing::info!(team = %team.name, "team updated");

    Ok(ApiResponse::success(team_to_api_value(&team, &principal)))
}

/// DELETE /api/1.0/teams/:name - remove a team. Owner only; member dragables
/// and their annotations go with it.
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    principal.require_user()?;

    let team = state
        .store
        .team_by_name(&name)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("no team named '{}'", name)))?;

    if !policy::can_mutate_team(&principal, &team) {
        return Err(ApiError::forbidden("only the team owner can delete it"));
    }

    state.store.delete_team(&team.name).await?;
    tracing::info!(team = %team.name, "team deleted");

    Ok(ApiResponse::<()>::deleted())
}
