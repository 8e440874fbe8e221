use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::api::format::dragable_to_api_value;
use crate::auth::Principal;
use crate::database::models::Dragable;
use crate::error::ApiError;
use crate::middleware::response::ApiResponse;
use crate::policy;

use super::{owning_team, required, resolve_connection, AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Narrow the listing to one team the caller belongs to.
    pub team: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDragableRequest {
    pub hash: Option<String>,
    pub url: Option<String>,
    pub xpath: Option<String>,
    pub team: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub connected_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDragableRequest {
    pub team: Option<String>,
    pub url: Option<String>,
    pub xpath: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub connected_to: Option<String>,
}

/// GET /api/1.0/dragables - dragables across the caller's teams, optionally
/// narrowed by ?team=.
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> Result<ApiResponse<Vec<Value>>, ApiError> {
    let user = principal.require_user()?;

    let dragables = match query.team.as_deref() {
        Some(team_name) => {
            let team = state
                .store
                .team_by_name(team_name)
                .await?
                .ok_or_else(|| ApiError::bad_request(format!("no team named '{}'", team_name)))?;
            if !policy::is_team_member(&principal, &team) {
                return Err(ApiError::forbidden(
                    "you are not a member of the requested team",
                ));
            }
            state.store.dragables_in_team(&team.name).await?
        }
        None => state.store.dragables_for_member(&user.username).await?,
    };

    Ok(ApiResponse::success(
        dragables.iter().map(dragable_to_api_value).collect(),
    ))
}

/// GET /api/1.0/dragables/:hash
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(hash): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    principal.require_user()?;

    let dragable = state
        .store
        .dragable_by_hash(&hash)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("no dragable with hash '{}'", hash)))?;

    let team = owning_team(&state, &dragable).await?;
    if !policy::can_view_dragable(&principal, &team) {
        return Err(ApiError::forbidden(
            "dragable belongs to a team you are not a member of",
        ));
    }

    Ok(ApiResponse::success(dragable_to_api_value(&dragable)))
}

/// POST /api/1.0/dragables - capture a fragment into a team the caller
/// belongs to.
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateDragableRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let user = principal.require_user()?;

    let hash = required(body.hash, "hash")?;
    let url = required(body.url, "url")?;
    let xpath = required(body.xpath, "xpath")?;
    let team_name = required(body.team, "team")?;

    let team = state
        .store
        .team_by_name(&team_name)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("no team named '{}'", team_name)))?;
    if !policy::is_team_member(&principal, &team) {
        return Err(ApiError::forbidden(
            "dragables can only be added by team members",
        ));
    }

    let connected_to = match body.connected_to.as_deref().map(str::trim) {
        Some(target) if !target.is_empty() => {
            Some(resolve_connection(&state, &team, target).await?)
        }
        _ => None,
    };

    let now = Utc::now();
    let dragable = Dragable {
        hash,
        created_by: user.username.clone(),
        team: team.name.clone(),
        created: now,
        updated: now,
        url,
        title: body.title.unwrap_or_default(),
        text: body.text.unwrap_or_default(),
        xpath,
        connected_to,
    };

    state.store.create_dragable(dragable.clone()).await?;
    tracing::info!(dragable = %dragable.hash, team = %dragable.team, "dragable created");

    Ok(ApiResponse::created(dragable_to_api_value(&dragable)))
}

/// PUT /api/1.0/dragables/:hash - overwrite fields. Any member of the
/// dragable's team may edit, not just the creator; moving it to another team
/// requires membership there too.
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(hash): Path<String>,
    Json(body): Json<UpdateDragableRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    principal.require_user()?;

    let mut dragable = state
        .store
        .dragable_by_hash(&hash)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("no dragable with hash '{}'", hash)))?;

    let mut team = owning_team(&state, &dragable).await?;
    if !policy::can_mutate_dragable(&principal, &dragable, &team) {
        return Err(ApiError::forbidden(
            "dragables can only be modified by their creator or team members",
        ));
    }

    if let Some(new_team_name) = body.team {
        let new_team = state
            .store
            .team_by_name(&new_team_name)
            .await?
            .ok_or_else(|| ApiError::bad_request(format!("no team named '{}'", new_team_name)))?;
        if !policy::is_team_member(&principal, &new_team) {
            return Err(ApiError::forbidden(
                "dragables can only be moved to a team you belong to",
            ));
        }
        dragable.team = new_team.name.clone();
        team = new_team;
    }

    if let Some(target) = body.connected_to {
        let target = target.trim().to_string();
        if target.is_empty() {
            dragable.connected_to = None;
        } else {
            dragable.connected_to = Some(resolve_connection(&state, &team, &target).await?);
        }
    }

    if let Some(url) = body.url {
        dragable.url = url;
    }
    if let Some(xpath) = body.xpath {
        dragable.xpath = xpath;
    }
    if let Some(title) = body.title {
        dragable.title = title;
    }
    if let Some(text) = body.text {
        dragable.text = text;
    }
    dragable.updated = Utc::now();

    state.store.update_dragable(dragable.clone()).await?;

    Ok(ApiResponse::success(dragable_to_api_value(&dragable)))
}

/// DELETE /api/1.0/dragables/:hash - remove a dragable and its annotations.
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(hash): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    principal.require_user()?;

    let dragable = state
        .store
        .dragable_by_hash(&hash)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("no dragable with hash '{}'", hash)))?;

    let team = owning_team(&state, &dragable).await?;
    if !policy::can_mutate_dragable(&principal, &dragable, &team) {
        return Err(ApiError::forbidden(
            "dragables can only be deleted by their creator or team members",
        ));
    }

    state.store.delete_dragable(&dragable.hash).await?;
    tracing::info!(dragable = %dragable.hash, "dragable deleted");

    Ok(ApiResponse::<()>::deleted())
}
