pub mod annotations;
pub mod dragables;
pub mod teams;
pub mod users;

use std::sync::Arc;

use crate::config;
use crate::database::models::{Dragable, Team};
use crate::database::EntityStore;
use crate::error::ApiError;

/// Shared state handed to every handler: the entity store behind a trait
/// object so the Postgres and in-memory backends are interchangeable.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
}

/// Extract a required request field, rejecting missing and blank values.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{} is required", field))),
    }
}

/// Fetch the team a dragable belongs to. Cascade deletion keeps this
/// reference intact, so a miss is a server-side consistency fault, not
/// client input.
pub(crate) async fn owning_team(state: &AppState, dragable: &Dragable) -> Result<Team, ApiError> {
    match state.store.team_by_name(&dragable.team).await? {
        Some(team) => Ok(team),
        None => {
            tracing::error!(
                dragable = %dragable.hash,
                team = %dragable.team,
                "dragable references a missing team"
            );
            Err(ApiError::internal_server_error(
                "An error occurred while processing your request",
            ))
        }
    }
}

/// Resolve a `connected_to` target hash. Cross-team links are allowed unless
/// the same-team policy option is switched on.
pub(crate) async fn resolve_connection(
    state: &AppState,
    owning_team: &Team,
    target_hash: &str,
) -> Result<String, ApiError> {
    let target = state
        .store
        .dragable_by_hash(target_hash)
        .await?
        .ok_or_else(|| {
            ApiError::bad_request(format!("no dragable with hash '{}'", target_hash))
        })?;

    if config::config().policy.enforce_same_team_connections && target.team != owning_team.name {
        return Err(ApiError::bad_request(
            "connected dragable must belong to the same team",
        ));
    }

    Ok(target.hash)
}
