use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::api::format::annotation_to_api_value;
use crate::auth::Principal;
use crate::database::models::{Annotation, AnnotationBody, AnnotationKind, Dragable, Team};
use crate::error::ApiError;
use crate::middleware::response::ApiResponse;
use crate::policy;

use super::{owning_team, required, resolve_connection, AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Narrow the listing to one dragable, by hash.
    pub dragable: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnnotationRequest {
    pub hash: Option<String>,
    pub dragable: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    // variant payload fields; which ones matter depends on `type`
    pub note: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub filename: Option<String>,
    pub connected_to: Option<String>,
}

/// GET /api/1.0/annotations - annotations on dragables in the caller's
/// teams, optionally narrowed by ?dragable=.
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> Result<ApiResponse<Vec<Value>>, ApiError> {
    let user = principal.require_user()?;

    let annotations = match query.dragable.as_deref() {
        Some(hash) => {
            let dragable = state
                .store
                .dragable_by_hash(hash)
                .await?
                .ok_or_else(|| ApiError::bad_request(format!("no dragable with hash '{}'", hash)))?;
            let team = owning_team(&state, &dragable).await?;
            if !policy::can_view_dragable(&principal, &team) {
                return Err(ApiError::forbidden(
                    "dragable belongs to a team you are not a member of",
                ));
            }
            state.store.annotations_for_dragable(&dragable.hash).await?
        }
        None => state.store.annotations_for_member(&user.username).await?,
    };

    Ok(ApiResponse::success(
        annotations.iter().map(annotation_to_api_value).collect(),
    ))
}

/// GET /api/1.0/annotations/:hash
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(hash): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    principal.require_user()?;

    let annotation = state
        .store
        .annotation_by_hash(&hash)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("no annotation with hash '{}'", hash)))?;

    let dragable = state
        .store
        .dragable_by_hash(&annotation.dragable)
        .await?
        .ok_or_else(|| {
            tracing::error!(
                annotation = %annotation.hash,
                dragable = %annotation.dragable,
                "annotation references a missing dragable"
            );
            ApiError::internal_server_error("An error occurred while processing your request")
        })?;

    let team = owning_team(&state, &dragable).await?;
    if !policy::can_view_annotation(&principal, &team) {
        return Err(ApiError::forbidden(
            "annotation belongs to a team you are not a member of",
        ));
    }

    Ok(ApiResponse::success(annotation_to_api_value(&annotation)))
}

/// POST /api/1.0/annotations - attach typed metadata to a dragable the
/// caller can reach. There is no update or delete surface; annotations are
/// read-only after creation.
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateAnnotationRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let user = principal.require_user()?;

    let hash = required(body.hash.clone(), "hash")?;
    let dragable_hash = required(body.dragable.clone(), "dragable")?;
    let kind_name = required(body.kind.clone(), "type")?;
    let kind = AnnotationKind::parse(&kind_name)
        .ok_or_else(|| ApiError::bad_request(format!("unknown annotation type '{}'", kind_name)))?;

    let dragable = state
        .store
        .dragable_by_hash(&dragable_hash)
        .await?
        .ok_or_else(|| {
            ApiError::bad_request(format!("no dragable with hash '{}'", dragable_hash))
        })?;

    let team = owning_team(&state, &dragable).await?;
    if !policy::can_create_annotation(&principal, &team) {
        return Err(ApiError::forbidden(
            "annotations can only be added by members of the dragable's team",
        ));
    }

    if state.store.annotation_by_hash(&hash).await?.is_some() {
        return Err(ApiError::bad_request(format!(
            "annotation hash '{}' is already used",
            hash
        )));
    }

    let annotation_body = build_body(kind, &body, &state, &dragable, &team).await?;

    let now = Utc::now();
    let annotation = Annotation {
        hash,
        dragable: dragable.hash.clone(),
        created_by: user.username.clone(),
        created: now,
        updated: now,
        body: annotation_body,
    };

    // Construction failures on this path - a racing duplicate, a dragable
    // deleted mid-flight - all collapse into the one client error kind.
    if let Err(err) = state.store.create_annotation(annotation.clone()).await {
        tracing::warn!(annotation = %annotation.hash, error = %err, "annotation create failed");
        return Err(ApiError::bad_request("could not create annotation"));
    }
    tracing::info!(annotation = %annotation.hash, kind = %kind, "annotation created");

    Ok(ApiResponse::created(annotation_to_api_value(&annotation)))
}

/// Type-dispatched payload construction. Image and video reuse the url
/// logic; file annotations also go through the url-like path until upload
/// handling exists.
async fn build_body(
    kind: AnnotationKind,
    request: &CreateAnnotationRequest,
    state: &AppState,
    dragable: &Dragable,
    team: &Team,
) -> Result<AnnotationBody, ApiError> {
    match kind {
        AnnotationKind::Note => Ok(AnnotationBody::Note {
            note: required(request.note.clone(), "note")?,
        }),
        AnnotationKind::Url => Ok(AnnotationBody::Url {
            url: required(request.url.clone(), "url")?,
            description: request.description.clone(),
        }),
        AnnotationKind::Image => Ok(AnnotationBody::Image {
            url: required(request.url.clone(), "url")?,
            description: request.description.clone(),
        }),
        AnnotationKind::Video => Ok(AnnotationBody::Video {
            url: required(request.url.clone(), "url")?,
            description: request.description.clone(),
        }),
        AnnotationKind::File => Ok(AnnotationBody::File {
            filename: request.filename.clone(),
            url: required(request.url.clone(), "url")?,
            description: request.description.clone(),
        }),
        AnnotationKind::Connection => {
            let target = required(request.connected_to.clone(), "connected_to")?;
            if target == dragable.hash {
                return Err(ApiError::bad_request(
                    "a dragable cannot be connected to itself",
                ));
            }
            let connected_to = resolve_connection(state, team, &target).await?;
            Ok(AnnotationBody::Connection { connected_to })
        }
    }
}
