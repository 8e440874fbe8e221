use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{parse_basic_header, verify_password, AuthUser, Principal};
use crate::error::ApiError;
use crate::handlers::AppState;

/// Basic-auth middleware that resolves request credentials to a Principal and
/// injects it as a request extension. Requests without an Authorization
/// header proceed as Anonymous; invalid or unverifiable credentials are
/// rejected here, before any handler runs.
pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = resolve_principal(&state, &headers).await?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

async fn resolve_principal(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let header = match headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))
    {
        Some(header) => header,
        None => return Ok(Principal::Anonymous),
    };

    let value = header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header"))?;

    let credentials = parse_basic_header(value).map_err(ApiError::unauthorized)?;

    let user = state
        .store
        .user_by_username(&credentials.username)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&credentials.password, &user.password_digest) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    Ok(Principal::User(AuthUser {
        id: user.id,
        username: user.username,
    }))
}
