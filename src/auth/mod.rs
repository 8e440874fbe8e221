use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ApiError;

/// Authenticated user context resolved from request credentials
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// The requesting identity every handler sees: a verified user, or the
/// anonymous principal for requests without credentials.
#[derive(Clone, Debug)]
pub enum Principal {
    Anonymous,
    User(AuthUser),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(&user.username),
        }
    }

    /// Gate for mutating operations: anonymous callers are rejected before
    /// any resource lookup happens.
    pub fn require_user(&self) -> Result<&AuthUser, ApiError> {
        match self {
            Principal::User(user) => Ok(user),
            Principal::Anonymous => Err(ApiError::unauthorized("Authentication required")),
        }
    }
}

/// Credentials carried by an HTTP Basic Authorization header
#[derive(Debug)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Parse an Authorization header value in the Basic scheme
pub fn parse_basic_header(value: &str) -> Result<BasicCredentials, String> {
    let encoded = value
        .strip_prefix("Basic ")
        .ok_or_else(|| "Authorization header must use Basic scheme".to_string())?;

    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| "Invalid base64 in Authorization header".to_string())?;

    let decoded = String::from_utf8(decoded)
        .map_err(|_| "Authorization header is not valid UTF-8".to_string())?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| "Basic credentials must be username:password".to_string())?;

    if username.is_empty() {
        return Err("Empty username in Authorization header".to_string());
    }

    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Hex sha-256 digest used for stored user passwords. The verification
/// mechanism stays behind this module; handlers only ever see a Principal.
pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_password(password: &str, digest: &str) -> bool {
    password_digest(password) == digest
}
