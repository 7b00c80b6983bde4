use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::StoreError;

/// Expected outcomes of authorization and sharing operations.
///
/// These are regular results for the caller to handle, each carrying a stable
/// message key the presentation layer can localize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("No access to this pet")]
    NoAccess,

    #[error("Insufficient permission for this action")]
    InsufficientPermission,

    #[error("User not found")]
    UserNotFound,

    #[error("Cannot share a pet with its owner")]
    SelfShareNotAllowed,

    #[error("Owner level cannot be granted")]
    CannotGrantOwner,

    #[error("Pet is already shared with this user")]
    AlreadyShared,

    #[error("Owner grant cannot be changed or removed")]
    OwnerGrantImmutable,

    #[error("Grant not found")]
    GrantNotFound,
}

impl AccessError {
    pub const ALL: [AccessError; 8] = [
        AccessError::NoAccess,
        AccessError::InsufficientPermission,
        AccessError::UserNotFound,
        AccessError::SelfShareNotAllowed,
        AccessError::CannotGrantOwner,
        AccessError::AlreadyShared,
        AccessError::OwnerGrantImmutable,
        AccessError::GrantNotFound,
    ];

    pub fn message_key(&self) -> &'static str {
        match self {
            AccessError::NoAccess => "access.no_access",
            AccessError::InsufficientPermission => "access.insufficient_permission",
            AccessError::UserNotFound => "sharing.user_not_found",
            AccessError::SelfShareNotAllowed => "sharing.self_share_not_allowed",
            AccessError::CannotGrantOwner => "sharing.cannot_grant_owner",
            AccessError::AlreadyShared => "sharing.already_shared",
            AccessError::OwnerGrantImmutable => "sharing.owner_grant_immutable",
            AccessError::GrantNotFound => "sharing.grant_not_found",
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AccessError::NoAccess => (StatusCode::FORBIDDEN, "NO_ACCESS"),
            AccessError::InsufficientPermission => {
                (StatusCode::FORBIDDEN, "INSUFFICIENT_PERMISSION")
            }
            AccessError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            AccessError::SelfShareNotAllowed => {
                (StatusCode::UNPROCESSABLE_ENTITY, "SELF_SHARE_NOT_ALLOWED")
            }
            AccessError::CannotGrantOwner => {
                (StatusCode::UNPROCESSABLE_ENTITY, "CANNOT_GRANT_OWNER")
            }
            AccessError::AlreadyShared => (StatusCode::CONFLICT, "ALREADY_SHARED"),
            AccessError::OwnerGrantImmutable => (StatusCode::CONFLICT, "OWNER_GRANT_IMMUTABLE"),
            AccessError::GrantNotFound => (StatusCode::NOT_FOUND, "GRANT_NOT_FOUND"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored data could not be decoded: {0}")]
    Decode(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateGrant => AppError::Access(AccessError::AlreadyShared),
            StoreError::GrantNotFound => AppError::Access(AccessError::GrantNotFound),
            StoreError::Decode(msg) => AppError::Decode(msg),
            StoreError::Transport(e) => AppError::Database(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;

        let (status, code, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            AppError::Access(err) => {
                let (status, code) = err.status_and_code();
                details = Some(serde_json::json!({ "message_key": err.message_key() }));
                (status, code, crate::i18n::t(err.message_key()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                msg.clone(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Decode(msg) => {
                tracing::error!("Decode error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DECODE_ERROR",
                    "Stored data is malformed".to_string(),
                )
            }
            AppError::Jwt(e) => {
                tracing::warn!("JWT error: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "Invalid or expired token".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_surface_as_domain_errors() {
        assert!(matches!(
            AppError::from(StoreError::DuplicateGrant),
            AppError::Access(AccessError::AlreadyShared)
        ));
        assert!(matches!(
            AppError::from(StoreError::GrantNotFound),
            AppError::Access(AccessError::GrantNotFound)
        ));
        assert!(matches!(
            AppError::from(StoreError::Decode("bad level".into())),
            AppError::Decode(_)
        ));
    }

    #[test]
    fn message_keys_are_unique() {
        let mut keys: Vec<_> = AccessError::ALL.iter().map(|e| e.message_key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), AccessError::ALL.len());
    }

    #[test]
    fn access_errors_map_to_expected_status() {
        let resp = AppError::from(AccessError::AlreadyShared).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = AppError::from(AccessError::InsufficientPermission).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = AppError::from(AccessError::UserNotFound).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
