//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use huella_core::access::AccessError;
use huella_core::auth::AuthError;
use huella_core::moderation::ModerationError;
use huella_core::validation::ValidationErrors;
use huella_storage::StorageError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::image_host::ImageHostError;

/// Message returned for every unexpected failure.
const INTERNAL_MESSAGE: &str = "An internal error occurred. Please try again later.";

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid session.
    #[error("You must sign in to continue.")]
    Unauthenticated,

    /// Signed in, but the role does not allow it.
    #[error("You do not have permission to perform this action.")]
    Forbidden,

    /// Resource not found.
    #[error("{0} not found.")]
    NotFound(String),

    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// A business rule rejected the request.
    #[error("{0}")]
    Unprocessable(String),

    /// Duplicate data or a protected account.
    #[error("{0}")]
    Conflict(String),

    /// Per-field submission errors.
    #[error("The report has errors. Please review the highlighted fields.")]
    Validation(ValidationErrors),

    /// Moderation rule error.
    #[error(transparent)]
    Moderation(#[from] ModerationError),

    /// Auth error.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Image upload error.
    #[error("image upload error: {0}")]
    Upload(#[from] ImageHostError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthenticated => ApiError::Unauthenticated,
            AccessError::Forbidden => ApiError::Forbidden,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::NotFound(capitalize(&what)),
            StorageError::Conflict(message) => ApiError::Conflict(message),
            other => ApiError::Storage(other),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) | ApiError::Validation(_) | ApiError::Moderation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(e) => match e {
                AuthError::UnknownAccount | AuthError::WrongPassword => StatusCode::UNAUTHORIZED,
                AuthError::HashingFailed(_) | AuthError::VerificationFailed(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ApiError::Storage(_) | ApiError::Upload(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let errors = match self {
            ApiError::Validation(errors) => Some(errors),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            message,
            errors,
        };

        (status, axum::Json(body)).into_response()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_access_errors_map_to_401_and_403() {
        let (status, json) = body_json(AccessError::Unauthenticated.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "You must sign in to continue.");

        let (status, _) = body_json(AccessError::Forbidden.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_storage_errors_do_not_leak_detail() {
        let err = ApiError::from(StorageError::Config("secret path /var/db".into()));
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_storage_not_found_and_conflict() {
        let (status, json) = body_json(StorageError::NotFound("report 4".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Report 4 not found.");

        let (status, json) =
            body_json(StorageError::Conflict("This username is already taken.".into()).into())
                .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], "This username is already taken.");
    }

    #[tokio::test]
    async fn test_validation_errors_are_listed_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("description", "Too short.");
        let (status, json) = body_json(ApiError::Validation(errors)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["errors"]["description"][0], "Too short.");
    }
}
