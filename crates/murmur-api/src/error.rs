use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use murmur_db::is_unique_violation;
use murmur_types::ValidationError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Every way a request can fail. Each variant maps to exactly one status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("missing `token` header")]
    MissingToken,
    #[error("missing username")]
    MissingUsername,
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("wrong password")]
    Unauthorized,
    #[error("too many requests")]
    RateLimited,
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::MissingToken
            | ApiError::MissingUsername
            | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Turn a storage-level UNIQUE failure into the same conflict the
    /// pre-insert check reports.
    pub fn unique_as_conflict(self, msg: &'static str) -> Self {
        match self {
            ApiError::Internal(err) if is_unique_violation(&err) => ApiError::Conflict(msg),
            other => other,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(ValidationError::Malformed(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(ValidationError::Malformed(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(err) => error!("Request failed: {:#}", err),
            ApiError::Validation(err) => warn!("Rejected request: {}", err),
            other => warn!("Request rejected ({}): {}", status.as_u16(), other),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_have_distinct_statuses() {
        assert_eq!(ApiError::MissingToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingUsername.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("user").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden("bad token").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn only_unique_failures_become_conflicts() {
        let err = ApiError::Internal(anyhow::anyhow!("disk on fire"));
        assert!(matches!(err.unique_as_conflict("taken"), ApiError::Internal(_)));

        let err = ApiError::NotFound("user");
        assert!(matches!(err.unique_as_conflict("taken"), ApiError::NotFound(_)));
    }
}
