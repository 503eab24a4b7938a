//! Mapping of failures to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kbot_harness::HarnessError;
use serde::Serialize;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    InvalidRequest(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Harness(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Harness(e) if e.is_user_error() => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Harness(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(StoreError::DuplicateChallenge(_)) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Harness(e) => e.kind(),
            ApiError::Store(StoreError::DuplicateChallenge(_)) => "duplicate_challenge",
            ApiError::Store(StoreError::ChallengeNotFound(_)) => "challenge_not_found",
            ApiError::Store(StoreError::UserNotFound(_)) => "user_not_found",
            ApiError::InvalidRequest(_) => "invalid_argument",
        }
    }
}

impl From<kbot_core::CoreError> for ApiError {
    fn from(err: kbot_core::CoreError) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}: {}", self.kind(), self);
        } else {
            tracing::debug!("{}: {}", self.kind(), self);
        }
        let retryable = matches!(&self, ApiError::Harness(e) if e.is_retryable());
        let body = ErrorBody { error: self.kind(), message: self.to_string(), retryable };
        (status, Json(body)).into_response()
    }
}
