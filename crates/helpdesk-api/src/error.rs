//! Error taxonomy shared by every handler.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use helpdesk_db::{StoreError, store_error};
use helpdesk_types::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No session, or a session token that failed verification.
    #[error("authentication required")]
    Unauthenticated,

    /// Login attempt with an unknown login or a wrong password.
    #[error("invalid login or password")]
    InvalidCredentials,

    /// Role not permitted, or status transition not permitted.
    #[error("{0}")]
    Forbidden(String),

    /// Id does not resolve, or resolves to something the caller may not see.
    #[error("{0}")]
    NotFound(String),

    /// Missing/blank field or duplicate unique key.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match store_error(&err) {
            Some(StoreError::DuplicateLogin) => Self::validation("login already exists"),
            // The session names an account that was deleted after sign-in.
            Some(StoreError::MissingReference) => Self::Unauthenticated,
            None => Self::Internal(err),
        }
    }
}

/// Malformed or mistyped JSON bodies answer in the same `{error}` shape as
/// every other failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl ApiError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show a client. Internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
