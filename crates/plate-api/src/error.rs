//! API error handling
//!
//! Every failure surfaced over HTTP passes through [`AppError`]. Module-level
//! errors (token, revocation, repository, password) convert into it so
//! handlers and services can use `?` throughout.

use crate::account::repository::RepositoryError;
use crate::auth::password::PasswordError;
use crate::auth::revocation::RevocationError;
use crate::auth::token::TokenError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn invalid_credentials() -> Self {
        Self::new("INVALID_CREDENTIALS", "Invalid email or password")
    }

    pub fn unauthenticated() -> Self {
        Self::new("UNAUTHENTICATED", "Authentication required")
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("INVALID_ARGUMENT", message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new("ALREADY_EXISTS", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Unknown email or wrong password; the two are indistinguishable to clients
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Detail is logged server-side and never sent to the client
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::InvalidCredentials => ApiError::invalid_credentials(),
            AppError::Unauthenticated(reason) => ApiError::unauthenticated().with_details(reason),
            AppError::NotFound(resource) => ApiError::not_found(&resource),
            AppError::InvalidArgument(msg) => ApiError::invalid_argument(msg),
            AppError::AlreadyExists(msg) => ApiError::already_exists(msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed with internal error");
                ApiError::internal_error()
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) | TokenError::Key(_) => AppError::Internal(err.to_string()),
            TokenError::InvalidToken(_)
            | TokenError::SignatureInvalid
            | TokenError::MalformedHeader => AppError::Unauthenticated(err.to_string()),
        }
    }
}

impl From<RevocationError> for AppError {
    fn from(err: RevocationError) -> Self {
        AppError::Internal(format!("Revocation cache: {err}"))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::AccountNotFound => AppError::NotFound("Account".to_string()),
            RepositoryError::EmailAlreadyExists => {
                AppError::AlreadyExists("Email already registered".to_string())
            }
            RepositoryError::DatabaseError(msg) => AppError::Internal(format!("Database: {msg}")),
            RepositoryError::CorruptRecord(msg) => {
                AppError::Internal(format!("Corrupt account record: {msg}"))
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(msg) => AppError::InvalidArgument(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidArgument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Unauthenticated("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::NotFound("Account".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidArgument("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::AlreadyExists("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let response = AppError::Internal("redis connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["message"], "Internal server error");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_token_error_conversion() {
        assert!(matches!(
            AppError::from(TokenError::SignatureInvalid),
            AppError::Unauthenticated(_)
        ));
        assert!(matches!(
            AppError::from(TokenError::Signing("boom".into())),
            AppError::Internal(_)
        ));
    }
}
