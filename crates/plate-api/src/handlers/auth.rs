//! Authentication API handlers
//!
//! Login, logout and access token refresh.

use super::parse_json;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{AccessSession, AuthResponse, LoginRequest, RefreshSession};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

/// Login with email and password
///
/// Returns the account together with a short-lived access token and a
/// long-lived refresh token.
///
/// # Responses
///
/// * `200 OK` - Authentication successful
/// * `400 Bad Request` - Malformed body
/// * `401 Unauthorized` - Invalid credentials
/// * `500 Internal Server Error` - Server error
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let request = parse_json(payload)?;
    request.validate()?;

    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);

    match state.auth.login(&request.email, &request.password).await {
        Ok(response) => {
            audit_log(&AuditEvent::LoginSuccess {
                account_id: response.account.id,
                email: response.account.email.clone(),
                ip_address,
                user_agent,
            });
            Ok(Json(response))
        }
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                email: request.email,
                reason: e.to_string(),
                ip_address,
                user_agent,
            });
            Err(e)
        }
    }
}

/// Logout current session
///
/// Revokes the presented access token and the account's refresh token until
/// they would have expired. Requires both the bearer access token (expired
/// is accepted) and the refresh token header.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [], "refresh_token" = [])
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(access): Extension<AccessSession>,
    Extension(refresh): Extension<RefreshSession>,
) -> Result<StatusCode, AppError> {
    ensure_same_account(&access, &refresh)?;

    state
        .auth
        .logout(&access.token, &access.claims, &refresh.token, &refresh.claims)
        .await?;

    audit_log(&AuditEvent::Logout {
        account_id: access.claims.payload.account_id,
        email: access.claims.payload.email.clone(),
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Refresh access token
///
/// Issues a new access token from the live account record. The bearer
/// access token may already be expired; the refresh token is returned
/// unchanged.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "Token refreshed", body = AuthResponse),
        (status = 401, description = "Invalid or revoked token", body = crate::error::ApiError),
        (status = 404, description = "Account no longer exists", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [], "refresh_token" = [])
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(access): Extension<AccessSession>,
    Extension(refresh): Extension<RefreshSession>,
) -> Result<Json<AuthResponse>, AppError> {
    ensure_same_account(&access, &refresh)?;

    let response = state.auth.refresh(&refresh.token, &refresh.claims).await?;

    audit_log(&AuditEvent::TokenRefresh {
        account_id: response.account.id,
        email: response.account.email.clone(),
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    Ok(Json(response))
}

/// Access and refresh tokens must belong to the same account
fn ensure_same_account(access: &AccessSession, refresh: &RefreshSession) -> Result<(), AppError> {
    if access.claims.payload.account_id != refresh.claims.payload.account_id {
        tracing::warn!(
            access_account = %access.claims.payload.account_id,
            refresh_account = %refresh.claims.payload.account_id,
            "Access and refresh tokens belong to different accounts"
        );
        return Err(AppError::Unauthenticated(
            "Access and refresh tokens do not match".to_string(),
        ));
    }
    Ok(())
}
