//! Account API handlers

use super::parse_json;
use crate::account::{AccountPublic, ChangePasswordRequest, RegisterRequest};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::AccessSession;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use std::sync::Arc;

/// Register a new account
///
/// New accounts get the `user` role.
#[utoipa::path(
    post,
    path = "/api/v1/accounts/register",
    tag = "accounts",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account registered", body = AccountPublic),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountPublic>), AppError> {
    let request = parse_json(payload)?;
    let email = request.email.clone();
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);

    match state.account_service.register(request).await {
        Ok(account) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                account_id: account.id,
                email: account.email.clone(),
                role: account.role.to_string(),
                ip_address,
                user_agent,
            });
            Ok((StatusCode::CREATED, Json(account)))
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: e.to_string(),
                ip_address,
                user_agent,
            });
            Err(e)
        }
    }
}

/// Current account profile
#[utoipa::path(
    get,
    path = "/api/v1/accounts/me",
    tag = "accounts",
    responses(
        (status = 200, description = "Current account", body = AccountPublic),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Account no longer exists", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AccessSession>,
) -> Result<Json<AccountPublic>, AppError> {
    let account = state
        .account_service
        .me(session.claims.payload.account_id)
        .await?;
    Ok(Json(account))
}

/// Change password of the current account
#[utoipa::path(
    put,
    path = "/api/v1/accounts/change-password",
    tag = "accounts",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid input or weak password", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized or wrong current password", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(session): Extension<AccessSession>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let request = parse_json(payload)?;
    let account_id = session.claims.payload.account_id;

    state
        .account_service
        .change_password(account_id, request)
        .await?;

    audit_log(&AuditEvent::PasswordChange {
        account_id,
        email: session.claims.payload.email.clone(),
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    Ok(StatusCode::NO_CONTENT)
}
