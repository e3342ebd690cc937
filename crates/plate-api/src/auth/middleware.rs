/// Authentication middleware for protecting routes
///
/// `require_access_token` guards every authenticated route and reads the
/// `Authorization: Bearer` header. Refresh and logout use
/// `require_session_access_token`, which accepts an access token past its
/// expiry, together with `require_refresh_token`, which reads the refresh
/// token from its own header (`RF-Token` unless configured otherwise).
///
/// On success the validated token and its claims are inserted into request
/// extensions as [`AccessSession`] / [`RefreshSession`].
use super::revocation::is_revoked;
use super::token::{extract_bearer, AccessClaims, RefreshClaims};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Validated access token attached by [`require_access_token`]
///
/// Extract in handlers with `Extension<AccessSession>`.
#[derive(Debug, Clone)]
pub struct AccessSession {
    /// Raw token as presented
    pub token: String,
    pub claims: AccessClaims,
}

/// Validated refresh token attached by [`require_refresh_token`]
#[derive(Debug, Clone)]
pub struct RefreshSession {
    /// Raw token as presented
    pub token: String,
    pub claims: RefreshClaims,
}

/// Require a valid, non-revoked access token
///
/// # Usage
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
///
/// let app = Router::new()
///     .route("/me", get(me_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_access_token));
/// ```
pub async fn require_access_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate_access(&state, request, next, true).await
}

/// Require a correctly signed, non-revoked access token, expired or not
///
/// Only for routes that also run [`require_refresh_token`]: an expired
/// access token still names the session being refreshed or closed.
pub async fn require_session_access_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate_access(&state, request, next, false).await
}

async fn authenticate_access(
    state: &AppState,
    mut request: Request,
    next: Next,
    check_expiry: bool,
) -> Result<Response, AppError> {
    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthenticated("Invalid Authorization header".to_string()))?;
    let token = extract_bearer(header_value)?.to_string();

    if is_revoked(
        state.revocations.as_ref(),
        &token,
        state.config.auth.revocation_fail_mode,
    )
    .await?
    {
        audit_log(&AuditEvent::RevokedTokenUsed {
            token_kind: "access".to_string(),
            account_id: None,
            ip_address,
            user_agent,
        });
        return Err(AppError::Unauthenticated(
            "Token has been revoked".to_string(),
        ));
    }

    let validated = if check_expiry {
        state.codec.validate_access(&token)
    } else {
        state.codec.validate_access_allow_expired(&token)
    };
    let claims = match validated {
        Ok(claims) => claims,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                token_kind: "access".to_string(),
                ip_address,
                user_agent,
                reason: e.to_string(),
            });
            return Err(e.into());
        }
    };

    request
        .extensions_mut()
        .insert(AccessSession { token, claims });

    Ok(next.run(request).await)
}

/// Require a valid refresh token whose account has not logged out
pub async fn require_refresh_token(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());
    let header_name = state.config.auth.refresh_header.as_str();

    let token = request
        .headers()
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthenticated(format!("Missing {header_name} header")))?
        .to_string();

    let claims = match state.codec.validate_refresh(&token) {
        Ok(claims) => claims,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                token_kind: "refresh".to_string(),
                ip_address,
                user_agent,
                reason: e.to_string(),
            });
            return Err(e.into());
        }
    };

    if is_revoked(
        state.revocations.as_ref(),
        &claims.payload.account_id.to_string(),
        state.config.auth.revocation_fail_mode,
    )
    .await?
    {
        audit_log(&AuditEvent::RevokedTokenUsed {
            token_kind: "refresh".to_string(),
            account_id: Some(claims.payload.account_id),
            ip_address,
            user_agent,
        });
        return Err(AppError::Unauthenticated(
            "Token has been revoked".to_string(),
        ));
    }

    request
        .extensions_mut()
        .insert(RefreshSession { token, claims });

    Ok(next.run(request).await)
}
