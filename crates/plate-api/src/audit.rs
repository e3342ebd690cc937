//! Security audit logging for authentication events
//!
//! Logins, logouts, token refreshes, registrations and rejected tokens are
//! logged at INFO level on the `audit` target so they can be filtered and
//! routed separately from application logs, e.g.
//! `RUST_LOG=info,audit=info` or a dedicated JSON sink.
//!
//! # Example
//!
//! ```ignore
//! use plate_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     account_id: account.id,
//!     email: account.email.clone(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: None,
//! });
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events for authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful login
    LoginSuccess {
        account_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login attempt
    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Session revoked
    Logout {
        account_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Access token reissued from a refresh token
    TokenRefresh {
        account_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Successful self-registration
    RegistrationSuccess {
        account_id: Uuid,
        email: String,
        role: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed registration attempt
    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Password change
    PasswordChange {
        account_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Token failed validation (bad signature, expired, malformed)
    InvalidToken {
        token_kind: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },

    /// Token was valid but has been revoked by logout
    RevokedTokenUsed {
        token_kind: String,
        account_id: Option<Uuid>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::Logout { .. } => "Logout",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::RevokedTokenUsed { .. } => "Revoked token used",
        }
    }

    fn account_id(&self) -> Option<Uuid> {
        match self {
            AuditEvent::LoginSuccess { account_id, .. }
            | AuditEvent::Logout { account_id, .. }
            | AuditEvent::TokenRefresh { account_id, .. }
            | AuditEvent::RegistrationSuccess { account_id, .. }
            | AuditEvent::PasswordChange { account_id, .. } => Some(*account_id),
            AuditEvent::RevokedTokenUsed { account_id, .. } => *account_id,
            AuditEvent::LoginFailure { .. }
            | AuditEvent::RegistrationFailure { .. }
            | AuditEvent::InvalidToken { .. } => None,
        }
    }

    fn ip_address(&self) -> Option<&str> {
        match self {
            AuditEvent::LoginSuccess { ip_address, .. }
            | AuditEvent::LoginFailure { ip_address, .. }
            | AuditEvent::Logout { ip_address, .. }
            | AuditEvent::TokenRefresh { ip_address, .. }
            | AuditEvent::RegistrationSuccess { ip_address, .. }
            | AuditEvent::RegistrationFailure { ip_address, .. }
            | AuditEvent::PasswordChange { ip_address, .. }
            | AuditEvent::InvalidToken { ip_address, .. }
            | AuditEvent::RevokedTokenUsed { ip_address, .. } => ip_address.as_deref(),
        }
    }
}

/// Log a security audit event with structured fields
///
/// The full event is serialised to JSON under the `event` field; the account
/// id and client IP are also emitted as top-level fields for filtering.
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %Utc::now(),
        event = %event_json,
        account_id = ?event.account_id(),
        ip_address = ?event.ip_address(),
        "{}",
        event.summary()
    );
}

/// Extract client IP from proxy headers
///
/// Checks X-Forwarded-For (first hop), then X-Real-IP.
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|xff| xff.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return Some(first_ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|ip| ip.to_string())
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
