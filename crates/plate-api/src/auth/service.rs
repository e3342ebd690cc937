//! Authentication service layer
//!
//! Login, logout and token refresh on top of the account store, the token
//! codec and the revocation cache.
//!
//! Session lifecycle:
//! - `login`: anonymous → access + refresh token pair
//! - `refresh`: refresh token → new access token (refresh token is not rotated)
//! - `logout`: both tokens are revoked until they would have expired

use super::password::{verify_password_blocking, PasswordError, PasswordHasher};
use super::revocation::RevocationStore;
use super::token::{AccessClaims, AccessPayload, RefreshClaims, RefreshPayload, TokenCodec, TokenError};
use crate::account::models::{Account, AccountPublic};
use crate::account::repository::AccountRepository;
use crate::account::service::normalize_email;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinError;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Authentication response with tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub account: AccountPublic,
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    codec: Arc<TokenCodec>,
    revocations: Arc<dyn RevocationStore>,
    /// Verified against when the email is unknown
    dummy_hash: Arc<str>,
}

impl AuthService {
    /// Build the service; `hasher` produces the placeholder hash checked on
    /// unknown emails, so it must carry the production cost parameters.
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        codec: Arc<TokenCodec>,
        revocations: Arc<dyn RevocationStore>,
        hasher: &PasswordHasher,
    ) -> Result<Self, PasswordError> {
        let dummy_hash = hasher.hash(&Uuid::new_v4().to_string())?;

        Ok(Self {
            accounts,
            codec,
            revocations,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Login with email and password
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`.
    /// A refresh revocation left behind by an earlier logout of the same
    /// account is cleared before the new pair is issued.
    ///
    /// # Returns
    ///
    /// * `Ok(AuthResponse)` - Account plus fresh access and refresh tokens
    /// * `Err(AppError::InvalidCredentials)` - Unknown email or wrong password
    /// * `Err(AppError::Internal)` - Store, cache or signing failure
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let email = normalize_email(email);

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            // same Argon2 cost as a wrong password
            let _ = verify_password_blocking(password.to_string(), self.dummy_hash.to_string()).await;
            return Err(AppError::InvalidCredentials);
        };

        let matches =
            verify_password_blocking(password.to_string(), account.password_hash.clone()).await?;
        if !matches {
            return Err(AppError::InvalidCredentials);
        }

        self.revocations.clear(&account.id.to_string()).await?;

        let (access_token, refresh_token) = self.issue_pair(&account).await?;

        tracing::debug!(account_id = %account.id, "Issued token pair");
        Ok(AuthResponse {
            account: account.into(),
            access_token,
            refresh_token,
        })
    }

    /// Revoke both tokens of a session
    ///
    /// The access token is keyed by its raw string, the refresh token by the
    /// account id. Both writes run concurrently and both results are checked.
    pub async fn logout(
        &self,
        access_token: &str,
        access: &AccessClaims,
        refresh_token: &str,
        refresh: &RefreshClaims,
    ) -> Result<(), AppError> {
        let account_key = refresh.payload.account_id.to_string();

        let (access_result, refresh_result) = tokio::join!(
            self.revocations
                .blacklist(access_token, access_token, access.remaining_ttl()),
            self.revocations
                .blacklist(&account_key, refresh_token, refresh.remaining_ttl()),
        );

        let failures: Vec<String> = [("access", access_result), ("refresh", refresh_result)]
            .into_iter()
            .filter_map(|(kind, result)| result.err().map(|e| format!("{kind} token: {e}")))
            .collect();

        if !failures.is_empty() {
            tracing::error!(
                account_id = %access.payload.account_id,
                failures = ?failures,
                "Failed to revoke session tokens"
            );
            return Err(AppError::Internal(format!(
                "failed to revoke {}",
                failures.join("; ")
            )));
        }

        Ok(())
    }

    /// Issue a new access token for the account behind a refresh token
    ///
    /// Claims are rebuilt from the live account record, so role or email
    /// changes since login are picked up. The refresh token is returned as is.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        refresh: &RefreshClaims,
    ) -> Result<AuthResponse, AppError> {
        let account = self
            .accounts
            .find_by_id(refresh.payload.account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account".to_string()))?;

        let access_token = self.codec.issue_access(access_payload(&account))?;

        Ok(AuthResponse {
            account: account.into(),
            access_token,
            refresh_token: refresh_token.to_string(),
        })
    }

    /// Sign access and refresh tokens as two independent blocking tasks
    ///
    /// Both tasks are awaited before either result is used; if either fails
    /// no token leaves this function.
    async fn issue_pair(&self, account: &Account) -> Result<(String, String), AppError> {
        let access_codec = Arc::clone(&self.codec);
        let refresh_codec = Arc::clone(&self.codec);
        let access_claims = access_payload(account);
        let refresh_claims = RefreshPayload {
            account_id: account.id,
        };

        let (access, refresh) = tokio::join!(
            tokio::task::spawn_blocking(move || access_codec.issue_access(access_claims)),
            tokio::task::spawn_blocking(move || refresh_codec.issue_refresh(refresh_claims)),
        );

        match (joined(access, "access"), joined(refresh, "refresh")) {
            (Ok(access), Ok(refresh)) => Ok((access, refresh)),
            (access, refresh) => {
                let failures: Vec<String> =
                    [access.err(), refresh.err()].into_iter().flatten().collect();
                Err(AppError::Internal(format!(
                    "token generation failed: {}",
                    failures.join("; ")
                )))
            }
        }
    }
}

fn access_payload(account: &Account) -> AccessPayload {
    AccessPayload {
        account_id: account.id,
        email: account.email.clone(),
        role: account.role,
    }
}

fn joined(
    result: Result<Result<String, TokenError>, JoinError>,
    kind: &str,
) -> Result<String, String> {
    match result {
        Ok(Ok(token)) => Ok(token),
        Ok(Err(e)) => Err(format!("{kind} token: {e}")),
        Err(e) => Err(format!("{kind} token task: {e}")),
    }
}
