//! Account service layer
//!
//! Registration, profile lookup and password change for authenticated accounts.

use super::models::{AccountPublic, ChangePasswordRequest, NewAccount, RegisterRequest};
use super::repository::{AccountRepository, RepositoryError};
use crate::auth::password::{
    validate_password_strength, verify_password_blocking, PasswordHasher,
};
use crate::error::AppError;
use plate_core::Role;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Account management service
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    hasher: PasswordHasher,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountRepository>, hasher: PasswordHasher) -> Self {
        Self { accounts, hasher }
    }

    /// Register a new account with the default `user` role
    ///
    /// # Returns
    ///
    /// * `Ok(AccountPublic)` - Newly created account
    /// * `Err(AppError::InvalidArgument)` - Request failed validation or password too weak
    /// * `Err(AppError::AlreadyExists)` - Email already registered
    pub async fn register(&self, request: RegisterRequest) -> Result<AccountPublic, AppError> {
        request.validate()?;
        validate_password_strength(&request.password)?;

        let email = normalize_email(&request.email);
        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(AppError::AlreadyExists(format!(
                "Email {email} already registered"
            )));
        }

        let password_hash = self.hasher.hash_blocking(request.password).await?;

        let account = self
            .accounts
            .create(NewAccount {
                firstname: request.firstname.trim().to_string(),
                lastname: request.lastname.trim().to_string(),
                email,
                password_hash,
                phone: request.phone,
                role: Role::User,
            })
            .await?;

        tracing::info!(account_id = %account.id, "Account registered");
        Ok(account.into())
    }

    /// Public profile of an authenticated account
    pub async fn me(&self, account_id: Uuid) -> Result<AccountPublic, AppError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .map(AccountPublic::from)
            .ok_or_else(|| AppError::NotFound("Account".to_string()))
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        account_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        request.validate()?;

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account".to_string()))?;

        let matches =
            verify_password_blocking(request.old_password, account.password_hash.clone()).await?;
        if !matches {
            return Err(AppError::InvalidCredentials);
        }

        validate_password_strength(&request.new_password)?;
        let password_hash = self.hasher.hash_blocking(request.new_password).await?;

        match self.accounts.update_password(account.id, &password_hash).await {
            Ok(()) => {}
            Err(RepositoryError::AccountNotFound) => {
                return Err(AppError::NotFound("Account".to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(account_id = %account.id, "Password changed");
        Ok(())
    }
}

/// Emails are matched case-insensitively
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
