//! Application state management

use crate::account::repository::AccountRepository;
use crate::account::service::AccountService;
use crate::auth::password::PasswordHasher;
use crate::auth::revocation::RevocationStore;
use crate::auth::service::AuthService;
use crate::auth::token::TokenCodec;
use anyhow::Context;
use plate_core::config::AppConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers and middleware
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Ready status, cleared during shutdown
    pub is_ready: AtomicBool,
    /// Access/refresh token codec
    pub codec: Arc<TokenCodec>,
    /// Revoked token cache
    pub revocations: Arc<dyn RevocationStore>,
    /// Account storage
    pub accounts: Arc<dyn AccountRepository>,
    /// Login, logout, refresh
    pub auth: AuthService,
    /// Register, profile, password change
    pub account_service: AccountService,
}

impl AppState {
    /// Wire services from config and storage handles
    pub fn new(
        config: AppConfig,
        accounts: Arc<dyn AccountRepository>,
        revocations: Arc<dyn RevocationStore>,
    ) -> anyhow::Result<Self> {
        let codec = Arc::new(TokenCodec::new(&config.auth).context("building token codec")?);
        let hasher =
            PasswordHasher::new(&config.auth.password).context("building password hasher")?;

        Ok(Self {
            auth: AuthService::new(accounts.clone(), codec.clone(), revocations.clone(), &hasher)
                .context("building auth service")?,
            account_service: AccountService::new(accounts.clone(), hasher),
            config,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
            codec,
            revocations,
            accounts,
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
