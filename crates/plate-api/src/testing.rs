//! In-memory collaborators and fixtures for tests
//!
//! Compiled for unit tests and for integration tests through the
//! `test-utils` feature.

use crate::account::models::{Account, NewAccount};
use crate::account::repository::{AccountRepository, RepositoryError};
use crate::auth::password::PasswordHasher;
use crate::auth::revocation::{MemoryRevocationStore, RevocationError, RevocationStore};
use crate::state::AppState;
use async_trait::async_trait;
use chrono::Utc;
use plate_core::{AppConfig, CacheBackend, PasswordHashConfig, Role};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Cheap Argon2 parameters so tests don't spend seconds hashing
pub fn light_password_config() -> PasswordHashConfig {
    PasswordHashConfig {
        memory_cost: 8192,
        time_cost: 1,
        parallelism: 1,
    }
}

pub fn light_password_hasher() -> PasswordHasher {
    PasswordHasher::new(&light_password_config()).expect("valid test argon2 params")
}

/// Default config with the in-memory cache and light password hashing
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.cache.backend = CacheBackend::Memory;
    config.auth.password = light_password_config();
    config
}

/// App state over in-memory account and revocation stores
pub fn test_state(
    config: AppConfig,
) -> (
    Arc<AppState>,
    Arc<InMemoryAccountRepository>,
    Arc<MemoryRevocationStore>,
) {
    let accounts = Arc::new(InMemoryAccountRepository::new());
    let revocations = Arc::new(MemoryRevocationStore::new(config.cache.memory_max_capacity));
    let state = AppState::new(config, accounts.clone(), revocations.clone())
        .expect("test config builds app state");

    (Arc::new(state), accounts, revocations)
}

/// App state with a caller-supplied revocation store
pub fn test_state_with_revocations(
    config: AppConfig,
    revocations: Arc<dyn RevocationStore>,
) -> Arc<AppState> {
    let accounts = Arc::new(InMemoryAccountRepository::new());
    Arc::new(AppState::new(config, accounts, revocations).expect("test config builds app state"))
}

// ============================================================================
// Account repositories
// ============================================================================

/// HashMap-backed account repository
#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account with `password` hashed under light parameters
    pub async fn seed(&self, email: &str, password: &str, role: Role) -> Account {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            firstname: "Test".to_string(),
            lastname: "Account".to_string(),
            email: email.to_string(),
            password_hash: light_password_hasher()
                .hash(password)
                .expect("hash test password"),
            phone: "+6281200000000".to_string(),
            role,
            created_at: now,
            updated_at: now,
        };

        self.accounts
            .write()
            .await
            .insert(account.id, account.clone());
        account
    }

    pub async fn set_role(&self, id: Uuid, role: Role) {
        if let Some(account) = self.accounts.write().await.get_mut(&id) {
            account.role = role;
            account.updated_at = Utc::now();
        }
    }

    pub async fn remove(&self, id: Uuid) {
        self.accounts.write().await.remove(&id);
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewAccount) -> Result<Account, RepositoryError> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == new.email) {
            return Err(RepositoryError::EmailAlreadyExists);
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            firstname: new.firstname,
            lastname: new.lastname,
            email: new.email,
            password_hash: new.password_hash,
            phone: new.phone,
            role: new.role,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or(RepositoryError::AccountNotFound)?;
        account.password_hash = password_hash.to_string();
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Repository whose every call fails as if the database were down
pub struct FailingAccountRepository;

#[async_trait]
impl AccountRepository for FailingAccountRepository {
    async fn find_by_email(&self, _email: &str) -> Result<Option<Account>, RepositoryError> {
        Err(RepositoryError::DatabaseError("connection refused".to_string()))
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<Account>, RepositoryError> {
        Err(RepositoryError::DatabaseError("connection refused".to_string()))
    }

    async fn create(&self, _account: NewAccount) -> Result<Account, RepositoryError> {
        Err(RepositoryError::DatabaseError("connection refused".to_string()))
    }

    async fn update_password(&self, _id: Uuid, _hash: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::DatabaseError("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Err(RepositoryError::DatabaseError("connection refused".to_string()))
    }
}

// ============================================================================
// Revocation stores
// ============================================================================

/// Revocation store whose every call fails as if the cache were down
#[derive(Default)]
pub struct FailingRevocationStore;

#[async_trait]
impl RevocationStore for FailingRevocationStore {
    async fn blacklist(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), RevocationError> {
        Err(RevocationError::Unavailable("cache down".to_string()))
    }

    async fn is_blacklisted(&self, _key: &str) -> Result<bool, RevocationError> {
        Err(RevocationError::Unavailable("cache down".to_string()))
    }

    async fn clear(&self, _key: &str) -> Result<(), RevocationError> {
        Err(RevocationError::Unavailable("cache down".to_string()))
    }

    async fn ping(&self) -> Result<(), RevocationError> {
        Err(RevocationError::Unavailable("cache down".to_string()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}
