//! Token revocation cache
//!
//! Logged-out tokens are kept in a TTL-bounded deny-list until they would
//! have expired anyway. Access tokens are keyed by their raw string, refresh
//! tokens by the owning account id.
//!
//! Two backends are provided:
//! - [`RedisRevocationStore`] for shared, multi-instance deployments
//! - [`MemoryRevocationStore`] (moka) for single-instance deployments and tests

use async_trait::async_trait;
use moka::{future::Cache, Expiry};
use plate_core::RevocationFailMode;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Revocation cache errors
#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Revocation cache unavailable: {0}")]
    Unavailable(String),
}

/// Deny-list of revoked tokens with per-entry expiry
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Revoke `key` for `ttl`. A zero TTL is a no-op since the token has already expired.
    async fn blacklist(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RevocationError>;

    /// Whether `key` is currently revoked
    async fn is_blacklisted(&self, key: &str) -> Result<bool, RevocationError>;

    /// Drop a revocation entry. Missing keys are not an error.
    async fn clear(&self, key: &str) -> Result<(), RevocationError>;

    /// Readiness probe
    async fn ping(&self) -> Result<(), RevocationError>;

    /// Backend name for logs and readiness output
    fn backend(&self) -> &'static str;
}

/// Look up `key` and apply the configured fail mode to lookup errors
///
/// Under [`RevocationFailMode::Open`] a failed lookup is logged and treated as
/// "not revoked"; under [`RevocationFailMode::Closed`] the error is returned.
pub async fn is_revoked(
    store: &dyn RevocationStore,
    key: &str,
    mode: RevocationFailMode,
) -> Result<bool, RevocationError> {
    match store.is_blacklisted(key).await {
        Ok(revoked) => Ok(revoked),
        Err(e) if mode == RevocationFailMode::Open => {
            tracing::warn!(
                backend = store.backend(),
                error = %e,
                "Revocation lookup failed, failing open"
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// Redis
// ============================================================================

/// Redis-backed revocation store
///
/// Uses `PSETEX` so entries expire with millisecond precision.
#[derive(Clone)]
pub struct RedisRevocationStore {
    conn: ConnectionManager,
}

impl RedisRevocationStore {
    /// Connect to Redis at `url`
    pub async fn connect(url: &str) -> Result<Self, RevocationError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn blacklist(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RevocationError> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let _: () = conn.pset_ex(key, value, millis).await?;
        Ok(())
    }

    async fn is_blacklisted(&self, key: &str) -> Result<bool, RevocationError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn clear(&self, key: &str) -> Result<(), RevocationError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), RevocationError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(RevocationError::Unavailable(format!(
                "unexpected PING reply: {pong}"
            )))
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

// ============================================================================
// In-process (moka)
// ============================================================================

/// Per-entry expiry: every entry lives exactly as long as its token
struct EntryExpiry;

impl Expiry<String, Duration> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, ttl: &Duration, _created_at: Instant) -> Option<Duration> {
        Some(*ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        ttl: &Duration,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(*ttl)
    }
}

/// In-process revocation store
///
/// Entries are not shared between instances, so this backend is only
/// correct when a single API process serves all traffic.
///
/// The cache has no size-based eviction: an entry leaves only when its TTL
/// runs out or it is cleared. Once `max_entries` live entries are held, new
/// revocations are refused with [`RevocationError::Unavailable`].
#[derive(Clone)]
pub struct MemoryRevocationStore {
    cache: Cache<String, Duration>,
    max_entries: u64,
}

impl MemoryRevocationStore {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder().expire_after(EntryExpiry).build();

        Self { cache, max_entries }
    }

    /// `entry_count` lags behind recent writes; it is only trusted after
    /// pending maintenance has run.
    async fn is_full(&self) -> bool {
        if self.cache.entry_count() < self.max_entries {
            return false;
        }
        self.cache.run_pending_tasks().await;
        self.cache.entry_count() >= self.max_entries
    }
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    /// Only the key and TTL are kept; `value` matters to the Redis backend
    async fn blacklist(&self, key: &str, _value: &str, ttl: Duration) -> Result<(), RevocationError> {
        if ttl.is_zero() {
            return Ok(());
        }

        if !self.cache.contains_key(key) && self.is_full().await {
            tracing::error!(
                max_entries = self.max_entries,
                "In-process revocation cache is full"
            );
            return Err(RevocationError::Unavailable(format!(
                "in-process cache holds {} entries",
                self.max_entries
            )));
        }

        self.cache.insert(key.to_string(), ttl).await;
        Ok(())
    }

    async fn is_blacklisted(&self, key: &str) -> Result<bool, RevocationError> {
        Ok(self.cache.get(key).await.is_some())
    }

    async fn clear(&self, key: &str) -> Result<(), RevocationError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), RevocationError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
