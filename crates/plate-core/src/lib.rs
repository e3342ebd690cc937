//! Plate Core - Configuration and shared domain types
//!
//! This crate holds the pieces shared by every plate service:
//! - Configuration management (env + TOML)
//! - Account roles

pub mod config;

pub use config::{
    AppConfig, AuthConfig, CacheBackend, CacheConfig, ConfigError, DatabaseConfig, LoggingConfig,
    PasswordHashConfig, RevocationFailMode, ServerConfig, TokenKeyConfig,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Roles
// ============================================================================

/// Account role carried in access tokens
///
/// - `User`: regular customer account (default for self-registration)
/// - `Admin`: outlet staff
/// - `Superadmin`: platform operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl Role {
    /// Lowercase name as persisted and serialised
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored role string is not recognised
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
