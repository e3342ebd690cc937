//! Authentication module
//!
//! JWT-based session handling with the following components:
//! - Access/refresh token issuance and validation
//! - Revocation cache for logged-out tokens (Redis or in-process)
//! - Password hashing with Argon2
//! - Middleware guarding authenticated routes
//! - Authentication service (login, logout, refresh)

pub mod middleware;
pub mod password;
pub mod revocation;
pub mod service;
pub mod token;

pub use middleware::{
    require_access_token, require_refresh_token, require_session_access_token, AccessSession,
    RefreshSession,
};
pub use password::{validate_password_strength, verify_password, PasswordError, PasswordHasher};
pub use revocation::{
    is_revoked, MemoryRevocationStore, RedisRevocationStore, RevocationError, RevocationStore,
};
pub use service::{AuthResponse, AuthService, LoginRequest};
pub use token::{
    extract_bearer, remaining_ttl, AccessClaims, AccessPayload, Claims, RefreshClaims,
    RefreshPayload, TokenCodec, TokenError,
};
