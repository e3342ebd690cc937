//! JWT access/refresh token issuance and validation
//!
//! Access and refresh tokens are signed with independent HMAC secrets and
//! lifetimes taken from [`AuthConfig`]. Validation pins the configured
//! algorithm so a token carrying any other `alg` header is rejected before
//! its signature is looked at.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use plate_core::{AuthConfig, Role, TokenKeyConfig};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Token codec errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Invalid signing key configuration: {0}")]
    Key(String),

    /// Signature checked out but the token is not acceptable (expired, not yet valid, ...)
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token signature is invalid")]
    SignatureInvalid,

    #[error("Expected authorization header format \"Bearer <token>\"")]
    MalformedHeader,
}

/// Claims carried by access tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPayload {
    pub account_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Claims carried by refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub account_id: Uuid,
}

/// Registered claims wrapped around a role-specific payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims<P> {
    #[serde(flatten)]
    pub payload: P,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

impl<P> Claims<P> {
    /// Time left before this token expires, zero once it has
    pub fn remaining_ttl(&self) -> Duration {
        remaining_ttl(self.exp)
    }
}

pub type AccessClaims = Claims<AccessPayload>;
pub type RefreshClaims = Claims<RefreshPayload>;

/// Signing material for one token kind
#[derive(Clone)]
struct KeySet {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl_secs: i64,
}

impl KeySet {
    fn from_config(config: &TokenKeyConfig) -> Result<Self, TokenError> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|e| TokenError::Key(format!("{}: {e}", config.algorithm)))?;

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            algorithm,
            ttl_secs: config.ttl_secs,
        })
    }

    fn issue<P: Serialize>(&self, payload: P) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let exp = now
            .checked_add(self.ttl_secs)
            .ok_or_else(|| TokenError::Key(format!("ttl of {}s overflows exp", self.ttl_secs)))?;
        let claims = Claims {
            payload,
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn validate<P: DeserializeOwned>(
        &self,
        token: &str,
        check_expiry: bool,
    ) -> Result<Claims<P>, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = check_expiry;

        decode::<Claims<P>>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::InvalidToken("token has expired".into()),
                ErrorKind::ImmatureSignature => {
                    TokenError::InvalidToken("token is not valid yet".into())
                }
                ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::InvalidSubject
                | ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidToken(e.to_string()),
                _ => TokenError::SignatureInvalid,
            })
    }
}

/// Issues and validates access and refresh tokens
#[derive(Clone)]
pub struct TokenCodec {
    access: KeySet,
    refresh: KeySet,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_algorithm", &self.access.algorithm)
            .field("access_ttl_secs", &self.access.ttl_secs)
            .field("refresh_algorithm", &self.refresh.algorithm)
            .field("refresh_ttl_secs", &self.refresh.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from the auth section of the application config
    ///
    /// Secret strength is checked by `AppConfig::validate`, not here.
    pub fn new(config: &AuthConfig) -> Result<Self, TokenError> {
        Ok(Self {
            access: KeySet::from_config(&config.access)?,
            refresh: KeySet::from_config(&config.refresh)?,
        })
    }

    /// Sign a new access token
    ///
    /// # Arguments
    ///
    /// * `payload` - Account id, email and role to embed
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Compact JWS
    /// * `Err(TokenError::Signing)` - If the signing primitive fails
    pub fn issue_access(&self, payload: AccessPayload) -> Result<String, TokenError> {
        self.access.issue(payload)
    }

    /// Sign a new refresh token
    pub fn issue_refresh(&self, payload: RefreshPayload) -> Result<String, TokenError> {
        self.refresh.issue(payload)
    }

    /// Verify an access token and return its claims
    ///
    /// # Returns
    ///
    /// * `Ok(AccessClaims)` - Signature and expiry check out
    /// * `Err(TokenError::InvalidToken)` - Signature valid but token expired or otherwise unacceptable
    /// * `Err(TokenError::SignatureInvalid)` - Anything else (bad signature, wrong algorithm, garbage)
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.access.validate(token, true)
    }

    /// Verify an access token's signature and algorithm but accept it past `exp`
    ///
    /// Used where the access token only identifies the session (refresh and
    /// logout) and the refresh token carries the authority.
    pub fn validate_access_allow_expired(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.access.validate(token, false)
    }

    /// Verify a refresh token and return its claims
    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.refresh.validate(token, true)
    }
}

/// Wall-clock time until `exp` (Unix seconds), saturating at zero
pub fn remaining_ttl(exp: i64) -> Duration {
    let remaining_ms = exp
        .saturating_mul(1000)
        .saturating_sub(Utc::now().timestamp_millis());

    u64::try_from(remaining_ms)
        .map(Duration::from_millis)
        .unwrap_or(Duration::ZERO)
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn extract_bearer(header: &str) -> Result<&str, TokenError> {
    let mut parts = header.split(' ');

    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(TokenError::MalformedHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&AuthConfig::default()).unwrap()
    }

    fn access_payload() -> AccessPayload {
        AccessPayload {
            account_id: Uuid::new_v4(),
            email: "owner@example.com".to_string(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_access_round_trip() {
        let codec = codec();
        let payload = access_payload();

        let token = codec.issue_access(payload.clone()).unwrap();
        let claims = codec.validate_access(&token).unwrap();

        assert_eq!(claims.payload, payload);
        assert_eq!(claims.exp - claims.iat, 600);
        assert!(Uuid::parse_str(&claims.jti).is_ok());
    }

    #[test]
    fn test_refresh_round_trip() {
        let codec = codec();
        let account_id = Uuid::new_v4();

        let token = codec.issue_refresh(RefreshPayload { account_id }).unwrap();
        let claims = codec.validate_refresh(&token).unwrap();

        assert_eq!(claims.payload.account_id, account_id);
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
    }

    #[test]
    fn test_tokens_issued_back_to_back_differ() {
        let codec = codec();
        let payload = access_payload();

        let first = codec.issue_access(payload.clone()).unwrap();
        let second = codec.issue_access(payload).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_expired_token() {
        let mut config = AuthConfig::default();
        config.access.ttl_secs = -1;
        let codec = TokenCodec::new(&config).unwrap();

        let token = codec.issue_access(access_payload()).unwrap();
        let result = codec.validate_access(&token);
        assert!(matches!(result, Err(TokenError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_access_token_still_identifies_session() {
        let mut config = AuthConfig::default();
        config.access.ttl_secs = -1;
        let expired = TokenCodec::new(&config).unwrap();
        let payload = access_payload();

        let token = expired.issue_access(payload.clone()).unwrap();
        let claims = codec().validate_access_allow_expired(&token).unwrap();
        assert_eq!(claims.payload, payload);

        // signature is still enforced
        let mut other = AuthConfig::default();
        other.access.secret = "a-completely-different-access-secret-0000".to_string();
        let forged = TokenCodec::new(&other).unwrap().issue_access(access_payload()).unwrap();
        assert!(matches!(
            codec().validate_access_allow_expired(&forged),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_overflowing_ttl_is_a_key_error() {
        let mut config = AuthConfig::default();
        config.refresh.ttl_secs = i64::MAX;
        let codec = TokenCodec::new(&config).unwrap();

        let result = codec.issue_refresh(RefreshPayload {
            account_id: Uuid::new_v4(),
        });
        assert!(matches!(result, Err(TokenError::Key(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let codec = codec();
        let mut other = AuthConfig::default();
        other.access.secret = "a-completely-different-access-secret-0000".to_string();
        let other = TokenCodec::new(&other).unwrap();

        let token = other.issue_access(access_payload()).unwrap();
        assert!(matches!(
            codec.validate_access(&token),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let codec = codec();
        let token = codec.issue_access(access_payload()).unwrap();
        assert!(matches!(
            codec.validate_refresh(&token),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_algorithm_confusion_rejected() {
        // Same secret, different HMAC variant
        let mut config = AuthConfig::default();
        config.access.algorithm = "HS512".to_string();
        let hs512 = TokenCodec::new(&config).unwrap();

        let token = hs512.issue_access(access_payload()).unwrap();
        assert!(hs512.validate_access(&token).is_ok());
        assert!(matches!(
            codec().validate_access(&token),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            codec().validate_access("invalid.token.here"),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_signing_failure_surfaces() {
        let mut config = AuthConfig::default();
        config.refresh.algorithm = "RS256".to_string();
        let codec = TokenCodec::new(&config).unwrap();

        let result = codec.issue_refresh(RefreshPayload {
            account_id: Uuid::new_v4(),
        });
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_unknown_algorithm() {
        let mut config = AuthConfig::default();
        config.access.algorithm = "HS999".to_string();
        assert!(matches!(
            TokenCodec::new(&config),
            Err(TokenError::Key(_))
        ));
    }

    #[test]
    fn test_remaining_ttl() {
        let now = Utc::now().timestamp();
        assert_eq!(remaining_ttl(now - 10), Duration::ZERO);

        let left = remaining_ttl(now + 60);
        assert!(left <= Duration::from_secs(60));
        assert!(left > Duration::from_secs(58));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");

        for header in [
            "",
            "Bearer",
            "Bearer ",
            "bearer abc",
            "Basic abc",
            "Bearer abc def",
            "Bearer  abc",
        ] {
            assert!(
                matches!(extract_bearer(header), Err(TokenError::MalformedHeader)),
                "{header:?} should be rejected"
            );
        }
    }
}
