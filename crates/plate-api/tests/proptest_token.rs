//! Property tests for token issuance and revocation

use plate_api::auth::{
    AccessPayload, MemoryRevocationStore, RefreshPayload, RevocationStore, TokenCodec, TokenError,
};
use plate_core::{AuthConfig, Role};
use proptest::prelude::*;
use std::time::Duration;
use uuid::Uuid;

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::User), Just(Role::Admin), Just(Role::Superadmin)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn access_token_round_trips(
        id in any::<u128>(),
        email in "[a-z0-9._]{1,20}@[a-z]{1,10}\\.[a-z]{2,4}",
        role in role_strategy(),
    ) {
        let codec = TokenCodec::new(&AuthConfig::default()).unwrap();
        let payload = AccessPayload { account_id: Uuid::from_u128(id), email, role };

        let token = codec.issue_access(payload.clone()).unwrap();
        let claims = codec.validate_access(&token).unwrap();

        prop_assert_eq!(claims.payload, payload);
    }

    #[test]
    fn refresh_token_never_validates_as_access(id in any::<u128>()) {
        let codec = TokenCodec::new(&AuthConfig::default()).unwrap();
        let token = codec
            .issue_refresh(RefreshPayload { account_id: Uuid::from_u128(id) })
            .unwrap();

        prop_assert!(matches!(
            codec.validate_access(&token),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn tampered_token_is_rejected(id in any::<u128>(), flip in 0usize..16) {
        let codec = TokenCodec::new(&AuthConfig::default()).unwrap();
        let token = codec
            .issue_refresh(RefreshPayload { account_id: Uuid::from_u128(id) })
            .unwrap();

        // the last signature character carries padding bits, leave it alone
        let sig_start = token.rfind('.').unwrap() + 1;
        let idx = sig_start + flip % (token.len() - sig_start - 1);
        let mut bytes = token.into_bytes();
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        prop_assert!(codec.validate_refresh(&tampered).is_err());
    }

    #[test]
    fn blacklisted_keys_are_revoked(keys in prop::collection::hash_set("[a-z0-9]{8,32}", 1..16)) {
        let store = MemoryRevocationStore::default();

        tokio_test::block_on(async {
            for key in &keys {
                store.blacklist(key, key, Duration::from_secs(60)).await.unwrap();
            }
            for key in &keys {
                assert!(store.is_blacklisted(key).await.unwrap());
            }
            assert!(!store.is_blacklisted("not-a-listed-key!").await.unwrap());
        });
    }
}
