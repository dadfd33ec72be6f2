//! Property-based tests for PKCE and token issuance.

use std::collections::HashSet;

use proptest::prelude::*;

use mcp_auth_proxy::server::oauth::OAuthStore;
use mcp_auth_proxy::server::oauth::pkce::{challenge_s256, constant_time_eq, verify_s256};

/// RFC 7636 §4.1 verifier alphabet, 43 to 128 characters.
fn arb_verifier() -> impl Strategy<Value = String> {
    "[A-Za-z0-9._~-]{43,128}"
}

proptest! {
    /// A verifier always satisfies its own challenge.
    #[test]
    fn verifier_matches_own_challenge(verifier in arb_verifier()) {
        let challenge = challenge_s256(&verifier);
        prop_assert_eq!(challenge.len(), 43);
        prop_assert!(!challenge.contains('='));
        prop_assert!(verify_s256(&verifier, &challenge));
    }

    /// A different verifier never satisfies the challenge.
    #[test]
    fn other_verifier_rejected(a in arb_verifier(), b in arb_verifier()) {
        prop_assume!(a != b);
        prop_assert!(!verify_s256(&b, &challenge_s256(&a)));
    }

    /// The challenge itself is not a valid verifier for itself.
    #[test]
    fn challenge_is_not_verifier(verifier in arb_verifier()) {
        let challenge = challenge_s256(&verifier);
        prop_assert!(!verify_s256(&challenge, &challenge));
    }

    #[test]
    fn constant_time_eq_agrees_with_eq(a in proptest::collection::vec(any::<u8>(), 0..64),
                                       b in proptest::collection::vec(any::<u8>(), 0..64)) {
        prop_assert_eq!(constant_time_eq(&a, &b), a == b);
        prop_assert!(constant_time_eq(&a, &a));
    }
}

#[tokio::test]
async fn issued_identifiers_are_unique() {
    let store = OAuthStore::new();
    let mut seen = HashSet::new();

    for _ in 0..200 {
        let client = store.register_client(None, vec!["https://c.example/cb".into()]).await;
        let pair = store.issue_token_pair(&client.client_id).await;
        for id in [client.client_id, client.client_secret, pair.access_token, pair.refresh_token] {
            assert!(seen.insert(id), "identifier issued twice");
        }
    }
}
