//! Trust-mark selection from the key-value store

use std::sync::Arc;

use oidfed::adapters::{DefaultCrypto, FixedClock, InMemoryStore};
use oidfed::jose::jws::{self, JwsAlg, JwsHeader};
use oidfed::jose::Jwk;
use oidfed::ports::store::KeyValueStore;
use oidfed::trust_mark::TrustMarksSource;
use serde_json::json;

const NOW: i64 = 1000;
const SUB: &str = "https://entity.example.org";
const TMT: &str = "https://trust.example.org/type";
const ISS_A: &str = "https://issuer.example.org/a";
const ISS_B: &str = "https://issuer.example.org/b";

struct Fixture {
    store: Arc<InMemoryStore>,
    key: Jwk,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            key: Jwk::generate_ed25519().unwrap(),
        }
    }

    fn source(&self) -> TrustMarksSource {
        TrustMarksSource::new(self.store.clone(), Arc::new(FixedClock::at(NOW)))
    }

    fn mark_token(&self, sub: &str, iss: &str, tmt: &str, iat: i64, exp: Option<i64>) -> String {
        let mut payload = json!({
            "sub": sub,
            "iss": iss,
            "trust_mark_id": tmt,
            "iat": iat,
        });
        if let Some(exp) = exp {
            payload["exp"] = json!(exp);
        }
        jws::sign_compact(
            &DefaultCrypto,
            &JwsHeader::new(JwsAlg::EdDSA, self.key.kid.clone(), jws::TRUST_MARK_TYP),
            &payload,
            &self.key,
        )
        .unwrap()
    }

    async fn store_mark(
        &self,
        store_key: &str,
        sub: &str,
        iss: &str,
        tmt: &str,
        iat: i64,
        exp: Option<i64>,
    ) -> String {
        let token = self.mark_token(sub, iss, tmt, iat, exp);
        self.store
            .put(
                store_key,
                json!({"trust_mark": token, "trust_mark_id": tmt}),
            )
            .await
            .unwrap();
        token
    }
}

#[tokio::test]
async fn selects_newest_per_issuer_and_prefers_no_exp_on_iat_tie() {
    let fixture = Fixture::new();

    fixture
        .store_mark("older", SUB, ISS_A, TMT, 800, Some(3_600))
        .await;
    let newer_expiring = fixture
        .store_mark("newer_expiring", SUB, ISS_A, TMT, 900, Some(1_200))
        .await;
    let newer_no_exp = fixture.store_mark("newer_no_exp", SUB, ISS_A, TMT, 900, None).await;
    let other_issuer = fixture
        .store_mark("second_issuer", SUB, ISS_B, TMT, 850, Some(4_000))
        .await;

    let marks = fixture.source().trust_marks(Some(SUB)).await.unwrap();

    // One winner per (type, issuer), sorted by group: on the iat tie the
    // unexpiring mark wins
    assert_eq!(marks.len(), 2);
    assert_eq!(marks[0].trust_mark_id, TMT);
    assert_eq!(marks[0].trust_mark, newer_no_exp);
    assert_eq!(marks[1].trust_mark, other_issuer);
    assert_ne!(newer_expiring, newer_no_exp);
}

#[tokio::test]
async fn groups_by_type_when_issuer_grouping_is_off() {
    let fixture = Fixture::new();
    let other_type = "https://trust.example.org/other";

    fixture
        .store_mark("issuer_a", SUB, ISS_A, TMT, 800, Some(4_000))
        .await;
    let newest_for_type = fixture
        .store_mark("issuer_b", SUB, ISS_B, TMT, 900, Some(4_000))
        .await;
    let other = fixture
        .store_mark("other_type", SUB, ISS_B, other_type, 850, Some(4_000))
        .await;

    let source = fixture.source().with_by_issuer(false);
    let marks = source.trust_marks(Some(SUB)).await.unwrap();

    assert_eq!(marks.len(), 2);
    // Sorted by type; the newer of the two same-type marks wins
    assert_eq!(marks[0].trust_mark, other);
    assert_eq!(marks[1].trust_mark, newest_for_type);
}

#[tokio::test]
async fn filters_by_subject_and_time() {
    let fixture = Fixture::new();

    let valid = fixture
        .store_mark("valid", "expected-sub", ISS_A, TMT, 950, Some(2_000))
        .await;
    fixture
        .store_mark("wrong_sub", "other-sub", ISS_A, TMT, 960, Some(2_000))
        .await;
    fixture
        .store_mark("future_iat", "expected-sub", ISS_A, TMT, 1_050, Some(2_000))
        .await;
    fixture
        .store_mark("expired", "expected-sub", ISS_A, TMT, 930, Some(900))
        .await;

    let source = fixture.source().with_leeway(10);
    let marks = source.trust_marks(Some("expected-sub")).await.unwrap();
    assert_eq!(marks.len(), 1);
    assert_eq!(marks[0].trust_mark, valid);
}

#[tokio::test]
async fn rejects_outer_inner_type_mismatch() {
    let fixture = Fixture::new();

    let token = fixture.mark_token(SUB, ISS_A, "https://trust.example.org/inner", 900, Some(2_000));
    fixture
        .store
        .put(
            "mismatch",
            json!({"trust_mark": token, "trust_mark_id": "https://trust.example.org/outer"}),
        )
        .await
        .unwrap();

    assert!(fixture.source().trust_marks(Some(SUB)).await.unwrap().is_empty());
}

#[tokio::test]
async fn skips_malformed_values() {
    let fixture = Fixture::new();

    fixture
        .store
        .put("bad", json!({"trust_mark": "not-a-jws", "trust_mark_id": TMT}))
        .await
        .unwrap();
    fixture.store.put("no_mark", json!({"note": "empty"})).await.unwrap();

    assert!(fixture.source().trust_marks(Some(SUB)).await.unwrap().is_empty());
}

#[tokio::test]
async fn configured_subject_takes_precedence() {
    let fixture = Fixture::new();

    let for_configured = fixture
        .store_mark("configured", "configured-sub", ISS_A, TMT, 900, None)
        .await;
    fixture
        .store_mark("for_argument", "argument-sub", ISS_A, TMT, 950, None)
        .await;

    let source = fixture.source().with_sub("configured-sub");
    let marks = source.trust_marks(Some("argument-sub")).await.unwrap();
    assert_eq!(marks.len(), 1);
    assert_eq!(marks[0].trust_mark, for_configured);
}

#[tokio::test]
async fn selection_is_deterministic() {
    let fixture = Fixture::new();
    for (key, iat) in [("a", 800), ("b", 900), ("c", 850)] {
        fixture.store_mark(key, SUB, ISS_A, TMT, iat, None).await;
    }

    let first = fixture.source().trust_marks(Some(SUB)).await.unwrap();
    let second = fixture.source().trust_marks(Some(SUB)).await.unwrap();
    assert_eq!(first, second);
}
