//! Law-style properties of the policy engine and store key encoding

use std::collections::BTreeMap;

use oidfed::adapters::abfile::AbFileStore;
use oidfed::chain::policy::{apply_claim_policies, combine_claim_policies};
use oidfed::message::policy::ClaimPolicy;
use proptest::prelude::*;
use serde_json::{json, Value};

fn value_set(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| json!(v)).collect()
}

// Policies built from the commutative verbs only (set operations and
// essential); value/default need agreement and are covered by unit tests.
fn arb_symmetric_policy() -> impl Strategy<Value = ClaimPolicy> {
    let pool = prop::sample::subsequence(
        vec!["code", "token", "id_token", "none", "openid"],
        0..=5,
    );
    (
        prop::option::of(pool.clone()),
        prop::option::of(pool.clone()),
        prop::option::of(pool),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(subset_of, superset_of, add, essential)| ClaimPolicy {
            subset_of: subset_of.map(|v| value_set(&v)),
            superset_of: superset_of.map(|v| value_set(&v)),
            add: add.map(|v| value_set(&v)),
            essential,
            ..ClaimPolicy::default()
        })
}

fn arb_metadata() -> impl Strategy<Value = serde_json::Map<String, Value>> {
    prop::collection::btree_map(
        prop::sample::select(vec!["grant_types", "response_types", "contacts", "scope"]),
        prop::sample::subsequence(vec!["code", "token", "id_token", "none", "openid"], 1..=5),
        0..4,
    )
    .prop_map(|m| {
        m.into_iter()
            .map(|(k, v)| (k.to_string(), Value::Array(value_set(&v))))
            .collect()
    })
}

fn sorted(policy: &ClaimPolicy) -> ClaimPolicy {
    let mut out = policy.clone();
    for set in [&mut out.subset_of, &mut out.superset_of, &mut out.add] {
        if let Some(values) = set {
            values.sort_by_key(|v| v.to_string());
        }
    }
    out
}

proptest! {
    // Combination over the set verbs does not depend on which side a
    // policy arrives from
    #[test]
    fn combine_is_commutative_up_to_ordering(
        a in arb_symmetric_policy(),
        b in arb_symmetric_policy(),
    ) {
        let ab = combine_claim_policies(&a, &b, "claim");
        let ba = combine_claim_policies(&b, &a, "claim");
        match (ab, ba) {
            (Ok(ab), Ok(ba)) => prop_assert_eq!(sorted(&ab), sorted(&ba)),
            (Err(_), Err(_)) => {}
            (ab, ba) => prop_assert!(false, "asymmetric outcome: {ab:?} vs {ba:?}"),
        }
    }

    #[test]
    fn combine_is_associative(
        a in arb_symmetric_policy(),
        b in arb_symmetric_policy(),
        c in arb_symmetric_policy(),
    ) {
        let left = combine_claim_policies(&a, &b, "claim")
            .and_then(|ab| combine_claim_policies(&ab, &c, "claim"));
        let right = combine_claim_policies(&b, &c, "claim")
            .and_then(|bc| combine_claim_policies(&a, &bc, "claim"));
        match (left, right) {
            (Ok(left), Ok(right)) => prop_assert_eq!(sorted(&left), sorted(&right)),
            (Err(_), Err(_)) => {}
            (left, right) => prop_assert!(false, "non-associative: {left:?} vs {right:?}"),
        }
    }

    // An empty policy map leaves metadata untouched
    #[test]
    fn empty_policy_is_identity(metadata in arb_metadata()) {
        let out = apply_claim_policies(&metadata, &BTreeMap::new()).unwrap();
        prop_assert_eq!(out, metadata);
    }

    // An empty claim policy under a claim is also an identity
    #[test]
    fn empty_claim_policy_is_identity(metadata in arb_metadata()) {
        let mut policies = BTreeMap::new();
        for claim in metadata.keys() {
            policies.insert(claim.clone(), ClaimPolicy::default());
        }
        let out = apply_claim_policies(&metadata, &policies).unwrap();
        prop_assert_eq!(out, metadata);
    }

    // Store keys survive the filename encoding
    #[test]
    fn store_key_filenames_round_trip(key in "[ -~]{1,120}") {
        let encoded = AbFileStore::encode_key(&key);
        prop_assert_eq!(AbFileStore::decode_key(&encoded).unwrap(), key);
    }
}
