//! Metadata policies combined across a chain and applied to leaf metadata

mod common;

use common::{init_tracing, Blueprint, TestFederation, TestFederationBuilder};
use oidfed::message::policy::MetadataPolicy;
use oidfed::message::{EntityType, Metadata};
use oidfed::SubordinateInfo;
use serde_json::json;

const TA: &str = "https://ta.example.org";
const IM: &str = "https://intermediate.example.org";
const RP: &str = "https://rp.example.org";

fn policy(value: serde_json::Value) -> MetadataPolicy {
    serde_json::from_value(value).unwrap()
}

fn rp_metadata() -> Metadata {
    let mut metadata = Metadata::default();
    metadata.insert(
        EntityType::FederationEntity,
        serde_json::from_value(json!({"organization_name": "RP Org"})).unwrap(),
    );
    metadata.insert(
        EntityType::OpenidRelyingParty,
        serde_json::from_value(json!({
            "client_registration_types": ["automatic"],
            "redirect_uris": ["https://rp.example.org/callback"],
            "response_types": ["code", "token"],
            "grant_types": ["authorization_code", "implicit"]
        }))
        .unwrap(),
    );
    metadata
}

fn build(
    ta_policy: Option<MetadataPolicy>,
    im_policy: Option<MetadataPolicy>,
) -> TestFederation {
    init_tracing();
    let mut builder = TestFederationBuilder::new(&[
        Blueprint::new(TA).with_subordinates(&[IM]),
        Blueprint::new(IM)
            .with_authority_hints(&[TA])
            .with_trust_anchors(&[TA])
            .with_subordinates(&[RP]),
        Blueprint::new(RP)
            .with_entity_type(EntityType::OpenidRelyingParty)
            .with_authority_hints(&[IM])
            .with_trust_anchors(&[TA]),
    ]);
    builder.entity_mut(RP).set_metadata(rp_metadata());

    // Re-register the subordinates with the policies under test
    let rp_jwks = oidfed::jose::JwkSet::single(builder.key(RP).to_public());
    let im_jwks = oidfed::jose::JwkSet::single(builder.key(IM).to_public());
    builder.entity_ref(TA).add_subordinate(
        IM,
        SubordinateInfo {
            jwks: im_jwks,
            intermediate: true,
            metadata_policy: ta_policy,
            ..SubordinateInfo::default()
        },
    );
    builder.entity_ref(IM).add_subordinate(
        RP,
        SubordinateInfo {
            jwks: rp_jwks,
            entity_types: vec![EntityType::OpenidRelyingParty],
            metadata_policy: im_policy,
            ..SubordinateInfo::default()
        },
    );
    builder.finish()
}

#[tokio::test]
async fn policies_combine_and_filter_leaf_metadata() {
    let federation = build(
        Some(policy(json!({
            "openid_relying_party": {
                "response_types": {"subset_of": ["code", "id_token"]},
                "contacts": {"add": ["federation@ta.example.org"]}
            }
        }))),
        Some(policy(json!({
            "openid_relying_party": {
                "grant_types": {"subset_of": ["authorization_code"]},
                "contacts": {"add": ["ops@intermediate.example.org"]}
            }
        }))),
    );

    let rp = federation.entity(RP);
    let chains = rp.get_trust_chains(RP).await.unwrap();
    assert_eq!(chains.len(), 1);
    let metadata = chains[0].metadata.as_ref().unwrap();
    let block = metadata.get(EntityType::OpenidRelyingParty).unwrap();

    // subset_of filtered the advertised lists
    assert_eq!(block["response_types"], json!(["code"]));
    assert_eq!(block["grant_types"], json!(["authorization_code"]));
    // add from both levels accumulated
    assert_eq!(
        block["contacts"],
        json!(["federation@ta.example.org", "ops@intermediate.example.org"])
    );
    // Claims without policy pass through untouched
    assert_eq!(block["client_registration_types"], json!(["automatic"]));

    // The leaf's own configuration is not rewritten by policy
    let leaf_block = chains[0]
        .leaf()
        .unwrap()
        .metadata
        .as_ref()
        .unwrap()
        .get(EntityType::OpenidRelyingParty)
        .unwrap()
        .clone();
    assert_eq!(leaf_block["response_types"], json!(["code", "token"]));
}

#[tokio::test]
async fn conflicting_policies_drop_the_chain() {
    let federation = build(
        Some(policy(json!({
            "openid_relying_party": {"subject_type": {"value": "pairwise"}}
        }))),
        Some(policy(json!({
            "openid_relying_party": {"subject_type": {"value": "public"}}
        }))),
    );

    let rp = federation.entity(RP);
    let chains = rp.get_trust_chains(RP).await.unwrap();
    assert!(chains.is_empty());
}

#[tokio::test]
async fn essential_claim_missing_drops_the_chain() {
    let federation = build(
        Some(policy(json!({
            "openid_relying_party": {"jwks_uri": {"essential": true}}
        }))),
        None,
    );

    let rp = federation.entity(RP);
    let chains = rp.get_trust_chains(RP).await.unwrap();
    assert!(chains.is_empty());
}

#[tokio::test]
async fn default_fills_missing_claims() {
    let federation = build(
        Some(policy(json!({
            "openid_relying_party": {
                "subject_type": {"essential": true, "default": "pairwise"}
            }
        }))),
        None,
    );

    let rp = federation.entity(RP);
    let chains = rp.get_trust_chains(RP).await.unwrap();
    assert_eq!(chains.len(), 1);
    let block = chains[0]
        .metadata
        .as_ref()
        .unwrap()
        .get(EntityType::OpenidRelyingParty)
        .unwrap();
    assert_eq!(block["subject_type"], json!("pairwise"));
}
