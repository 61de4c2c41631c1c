//! The resolve endpoint: chain selection, metadata narrowing and the
//! signed response format

mod common;

use common::{init_tracing, Blueprint, TestFederation, TestFederationBuilder};
use oidfed::endpoint::ResolveEndpoint;
use oidfed::jose::jws;
use oidfed::message::api::{ResolveRequest, ResolveResponse};
use oidfed::message::entity_statement::EntityStatement;
use oidfed::message::EntityType;
use oidfed::FederationError;

const TA: &str = "https://ta.example.org";
const IM: &str = "https://intermediate.example.org";
const RP: &str = "https://rp.example.org";
const RESOLVER: &str = "https://resolver.example.org";

fn federation_with_resolver() -> TestFederation {
    init_tracing();
    TestFederationBuilder::new(&[
        Blueprint::new(TA).with_subordinates(&[IM]),
        Blueprint::new(IM)
            .with_authority_hints(&[TA])
            .with_trust_anchors(&[TA])
            .with_subordinates(&[RP]),
        Blueprint::new(RP)
            .with_entity_type(EntityType::OpenidRelyingParty)
            .with_authority_hints(&[IM])
            .with_trust_anchors(&[TA]),
        Blueprint::new(RESOLVER).with_trust_anchors(&[TA]),
    ])
    .finish()
}

fn request(sub: &str, trust_anchor: &str, entity_type: Option<&str>) -> ResolveRequest {
    ResolveRequest {
        sub: sub.to_string(),
        trust_anchor: trust_anchor.to_string(),
        entity_type: entity_type.map(|t| t.to_string()),
    }
}

#[tokio::test]
async fn resolve_single_anchor_path() {
    let federation = federation_with_resolver();
    let endpoint = ResolveEndpoint::new(federation.entity(RESOLVER));

    let token = endpoint
        .process_request(&request(RP, TA, None))
        .await
        .unwrap()
        .expect("a chain to the anchor exists");

    let header = jws::decode_header(&token).unwrap();
    assert_eq!(header.typ.as_deref(), Some(jws::RESOLVE_RESPONSE_TYP));

    let response = ResolveResponse::peek(&token).unwrap();
    assert_eq!(response.iss, RESOLVER);
    assert_eq!(response.sub, RP);
    assert!(response.metadata.has_type(EntityType::OpenidRelyingParty));

    // Anchor-first chain of three: TA about IM, IM about RP, RP's own EC
    let chain = response.trust_chain.unwrap();
    assert_eq!(chain.len(), 3);
    let statements: Vec<EntityStatement> = chain
        .iter()
        .map(|token| jws::peek_claims(token).unwrap())
        .collect();
    assert_eq!(statements[0].iss, TA);
    assert_eq!(statements[0].sub, IM);
    assert_eq!(statements[1].iss, IM);
    assert_eq!(statements[1].sub, RP);
    assert!(statements[2].is_self_signed());
    assert_eq!(statements[2].sub, RP);

    // The response verifies against the resolver's published keys
    let keys = vec![federation.key(RESOLVER).to_public()];
    let verified =
        ResolveResponse::verify_with(federation.crypto.as_ref(), &token, &keys).unwrap();
    assert_eq!(verified.sub, RP);
}

#[tokio::test]
async fn resolve_narrows_metadata_to_requested_type() {
    let federation = federation_with_resolver();
    let endpoint = ResolveEndpoint::new(federation.entity(RESOLVER));

    let token = endpoint
        .process_request(&request(RP, TA, Some("openid_relying_party")))
        .await
        .unwrap()
        .unwrap();
    let response = ResolveResponse::peek(&token).unwrap();
    assert!(response.metadata.has_type(EntityType::OpenidRelyingParty));
    assert!(!response.metadata.has_type(EntityType::FederationEntity));

    // A type the entity does not advertise resolves to nothing
    let missing = endpoint
        .process_request(&request(RP, TA, Some("openid_provider")))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn resolve_unknown_anchor_is_empty() {
    let federation = federation_with_resolver();
    let endpoint = ResolveEndpoint::new(federation.entity(RESOLVER));

    let result = endpoint
        .process_request(&request(RP, "https://other-ta.example.org", None))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn resolve_unreachable_subject_is_empty() {
    let federation = federation_with_resolver();
    let endpoint = ResolveEndpoint::new(federation.entity(RESOLVER));

    let result = endpoint
        .process_request(&request("https://nowhere.example.org", TA, None))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn resolve_with_trust_anchor_configuration() {
    let federation = federation_with_resolver();
    let endpoint =
        ResolveEndpoint::new(federation.entity(RESOLVER)).with_trust_anchor_configuration();

    let token = endpoint
        .process_request(&request(RP, TA, None))
        .await
        .unwrap()
        .unwrap();
    let response = ResolveResponse::peek(&token).unwrap();
    let chain = response.trust_chain.unwrap();
    assert_eq!(chain.len(), 4);
    let head: EntityStatement = jws::peek_claims(&chain[0]).unwrap();
    assert!(head.is_self_signed());
    assert_eq!(head.sub, TA);
}

#[test]
fn responses_without_the_resolve_typ_are_rejected() {
    init_tracing();
    let federation = federation_with_resolver();

    // An entity configuration is a perfectly good JWS with the wrong typ
    let configuration = federation.entity(RP).entity_configuration().unwrap();
    let err = ResolveResponse::peek(&configuration).unwrap_err();
    assert!(matches!(err, FederationError::InvalidStatement(_)));

    let keys = vec![federation.key(RP).to_public()];
    assert!(matches!(
        ResolveResponse::verify_with(federation.crypto.as_ref(), &configuration, &keys),
        Err(FederationError::InvalidStatement(_))
    ));
}
