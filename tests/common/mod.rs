//! Shared federation-builder harness for the integration tests
//!
//! Builds a small federation out of blueprints (every entity gets a fresh
//! Ed25519 key and a `FederationEntity` wired to one shared in-memory HTTP
//! network) and registers the discovery routes (well-known entity
//! configurations plus superior fetch endpoints) the collector will walk.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use oidfed::adapters::in_memory::RouteHandler;
use oidfed::adapters::{DefaultCrypto, InMemoryHttpClient, SystemClock};
use oidfed::chain::collect::{entity_configuration_url, fetch_url};
use oidfed::endpoint::ENTITY_STATEMENT_CONTENT_TYPE;
use oidfed::jose::{Jwk, JwkSet};
use oidfed::jose::jws::JwsAlg;
use oidfed::message::api::{ListRequest, TrustMarkStatusRequest};
use oidfed::message::entity_statement::TrustMarkOwner;
use oidfed::message::{EntityType, Metadata};
use oidfed::ports::http::{HttpError, HttpResponse};
use oidfed::trust_mark::TrustMarkEntity;
use oidfed::{FederationConfig, FederationEntity, SubordinateInfo};
use serde_json::json;

/// One entity of the test federation
#[derive(Debug, Clone, Default)]
pub struct Blueprint {
    pub id: String,
    /// Entity types besides `federation_entity`
    pub entity_types: Vec<EntityType>,
    pub authority_hints: Vec<String>,
    pub subordinates: Vec<String>,
    /// Anchors this entity trusts (ids of other blueprints)
    pub trust_anchors: Vec<String>,
    /// Trust-anchor only: recognized issuers per mark type
    pub trust_mark_issuers: Option<BTreeMap<String, Vec<String>>>,
    /// Trust-anchor only: mark-type owners
    pub trust_mark_owners: Option<BTreeMap<String, TrustMarkOwner>>,
}

impl Blueprint {
    pub fn new(id: &str) -> Self {
        Blueprint {
            id: id.to_string(),
            ..Blueprint::default()
        }
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_types.push(entity_type);
        self
    }

    pub fn with_authority_hints(mut self, hints: &[&str]) -> Self {
        self.authority_hints = hints.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_subordinates(mut self, subordinates: &[&str]) -> Self {
        self.subordinates = subordinates.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_trust_anchors(mut self, anchors: &[&str]) -> Self {
        self.trust_anchors = anchors.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// The federation under construction: entities are still mutable
pub struct TestFederationBuilder {
    pub http: Arc<InMemoryHttpClient>,
    pub crypto: Arc<DefaultCrypto>,
    pub clock: Arc<SystemClock>,
    keys: BTreeMap<String, Jwk>,
    entities: BTreeMap<String, FederationEntity>,
}

impl TestFederationBuilder {
    pub fn new(blueprints: &[Blueprint]) -> Self {
        let http = Arc::new(InMemoryHttpClient::new());
        let crypto = Arc::new(DefaultCrypto);
        let clock = Arc::new(SystemClock);

        let keys: BTreeMap<String, Jwk> = blueprints
            .iter()
            .map(|bp| (bp.id.clone(), Jwk::generate_ed25519().unwrap()))
            .collect();

        let mut entities = BTreeMap::new();
        for bp in blueprints {
            let mut config = FederationConfig::new(&bp.id);
            config.signing_alg = JwsAlg::EdDSA;
            config.authority_hints = bp.authority_hints.clone();
            for anchor in &bp.trust_anchors {
                config.trust_anchors.insert(
                    anchor.clone(),
                    JwkSet::single(keys[anchor].to_public()),
                );
            }

            let mut entity = FederationEntity::new(
                config,
                JwkSet::single(keys[&bp.id].clone()),
                http.clone(),
                crypto.clone(),
                clock.clone(),
            )
            .unwrap();
            entity.set_metadata(default_metadata(bp));
            if let Some(issuers) = &bp.trust_mark_issuers {
                entity.set_trust_mark_issuers(issuers.clone());
            }
            if let Some(owners) = &bp.trust_mark_owners {
                entity.set_trust_mark_owners(owners.clone());
            }
            entities.insert(bp.id.clone(), entity);
        }

        // Superiors learn their subordinates' keys and roles
        for bp in blueprints {
            for sub_id in &bp.subordinates {
                let sub_bp = blueprints.iter().find(|b| &b.id == sub_id).unwrap();
                let info = SubordinateInfo {
                    jwks: JwkSet::single(keys[sub_id].to_public()),
                    entity_types: sub_bp.entity_types.clone(),
                    intermediate: !sub_bp.subordinates.is_empty(),
                    ..SubordinateInfo::default()
                };
                entities.get(&bp.id).unwrap().add_subordinate(sub_id, info);
            }
        }

        Self {
            http,
            crypto,
            clock,
            keys,
            entities,
        }
    }

    pub fn entity_mut(&mut self, id: &str) -> &mut FederationEntity {
        self.entities.get_mut(id).unwrap()
    }

    pub fn entity_ref(&self, id: &str) -> &FederationEntity {
        self.entities.get(id).unwrap()
    }

    pub fn key(&self, id: &str) -> &Jwk {
        self.keys.get(id).unwrap()
    }

    /// Freeze the entities and publish the discovery routes
    pub fn finish(self) -> TestFederation {
        let entities: BTreeMap<String, Arc<FederationEntity>> = self
            .entities
            .into_iter()
            .map(|(id, entity)| (id, Arc::new(entity)))
            .collect();
        let federation = TestFederation {
            http: self.http,
            crypto: self.crypto,
            clock: self.clock,
            keys: self.keys,
            entities,
        };
        federation.register_routes();
        federation
    }
}

// Every entity serves federation-entity metadata; superiors advertise
// their fetch/list endpoints, relying parties their registration types,
// trust-mark issuers their status endpoint.
fn default_metadata(bp: &Blueprint) -> Metadata {
    let mut metadata = Metadata::default();

    let mut federation_entity = serde_json::Map::new();
    federation_entity.insert(
        "organization_name".to_string(),
        json!(format!("Operator of {}", bp.id)),
    );
    if !bp.subordinates.is_empty() {
        federation_entity.insert(
            "federation_fetch_endpoint".to_string(),
            json!(format!("{}/fetch", bp.id)),
        );
        federation_entity.insert(
            "federation_list_endpoint".to_string(),
            json!(format!("{}/list", bp.id)),
        );
    }
    if bp.entity_types.contains(&EntityType::TrustMarkIssuer) {
        federation_entity.insert(
            "federation_trust_mark_status_endpoint".to_string(),
            json!(status_endpoint(&bp.id)),
        );
    }
    metadata.insert(EntityType::FederationEntity, federation_entity);

    if bp.entity_types.contains(&EntityType::OpenidRelyingParty) {
        metadata.insert(
            EntityType::OpenidRelyingParty,
            serde_json::from_value(json!({
                "client_registration_types": ["automatic"],
                "redirect_uris": [format!("{}/callback", bp.id)],
                "response_types": ["code"]
            }))
            .unwrap(),
        );
    }
    if bp.entity_types.contains(&EntityType::TrustMarkIssuer) {
        metadata.insert(
            EntityType::TrustMarkIssuer,
            serde_json::from_value(json!({
                "status_endpoint": status_endpoint(&bp.id)
            }))
            .unwrap(),
        );
    }
    metadata
}

/// The status-endpoint URL the harness wires for a mark issuer
pub fn status_endpoint(issuer_id: &str) -> String {
    format!("{issuer_id}/status")
}

/// A built federation with its shared in-memory network
pub struct TestFederation {
    pub http: Arc<InMemoryHttpClient>,
    pub crypto: Arc<DefaultCrypto>,
    pub clock: Arc<SystemClock>,
    keys: BTreeMap<String, Jwk>,
    pub entities: BTreeMap<String, Arc<FederationEntity>>,
}

impl TestFederation {
    pub fn entity(&self, id: &str) -> Arc<FederationEntity> {
        self.entities.get(id).unwrap().clone()
    }

    pub fn key(&self, id: &str) -> &Jwk {
        self.keys.get(id).unwrap()
    }

    // The canned discovery surface: every entity's configuration at its
    // well-known URL, and each superior's fetch endpoint answers per
    // registered subordinate.
    fn register_routes(&self) {
        for (id, entity) in &self.entities {
            self.http.route(
                &entity_configuration_url(id),
                entity.entity_configuration().unwrap(),
                ENTITY_STATEMENT_CONTENT_TYPE,
            );
            for sub_id in self.entities.keys() {
                if let Ok(statement) = entity.subordinate_statement(sub_id) {
                    let url = fetch_url(&format!("{id}/fetch"), sub_id).unwrap();
                    self.http
                        .route(&url, statement, ENTITY_STATEMENT_CONTENT_TYPE);
                }
            }
        }
    }

    /// Replace the canned fetch response of `superior` about `sub`
    pub fn override_fetch(&self, superior: &str, sub: &str, token: String) {
        let url = fetch_url(&format!("{superior}/fetch"), sub).unwrap();
        self.http.route(&url, token, ENTITY_STATEMENT_CONTENT_TYPE);
    }

    /// Drop an entity's well-known route, simulating an unreachable entity
    pub fn unpublish_configuration(&self, id: &str) {
        self.http.remove_route(&entity_configuration_url(id));
    }

    /// Wire a superior's live list endpoint into the network
    pub fn wire_list_endpoint(&self, superior_id: &str) {
        let entity = self.entity(superior_id);
        let handler: RouteHandler = Arc::new(move |request| {
            let entity = entity.clone();
            Box::pin(async move {
                let url = url::Url::parse(&request.url)
                    .map_err(|e| HttpError::Connection(e.to_string()))?;
                let mut list_request = ListRequest::default();
                for (name, value) in url.query_pairs() {
                    match name.as_ref() {
                        "entity_type" => list_request.entity_type = Some(value.into_owned()),
                        "intermediate" => list_request.intermediate = Some(value == "true"),
                        "trust_marked" => list_request.trust_marked = Some(value == "true"),
                        "trust_mark_id" => list_request.trust_mark_id = Some(value.into_owned()),
                        _ => {}
                    }
                }
                let ids = entity.list_subordinates(&list_request);
                Ok(HttpResponse::ok(
                    serde_json::to_string(&ids).unwrap(),
                    "application/json",
                ))
            })
        });
        self.http
            .handle_prefix(&format!("{superior_id}/list"), handler);
    }

    /// Wire a live trust-mark status endpoint into the network
    pub fn wire_status_endpoint(&self, issuer_id: &str, issuer: Arc<TrustMarkEntity>) {
        let handler: RouteHandler = Arc::new(move |request| {
            let issuer = issuer.clone();
            Box::pin(async move {
                let form = request.form.unwrap_or_default();
                let status_request = TrustMarkStatusRequest {
                    sub: form.get("sub").cloned(),
                    trust_mark_id: form
                        .get("trust_mark_id")
                        .or_else(|| form.get("trust_mark_type"))
                        .cloned(),
                    iat: form.get("iat").and_then(|v| v.parse().ok()),
                    trust_mark: form.get("trust_mark").cloned(),
                };
                let response = issuer
                    .status(&status_request)
                    .await
                    .map_err(|e| HttpError::Connection(e.to_string()))?;
                Ok(HttpResponse::ok(
                    serde_json::to_string(&response).unwrap(),
                    "application/json",
                ))
            })
        });
        self.http.handle_prefix(&status_endpoint(issuer_id), handler);
    }
}

/// Initialize test logging once; respects `RUST_LOG`
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}
