//! The federation entity facade
//!
//! Wires a [`FederationContext`] to the collector, verifier and policy
//! engine, keeps the per-entity chain cache, serves the superior-side
//! registry of subordinates, and exposes the operations the endpoints are
//! built from.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};
use url::Url;

use crate::chain::collect::TrustChainCollector;
use crate::chain::policy::apply_policies;
use crate::chain::verify::TrustChainVerifier;
use crate::chain::TrustChain;
use crate::config::{AuthorityHints, FederationConfig};
use crate::context::FederationContext;
use crate::error::{FederationError, Result};
use crate::jose::jwk::JwkSet;
use crate::jose::jws;
use crate::jose::keyjar::KeyJar;
use crate::message::api::ListRequest;
use crate::message::entity_statement::Constraints;
use crate::message::policy::MetadataPolicy;
use crate::message::trust_mark::{TrustMark, TrustMarkEntry};
use crate::message::{EntityType, Metadata};
use crate::ports::clock::Clock;
use crate::ports::crypto::JwsCrypto;
use crate::ports::http::HttpClient;
use crate::statement::create::{EntityConfigurationOptions, StatementSigner, SubordinateOptions};
use crate::trust_mark::verifier::{verify_trust_mark, TrustMarkVerifyOptions};

/// What a superior knows about one of its subordinates
#[derive(Debug, Clone, Default)]
pub struct SubordinateInfo {
    /// The subordinate's advertised signing keys
    pub jwks: JwkSet,

    /// Entity types the subordinate acts as
    pub entity_types: Vec<EntityType>,

    /// Whether the subordinate is itself an authority
    pub intermediate: bool,

    /// Policy to apply to the subordinate's metadata
    pub metadata_policy: Option<MetadataPolicy>,

    /// Constraints on the chain below the subordinate
    pub constraints: Option<Constraints>,

    /// Identifiers of trust marks the subordinate holds
    pub trust_marks: Vec<String>,
}

/// A federation participant: context, collector and derived operations
pub struct FederationEntity {
    context: FederationContext,
    collector: TrustChainCollector,
    http: Arc<dyn HttpClient>,
    crypto: Arc<dyn JwsCrypto>,
    clock: Arc<dyn Clock>,
    signer: StatementSigner,
    subordinates: RwLock<BTreeMap<String, SubordinateInfo>>,
    chain_cache: RwLock<HashMap<String, Vec<TrustChain>>>,
}

impl FederationEntity {
    /// Build an entity from its configuration, signing keys and ports
    ///
    /// `keys` must contain at least one private key usable with the
    /// configured signing algorithm. The pinned anchor keys are imported
    /// into the key jar up front.
    pub fn new(
        config: FederationConfig,
        keys: JwkSet,
        http: Arc<dyn HttpClient>,
        crypto: Arc<dyn JwsCrypto>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let mut keyjar = KeyJar::new();
        for key in keys.keys {
            keyjar.add_key(&config.entity_id, key);
        }
        if keyjar.signing_key(&config.entity_id, config.signing_alg).is_none() {
            return Err(FederationError::Configuration(format!(
                "no private {} signing key for {}",
                config.signing_alg, config.entity_id
            )));
        }
        for (anchor, jwks) in &config.trust_anchors {
            keyjar.import_jwks(anchor, jwks);
        }

        let mut trust_marks = Vec::new();
        for token in &config.trust_marks {
            let mark: TrustMark = jws::peek_claims(token).map_err(|e| {
                FederationError::Configuration(format!("unparseable trust mark: {e}"))
            })?;
            trust_marks.push(TrustMarkEntry {
                trust_mark_id: mark.trust_mark_id,
                trust_mark: token.clone(),
            });
        }

        let context = FederationContext {
            entity_id: config.entity_id.clone(),
            keyjar: Arc::new(RwLock::new(keyjar)),
            authority_hints: AuthorityHints::Static(config.authority_hints.clone()),
            trust_marks,
            tr_priority: config.tr_priority.clone(),
            trust_mark_issuers: BTreeMap::new(),
            trust_mark_owners: BTreeMap::new(),
            metadata: Metadata::default(),
            lifetime: config.lifetime,
            signing_alg: config.signing_alg,
        };

        let collector = TrustChainCollector::new(
            http.clone(),
            crypto.clone(),
            clock.clone(),
            config.trust_anchors.into_iter().collect(),
        );
        let signer = StatementSigner::new(crypto.clone(), clock.clone())
            .with_lifetime(config.lifetime)
            .with_alg(config.signing_alg);

        Ok(Self {
            context,
            collector,
            http,
            crypto,
            clock,
            signer,
            subordinates: RwLock::new(BTreeMap::new()),
            chain_cache: RwLock::new(HashMap::new()),
        })
    }

    /// This participant's entity identifier
    pub fn entity_id(&self) -> &str {
        &self.context.entity_id
    }

    /// The per-entity context
    pub fn context(&self) -> &FederationContext {
        &self.context
    }

    /// The statement collector (and its caches)
    pub fn collector(&self) -> &TrustChainCollector {
        &self.collector
    }

    /// The signer used for all outgoing tokens
    pub fn signer(&self) -> &StatementSigner {
        &self.signer
    }

    /// The HTTP port
    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    /// The crypto port
    pub fn crypto(&self) -> &Arc<dyn JwsCrypto> {
        &self.crypto
    }

    /// The clock port
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The key jar shared by the entity's components
    pub fn keyjar(&self) -> &Arc<RwLock<KeyJar>> {
        &self.context.keyjar
    }

    /// Replace the metadata this entity publishes about itself
    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.context.metadata = metadata;
    }

    /// Replace the advertised authority hints
    pub fn set_authority_hints(&mut self, hints: AuthorityHints) {
        self.context.authority_hints = hints;
    }

    /// Trust-anchor only: publish the recognized issuers per mark type
    pub fn set_trust_mark_issuers(&mut self, issuers: BTreeMap<String, Vec<String>>) {
        self.context.trust_mark_issuers = issuers;
    }

    /// Trust-anchor only: publish the mark-type owners
    pub fn set_trust_mark_owners(
        &mut self,
        owners: BTreeMap<String, crate::message::entity_statement::TrustMarkOwner>,
    ) {
        self.context.trust_mark_owners = owners;
    }

    /// Replace the advertised trust marks
    pub fn set_trust_marks(&mut self, entries: Vec<TrustMarkEntry>) {
        self.context.trust_marks = entries;
    }

    /// Recognize an additional trust anchor at runtime
    pub fn add_trust_anchor(&self, entity_id: &str, jwks: JwkSet) {
        self.context
            .keyjar
            .write()
            .expect("keyjar poisoned")
            .import_jwks(entity_id, &jwks);
        self.collector.add_trust_anchor(entity_id, jwks);
    }

    /// Register a subordinate for the fetch and list endpoints
    pub fn add_subordinate(&self, entity_id: impl Into<String>, info: SubordinateInfo) {
        self.subordinates
            .write()
            .expect("subordinate registry poisoned")
            .insert(entity_id.into(), info);
    }

    /// This entity's self-signed entity configuration
    pub fn entity_configuration(&self) -> Result<String> {
        let keyjar = self.context.keyjar.read().expect("keyjar poisoned");
        let context = &self.context;
        self.signer.entity_configuration(
            &keyjar,
            &context.entity_id,
            context.metadata.clone(),
            Some(context.authority_hints.resolve()),
            EntityConfigurationOptions {
                trust_marks: context.trust_marks.clone(),
                trust_mark_issuers: (!context.trust_mark_issuers.is_empty())
                    .then(|| context.trust_mark_issuers.clone()),
                trust_mark_owners: (!context.trust_mark_owners.is_empty())
                    .then(|| context.trust_mark_owners.clone()),
                ..EntityConfigurationOptions::default()
            },
        )
    }

    /// A subordinate statement about a registered subordinate
    pub fn subordinate_statement(&self, sub: &str) -> Result<String> {
        let info = self
            .subordinates
            .read()
            .expect("subordinate registry poisoned")
            .get(sub)
            .cloned()
            .ok_or_else(|| FederationError::NotFound(format!("unknown subordinate {sub}")))?;
        let keyjar = self.context.keyjar.read().expect("keyjar poisoned");
        self.signer.subordinate_statement(
            &keyjar,
            &self.context.entity_id,
            sub,
            info.jwks,
            SubordinateOptions {
                metadata_policy: info.metadata_policy,
                constraints: info.constraints,
                ..SubordinateOptions::default()
            },
        )
    }

    /// Answer a list request over the subordinate registry
    pub fn list_subordinates(&self, request: &ListRequest) -> Vec<String> {
        let registry = self
            .subordinates
            .read()
            .expect("subordinate registry poisoned");
        registry
            .iter()
            .filter(|(_, info)| match &request.entity_type {
                Some(wanted) => info.entity_types.iter().any(|t| t.as_str() == wanted),
                None => true,
            })
            .filter(|(_, info)| match request.intermediate {
                Some(wanted) => info.intermediate == wanted,
                None => true,
            })
            .filter(|(_, info)| match request.trust_marked {
                Some(true) => !info.trust_marks.is_empty(),
                Some(false) => info.trust_marks.is_empty(),
                None => true,
            })
            .filter(|(_, info)| match &request.trust_mark_id {
                Some(wanted) => info.trust_marks.iter().any(|id| id == wanted),
                None => true,
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Verify collected candidate chains against the recognized anchors
    pub fn verify_trust_chains(
        &self,
        chains: &[Vec<String>],
        leaf_configuration: &str,
    ) -> Vec<TrustChain> {
        let anchors = self.collector.trust_anchors();
        let verifier =
            TrustChainVerifier::new(self.crypto.as_ref(), self.clock.as_ref(), &anchors);
        let mut keyjar = self.context.keyjar.write().expect("keyjar poisoned");
        verifier.verify_trust_chains(&mut keyjar, chains, leaf_configuration)
    }

    /// Collect, verify and policy-process the trust chains for an entity
    ///
    /// Results are cached per entity until an element of every cached
    /// chain has expired.
    pub async fn get_trust_chains(&self, entity_id: &str) -> Result<Vec<TrustChain>> {
        let now = self.clock.now();
        {
            let cache = self.chain_cache.read().expect("chain cache poisoned");
            if let Some(chains) = cache.get(entity_id) {
                if !chains.is_empty() && chains.iter().all(|c| !c.is_expired(now)) {
                    return Ok(chains.clone());
                }
            }
        }

        let (collected, leaf_configuration) =
            self.collector.collect_trust_chains(entity_id, None).await?;
        let verified = self.verify_trust_chains(&collected, &leaf_configuration);
        let chains = apply_policies(verified);

        if chains.is_empty() {
            debug!(entity_id, "no verified trust chains");
        } else {
            self.chain_cache
                .write()
                .expect("chain cache poisoned")
                .insert(entity_id.to_string(), chains.clone());
        }
        Ok(chains)
    }

    /// Pick one chain out of the candidates, honoring `tr_priority`
    pub fn pick_trust_chain<'a>(&self, chains: &'a [TrustChain]) -> Option<&'a TrustChain> {
        match chains {
            [] => None,
            [only] => Some(only),
            _ => {
                for preferred in &self.context.tr_priority {
                    if let Some(chain) = chains.iter().find(|c| &c.anchor == preferred) {
                        return Some(chain);
                    }
                }
                chains.first()
            }
        }
    }

    /// The effective metadata of an entity, from its best trust chain
    pub async fn get_verified_metadata(&self, entity_id: &str) -> Result<Option<Metadata>> {
        let chains = self.get_trust_chains(entity_id).await?;
        Ok(self
            .pick_trust_chain(&chains)
            .and_then(|chain| chain.metadata.clone()))
    }

    /// Verify a trust mark against an anchor, per the six-step contract
    pub async fn verify_trust_mark(
        &self,
        trust_mark: &str,
        trust_anchor: &str,
        opts: &TrustMarkVerifyOptions,
    ) -> Result<Option<TrustMark>> {
        verify_trust_mark(self, trust_mark, trust_anchor, opts).await
    }

    /// Walk the list endpoints below a superior, collecting every entity
    /// of the given type
    pub async fn trawl(&self, superior: &str, entity_type: &str) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![superior.to_string()];
        let mut seen = std::collections::HashSet::new();

        while let Some(node) = pending.pop() {
            if !seen.insert(node.clone()) {
                continue;
            }
            let configuration = match self.collector.get_entity_configuration(&node).await {
                Ok(ec) => ec,
                Err(err) => {
                    warn!(node, error = %err, "skipping unreachable node in trawl");
                    continue;
                }
            };
            let metadata = configuration.statement.metadata.clone().unwrap_or_default();
            if metadata.0.contains_key(entity_type) && !found.contains(&node) {
                found.push(node.clone());
            }
            let Some(list_endpoint) = metadata
                .federation_entity()
                .and_then(|fe| fe.federation_list_endpoint)
            else {
                continue;
            };

            for id in self
                .list_request(&list_endpoint, Some(entity_type), None)
                .await?
            {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
            pending.extend(
                self.list_request(&list_endpoint, None, Some(true))
                    .await?,
            );
        }
        Ok(found)
    }

    async fn list_request(
        &self,
        endpoint: &str,
        entity_type: Option<&str>,
        intermediate: Option<bool>,
    ) -> Result<Vec<String>> {
        let mut url = Url::parse(endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(entity_type) = entity_type {
                query.append_pair("entity_type", entity_type);
            }
            if let Some(intermediate) = intermediate {
                query.append_pair("intermediate", if intermediate { "true" } else { "false" });
            }
        }
        let response = self.http.get(url.as_str()).await?;
        if !response.is_success() {
            return Err(FederationError::Http(
                crate::ports::http::HttpError::Status {
                    url: url.into(),
                    status: response.status,
                },
            ));
        }
        Ok(serde_json::from_str(&response.body)?)
    }
}
