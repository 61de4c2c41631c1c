//! Trust-chain collection
//!
//! Walks from a leaf entity towards the configured trust anchors: fetch
//! the leaf's entity configuration at its well-known location, then for
//! every authority hint fetch the authority's configuration, ask its fetch
//! endpoint for a subordinate statement about the current entity, and
//! either terminate at a recognized anchor or climb further. Branches that
//! are unreachable, malformed or cyclic are abandoned silently; finding no
//! chain at all is an empty result, not an error.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};
use url::Url;

use crate::error::{FederationError, Result};
use crate::jose::jwk::JwkSet;
use crate::jose::jws;
use crate::message::entity_statement::EntityStatement;
use crate::ports::clock::Clock;
use crate::ports::crypto::JwsCrypto;
use crate::ports::http::HttpClient;

/// Well-known path where entity configurations are published
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-federation";

/// Safety bound on the number of superiors a branch may climb
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Well-known URL of an entity's configuration
pub fn entity_configuration_url(entity_id: &str) -> String {
    format!("{}{WELL_KNOWN_PATH}", entity_id.trim_end_matches('/'))
}

/// Fetch-endpoint URL asking for a statement about `sub`
pub fn fetch_url(fetch_endpoint: &str, sub: &str) -> Result<String> {
    let mut url = Url::parse(fetch_endpoint)?;
    url.query_pairs_mut().append_pair("sub", sub);
    Ok(url.into())
}

/// A fetched statement together with its compact form
#[derive(Debug, Clone)]
pub struct CachedStatement {
    /// The compact JWS as fetched
    pub token: String,
    /// The decoded payload
    pub statement: EntityStatement,
}

impl CachedStatement {
    fn fresh(&self, now: i64) -> bool {
        !self.statement.is_expired(now)
    }
}

// One pending branch of the discovery walk: the entity whose superiors
// are being asked next, the authorities to ask, the subordinate-statement
// tokens collected so far (leaf-first) and the identifiers already seen
// on this branch.
struct Branch {
    entity_id: String,
    hints: Vec<String>,
    tokens: Vec<String>,
    visited: HashSet<String>,
}

/// Discovers and caches the statements linking entities to trust anchors
pub struct TrustChainCollector {
    http: Arc<dyn HttpClient>,
    crypto: Arc<dyn JwsCrypto>,
    clock: Arc<dyn Clock>,
    trust_anchors: RwLock<HashMap<String, JwkSet>>,
    config_cache: RwLock<HashMap<String, CachedStatement>>,
    statement_cache: RwLock<HashMap<String, CachedStatement>>,
    max_depth: usize,
}

impl TrustChainCollector {
    /// A collector trusting the given anchors
    pub fn new(
        http: Arc<dyn HttpClient>,
        crypto: Arc<dyn JwsCrypto>,
        clock: Arc<dyn Clock>,
        trust_anchors: HashMap<String, JwkSet>,
    ) -> Self {
        Self {
            http,
            crypto,
            clock,
            trust_anchors: RwLock::new(trust_anchors),
            config_cache: RwLock::new(HashMap::new()),
            statement_cache: RwLock::new(HashMap::new()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the branch depth bound
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether an entity is one of the recognized trust anchors
    pub fn is_trust_anchor(&self, entity_id: &str) -> bool {
        self.trust_anchors
            .read()
            .expect("trust anchor set poisoned")
            .contains_key(entity_id)
    }

    /// The pinned JWKS of the recognized anchors
    pub fn trust_anchors(&self) -> HashMap<String, JwkSet> {
        self.trust_anchors
            .read()
            .expect("trust anchor set poisoned")
            .clone()
    }

    /// Recognize an additional trust anchor
    pub fn add_trust_anchor(&self, entity_id: &str, jwks: JwkSet) {
        self.trust_anchors
            .write()
            .expect("trust anchor set poisoned")
            .insert(entity_id.to_string(), jwks);
    }

    /// A cached entity configuration, if present and unexpired
    pub fn cached_configuration(&self, entity_id: &str) -> Option<CachedStatement> {
        let cache = self.config_cache.read().expect("config cache poisoned");
        cache
            .get(entity_id)
            .filter(|c| c.fresh(self.clock.now()))
            .cloned()
    }

    /// Fetch and self-verify an entity configuration
    ///
    /// The configuration must come from the entity's well-known location,
    /// be self-signed with a key from its own `jwks`, and be unexpired.
    /// Results are cached by subject until they expire.
    pub async fn get_entity_configuration(&self, entity_id: &str) -> Result<CachedStatement> {
        if let Some(cached) = self.cached_configuration(entity_id) {
            return Ok(cached);
        }

        let url = entity_configuration_url(entity_id);
        let response = self.http.get(&url).await?;
        if !response.is_success() {
            return Err(FederationError::Http(
                crate::ports::http::HttpError::Status {
                    url,
                    status: response.status,
                },
            ));
        }
        let token = response.body.trim().to_string();

        let unverified: EntityStatement = jws::peek_claims(&token)?;
        if unverified.iss != entity_id || unverified.sub != entity_id {
            return Err(FederationError::WrongSubject(format!(
                "configuration at {url} is about {}",
                unverified.sub
            )));
        }
        let jwks = unverified
            .jwks
            .as_ref()
            .ok_or_else(|| FederationError::MissingRequiredAttribute("jwks".to_string()))?;

        let statement: EntityStatement =
            jws::verify_claims(self.crypto.as_ref(), &token, &jwks.keys)?;
        if statement.is_expired(self.clock.now()) {
            return Err(FederationError::Expired);
        }

        let cached = CachedStatement {
            token,
            statement,
        };
        self.config_cache
            .write()
            .expect("config cache poisoned")
            .insert(cached.statement.sub.clone(), cached.clone());
        Ok(cached)
    }

    // Fetch a subordinate statement about `sub` from a superior's fetch
    // endpoint, reusing the cache when the cached copy is unexpired.
    async fn fetch_subordinate_statement(
        &self,
        fetch_endpoint: &str,
        sub: &str,
    ) -> Result<CachedStatement> {
        let url = fetch_url(fetch_endpoint, sub)?;
        let now = self.clock.now();
        {
            let cache = self.statement_cache.read().expect("statement cache poisoned");
            if let Some(cached) = cache.get(&url).filter(|c| c.fresh(now)) {
                return Ok(cached.clone());
            }
        }

        let response = self.http.get(&url).await?;
        if !response.is_success() {
            return Err(FederationError::Http(
                crate::ports::http::HttpError::Status {
                    url,
                    status: response.status,
                },
            ));
        }
        let token = response.body.trim().to_string();
        let statement: EntityStatement = jws::peek_claims(&token)?;
        if statement.sub != sub {
            return Err(FederationError::WrongSubject(format!(
                "fetch endpoint returned a statement about {}",
                statement.sub
            )));
        }
        if statement.is_expired(now) {
            return Err(FederationError::Expired);
        }

        let cached = CachedStatement { token, statement };
        self.statement_cache
            .write()
            .expect("statement cache poisoned")
            .insert(url, cached.clone());
        Ok(cached)
    }

    // The fetch endpoint an authority advertises, if any.
    fn fetch_endpoint_of(&self, configuration: &CachedStatement) -> Option<String> {
        configuration
            .statement
            .metadata
            .as_ref()?
            .federation_entity()?
            .federation_fetch_endpoint
    }

    /// Collect candidate trust chains for an entity
    ///
    /// Returns the chains as ordered lists of subordinate-statement tokens,
    /// leaf-first to anchor-last, together with the leaf's self-signed
    /// configuration. With `stop_at` set, only chains terminating at that
    /// anchor are returned. No chain is an empty list, not an error.
    pub async fn collect_trust_chains(
        &self,
        entity_id: &str,
        stop_at: Option<&str>,
    ) -> Result<(Vec<Vec<String>>, String)> {
        let leaf = self.get_entity_configuration(entity_id).await?;
        let mut chains: Vec<Vec<String>> = Vec::new();

        let mut queue: VecDeque<Branch> = VecDeque::new();
        queue.push_back(Branch {
            entity_id: leaf.statement.sub.clone(),
            hints: leaf.statement.authority_hints.clone().unwrap_or_default(),
            tokens: Vec::new(),
            visited: HashSet::from([leaf.statement.sub.clone()]),
        });

        while let Some(branch) = queue.pop_front() {
            if branch.tokens.len() >= self.max_depth {
                warn!(entity = %branch.entity_id, "abandoning branch: depth bound reached");
                continue;
            }
            for authority in &branch.hints {
                if branch.visited.contains(authority) {
                    debug!(authority, "abandoning branch: authority cycle");
                    continue;
                }

                let authority_ec = match self.get_entity_configuration(authority).await {
                    Ok(ec) => ec,
                    Err(err) => {
                        warn!(authority, error = %err, "abandoning branch: authority configuration unavailable");
                        continue;
                    }
                };
                let Some(fetch_endpoint) = self.fetch_endpoint_of(&authority_ec) else {
                    warn!(authority, "abandoning branch: no federation_fetch_endpoint");
                    continue;
                };
                let subordinate = match self
                    .fetch_subordinate_statement(&fetch_endpoint, &branch.entity_id)
                    .await
                {
                    Ok(statement) => statement,
                    Err(err) => {
                        warn!(authority, error = %err, "abandoning branch: subordinate statement unavailable");
                        continue;
                    }
                };

                let mut tokens = branch.tokens.clone();
                tokens.push(subordinate.token.clone());

                if self.is_trust_anchor(authority) {
                    // Recognized anchors terminate the branch either way
                    if stop_at.is_none_or(|anchor| anchor == authority.as_str()) {
                        chains.push(tokens);
                    }
                } else {
                    let mut visited = branch.visited.clone();
                    visited.insert(authority.clone());
                    queue.push_back(Branch {
                        entity_id: authority.clone(),
                        hints: authority_ec
                            .statement
                            .authority_hints
                            .clone()
                            .unwrap_or_default(),
                        tokens,
                        visited,
                    });
                }
            }
        }

        if chains.is_empty() {
            debug!(entity_id, "no chain reached a recognized trust anchor");
        }
        Ok((chains, leaf.token))
    }

    /// Rehydrate the compact chain for a known issuer path from the caches
    ///
    /// `iss_path` is leaf-first, anchor-last. The result is anchor-first:
    /// the anchor-issued statement, the intermediate statements, and the
    /// leaf's entity configuration; with `with_ta_ec` the anchor's own
    /// configuration is prepended.
    pub async fn get_chain(
        &self,
        iss_path: &[String],
        trust_anchor: &str,
        with_ta_ec: bool,
    ) -> Result<Vec<String>> {
        if iss_path.len() < 2 {
            return Err(FederationError::InvalidStatement(
                "issuer path must name at least a leaf and an anchor".to_string(),
            ));
        }
        if iss_path.last().map(String::as_str) != Some(trust_anchor) {
            return Err(FederationError::UnknownTrustAnchor(format!(
                "issuer path does not end at {trust_anchor}"
            )));
        }

        let mut chain = Vec::new();
        if with_ta_ec {
            chain.push(self.get_entity_configuration(trust_anchor).await?.token);
        }
        // Superior-about-subject statements, anchor side first
        for index in (0..iss_path.len() - 1).rev() {
            let subject = &iss_path[index];
            let issuer = &iss_path[index + 1];
            let issuer_ec = self.get_entity_configuration(issuer).await?;
            let fetch_endpoint = self.fetch_endpoint_of(&issuer_ec).ok_or_else(|| {
                FederationError::NotFound(format!("{issuer} has no federation_fetch_endpoint"))
            })?;
            let statement = self
                .fetch_subordinate_statement(&fetch_endpoint, subject)
                .await?;
            chain.push(statement.token);
        }
        chain.push(self.get_entity_configuration(&iss_path[0]).await?.token);
        Ok(chain)
    }
}
