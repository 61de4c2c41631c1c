//! Federation participant configuration
//!
//! All recognized options are explicit struct members; unknown options are
//! a configuration error. Configurations load from TOML files or are built
//! in code.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FederationError, Result};
use crate::jose::jwk::JwkSet;
use crate::jose::jws::JwsAlg;
use crate::statement::create::DEFAULT_LIFETIME;

/// Authority hints: a fixed list or a callable producing one
#[derive(Clone)]
pub enum AuthorityHints {
    /// A fixed list of superior entity identifiers
    Static(Vec<String>),
    /// Hints computed at each use
    Dynamic(Arc<dyn Fn() -> Vec<String> + Send + Sync>),
}

impl AuthorityHints {
    /// The current hints
    pub fn resolve(&self) -> Vec<String> {
        match self {
            AuthorityHints::Static(hints) => hints.clone(),
            AuthorityHints::Dynamic(producer) => producer(),
        }
    }

    /// Whether no hints would be produced
    pub fn is_empty(&self) -> bool {
        self.resolve().is_empty()
    }
}

impl Default for AuthorityHints {
    fn default() -> Self {
        AuthorityHints::Static(Vec::new())
    }
}

impl fmt::Debug for AuthorityHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorityHints::Static(hints) => f.debug_tuple("Static").field(hints).finish(),
            AuthorityHints::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<Vec<String>> for AuthorityHints {
    fn from(hints: Vec<String>) -> Self {
        AuthorityHints::Static(hints)
    }
}

fn default_lifetime() -> i64 {
    DEFAULT_LIFETIME
}

/// The recognized configuration options of a federation participant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FederationConfig {
    /// The URI identifying this participant
    pub entity_id: String,

    /// Pinned trust anchors: anchor id → JWKS
    #[serde(default)]
    pub trust_anchors: BTreeMap<String, JwkSet>,

    /// Superiors to advertise in the entity configuration
    #[serde(default)]
    pub authority_hints: Vec<String>,

    /// Trust marks (compact JWSes) to advertise
    #[serde(default)]
    pub trust_marks: Vec<String>,

    /// Preferred anchors, most preferred first
    #[serde(default)]
    pub tr_priority: Vec<String>,

    /// Default signature lifetime in seconds
    #[serde(default = "default_lifetime")]
    pub lifetime: i64,

    /// Default JWS signing algorithm
    #[serde(default)]
    pub signing_alg: JwsAlg,
}

impl FederationConfig {
    /// A minimal configuration for the given entity
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            trust_anchors: BTreeMap::new(),
            authority_hints: Vec::new(),
            trust_marks: Vec::new(),
            tr_priority: Vec::new(),
            lifetime: DEFAULT_LIFETIME,
            signing_alg: JwsAlg::default(),
        }
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| FederationError::Configuration(e.to_string()))?;
        let config: FederationConfig =
            toml::from_str(&raw).map_err(|e| FederationError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for obvious mistakes
    pub fn validate(&self) -> Result<()> {
        if self.entity_id.is_empty() {
            return Err(FederationError::Configuration(
                "entity_id must be set".to_string(),
            ));
        }
        url::Url::parse(&self.entity_id)
            .map_err(|e| FederationError::Configuration(format!("entity_id: {e}")))?;
        if self.lifetime <= 0 {
            return Err(FederationError::Configuration(
                "lifetime must be positive".to_string(),
            ));
        }
        for anchor in &self.tr_priority {
            if !self.trust_anchors.contains_key(anchor) {
                return Err(FederationError::Configuration(format!(
                    "tr_priority names unknown anchor {anchor}"
                )));
            }
        }
        Ok(())
    }
}
