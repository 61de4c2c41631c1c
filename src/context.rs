//! Per-entity federation context
//!
//! Everything one participant needs to act in a federation: its identity,
//! key jar, pinned anchors, advertised metadata and marks, and signing
//! defaults. There is no global state; processes hosting several entities
//! give each its own context, and caches are only shared through a shared
//! collector (same trust-anchor set).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::config::AuthorityHints;
use crate::jose::jws::JwsAlg;
use crate::jose::keyjar::KeyJar;
use crate::message::entity_statement::TrustMarkOwner;
use crate::message::trust_mark::TrustMarkEntry;
use crate::message::Metadata;

/// The state a federation participant carries between requests
#[derive(Debug, Clone)]
pub struct FederationContext {
    /// The URI of this participant
    pub entity_id: String,

    /// Key material, own and learned, per issuer
    pub keyjar: Arc<RwLock<KeyJar>>,

    /// Superiors to advertise
    pub authority_hints: AuthorityHints,

    /// Trust marks to advertise
    pub trust_marks: Vec<TrustMarkEntry>,

    /// Preferred anchors for chain selection, most preferred first
    pub tr_priority: Vec<String>,

    /// Trust-anchor only: recognized issuers per mark type
    pub trust_mark_issuers: BTreeMap<String, Vec<String>>,

    /// Trust-anchor only: mark-type owners
    pub trust_mark_owners: BTreeMap<String, TrustMarkOwner>,

    /// Metadata this entity publishes about itself
    pub metadata: Metadata,

    /// Default signature lifetime in seconds
    pub lifetime: i64,

    /// Default signing algorithm
    pub signing_alg: JwsAlg,
}

impl FederationContext {
    /// A context for the given entity with empty collections
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            keyjar: Arc::new(RwLock::new(KeyJar::new())),
            authority_hints: AuthorityHints::default(),
            trust_marks: Vec::new(),
            tr_priority: Vec::new(),
            trust_mark_issuers: BTreeMap::new(),
            trust_mark_owners: BTreeMap::new(),
            metadata: Metadata::default(),
            lifetime: crate::statement::create::DEFAULT_LIFETIME,
            signing_alg: JwsAlg::default(),
        }
    }
}
