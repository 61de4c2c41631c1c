//! Trust-chain collection, verification and policy processing

pub mod collect;
pub mod constraints;
pub mod policy;
pub mod verify;

pub use collect::TrustChainCollector;
pub use policy::apply_policies;
pub use verify::TrustChainVerifier;

use crate::message::entity_statement::EntityStatement;
use crate::message::Metadata;

/// A verified trust chain binding a leaf entity to a trust anchor
#[derive(Debug, Clone)]
pub struct TrustChain {
    /// The trust anchor the chain terminates at
    pub anchor: String,

    /// Issuers along the chain, leaf first, anchor last
    pub iss_path: Vec<String>,

    /// When the chain stops being valid: the earliest statement expiry
    pub exp: i64,

    /// Decoded statement payloads, anchor-issued first, leaf configuration last
    pub verified_chain: Vec<EntityStatement>,

    /// The compact JWS tokens of the chain, in the same order
    pub chain: Vec<String>,

    /// Effective leaf metadata; present after policy application
    pub metadata: Option<Metadata>,
}

impl TrustChain {
    /// The leaf's self-signed configuration
    pub fn leaf(&self) -> Option<&EntityStatement> {
        self.verified_chain.last()
    }

    /// The entity the chain is about
    pub fn leaf_entity_id(&self) -> Option<&str> {
        self.iss_path.first().map(String::as_str)
    }

    /// Whether any element of the chain has expired
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.exp
    }
}
