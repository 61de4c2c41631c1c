//! # oidfed: OpenID Federation trust processing
//!
//! This crate implements the trust-processing core of an OpenID Federation
//! participant: given an entity identifier and a set of pinned trust
//! anchors it discovers, verifies and normalizes the chain of signed
//! entity statements linking the entity to an anchor, yielding the
//! entity's effective metadata after policy application and its verified
//! trust marks.
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//! - `jose`: JWKs, compact JWS plumbing and the federation key jar
//! - `message`: entity statements, trust marks, policies and endpoint I/O
//! - `statement`: the factory assembling and signing statements and marks
//! - `chain`: trust-chain collection, verification, constraints and the
//!   metadata-policy engine
//! - `trust_mark`: mark verification (incl. delegation), selection from
//!   the store, and issuer-side handling
//! - `endpoint`: transport-free request processors (resolve, fetch, ...)
//! - `ports` / `adapters`: the consumed collaborators (HTTP fetcher, JWS
//!   crypto, key-value store, clock) and their default implementations
//!
//! External protocol surfaces (HTTP serving, TLS, the OAuth2/OIDC flows
//! consuming these results) are deliberately out of scope; hosts wire the
//! endpoint processors into their own stack.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod adapters;
pub mod chain;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod jose;
pub mod message;
pub mod ports;
pub mod statement;
pub mod trust_mark;

// Re-export the types most hosts touch
pub use chain::TrustChain;
pub use config::{AuthorityHints, FederationConfig};
pub use context::FederationContext;
pub use entity::{FederationEntity, SubordinateInfo};
pub use error::{FederationError, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{DefaultCrypto, SystemClock};
    pub use crate::chain::{TrustChain, TrustChainCollector, TrustChainVerifier};
    pub use crate::config::{AuthorityHints, FederationConfig};
    pub use crate::endpoint::{
        EntityConfigurationEndpoint, FetchEndpoint, ListEndpoint, ResolveEndpoint,
        TrustMarkEndpoint, TrustMarkListEndpoint, TrustMarkStatusEndpoint,
    };
    pub use crate::entity::{FederationEntity, SubordinateInfo};
    pub use crate::error::{FederationError, Result};
    pub use crate::jose::{Jwk, JwkSet, JwsAlg, KeyJar};
    pub use crate::message::{
        EntityStatement, EntityType, Metadata, ResolveRequest, ResolveResponse, TrustMark,
        TrustMarkEntry,
    };
    pub use crate::ports::{Clock, HttpClient, JwsCrypto, KeyValueStore};
    pub use crate::statement::StatementSigner;
    pub use crate::trust_mark::{TrustMarkEntity, TrustMarksSource, TrustMarkVerifyOptions};
}
