//! Assembling and signing entity statements, trust marks and delegations
//!
//! All federation tokens leave through [`StatementSigner`]: self-signed
//! entity configurations, subordinate statements, trust marks with or
//! without an embedded delegation, and signed resolve responses. The
//! signer picks a private key for its configured algorithm out of the key
//! jar; a jar that cannot sign with that algorithm is a fatal error.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::error::{FederationError, Result};
use crate::jose::jwk::JwkSet;
use crate::jose::jws::{self, JwsAlg, JwsHeader};
use crate::jose::keyjar::KeyJar;
use crate::message::entity_statement::{Constraints, EntityStatement, TrustMarkOwner};
use crate::message::policy::MetadataPolicy;
use crate::message::trust_mark::{TrustMark, TrustMarkDelegation, TrustMarkEntry};
use crate::message::{api::ResolveResponse, Metadata};
use crate::ports::clock::Clock;
use crate::ports::crypto::JwsCrypto;

/// Default signature lifetime in seconds
pub const DEFAULT_LIFETIME: i64 = 86_400;

/// Optional claims of an entity configuration
#[derive(Debug, Clone, Default)]
pub struct EntityConfigurationOptions {
    /// Trust marks to advertise
    pub trust_marks: Vec<TrustMarkEntry>,

    /// Trust-anchor only: recognized issuers per mark type
    pub trust_mark_issuers: Option<BTreeMap<String, Vec<String>>>,

    /// Trust-anchor only: mark-type owners
    pub trust_mark_owners: Option<BTreeMap<String, TrustMarkOwner>>,

    /// Suppress embedding the issuer's public JWKS
    pub suppress_jwks: bool,
}

/// Optional claims of a subordinate statement
#[derive(Debug, Clone, Default)]
pub struct SubordinateOptions {
    /// Policy applied to the subordinate's metadata
    pub metadata_policy: Option<MetadataPolicy>,

    /// Constraints on the chain below the subordinate
    pub constraints: Option<Constraints>,

    /// Metadata the superior asserts about the subordinate
    pub metadata: Option<Metadata>,

    /// Extension claims the consumer must understand
    pub crit: Option<Vec<String>>,

    /// Policy verbs the consumer must understand
    pub policy_language_crit: Option<Vec<String>>,
}

/// Optional claims of a trust mark
#[derive(Debug, Clone, Default)]
pub struct TrustMarkOptions {
    /// Mark lifetime overriding the signer default
    pub lifetime: Option<i64>,

    pub logo_uri: Option<String>,

    /// Reference to the definition of the mark
    pub ref_: Option<String>,

    /// Delegation from the mark-type owner, compact JWS
    pub delegation: Option<String>,
}

/// Signs federation tokens with a configurable lifetime and algorithm
#[derive(Clone)]
pub struct StatementSigner {
    crypto: Arc<dyn JwsCrypto>,
    clock: Arc<dyn Clock>,
    lifetime: i64,
    alg: JwsAlg,
}

impl StatementSigner {
    /// A signer with the default lifetime (86 400 s) and algorithm (RS256)
    pub fn new(crypto: Arc<dyn JwsCrypto>, clock: Arc<dyn Clock>) -> Self {
        Self {
            crypto,
            clock,
            lifetime: DEFAULT_LIFETIME,
            alg: JwsAlg::default(),
        }
    }

    /// Override the signature lifetime
    pub fn with_lifetime(mut self, lifetime: i64) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Override the signing algorithm
    pub fn with_alg(mut self, alg: JwsAlg) -> Self {
        self.alg = alg;
        self
    }

    /// The configured signing algorithm
    pub fn alg(&self) -> JwsAlg {
        self.alg
    }

    /// The configured lifetime in seconds
    pub fn lifetime(&self) -> i64 {
        self.lifetime
    }

    fn sign(&self, keyjar: &KeyJar, iss: &str, typ: &str, payload: Value) -> Result<String> {
        let key = keyjar.signing_key(iss, self.alg).ok_or_else(|| {
            FederationError::MissingKey(format!("no {} signing key for {iss}", self.alg))
        })?;
        let header = JwsHeader::new(self.alg, key.kid.clone(), typ);
        jws::sign_compact(self.crypto.as_ref(), &header, &payload, key)
    }

    /// Sign an entity statement, filling in `iat`/`exp` and, unless
    /// suppressed, the issuer's public JWKS
    pub fn entity_statement(
        &self,
        keyjar: &KeyJar,
        mut statement: EntityStatement,
        include_jwks: bool,
    ) -> Result<String> {
        if statement.iss.is_empty() {
            return Err(FederationError::MissingRequiredAttribute("iss".to_string()));
        }
        if statement.sub.is_empty() {
            return Err(FederationError::MissingRequiredAttribute("sub".to_string()));
        }
        let now = self.clock.now();
        statement.iat = now;
        statement.exp = now + self.lifetime;
        if include_jwks && statement.jwks.is_none() {
            statement.jwks = Some(keyjar.export_jwks(&statement.iss));
        }
        let issuer = statement.iss.clone();
        self.sign(
            keyjar,
            &issuer,
            jws::ENTITY_STATEMENT_TYP,
            serde_json::to_value(statement)?,
        )
    }

    /// Create a self-signed entity configuration (`iss == sub`)
    pub fn entity_configuration(
        &self,
        keyjar: &KeyJar,
        iss: &str,
        metadata: Metadata,
        authority_hints: Option<Vec<String>>,
        opts: EntityConfigurationOptions,
    ) -> Result<String> {
        let mut statement = EntityStatement::new(iss, iss);
        if !metadata.is_empty() {
            statement.metadata = Some(metadata);
        }
        if let Some(hints) = authority_hints {
            if !hints.is_empty() {
                statement.authority_hints = Some(hints);
            }
        }
        if !opts.trust_marks.is_empty() {
            statement.trust_marks = Some(opts.trust_marks);
        }
        statement.trust_mark_issuers = opts.trust_mark_issuers;
        statement.trust_mark_owners = opts.trust_mark_owners;
        self.entity_statement(keyjar, statement, !opts.suppress_jwks)
    }

    /// Create a subordinate statement about `sub`, embedding the subject's
    /// advertised JWKS so the next signature can be verified without a
    /// second lookup
    pub fn subordinate_statement(
        &self,
        keyjar: &KeyJar,
        iss: &str,
        sub: &str,
        subject_jwks: JwkSet,
        opts: SubordinateOptions,
    ) -> Result<String> {
        if subject_jwks.is_empty() {
            return Err(FederationError::MissingRequiredAttribute(
                "subject jwks".to_string(),
            ));
        }
        let mut statement = EntityStatement::new(iss, sub);
        statement.jwks = Some(subject_jwks.to_public());
        statement.metadata_policy = opts.metadata_policy;
        statement.constraints = opts.constraints;
        statement.metadata = opts.metadata;
        statement.crit = opts.crit;
        statement.policy_language_crit = opts.policy_language_crit;
        // The subject's keys are already embedded; nothing else to add
        self.entity_statement(keyjar, statement, false)
    }

    /// Create a signed trust mark, optionally carrying a delegation
    pub fn trust_mark(
        &self,
        keyjar: &KeyJar,
        iss: &str,
        sub: &str,
        trust_mark_id: &str,
        opts: TrustMarkOptions,
    ) -> Result<String> {
        if trust_mark_id.is_empty() {
            return Err(FederationError::MissingRequiredAttribute(
                "trust_mark_id".to_string(),
            ));
        }
        if sub.is_empty() {
            return Err(FederationError::MissingRequiredAttribute("sub".to_string()));
        }
        let now = self.clock.now();
        let mark = TrustMark {
            iss: iss.to_string(),
            sub: sub.to_string(),
            iat: now,
            trust_mark_id: trust_mark_id.to_string(),
            exp: Some(now + opts.lifetime.unwrap_or(self.lifetime)),
            logo_uri: opts.logo_uri,
            ref_: opts.ref_,
            delegation: opts.delegation,
            jti: Some(Uuid::new_v4().to_string()),
            ..TrustMark::default()
        };
        self.sign(
            keyjar,
            iss,
            jws::TRUST_MARK_TYP,
            serde_json::to_value(mark)?,
        )
    }

    /// Create a trust-mark delegation, signed by the mark-type owner
    pub fn trust_mark_delegation(
        &self,
        keyjar: &KeyJar,
        owner: &str,
        issuer: &str,
        trust_mark_id: &str,
    ) -> Result<String> {
        if trust_mark_id.is_empty() {
            return Err(FederationError::MissingRequiredAttribute(
                "trust_mark_id".to_string(),
            ));
        }
        let delegation = TrustMarkDelegation {
            iss: owner.to_string(),
            sub: issuer.to_string(),
            trust_mark_id: trust_mark_id.to_string(),
            iat: self.clock.now(),
            ..TrustMarkDelegation::default()
        };
        self.sign(
            keyjar,
            owner,
            jws::TRUST_MARK_DELEGATION_TYP,
            serde_json::to_value(delegation)?,
        )
    }

    /// Sign a resolve response
    pub fn resolve_response(
        &self,
        keyjar: &KeyJar,
        iss: &str,
        sub: &str,
        metadata: Metadata,
        trust_chain: Vec<String>,
        trust_marks: Vec<TrustMarkEntry>,
    ) -> Result<String> {
        let now = self.clock.now();
        let response = ResolveResponse {
            iss: iss.to_string(),
            sub: sub.to_string(),
            iat: now,
            exp: now + self.lifetime,
            metadata,
            trust_chain: Some(trust_chain),
            trust_marks: (!trust_marks.is_empty()).then_some(trust_marks),
            ..ResolveResponse::default()
        };
        self.sign(
            keyjar,
            iss,
            jws::RESOLVE_RESPONSE_TYP,
            serde_json::to_value(response)?,
        )
    }
}
