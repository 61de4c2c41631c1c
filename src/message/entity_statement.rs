//! Entity statement claims and structural verification

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FederationError, Result};
use crate::jose::jwk::JwkSet;
use crate::jose::jws;
use crate::message::metadata::verify_metadata_block;
use crate::message::policy::MetadataPolicy;
use crate::message::trust_mark::{TrustMark, TrustMarkEntry};
use crate::message::{ClaimMap, Metadata};

/// Naming constraints on the subjects below an authority
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamingConstraints {
    /// Subjects must fall under one of these identifiers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permitted: Option<Vec<String>>,

    /// Subjects must not fall under any of these identifiers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded: Option<Vec<String>>,
}

/// Constraints a superior places on the chain below it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Maximum number of intermediates below this statement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_path_length: Option<i64>,

    /// Naming constraints on all subordinate subjects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub naming_constraints: Option<NamingConstraints>,

    /// Constraint extensions
    #[serde(flatten)]
    pub extra: ClaimMap,
}

/// Owner of a trust-mark type, as listed by a trust anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustMarkOwner {
    /// Entity identifier of the owner
    pub sub: String,
    /// The owner's public keys, used to verify delegations
    pub jwks: JwkSet,
}

/// Options controlling structural verification of statements
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Extension claims this deployment understands (checked against `crit`)
    pub known_extensions: Vec<String>,
    /// Policy verbs this deployment understands beyond the seven standard ones
    pub known_policy_extensions: Vec<String>,
}

/// The payload of an entity statement
///
/// Self-signed entity configurations (`iss == sub`) and subordinate
/// statements share this shape; `trust_mark_issuers` and
/// `trust_mark_owners` only appear on trust-anchor configurations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStatement {
    /// Issuer of the statement
    pub iss: String,

    /// Subject the statement describes
    pub sub: String,

    /// Issued-at, Unix seconds
    #[serde(default)]
    pub iat: i64,

    /// Expiration, Unix seconds
    #[serde(default)]
    pub exp: i64,

    /// Intended audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Unique token identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Signing keys of the subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,

    /// Superiors of the subject; present on leaf configurations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_hints: Option<Vec<String>>,

    /// Metadata describing the subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Policy a superior applies to subordinate metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_policy: Option<MetadataPolicy>,

    /// Policy verbs that must be understood
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_language_crit: Option<Vec<String>>,

    /// Constraints on the chain below this statement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,

    /// Extension claims that must be understood
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,

    /// Trust marks the subject holds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_marks: Option<Vec<TrustMarkEntry>>,

    /// Trust-anchor only: mark id → issuers allowed to issue it (empty = any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_mark_issuers: Option<BTreeMap<String, Vec<String>>>,

    /// Trust-anchor only: mark id → owner of the mark type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_mark_owners: Option<BTreeMap<String, TrustMarkOwner>>,

    /// Where the statement was fetched from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_endpoint: Option<String>,

    /// Anchor a resolve response was produced under
    #[serde(skip_serializing_if = "Option::is_none", alias = "trust_anchor_id")]
    pub trust_anchor: Option<String>,

    /// Claims this crate does not model
    #[serde(flatten)]
    pub extra: ClaimMap,
}

impl EntityStatement {
    /// Minimal statement skeleton; `iat`/`exp` are filled in at signing time
    pub fn new(iss: impl Into<String>, sub: impl Into<String>) -> Self {
        EntityStatement {
            iss: iss.into(),
            sub: sub.into(),
            ..EntityStatement::default()
        }
    }

    /// Whether this is a self-signed entity configuration
    pub fn is_self_signed(&self) -> bool {
        !self.iss.is_empty() && self.iss == self.sub
    }

    /// Whether the statement has passed its expiration time
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.exp
    }

    /// Structural verification of the statement
    ///
    /// Checks required claims and time ordering, rejects unknown critical
    /// extension claims, validates the metadata blocks and any embedded
    /// trust-mark entries, and verifies the metadata policy against
    /// `policy_language_crit`.
    pub fn verify(&self, now: i64, opts: &VerifyOptions) -> Result<()> {
        for (name, value) in [("iss", &self.iss), ("sub", &self.sub)] {
            if value.is_empty() {
                return Err(FederationError::MissingRequiredAttribute(name.to_string()));
            }
        }
        if self.iat <= 0 {
            return Err(FederationError::MissingRequiredAttribute("iat".to_string()));
        }
        if self.exp <= 0 {
            return Err(FederationError::MissingRequiredAttribute("exp".to_string()));
        }
        if self.iat > self.exp {
            return Err(FederationError::InvalidStatement(
                "iat is after exp".to_string(),
            ));
        }
        if self.is_expired(now) {
            return Err(FederationError::Expired);
        }

        if let Some(critical) = &self.crit {
            if critical.is_empty() {
                return Err(FederationError::InvalidStatement(
                    "empty list not allowed for 'crit'".to_string(),
                ));
            }
            for claim in critical {
                if self.extra.contains_key(claim)
                    && !opts.known_extensions.iter().any(|k| k == claim)
                {
                    return Err(FederationError::UnknownCriticalExtension(claim.clone()));
                }
            }
        }

        if let Some(metadata) = &self.metadata {
            for (entity_type, claims) in &metadata.0 {
                verify_metadata_block(entity_type, claims)?;
            }
        }

        if let Some(policy) = &self.metadata_policy {
            policy.verify(
                self.policy_language_crit.as_deref(),
                &opts.known_policy_extensions,
            )?;
        }

        if let Some(entries) = &self.trust_marks {
            for entry in entries {
                let payload: TrustMark = jws::peek_claims(&entry.trust_mark)?;
                if payload.trust_mark_id != entry.trust_mark_id {
                    return Err(FederationError::InvalidStatement(
                        "trust mark entry id does not match the mark's trust_mark_id".to_string(),
                    ));
                }
                payload.verify(now, None)?;
            }
        }

        Ok(())
    }
}
