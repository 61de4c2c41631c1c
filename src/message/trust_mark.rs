//! Trust mark and trust-mark delegation claims

use serde::{Deserialize, Serialize};

use crate::error::{FederationError, Result};
use crate::jose::jws;
use crate::message::ClaimMap;

/// A `trust_marks` list entry: the mark id next to the signed mark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustMarkEntry {
    /// Identifier of the trust-mark type
    #[serde(alias = "trust_mark_type")]
    pub trust_mark_id: String,

    /// The mark itself as a compact JWS
    pub trust_mark: String,
}

/// The payload of a trust mark
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustMark {
    /// Issuer of the mark
    pub iss: String,

    /// Entity the mark is about
    pub sub: String,

    /// Issued-at, Unix seconds
    #[serde(default)]
    pub iat: i64,

    /// Identifier of the trust-mark type
    #[serde(alias = "trust_mark_type")]
    pub trust_mark_id: String,

    /// Expiration, Unix seconds; marks may be unexpiring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Logo associated with the mark
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,

    /// Reference to the definition of the mark
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_: Option<String>,

    /// Delegation from the owner of the mark type, compact JWS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation: Option<String>,

    /// Unique token identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Claims this crate does not model
    #[serde(flatten)]
    pub extra: ClaimMap,
}

impl TrustMark {
    /// Structural verification of the mark
    ///
    /// Checks required claims, the subject against an expected `entity_id`,
    /// expiry, and, when a delegation is embedded, that the delegation's
    /// `sub` names this mark's issuer and its `trust_mark_id` matches.
    /// Returns the decoded delegation claims when present. Signatures are
    /// not verified here.
    pub fn verify(&self, now: i64, entity_id: Option<&str>) -> Result<Option<TrustMarkDelegation>> {
        for (name, value) in [
            ("iss", &self.iss),
            ("sub", &self.sub),
            ("trust_mark_id", &self.trust_mark_id),
        ] {
            if value.is_empty() {
                return Err(FederationError::MissingRequiredAttribute(name.to_string()));
            }
        }
        if self.iat <= 0 {
            return Err(FederationError::MissingRequiredAttribute("iat".to_string()));
        }

        if let Some(expected) = entity_id {
            if expected != self.sub {
                return Err(FederationError::WrongSubject(format!(
                    "trust mark subject {} does not match entity {expected}",
                    self.sub
                )));
            }
        }

        if let Some(exp) = self.exp {
            if now > exp {
                return Err(FederationError::Expired);
            }
        }

        let Some(delegation_jws) = &self.delegation else {
            return Ok(None);
        };
        let delegation: TrustMarkDelegation = jws::peek_claims(delegation_jws)?;
        delegation.verify(now)?;
        if delegation.sub != self.iss {
            return Err(FederationError::Delegation(format!(
                "delegation is for issuer {}, mark issued by {}",
                delegation.sub, self.iss
            )));
        }
        if delegation.trust_mark_id != self.trust_mark_id {
            return Err(FederationError::Delegation(format!(
                "delegation is for {}, mark is {}",
                delegation.trust_mark_id, self.trust_mark_id
            )));
        }
        Ok(Some(delegation))
    }
}

/// The payload of a trust-mark delegation, signed by the mark-type owner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustMarkDelegation {
    /// The mark-type owner
    pub iss: String,

    /// The issuer being delegated to
    pub sub: String,

    /// Identifier of the trust-mark type being delegated
    #[serde(alias = "trust_mark_type")]
    pub trust_mark_id: String,

    /// Issued-at, Unix seconds
    #[serde(default)]
    pub iat: i64,

    /// Expiration, Unix seconds; delegations may be unexpiring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Reference to the definition of the delegation
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_: Option<String>,

    /// Claims this crate does not model
    #[serde(flatten)]
    pub extra: ClaimMap,
}

impl TrustMarkDelegation {
    /// Structural verification: required claims and expiry
    pub fn verify(&self, now: i64) -> Result<()> {
        for (name, value) in [
            ("iss", &self.iss),
            ("sub", &self.sub),
            ("trust_mark_id", &self.trust_mark_id),
        ] {
            if value.is_empty() {
                return Err(FederationError::MissingRequiredAttribute(name.to_string()));
            }
        }
        if let Some(exp) = self.exp {
            if now > exp {
                return Err(FederationError::Expired);
            }
        }
        Ok(())
    }
}
