//! Typed views of the per-type metadata blocks
//!
//! The federation-entity view is what the collector and resolver use to
//! locate endpoints; the RP/OP views carry the members the federation
//! profile requires on top of plain OAuth2/OIDC metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FederationError, Result};
use crate::message::ClaimMap;

/// Federation-entity metadata: endpoints and organization information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FederationEntityMetadata {
    /// Endpoint returning subordinate statements by subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federation_fetch_endpoint: Option<String>,

    /// Endpoint listing subordinate entity identifiers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federation_list_endpoint: Option<String>,

    /// Endpoint resolving metadata and trust marks for an entity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federation_resolve_endpoint: Option<String>,

    /// Endpoint reporting whether a trust mark is still active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federation_trust_mark_status_endpoint: Option<String>,

    /// Endpoint listing subjects holding a trust mark
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federation_trust_mark_list_endpoint: Option<String>,

    /// Endpoint issuing trust marks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federation_trust_mark_endpoint: Option<String>,

    /// Endpoint serving historical signing keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federation_historical_keys_endpoint: Option<String>,

    /// Display name of the operating organization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,

    /// Operational contact addresses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<String>>,

    /// Organization logo
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,

    /// Policy document of the operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,

    /// Organization home page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage_uri: Option<String>,

    /// Claims this view does not model
    #[serde(flatten)]
    pub extra: ClaimMap,
}

impl FederationEntityMetadata {
    /// The claim-map form used inside [`crate::message::Metadata`]
    pub fn to_claims(&self) -> Result<ClaimMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(FederationError::InvalidStatement(
                "federation entity metadata must be an object".to_string(),
            )),
        }
    }
}

/// Structural checks for the metadata blocks of the known entity roles
///
/// Mirrors the required members of the federation profile: relying parties
/// must state their `client_registration_types`, providers the supported
/// ones, trust-mark issuers their status endpoint.
pub fn verify_metadata_block(entity_type: &str, claims: &ClaimMap) -> Result<()> {
    fn require(claims: &ClaimMap, entity_type: &str, member: &str) -> Result<()> {
        if claims.contains_key(member) {
            Ok(())
        } else {
            Err(FederationError::MissingRequiredAttribute(format!(
                "{entity_type}.{member}"
            )))
        }
    }

    match entity_type {
        "openid_relying_party" => require(claims, entity_type, "client_registration_types"),
        "openid_provider" => require(claims, entity_type, "client_registration_types_supported"),
        "trust_mark_issuer" => require(claims, entity_type, "status_endpoint"),
        // Other blocks have no federation-required members
        _ => Ok(()),
    }
}
