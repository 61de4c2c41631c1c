//! Request and response messages of the federation endpoints

use serde::{Deserialize, Serialize};

use crate::error::{FederationError, Result};
use crate::jose::jws;
use crate::message::trust_mark::TrustMarkEntry;
use crate::message::{ClaimMap, Metadata};

/// Request to the resolve endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Entity to resolve
    pub sub: String,

    /// Anchor the chain must terminate at
    #[serde(alias = "trust_anchor_id")]
    pub trust_anchor: String,

    /// Narrow the returned metadata to a single entity type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

/// The payload of a signed resolve response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// The resolver
    pub iss: String,

    /// The resolved entity
    pub sub: String,

    /// Issued-at, Unix seconds
    #[serde(default)]
    pub iat: i64,

    /// Expiration, Unix seconds
    #[serde(default)]
    pub exp: i64,

    /// Effective metadata after policy application
    pub metadata: Metadata,

    /// The chosen trust chain, anchor-issued statement first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_chain: Option<Vec<String>>,

    /// Marks that verified against the chosen anchor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_marks: Option<Vec<TrustMarkEntry>>,

    /// Claims this crate does not model
    #[serde(flatten)]
    pub extra: ClaimMap,
}

impl ResolveResponse {
    /// Decode a resolve response without verifying its signature
    ///
    /// Rejects tokens whose `typ` header is not `resolve-response+jwt`.
    pub fn peek(token: &str) -> Result<ResolveResponse> {
        let header = jws::decode_header(token)?;
        if header.typ.as_deref() != Some(jws::RESOLVE_RESPONSE_TYP) {
            return Err(FederationError::InvalidStatement(format!(
                "expected typ {}, got {:?}",
                jws::RESOLVE_RESPONSE_TYP,
                header.typ
            )));
        }
        jws::peek_claims(token)
    }

    /// Decode and verify a resolve response against the resolver's keys
    pub fn verify_with(
        crypto: &dyn crate::ports::crypto::JwsCrypto,
        token: &str,
        keys: &[crate::jose::jwk::Jwk],
    ) -> Result<ResolveResponse> {
        // typ check first; a valid signature over the wrong type is still wrong
        Self::peek(token)?;
        jws::verify_claims(crypto, token, keys)
    }
}

/// Request to a superior's fetch endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// The subordinate the statement should be about
    pub sub: String,
}

/// Request to the list endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    /// Only subordinates advertising this entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Only subordinates that are intermediates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate: Option<bool>,

    /// Only subordinates holding at least one trust mark
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_marked: Option<bool>,

    /// Only subordinates holding this trust mark
    #[serde(alias = "trust_mark_type", skip_serializing_if = "Option::is_none")]
    pub trust_mark_id: Option<String>,
}

/// Request to the trust-mark status endpoint
///
/// Either the whole mark, or the pair `sub` + `trust_mark_id` (optionally
/// narrowed by `iat`) identifies the mark being asked about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustMarkStatusRequest {
    /// The mark's subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// The mark's type identifier
    #[serde(alias = "trust_mark_type", skip_serializing_if = "Option::is_none")]
    pub trust_mark_id: Option<String>,

    /// Narrow to a mark issued at exactly this time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// The whole mark as a compact JWS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_mark: Option<String>,
}

impl TrustMarkStatusRequest {
    /// Check the either/or shape of the request
    pub fn verify(&self) -> Result<()> {
        if self.trust_mark.is_some() {
            return Ok(());
        }
        if self.sub.is_some() && self.trust_mark_id.is_some() {
            return Ok(());
        }
        Err(FederationError::MissingRequiredAttribute(
            "either 'trust_mark' or both 'sub' and 'trust_mark_id'".to_string(),
        ))
    }
}

/// Response of the trust-mark status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustMarkStatusResponse {
    /// Whether the mark is currently active according to its issuer
    pub active: bool,
}

/// Request to the trust-mark list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustMarkListRequest {
    /// The trust-mark type being asked about
    #[serde(alias = "trust_mark_type")]
    pub trust_mark_id: String,

    /// Restrict to a single subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

/// Request for issuing a trust mark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustMarkRequest {
    /// The trust-mark type to issue
    #[serde(alias = "trust_mark_type")]
    pub trust_mark_id: String,

    /// The subject to issue it to
    pub sub: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_request_shape() {
        let bad = TrustMarkStatusRequest {
            sub: Some("https://rp.example.org".to_string()),
            ..TrustMarkStatusRequest::default()
        };
        assert!(bad.verify().is_err());

        let by_pair = TrustMarkStatusRequest {
            sub: Some("https://rp.example.org".to_string()),
            trust_mark_id: Some("https://refeds.org/sirtfi".to_string()),
            ..TrustMarkStatusRequest::default()
        };
        assert!(by_pair.verify().is_ok());

        let by_mark = TrustMarkStatusRequest {
            trust_mark: Some("eyJ..".to_string()),
            ..TrustMarkStatusRequest::default()
        };
        assert!(by_mark.verify().is_ok());
    }

    #[test]
    fn resolve_request_accepts_anchor_alias() {
        let req: ResolveRequest = serde_json::from_str(
            r#"{"sub": "https://rp.example.org", "trust_anchor_id": "https://ta.example.org"}"#,
        )
        .unwrap();
        assert_eq!(req.trust_anchor, "https://ta.example.org");
    }
}
