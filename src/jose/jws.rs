//! Compact JWS handling
//!
//! Splitting, unverified payload peeks, and signing/verification through
//! the [`JwsCrypto`] port. The federation media types carried in the `typ`
//! header are defined here as well.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FederationError, Result};
use crate::jose::jwk::Jwk;
use crate::ports::crypto::JwsCrypto;

/// `typ` header of entity statements
pub const ENTITY_STATEMENT_TYP: &str = "entity-statement+jwt";
/// `typ` header of trust marks
pub const TRUST_MARK_TYP: &str = "trust-mark+jwt";
/// `typ` header of trust-mark delegations
pub const TRUST_MARK_DELEGATION_TYP: &str = "trust-mark-delegation+jwt";
/// `typ` header of resolve responses
pub const RESOLVE_RESPONSE_TYP: &str = "resolve-response+jwt";

/// Supported JWS algorithms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwsAlg {
    /// RSASSA-PKCS1-v1_5 with SHA-256
    #[default]
    RS256,
    /// Ed25519
    EdDSA,
}

impl std::fmt::Display for JwsAlg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwsAlg::RS256 => write!(f, "RS256"),
            JwsAlg::EdDSA => write!(f, "EdDSA"),
        }
    }
}

impl std::str::FromStr for JwsAlg {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RS256" => Ok(JwsAlg::RS256),
            "EdDSA" => Ok(JwsAlg::EdDSA),
            other => Err(FederationError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Protected JWS header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwsHeader {
    /// Signature algorithm
    pub alg: JwsAlg,

    /// Key identifier of the signing key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Media type of the signed object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl JwsHeader {
    /// Header for the given algorithm, key and media type
    pub fn new(alg: JwsAlg, kid: Option<String>, typ: &str) -> Self {
        Self {
            alg,
            kid,
            typ: Some(typ.to_string()),
        }
    }
}

/// Split a compact JWS into its three segments
pub fn split(token: &str) -> Result<(&str, &str, &str)> {
    let mut parts = token.trim().split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => Ok((h, p, s)),
        _ => Err(FederationError::MalformedJws(
            "expected three dot-separated segments".to_string(),
        )),
    }
}

/// Decode the protected header of a compact JWS
pub fn decode_header(token: &str) -> Result<JwsHeader> {
    let (h, _, _) = split(token)?;
    let raw = URL_SAFE_NO_PAD.decode(h)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Decode the payload of a compact JWS without verifying the signature
pub fn peek_payload(token: &str) -> Result<Value> {
    let (_, p, _) = split(token)?;
    let raw = URL_SAFE_NO_PAD.decode(p)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Decode the payload into typed claims without verifying the signature
pub fn peek_claims<T: DeserializeOwned>(token: &str) -> Result<T> {
    let (_, p, _) = split(token)?;
    let raw = URL_SAFE_NO_PAD.decode(p)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Sign a JSON payload into a compact JWS
pub fn sign_compact(
    crypto: &dyn JwsCrypto,
    header: &JwsHeader,
    payload: &Value,
    key: &Jwk,
) -> Result<String> {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?);
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = crypto.sign(signing_input.as_bytes(), key, header.alg)?;
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verify a compact JWS against a set of candidate keys
///
/// Keys that cannot carry the header's algorithm, or whose `kid` does not
/// match a `kid` present in the header, are not tried. Returns the decoded
/// payload of the first key that verifies.
pub fn verify_compact(crypto: &dyn JwsCrypto, token: &str, keys: &[Jwk]) -> Result<Value> {
    let (h, p, s) = split(token)?;
    let raw_header = URL_SAFE_NO_PAD.decode(h)?;
    let header: JwsHeader = serde_json::from_slice(&raw_header)?;
    let signature = URL_SAFE_NO_PAD.decode(s)?;
    let signing_input = format!("{h}.{p}");

    let candidates: Vec<&Jwk> = keys
        .iter()
        .filter(|k| k.supports_alg(header.alg))
        .filter(|k| match (&header.kid, &k.kid) {
            (Some(want), Some(have)) => want == have,
            _ => true,
        })
        .collect();

    if candidates.is_empty() {
        return Err(FederationError::MissingKey(format!(
            "alg={} kid={:?}",
            header.alg, header.kid
        )));
    }

    for key in candidates {
        if crypto
            .verify(signing_input.as_bytes(), &signature, key, header.alg)
            .is_ok()
        {
            let raw = URL_SAFE_NO_PAD.decode(p)?;
            return Ok(serde_json::from_slice(&raw)?);
        }
    }
    Err(FederationError::SignatureVerification)
}

/// Verify a compact JWS and decode the payload into typed claims
pub fn verify_claims<T: DeserializeOwned>(
    crypto: &dyn JwsCrypto,
    token: &str,
    keys: &[Jwk],
) -> Result<T> {
    let payload = verify_compact(crypto, token, keys)?;
    Ok(serde_json::from_value(payload)?)
}
