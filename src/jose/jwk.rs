//! JSON Web Keys
//!
//! Key material is carried as JWKs throughout: pinned trust-anchor key
//! sets, `jwks` claims in entity statements, and the key jar. Two key
//! families are supported, matching the crypto service: RSA (RS256) and
//! Ed25519 (EdDSA).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FederationError, Result};
use crate::jose::jws::JwsAlg;

/// A single JSON Web Key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type: `RSA` or `OKP`
    pub kty: String,

    /// Key use, normally `sig`
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    /// Key identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended algorithm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// OKP curve, `Ed25519`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// OKP public key, base64url
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// RSA modulus, base64url big-endian
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent, base64url big-endian
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Private key member (OKP seed or RSA private exponent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// RSA first prime factor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,

    /// RSA second prime factor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

impl Jwk {
    /// Generate a fresh Ed25519 signing key with a thumbprint `kid`
    pub fn generate_ed25519() -> Result<Jwk> {
        let signing = ed25519_dalek::SigningKey::generate(&mut OsRng);
        let mut jwk = Jwk {
            kty: "OKP".to_string(),
            use_: Some("sig".to_string()),
            alg: Some(JwsAlg::EdDSA.to_string()),
            crv: Some("Ed25519".to_string()),
            x: Some(URL_SAFE_NO_PAD.encode(signing.verifying_key().as_bytes())),
            d: Some(URL_SAFE_NO_PAD.encode(signing.to_bytes())),
            ..Jwk::default()
        };
        jwk.kid = Some(jwk.thumbprint()?);
        Ok(jwk)
    }

    /// Generate a fresh RSA signing key with a thumbprint `kid`
    pub fn generate_rsa(bits: usize) -> Result<Jwk> {
        let private = rsa::RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| FederationError::InvalidKey(e.to_string()))?;
        let primes = private.primes();
        if primes.len() < 2 {
            return Err(FederationError::InvalidKey(
                "RSA key without two prime factors".to_string(),
            ));
        }
        let mut jwk = Jwk {
            kty: "RSA".to_string(),
            use_: Some("sig".to_string()),
            alg: Some(JwsAlg::RS256.to_string()),
            n: Some(URL_SAFE_NO_PAD.encode(private.n().to_bytes_be())),
            e: Some(URL_SAFE_NO_PAD.encode(private.e().to_bytes_be())),
            d: Some(URL_SAFE_NO_PAD.encode(private.d().to_bytes_be())),
            p: Some(URL_SAFE_NO_PAD.encode(primes[0].to_bytes_be())),
            q: Some(URL_SAFE_NO_PAD.encode(primes[1].to_bytes_be())),
            ..Jwk::default()
        };
        jwk.kid = Some(jwk.thumbprint()?);
        Ok(jwk)
    }

    /// RFC 7638 thumbprint, base64url-encoded SHA-256
    pub fn thumbprint(&self) -> Result<String> {
        let canonical = match self.kty.as_str() {
            "OKP" => {
                let crv = self.crv.as_deref().ok_or_else(|| missing("crv"))?;
                let x = self.x.as_deref().ok_or_else(|| missing("x"))?;
                format!(r#"{{"crv":"{crv}","kty":"OKP","x":"{x}"}}"#)
            }
            "RSA" => {
                let e = self.e.as_deref().ok_or_else(|| missing("e"))?;
                let n = self.n.as_deref().ok_or_else(|| missing("n"))?;
                format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#)
            }
            other => {
                return Err(FederationError::UnsupportedAlgorithm(format!(
                    "no thumbprint for kty {other}"
                )))
            }
        };
        let digest = Sha256::digest(canonical.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(digest))
    }

    /// A copy with all private members stripped
    pub fn to_public(&self) -> Jwk {
        Jwk {
            d: None,
            p: None,
            q: None,
            ..self.clone()
        }
    }

    /// Whether the key carries private material
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Whether this key can carry signatures of the given algorithm
    pub fn supports_alg(&self, alg: JwsAlg) -> bool {
        match alg {
            JwsAlg::RS256 => self.kty == "RSA",
            JwsAlg::EdDSA => self.kty == "OKP" && self.crv.as_deref() == Some("Ed25519"),
        }
    }
}

fn missing(member: &str) -> FederationError {
    FederationError::InvalidKey(format!("JWK missing {member}"))
}

/// A JWK set, the `jwks` claim shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// The keys in the set
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// A set holding a single key
    pub fn single(key: Jwk) -> Self {
        Self { keys: vec![key] }
    }

    /// A copy with all private members stripped
    pub fn to_public(&self) -> JwkSet {
        JwkSet {
            keys: self.keys.iter().map(Jwk::to_public).collect(),
        }
    }

    /// Whether the set contains no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_thumbprint_is_stable() {
        let jwk = Jwk::generate_ed25519().unwrap();
        assert_eq!(jwk.thumbprint().unwrap(), jwk.thumbprint().unwrap());
        assert_eq!(jwk.kid.as_deref(), Some(jwk.thumbprint().unwrap().as_str()));
    }

    #[test]
    fn public_copy_strips_private_members() {
        let jwk = Jwk::generate_ed25519().unwrap();
        assert!(jwk.is_private());
        let public = jwk.to_public();
        assert!(!public.is_private());
        assert_eq!(public.x, jwk.x);
        // Thumbprint only covers public members
        assert_eq!(public.thumbprint().unwrap(), jwk.thumbprint().unwrap());
    }

    #[test]
    fn supports_alg_by_family() {
        let okp = Jwk::generate_ed25519().unwrap();
        assert!(okp.supports_alg(JwsAlg::EdDSA));
        assert!(!okp.supports_alg(JwsAlg::RS256));
    }
}
