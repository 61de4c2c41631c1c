//! JWS signing/verification port
//!
//! The core consumes compact-JWS signing and verification as a service; it
//! never implements JOSE algorithms itself. The default adapter supports
//! RS256 and EdDSA.

use thiserror::Error;

use crate::jose::jwk::Jwk;
use crate::jose::jws::JwsAlg;

/// Port for raw JWS signature operations
///
/// Implementations sign and verify the JWS signing input
/// (`base64url(header) || '.' || base64url(payload)`) with a JWK.
pub trait JwsCrypto: Send + Sync {
    /// Produce a signature over the signing input with the given key
    fn sign(&self, signing_input: &[u8], key: &Jwk, alg: JwsAlg) -> Result<Vec<u8>, CryptoError>;

    /// Verify a signature over the signing input with the given key
    fn verify(
        &self,
        signing_input: &[u8],
        signature: &[u8],
        key: &Jwk,
        alg: JwsAlg,
    ) -> Result<(), CryptoError>;
}

/// Crypto-service errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("signature does not verify")]
    BadSignature,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}
