//! Default JWS crypto service
//!
//! Implements the two algorithm families the federation core signs and
//! verifies with: RS256 (`rsa` + `sha2`) and EdDSA (`ed25519-dalek`).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signer as _, Verifier as _};
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::BigUint;
use sha2::Sha256;

use crate::jose::jwk::Jwk;
use crate::jose::jws::JwsAlg;
use crate::ports::crypto::{CryptoError, JwsCrypto};

/// RS256 + EdDSA implementation of the [`JwsCrypto`] port
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCrypto;

fn decode_b64(member: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| CryptoError::InvalidKey(format!("{member}: {e}")))
}

fn require<'a>(key: &'a Jwk, member: &str, value: &'a Option<String>) -> Result<&'a str, CryptoError> {
    value.as_deref().ok_or_else(|| {
        CryptoError::InvalidKey(format!("{} key missing {member}", key.kty))
    })
}

fn ed25519_signing_key(key: &Jwk) -> Result<ed25519_dalek::SigningKey, CryptoError> {
    let d = decode_b64("d", require(key, "d", &key.d)?)?;
    let seed: [u8; 32] = d
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("Ed25519 seed must be 32 bytes".to_string()))?;
    Ok(ed25519_dalek::SigningKey::from_bytes(&seed))
}

fn ed25519_verifying_key(key: &Jwk) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
    let x = decode_b64("x", require(key, "x", &key.x)?)?;
    let raw: [u8; 32] = x
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("Ed25519 public key must be 32 bytes".to_string()))?;
    ed25519_dalek::VerifyingKey::from_bytes(&raw)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

fn rsa_private_key(key: &Jwk) -> Result<rsa::RsaPrivateKey, CryptoError> {
    let n = BigUint::from_bytes_be(&decode_b64("n", require(key, "n", &key.n)?)?);
    let e = BigUint::from_bytes_be(&decode_b64("e", require(key, "e", &key.e)?)?);
    let d = BigUint::from_bytes_be(&decode_b64("d", require(key, "d", &key.d)?)?);
    let p = BigUint::from_bytes_be(&decode_b64("p", require(key, "p", &key.p)?)?);
    let q = BigUint::from_bytes_be(&decode_b64("q", require(key, "q", &key.q)?)?);
    rsa::RsaPrivateKey::from_components(n, e, d, vec![p, q])
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

fn rsa_public_key(key: &Jwk) -> Result<rsa::RsaPublicKey, CryptoError> {
    let n = BigUint::from_bytes_be(&decode_b64("n", require(key, "n", &key.n)?)?);
    let e = BigUint::from_bytes_be(&decode_b64("e", require(key, "e", &key.e)?)?);
    rsa::RsaPublicKey::new(n, e).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

impl JwsCrypto for DefaultCrypto {
    fn sign(&self, signing_input: &[u8], key: &Jwk, alg: JwsAlg) -> Result<Vec<u8>, CryptoError> {
        if !key.supports_alg(alg) {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{alg} with kty {}",
                key.kty
            )));
        }
        match alg {
            JwsAlg::EdDSA => {
                let signing = ed25519_signing_key(key)?;
                Ok(signing.sign(signing_input).to_bytes().to_vec())
            }
            JwsAlg::RS256 => {
                let private = rsa_private_key(key)?;
                let signing = rsa::pkcs1v15::SigningKey::<Sha256>::new(private);
                Ok(signing.sign(signing_input).to_vec())
            }
        }
    }

    fn verify(
        &self,
        signing_input: &[u8],
        signature: &[u8],
        key: &Jwk,
        alg: JwsAlg,
    ) -> Result<(), CryptoError> {
        if !key.supports_alg(alg) {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{alg} with kty {}",
                key.kty
            )));
        }
        match alg {
            JwsAlg::EdDSA => {
                let verifying = ed25519_verifying_key(key)?;
                let raw: [u8; 64] = signature
                    .try_into()
                    .map_err(|_| CryptoError::BadSignature)?;
                let sig = ed25519_dalek::Signature::from_bytes(&raw);
                verifying
                    .verify(signing_input, &sig)
                    .map_err(|_| CryptoError::BadSignature)
            }
            JwsAlg::RS256 => {
                let public = rsa_public_key(key)?;
                let verifying = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public);
                let sig = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|_| CryptoError::BadSignature)?;
                verifying
                    .verify(signing_input, &sig)
                    .map_err(|_| CryptoError::BadSignature)
            }
        }
    }
}
