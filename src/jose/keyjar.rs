//! Federation key jar
//!
//! Keys are held per issuer. Imports are append-only: a key is added only
//! if no key with the same `kty`/`use`/`kid` is already present for that
//! issuer, so pinned trust-anchor keys are never replaced and repeated
//! chain verifications do not grow the jar.

use std::collections::HashMap;

use tracing::debug;

use crate::jose::jwk::{Jwk, JwkSet};
use crate::jose::jws::{JwsAlg, JwsHeader};

/// Per-issuer key store
#[derive(Debug, Clone, Default)]
pub struct KeyJar {
    keys: HashMap<String, Vec<Jwk>>,
}

fn key_identity(key: &Jwk) -> (String, Option<String>, Option<String>) {
    (key.kty.clone(), key.use_.clone(), key.kid.clone())
}

impl KeyJar {
    /// An empty key jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single key for an issuer, deduplicating by `kty`/`use`/`kid`
    pub fn add_key(&mut self, issuer: &str, key: Jwk) -> bool {
        let entry = self.keys.entry(issuer.to_string()).or_default();
        let identity = key_identity(&key);
        if entry.iter().any(|k| key_identity(k) == identity) {
            return false;
        }
        entry.push(key);
        true
    }

    /// Import a JWK set for an issuer; returns how many keys were new
    pub fn import_jwks(&mut self, issuer: &str, jwks: &JwkSet) -> usize {
        let mut added = 0;
        for key in &jwks.keys {
            if self.add_key(issuer, key.clone()) {
                added += 1;
            }
        }
        if added > 0 {
            debug!(issuer, added, "new keys added to the federation key jar");
        }
        added
    }

    /// All keys held for an issuer
    pub fn get(&self, issuer: &str) -> &[Jwk] {
        self.keys.get(issuer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any keys are held for an issuer
    pub fn contains_issuer(&self, issuer: &str) -> bool {
        self.keys.get(issuer).is_some_and(|k| !k.is_empty())
    }

    /// Candidate verification keys for a JWS header of the given issuer
    ///
    /// Matches the header `alg` against the key family, an explicit header
    /// `kid` against the key `kid`, and restricts to signature keys.
    pub fn verify_keys(&self, issuer: &str, header: &JwsHeader) -> Vec<Jwk> {
        self.get(issuer)
            .iter()
            .filter(|k| k.supports_alg(header.alg))
            .filter(|k| matches!(k.use_.as_deref(), None | Some("sig")))
            .filter(|k| match (&header.kid, &k.kid) {
                (Some(want), Some(have)) => want == have,
                _ => true,
            })
            .cloned()
            .collect()
    }

    /// A private key of the issuer able to sign with the given algorithm
    pub fn signing_key(&self, issuer: &str, alg: JwsAlg) -> Option<&Jwk> {
        self.get(issuer)
            .iter()
            .find(|k| k.is_private() && k.supports_alg(alg))
    }

    /// Public JWK set advertised for an issuer
    pub fn export_jwks(&self, issuer: &str) -> JwkSet {
        JwkSet {
            keys: self.get(issuer).iter().map(Jwk::to_public).collect(),
        }
    }

    /// Issuers with at least one key
    pub fn issuers(&self) -> impl Iterator<Item = &String> {
        self.keys.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_deduplicates_by_identity() {
        let mut jar = KeyJar::new();
        let key = Jwk::generate_ed25519().unwrap();
        let set = JwkSet::single(key.to_public());

        assert_eq!(jar.import_jwks("https://im.example.org", &set), 1);
        assert_eq!(jar.import_jwks("https://im.example.org", &set), 0);
        assert_eq!(jar.get("https://im.example.org").len(), 1);
    }

    #[test]
    fn pinned_keys_are_not_replaced() {
        let mut jar = KeyJar::new();
        let pinned = Jwk::generate_ed25519().unwrap().to_public();
        let kid = pinned.kid.clone();
        jar.add_key("https://ta.example.org", pinned.clone());

        // Same identity with different material must not displace the pin
        let mut impostor = Jwk::generate_ed25519().unwrap().to_public();
        impostor.kid = kid;
        assert!(!jar.add_key("https://ta.example.org", impostor));
        assert_eq!(jar.get("https://ta.example.org"), &[pinned]);
    }

    #[test]
    fn verify_keys_match_header_kid() {
        let mut jar = KeyJar::new();
        let a = Jwk::generate_ed25519().unwrap().to_public();
        let b = Jwk::generate_ed25519().unwrap().to_public();
        jar.add_key("iss", a.clone());
        jar.add_key("iss", b);

        let header = JwsHeader::new(JwsAlg::EdDSA, a.kid.clone(), "entity-statement+jwt");
        let selected = jar.verify_keys("iss", &header);
        assert_eq!(selected, vec![a]);
    }

    #[test]
    fn signing_key_requires_private_material() {
        let mut jar = KeyJar::new();
        let key = Jwk::generate_ed25519().unwrap();
        jar.add_key("iss", key.to_public());
        assert!(jar.signing_key("iss", JwsAlg::EdDSA).is_none());
        jar.add_key("other", key);
        assert!(jar.signing_key("other", JwsAlg::EdDSA).is_some());
        assert!(jar.signing_key("other", JwsAlg::RS256).is_none());
    }
}
