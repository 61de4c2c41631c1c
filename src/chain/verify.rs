//! Trust-chain verification
//!
//! A candidate chain is walked from the trust anchor down to the leaf.
//! The anchor statement must be issued by a recognized anchor and verifies
//! against the pinned anchor JWKS only; every verified non-leaf statement
//! contributes its subject's keys to the key jar, which then verifies the
//! next statement. Constraints and critical-extension handling are
//! enforced on the way; metadata policy is not applied here.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::chain::constraints::meets_restrictions;
use crate::chain::TrustChain;
use crate::error::{FederationError, Result};
use crate::jose::jwk::JwkSet;
use crate::jose::jws;
use crate::jose::keyjar::KeyJar;
use crate::message::entity_statement::{EntityStatement, VerifyOptions};
use crate::ports::clock::Clock;
use crate::ports::crypto::JwsCrypto;

/// Verifies candidate chains into [`TrustChain`] values
pub struct TrustChainVerifier<'a> {
    crypto: &'a dyn JwsCrypto,
    clock: &'a dyn Clock,
    trust_anchors: &'a HashMap<String, JwkSet>,
    opts: VerifyOptions,
}

impl<'a> TrustChainVerifier<'a> {
    /// A verifier for the given anchors
    pub fn new(
        crypto: &'a dyn JwsCrypto,
        clock: &'a dyn Clock,
        trust_anchors: &'a HashMap<String, JwkSet>,
    ) -> Self {
        Self {
            crypto,
            clock,
            trust_anchors,
            opts: VerifyOptions::default(),
        }
    }

    /// Use non-default structural verification options
    pub fn with_options(mut self, opts: VerifyOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Verify collected chains against the recognized anchors
    ///
    /// `chains` are subordinate-statement tokens leaf-first (the
    /// collector's output); `leaf_configuration` is the leaf's self-signed
    /// entity configuration. Every suffix of a candidate that starts at a
    /// recognized anchor is verified on its own, so a candidate that
    /// passes several anchors can yield several chains. Chains that fail
    /// verification are dropped; the result preserves input order.
    pub fn verify_trust_chains(
        &self,
        keyjar: &mut KeyJar,
        chains: &[Vec<String>],
        leaf_configuration: &str,
    ) -> Vec<TrustChain> {
        let mut verified = Vec::new();
        for chain in chains {
            // Anchor-first walk order: reverse the collected tokens and
            // terminate with the leaf configuration
            let mut tokens: Vec<String> = chain.iter().rev().cloned().collect();
            tokens.push(leaf_configuration.to_string());

            for start in self.anchor_positions(&tokens) {
                match self.verify_chain(keyjar, &tokens[start..]) {
                    Ok(Some(trust_chain)) => verified.push(trust_chain),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "dropping trust chain"),
                }
            }
        }
        if verified.is_empty() {
            debug!("found no verified trust chains");
        }
        verified
    }

    // Indices whose statement is issued by a recognized anchor, walking up
    // from the leaf side.
    fn anchor_positions(&self, tokens: &[String]) -> Vec<usize> {
        let mut positions = Vec::new();
        for (position, token) in tokens.iter().enumerate().rev() {
            let Ok(statement) = jws::peek_claims::<EntityStatement>(token) else {
                continue;
            };
            if self.trust_anchors.contains_key(&statement.iss) {
                positions.push(position);
            }
        }
        positions
    }

    // Walk one chain, anchor statement first, leaf configuration last.
    fn verify_chain(&self, keyjar: &mut KeyJar, tokens: &[String]) -> Result<Option<TrustChain>> {
        let Some(first) = tokens.first() else {
            return Ok(None);
        };
        let head: EntityStatement = jws::peek_claims(first)?;
        let Some(anchor_jwks) = self.trust_anchors.get(&head.iss) else {
            debug!(iss = %head.iss, "chain does not start at a recognized trust anchor");
            return Ok(None);
        };
        // The anchor verifies against pinned keys, never its own claim
        keyjar.import_jwks(&head.iss, anchor_jwks);

        let now = self.clock.now();
        let last = tokens.len() - 1;
        let mut statements: Vec<EntityStatement> = Vec::with_capacity(tokens.len());

        for (position, token) in tokens.iter().enumerate() {
            let header = jws::decode_header(token)?;
            let issuer = jws::peek_claims::<EntityStatement>(token)?.iss;
            let keys = keyjar.verify_keys(&issuer, &header);
            if keys.is_empty() {
                return Err(FederationError::MissingKey(issuer));
            }
            let statement: EntityStatement = jws::verify_claims(self.crypto, token, &keys)?;
            statement.verify(now, &self.opts)?;

            match &statement.jwks {
                Some(jwks) => {
                    // Thread the subject's keys for the next statement;
                    // only keys not already present are added
                    keyjar.import_jwks(&statement.sub, jwks);
                }
                None if position != last => {
                    return Err(FederationError::MissingRequiredAttribute(
                        "jwks on non-leaf statement".to_string(),
                    ));
                }
                None => {}
            }
            statements.push(statement);
        }

        if !meets_restrictions(&statements) {
            debug!("chain constraints not met");
            return Ok(None);
        }

        let exp = statements.iter().map(|s| s.exp).min().unwrap_or(0);
        let mut iss_path: Vec<String> = statements.iter().map(|s| s.iss.clone()).collect();
        let anchor = iss_path[0].clone();
        iss_path.reverse();

        Ok(Some(TrustChain {
            anchor,
            iss_path,
            exp,
            verified_chain: statements,
            chain: tokens.to_vec(),
            metadata: None,
        }))
    }
}
