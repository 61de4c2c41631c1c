//! Trust-mark verification
//!
//! The verification steps, in order and aborting on the first failure:
//!
//! 1. Structural validation of the mark, including expiry.
//! 2. The anchor must know the mark type, and the mark's issuer must be
//!    recognized for it; an empty recognized-issuer list permits any
//!    issuer.
//! 3. With a delegation present: the anchor must list an owner for the
//!    type, the delegation must come from that owner and name the mark's
//!    issuer, and its signature must verify against the owner's JWKS.
//! 4. A verified trust chain must link the issuer to the anchor.
//! 5. The mark's signature must verify with the issuer's chain-fed keys.
//! 6. Optionally the issuer's status endpoint must report the mark active.
//!
//! Non-fatal failures yield `None`; only malformed delegation structure is
//! an error.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::entity::FederationEntity;
use crate::error::{FederationError, Result};
use crate::jose::jws;
use crate::message::api::TrustMarkStatusResponse;
use crate::message::trust_mark::TrustMark;

/// Options for trust-mark verification
#[derive(Debug, Clone, Default)]
pub struct TrustMarkVerifyOptions {
    /// Ask the issuer's status endpoint and require `active == true`
    pub check_status: bool,

    /// Require the mark's subject to equal this entity
    pub entity_id: Option<String>,
}

/// Verify a trust mark against a trust anchor
///
/// Returns the verified mark claims, or `None` when any non-fatal check
/// fails.
pub async fn verify_trust_mark(
    entity: &FederationEntity,
    trust_mark: &str,
    trust_anchor: &str,
    opts: &TrustMarkVerifyOptions,
) -> Result<Option<TrustMark>> {
    let now = entity.clock().now();

    let Ok(mark) = jws::peek_claims::<TrustMark>(trust_mark) else {
        warn!("trust mark is not a decodable compact JWS");
        return Ok(None);
    };
    let delegation = match mark.verify(now, opts.entity_id.as_deref()) {
        Ok(delegation) => delegation,
        // A structurally inconsistent delegation is a caller error
        Err(err @ FederationError::Delegation(_)) => return Err(err),
        Err(err) => {
            warn!(error = %err, "trust mark failed structural validation");
            return Ok(None);
        }
    };

    // The anchor's configuration names the recognized issuers and owners
    let anchor_configuration = entity
        .collector()
        .get_entity_configuration(trust_anchor)
        .await?;
    let anchor_statement = &anchor_configuration.statement;

    let Some(recognized) = &anchor_statement.trust_mark_issuers else {
        warn!(trust_anchor, "anchor recognizes no trust mark issuers");
        return Ok(None);
    };
    let Some(allowed_issuers) = recognized.get(&mark.trust_mark_id) else {
        warn!(
            trust_mark_id = %mark.trust_mark_id,
            "mark type unknown to the trust anchor"
        );
        return Ok(None);
    };
    if !allowed_issuers.is_empty() && !allowed_issuers.contains(&mark.iss) {
        warn!(
            iss = %mark.iss,
            trust_mark_id = %mark.trust_mark_id,
            "trust mark issuer not recognized by the trust anchor"
        );
        return Ok(None);
    }

    if let Some(delegation) = &delegation {
        let Some(owner) = anchor_statement
            .trust_mark_owners
            .as_ref()
            .and_then(|owners| owners.get(&mark.trust_mark_id))
        else {
            warn!(
                trust_mark_id = %mark.trust_mark_id,
                "delegated mark type has no owner at the trust anchor"
            );
            return Ok(None);
        };
        if owner.sub != delegation.iss {
            warn!(
                delegator = %delegation.iss,
                owner = %owner.sub,
                "delegation not issued by the recognized owner"
            );
            return Ok(None);
        }
        let delegation_jws = mark.delegation.as_deref().unwrap_or_default();
        if jws::verify_compact(entity.crypto().as_ref(), delegation_jws, &owner.jwks.keys).is_err()
        {
            warn!("delegation signature did not verify against the owner's keys");
            return Ok(None);
        }
    }

    // A chain must bind the issuer to the requested anchor
    let chains = entity.get_trust_chains(&mark.iss).await?;
    if chains.is_empty() {
        warn!(iss = %mark.iss, "no verifiable trust chain for the trust mark issuer");
        return Ok(None);
    }
    let Some(issuer_chain) = chains.iter().find(|c| c.anchor == trust_anchor) else {
        warn!(trust_anchor, "no trust chain to the requested anchor");
        return Ok(None);
    };

    // Chain verification has threaded the issuer's keys into the jar;
    // fall back to the chain's leaf JWKS if it somehow has not
    let header = jws::decode_header(trust_mark)?;
    let mut keys = entity
        .keyjar()
        .read()
        .expect("keyjar poisoned")
        .verify_keys(&mark.iss, &header);
    if keys.is_empty() {
        if let Some(leaf_jwks) = issuer_chain.leaf().and_then(|leaf| leaf.jwks.clone()) {
            let mut keyjar = entity.keyjar().write().expect("keyjar poisoned");
            keyjar.import_jwks(&mark.iss, &leaf_jwks);
            keys = keyjar.verify_keys(&mark.iss, &header);
        }
    }
    let verified: TrustMark = match jws::verify_claims(entity.crypto().as_ref(), trust_mark, &keys)
    {
        Ok(mark) => mark,
        Err(err) => {
            warn!(error = %err, "trust mark signature did not verify");
            return Ok(None);
        }
    };

    if opts.check_status && !status_is_active(entity, issuer_chain, &verified).await {
        return Ok(None);
    }

    Ok(Some(verified))
}

// Ask the issuer's trust-mark status endpoint whether the mark is active.
async fn status_is_active(
    entity: &FederationEntity,
    issuer_chain: &crate::chain::TrustChain,
    mark: &TrustMark,
) -> bool {
    let Some(endpoint) = issuer_chain
        .metadata
        .as_ref()
        .and_then(|m| m.federation_entity())
        .and_then(|fe| fe.federation_trust_mark_status_endpoint)
    else {
        warn!(iss = %mark.iss, "issuer advertises no trust mark status endpoint");
        return false;
    };

    let mut form = BTreeMap::new();
    form.insert("sub".to_string(), mark.sub.clone());
    form.insert("trust_mark_id".to_string(), mark.trust_mark_id.clone());

    let response = match entity.http().post_form(&endpoint, &form).await {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            warn!(endpoint, status = response.status, "status endpoint error");
            return false;
        }
        Err(err) => {
            warn!(endpoint, error = %err, "status endpoint unreachable");
            return false;
        }
    };
    match serde_json::from_str::<TrustMarkStatusResponse>(&response.body) {
        Ok(TrustMarkStatusResponse { active }) => active,
        Err(_) => {
            // Tolerate extra members but insist on a boolean `active`
            serde_json::from_str::<Value>(&response.body)
                .ok()
                .and_then(|v| v.get("active").and_then(Value::as_bool))
                .unwrap_or(false)
        }
    }
}
