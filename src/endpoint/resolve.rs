//! The resolve endpoint
//!
//! Collects and verifies chains for the requested subject, applies the
//! metadata policies, picks the chain ending at the requested anchor,
//! verifies the leaf's trust marks against that anchor, and packages the
//! result as a signed `resolve-response+jwt`. A subject that cannot be
//! resolved under the requested anchor yields an empty result, not an
//! error.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::chain::policy::apply_policies;
use crate::entity::FederationEntity;
use crate::error::{FederationError, Result};
use crate::message::api::ResolveRequest;
use crate::message::trust_mark::TrustMarkEntry;
use crate::trust_mark::verifier::TrustMarkVerifyOptions;

/// Produces signed resolve responses
pub struct ResolveEndpoint {
    entity: Arc<FederationEntity>,
    with_trust_anchor_configuration: bool,
}

impl ResolveEndpoint {
    /// An endpoint answering with chains verified by `entity`
    pub fn new(entity: Arc<FederationEntity>) -> Self {
        Self {
            entity,
            with_trust_anchor_configuration: false,
        }
    }

    /// Also include the anchor's entity configuration in `trust_chain`
    pub fn with_trust_anchor_configuration(mut self) -> Self {
        self.with_trust_anchor_configuration = true;
        self
    }

    /// Resolve a subject under a trust anchor
    ///
    /// Returns the signed response, or `None` when no verified chain ends
    /// at the requested anchor (or the requested metadata type is absent).
    pub async fn process_request(&self, request: &ResolveRequest) -> Result<Option<String>> {
        for (name, value) in [("sub", &request.sub), ("trust_anchor", &request.trust_anchor)] {
            if value.is_empty() {
                return Err(FederationError::MissingRequiredAttribute(name.to_string()));
            }
        }

        let entity = &self.entity;
        let (collected, leaf_configuration) = match entity
            .collector()
            .collect_trust_chains(&request.sub, Some(&request.trust_anchor))
            .await
        {
            Ok(result) => result,
            Err(err) => {
                warn!(sub = %request.sub, error = %err, "resolve: could not collect chains");
                return Ok(None);
            }
        };
        let verified = entity.verify_trust_chains(&collected, &leaf_configuration);
        let chains = apply_policies(verified);

        let Some(chosen) = chains
            .iter()
            .find(|chain| chain.anchor == request.trust_anchor)
        else {
            debug!(
                sub = %request.sub,
                trust_anchor = %request.trust_anchor,
                "resolve: no chain to the requested anchor"
            );
            return Ok(None);
        };

        let full_metadata = chosen.metadata.clone().unwrap_or_default();
        let metadata = match &request.entity_type {
            Some(entity_type) => match full_metadata.restrict_to(entity_type) {
                Some(metadata) => metadata,
                None => {
                    debug!(entity_type, "resolve: requested type not in effective metadata");
                    return Ok(None);
                }
            },
            None => full_metadata,
        };

        // Only marks that verify against the chosen anchor are echoed
        let mut verified_marks: Vec<TrustMarkEntry> = Vec::new();
        let leaf_marks = chosen
            .leaf()
            .and_then(|leaf| leaf.trust_marks.clone())
            .unwrap_or_default();
        for entry in leaf_marks {
            let outcome = entity
                .verify_trust_mark(
                    &entry.trust_mark,
                    &request.trust_anchor,
                    &TrustMarkVerifyOptions::default(),
                )
                .await;
            match outcome {
                Ok(Some(mark)) => verified_marks.push(TrustMarkEntry {
                    trust_mark_id: mark.trust_mark_id,
                    trust_mark: entry.trust_mark,
                }),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "resolve: skipping unverifiable trust mark")
                }
            }
        }

        let trust_chain = entity
            .collector()
            .get_chain(
                &chosen.iss_path,
                &request.trust_anchor,
                self.with_trust_anchor_configuration,
            )
            .await?;

        let keyjar = entity.keyjar().read().expect("keyjar poisoned");
        let token = entity.signer().resolve_response(
            &keyjar,
            entity.entity_id(),
            &request.sub,
            metadata,
            trust_chain,
            verified_marks,
        )?;
        Ok(Some(token))
    }
}
