//! Metadata policy combination and application
//!
//! Policies from the statements of a chain are combined anchor→leaf, per
//! entity type and per claim; the combined policy is then applied to the
//! leaf's advertised metadata. A chain whose policies cannot be combined
//! or applied is dropped, never partially trusted.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::chain::TrustChain;
use crate::message::entity_statement::EntityStatement;
use crate::message::policy::{ClaimPolicy, MetadataPolicy};
use crate::message::{ClaimMap, Metadata};

/// Errors from combining or applying metadata policies
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("conflicting '{verb}' directives for claim '{claim}'")]
    Conflict { claim: String, verb: String },

    #[error("empty 'one_of' intersection for claim '{0}'")]
    EmptyOneOf(String),

    #[error("essential claim '{0}' is missing")]
    EssentialMissing(String),

    #[error("claim '{claim}' violates '{verb}'")]
    Violation { claim: String, verb: String },

    #[error("inconsistent '{a}' and '{b}' for claim '{claim}'")]
    Inconsistent { claim: String, a: String, b: String },
}

fn conflict(claim: &str, verb: &str) -> PolicyError {
    PolicyError::Conflict {
        claim: claim.to_string(),
        verb: verb.to_string(),
    }
}

fn violation(claim: &str, verb: &str) -> PolicyError {
    PolicyError::Violation {
        claim: claim.to_string(),
        verb: verb.to_string(),
    }
}

fn union(a: &[Value], b: &[Value]) -> Vec<Value> {
    let mut out = a.to_vec();
    for v in b {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

fn intersection(a: &[Value], b: &[Value]) -> Vec<Value> {
    a.iter().filter(|v| b.contains(v)).cloned().collect()
}

fn contains_all(haystack: &[Value], needles: &[Value]) -> bool {
    needles.iter().all(|n| haystack.contains(n))
}

// Merge one set-valued verb of two policies.
fn merge_sets(
    claim: &str,
    a: &Option<Vec<Value>>,
    b: &Option<Vec<Value>>,
    verb: &str,
    by_intersection: bool,
) -> Result<Option<Vec<Value>>, PolicyError> {
    match (a, b) {
        (Some(a), Some(b)) => {
            let merged = if by_intersection {
                intersection(a, b)
            } else {
                union(a, b)
            };
            if by_intersection && merged.is_empty() && verb == "one_of" {
                return Err(PolicyError::EmptyOneOf(claim.to_string()));
            }
            Ok(Some(merged))
        }
        (Some(a), None) => Ok(Some(a.clone())),
        (None, Some(b)) => Ok(Some(b.clone())),
        (None, None) => Ok(None),
    }
}

/// Combine a superior's claim policy with a subordinate's
///
/// The rules of the federation policy language: fixed `value`s and
/// `default`s must agree, `add` and `superset_of` union, `subset_of` and
/// `one_of` intersect, `essential` can only be strengthened. After
/// merging, the verbs are checked for mutual consistency.
pub fn combine_claim_policies(
    superior: &ClaimPolicy,
    subordinate: &ClaimPolicy,
    claim: &str,
) -> Result<ClaimPolicy, PolicyError> {
    let mut out = ClaimPolicy::default();

    out.value = match (&superior.value, &subordinate.value) {
        (Some(a), Some(b)) if a != b => return Err(conflict(claim, "value")),
        (Some(a), _) => Some(a.clone()),
        (None, b) => b.clone(),
    };

    out.default = match (&superior.default, &subordinate.default) {
        (Some(a), Some(b)) if a != b => return Err(conflict(claim, "default")),
        (Some(a), _) => Some(a.clone()),
        (None, b) => b.clone(),
    };

    out.add = merge_sets(claim, &superior.add, &subordinate.add, "add", false)?;
    out.subset_of = merge_sets(
        claim,
        &superior.subset_of,
        &subordinate.subset_of,
        "subset_of",
        true,
    )?;
    out.superset_of = merge_sets(
        claim,
        &superior.superset_of,
        &subordinate.superset_of,
        "superset_of",
        false,
    )?;
    out.one_of = merge_sets(claim, &superior.one_of, &subordinate.one_of, "one_of", true)?;

    out.essential = match (superior.essential, subordinate.essential) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(false) || b.unwrap_or(false)),
    };

    // `value` wins over `default`
    if out.value.is_some() {
        out.default = None;
    }

    check_consistency(&out, claim)?;
    Ok(out)
}

// Cross-verb consistency of a combined policy.
fn check_consistency(policy: &ClaimPolicy, claim: &str) -> Result<(), PolicyError> {
    if let (Some(value), Some(subset)) = (&policy.value, &policy.subset_of) {
        let ok = match value {
            Value::Array(items) => contains_all(subset, items),
            scalar => subset.contains(scalar),
        };
        if !ok {
            return Err(PolicyError::Inconsistent {
                claim: claim.to_string(),
                a: "value".to_string(),
                b: "subset_of".to_string(),
            });
        }
    }
    if let (Some(value), Some(one_of)) = (&policy.value, &policy.one_of) {
        if !one_of.contains(value) {
            return Err(PolicyError::Inconsistent {
                claim: claim.to_string(),
                a: "value".to_string(),
                b: "one_of".to_string(),
            });
        }
    }
    if let (Some(superset), Some(subset)) = (&policy.superset_of, &policy.subset_of) {
        if !contains_all(subset, superset) {
            return Err(PolicyError::Inconsistent {
                claim: claim.to_string(),
                a: "superset_of".to_string(),
                b: "subset_of".to_string(),
            });
        }
    }
    Ok(())
}

/// Combine the `metadata_policy` claims of a chain, anchor→leaf
///
/// Only non-leaf statements carry policy; the leaf configuration is
/// skipped. Extension verbs are dropped here; statement verification has
/// already rejected any that were critical and unknown.
pub fn combined_policy_for_chain(chain: &[EntityStatement]) -> Result<MetadataPolicy, PolicyError> {
    let mut combined = MetadataPolicy::default();
    let Some((_leaf, superiors)) = chain.split_last() else {
        return Ok(combined);
    };
    for statement in superiors {
        let Some(policy) = &statement.metadata_policy else {
            continue;
        };
        for (entity_type, claims) in &policy.0 {
            let slot = combined.0.entry(entity_type.clone()).or_default();
            for (claim, subordinate) in claims {
                let superior = slot.remove(claim).unwrap_or_default();
                let merged = combine_claim_policies(&superior, subordinate, claim)?;
                slot.insert(claim.clone(), merged);
            }
        }
    }
    Ok(combined)
}

/// Apply a combined per-claim policy map to one metadata block
pub fn apply_claim_policies(
    metadata: &ClaimMap,
    policies: &BTreeMap<String, ClaimPolicy>,
) -> Result<ClaimMap, PolicyError> {
    let mut out = metadata.clone();

    for (claim, policy) in policies {
        let mut current = out.get(claim).cloned();

        if let Some(value) = &policy.value {
            current = Some(value.clone());
        }

        if let Some(add) = &policy.add {
            current = Some(match current {
                None => Value::Array(add.clone()),
                Some(Value::Array(items)) => Value::Array(union(&items, add)),
                Some(_) => return Err(violation(claim, "add")),
            });
        }

        if current.is_none() {
            if let Some(default) = &policy.default {
                current = Some(default.clone());
            }
        }

        if let Some(subset) = &policy.subset_of {
            if let Some(value) = current.take() {
                current = match value {
                    Value::Array(items) => {
                        let filtered = intersection(&items, subset);
                        if filtered.is_empty() {
                            return Err(violation(claim, "subset_of"));
                        }
                        Some(Value::Array(filtered))
                    }
                    scalar if subset.contains(&scalar) => Some(scalar),
                    _ => return Err(violation(claim, "subset_of")),
                };
            }
        }

        if let Some(one_of) = &policy.one_of {
            if let Some(value) = &current {
                if !one_of.contains(value) {
                    return Err(violation(claim, "one_of"));
                }
            }
        }

        if let Some(superset) = &policy.superset_of {
            if let Some(value) = &current {
                match value {
                    Value::Array(items) if contains_all(items, superset) => {}
                    _ => return Err(violation(claim, "superset_of")),
                }
            }
        }

        if policy.essential == Some(true) && current.is_none() {
            return Err(PolicyError::EssentialMissing(claim.clone()));
        }

        match current {
            Some(value) => {
                out.insert(claim.clone(), value);
            }
            None => {
                out.remove(claim);
            }
        }
    }

    Ok(out)
}

// The effective metadata of a chain: combined policy applied to the
// leaf's advertised metadata, per entity type.
fn effective_metadata(chain: &TrustChain) -> Result<Metadata, PolicyError> {
    let combined = combined_policy_for_chain(&chain.verified_chain)?;
    let leaf_metadata = chain
        .leaf()
        .and_then(|leaf| leaf.metadata.clone())
        .unwrap_or_default();

    let mut out = Metadata::default();
    for (entity_type, claims) in &leaf_metadata.0 {
        let applied = match combined.get(entity_type) {
            Some(policies) => apply_claim_policies(claims, policies)?,
            None => claims.clone(),
        };
        out.0.insert(entity_type.clone(), applied);
    }
    Ok(out)
}

/// Apply metadata policies to verified chains
///
/// Each surviving chain carries its effective metadata; chains whose
/// policies conflict or whose leaf metadata violates them are dropped.
pub fn apply_policies(chains: Vec<TrustChain>) -> Vec<TrustChain> {
    chains
        .into_iter()
        .filter_map(|mut chain| match effective_metadata(&chain) {
            Ok(metadata) => {
                chain.metadata = Some(metadata);
                Some(chain)
            }
            Err(err) => {
                warn!(anchor = %chain.anchor, error = %err, "dropping chain: metadata policy failed");
                None
            }
        })
        .collect()
}
