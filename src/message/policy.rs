//! Metadata policy types
//!
//! A `metadata_policy` claim maps entity types to per-claim policies built
//! from the seven verbs. Extension verbs are retained; whether an unknown
//! verb is acceptable depends on `policy_language_crit` and the configured
//! known extensions. The combination and application rules live in
//! [`crate::chain::policy`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FederationError, Result};
use crate::message::ClaimMap;

/// The policy verbs applicable to a single metadata claim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimPolicy {
    /// Allowed values; the claim is filtered to this set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subset_of: Option<Vec<Value>>,

    /// The claim value must be one of these
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,

    /// Values that must all be present in the claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superset_of: Option<Vec<Value>>,

    /// Values appended to the claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<Value>>,

    /// Fixed value overriding whatever the leaf advertises
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Value used when the leaf does not set the claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Whether the claim must be present after application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,

    /// Extension verbs
    #[serde(flatten)]
    pub extra: ClaimMap,
}

impl ClaimPolicy {
    /// Whether no verb is set
    pub fn is_empty(&self) -> bool {
        *self == ClaimPolicy::default()
    }

    /// Reject extension verbs that are marked critical but not known
    pub fn verify(
        &self,
        policy_language_crit: Option<&[String]>,
        known_policy_extensions: &[String],
    ) -> Result<()> {
        if self.extra.is_empty() {
            return Ok(());
        }
        let Some(critical) = policy_language_crit else {
            return Ok(());
        };
        if critical.is_empty() {
            return Err(FederationError::InvalidStatement(
                "empty list not allowed for 'policy_language_crit'".to_string(),
            ));
        }
        for verb in self.extra.keys() {
            if critical.iter().any(|c| c == verb)
                && !known_policy_extensions.iter().any(|k| k == verb)
            {
                return Err(FederationError::UnknownCriticalExtension(verb.clone()));
            }
        }
        Ok(())
    }
}

/// The `metadata_policy` claim: entity type name → claim → policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataPolicy(pub BTreeMap<String, BTreeMap<String, ClaimPolicy>>);

impl MetadataPolicy {
    /// Whether the policy has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The per-claim policies for an entity type, if any
    pub fn get(&self, entity_type: &str) -> Option<&BTreeMap<String, ClaimPolicy>> {
        self.0.get(entity_type)
    }

    /// Verify every contained claim policy
    pub fn verify(
        &self,
        policy_language_crit: Option<&[String]>,
        known_policy_extensions: &[String],
    ) -> Result<()> {
        for policies in self.0.values() {
            for policy in policies.values() {
                policy.verify(policy_language_crit, known_policy_extensions)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy(value: Value) -> ClaimPolicy {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn unknown_critical_verb_is_rejected() {
        let p = policy(json!({"subset_of": ["a"], "regexp": "^x"}));
        let crit = vec!["regexp".to_string()];

        // Not critical: fine
        assert!(p.verify(None, &[]).is_ok());
        // Critical and unknown: rejected
        assert!(matches!(
            p.verify(Some(&crit), &[]),
            Err(FederationError::UnknownCriticalExtension(v)) if v == "regexp"
        ));
        // Critical but configured as known: fine
        assert!(p.verify(Some(&crit), &crit).is_ok());
    }

    #[test]
    fn metadata_policy_parses_nested_shape() {
        let mp: MetadataPolicy = serde_json::from_value(json!({
            "openid_relying_party": {
                "grant_types": {"subset_of": ["authorization_code"], "essential": true}
            }
        }))
        .unwrap();
        let claim = &mp.get("openid_relying_party").unwrap()["grant_types"];
        assert_eq!(claim.subset_of, Some(vec![json!("authorization_code")]));
        assert_eq!(claim.essential, Some(true));
    }
}
