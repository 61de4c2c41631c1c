//! Issuer-side trust-mark handling
//!
//! A [`TrustMarkEntity`] issues marks according to its per-type
//! specification and records every issued mark in the store, keyed
//! `iss=<uri>:trust_mark_type=<uri>:iat=<int>`. The records back the
//! status and list endpoints. [`TrustMarkIssuerIndex`] maintains a trust
//! anchor's `trust_mark_issuers` map in a store of the same shape.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{FederationError, Result};
use crate::jose::keyjar::KeyJar;
use crate::message::api::{TrustMarkStatusRequest, TrustMarkStatusResponse};
use crate::message::trust_mark::TrustMark;
use crate::jose::jws;
use crate::ports::clock::Clock;
use crate::ports::store::{KeyValueStore, StoreError};
use crate::statement::create::{StatementSigner, TrustMarkOptions};

/// How a trust-mark type is issued
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustMarkSpec {
    /// Mark lifetime in seconds; the signer default applies when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<i64>,

    /// Reference to the definition of the mark
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,

    /// Delegation from the mark-type owner to embed in issued marks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation: Option<String>,
}

/// Store key of an issued-mark record
pub fn store_key(iss: &str, trust_mark_id: &str, iat: i64) -> String {
    format!("iss={iss}:trust_mark_type={trust_mark_id}:iat={iat}")
}

/// Split an issued-mark store key back into its parts
pub fn parse_store_key(key: &str) -> Option<(&str, &str, i64)> {
    let rest = key.strip_prefix("iss=")?;
    let (iss, rest) = rest.split_once(":trust_mark_type=")?;
    let (trust_mark_id, iat) = rest.split_once(":iat=")?;
    Some((iss, trust_mark_id, iat.parse().ok()?))
}

#[derive(Debug, Serialize, Deserialize)]
struct IssuedMark {
    sub: String,
    trust_mark_id: String,
    iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    trust_mark: String,
}

/// Issues trust marks and answers status/list queries about them
pub struct TrustMarkEntity {
    entity_id: String,
    signer: StatementSigner,
    keyjar: Arc<RwLock<KeyJar>>,
    specification: RwLock<BTreeMap<String, TrustMarkSpec>>,
    db: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl TrustMarkEntity {
    /// An issuer for the given mark types
    pub fn new(
        entity_id: impl Into<String>,
        signer: StatementSigner,
        keyjar: Arc<RwLock<KeyJar>>,
        db: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        specification: BTreeMap<String, TrustMarkSpec>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            signer,
            keyjar,
            specification: RwLock::new(specification),
            db,
            clock,
        }
    }

    /// The mark types this entity issues
    pub fn mark_types(&self) -> Vec<String> {
        self.specification
            .read()
            .expect("specification poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Replace the specification of one mark type
    pub fn set_specification(&self, trust_mark_id: &str, spec: TrustMarkSpec) {
        self.specification
            .write()
            .expect("specification poisoned")
            .insert(trust_mark_id.to_string(), spec);
    }

    /// Issue a mark of a configured type to `sub` and record it
    pub async fn create_trust_mark(&self, trust_mark_id: &str, sub: &str) -> Result<String> {
        let spec = self
            .specification
            .read()
            .expect("specification poisoned")
            .get(trust_mark_id)
            .cloned()
            .ok_or_else(|| {
                FederationError::NotFound(format!("no specification for {trust_mark_id}"))
            })?;

        let token = {
            let keyjar = self.keyjar.read().expect("keyjar poisoned");
            self.signer.trust_mark(
                &keyjar,
                &self.entity_id,
                sub,
                trust_mark_id,
                TrustMarkOptions {
                    lifetime: spec.lifetime,
                    logo_uri: spec.logo_uri.clone(),
                    ref_: spec.ref_.clone(),
                    delegation: spec.delegation.clone(),
                },
            )?
        };

        let mark: TrustMark = jws::peek_claims(&token)?;
        let record = IssuedMark {
            sub: sub.to_string(),
            trust_mark_id: trust_mark_id.to_string(),
            iat: mark.iat,
            exp: mark.exp,
            trust_mark: token.clone(),
        };
        self.db
            .put(
                &store_key(&self.entity_id, trust_mark_id, mark.iat),
                serde_json::to_value(record)?,
            )
            .await?;
        Ok(token)
    }

    async fn records_for(&self, trust_mark_id: &str) -> Result<Vec<IssuedMark>> {
        let mut records = Vec::new();
        for key in self.db.keys().await? {
            let Some((iss, id, _)) = parse_store_key(&key) else {
                continue;
            };
            if iss != self.entity_id || id != trust_mark_id {
                continue;
            }
            if let Some(value) = self.db.get(&key).await? {
                if let Ok(record) = serde_json::from_value::<IssuedMark>(value) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// Whether a mark of this type was issued to `sub` and is still valid
    ///
    /// With `iat` given, only a record issued at exactly that time counts.
    pub async fn find(&self, trust_mark_id: &str, sub: &str, iat: Option<i64>) -> Result<bool> {
        let now = self.clock.now();
        Ok(self.records_for(trust_mark_id).await?.into_iter().any(|r| {
            r.sub == sub
                && iat.is_none_or(|wanted| wanted == r.iat)
                && r.exp.is_none_or(|exp| exp > now)
        }))
    }

    /// Subjects currently holding a mark of this type
    pub async fn list(&self, trust_mark_id: &str, sub: Option<&str>) -> Result<Vec<String>> {
        let now = self.clock.now();
        let mut subjects: Vec<String> = Vec::new();
        for record in self.records_for(trust_mark_id).await? {
            if record.exp.is_some_and(|exp| exp <= now) {
                continue;
            }
            if sub.is_some_and(|wanted| wanted != record.sub) {
                continue;
            }
            if !subjects.contains(&record.sub) {
                subjects.push(record.sub);
            }
        }
        subjects.sort();
        Ok(subjects)
    }

    /// Answer a status request about an issued mark
    pub async fn status(&self, request: &TrustMarkStatusRequest) -> Result<TrustMarkStatusResponse> {
        request.verify()?;
        let active = if let Some(token) = &request.trust_mark {
            let mark: TrustMark = jws::peek_claims(token)?;
            self.find(&mark.trust_mark_id, &mark.sub, Some(mark.iat))
                .await?
        } else {
            // verify() guarantees both members are present
            let id = request.trust_mark_id.as_deref().unwrap_or_default();
            let sub = request.sub.as_deref().unwrap_or_default();
            self.find(id, sub, request.iat).await?
        };
        Ok(TrustMarkStatusResponse { active })
    }
}

/// Maintains a `trust_mark_issuers` map in a key-value store
///
/// Keys are mark-type identifiers, values JSON lists of issuer URIs. An
/// empty list means "any issuer permitted", so a removal that would empty
/// a list deletes the key when `drop_empty` is set and is refused
/// otherwise; an empty list is never written.
pub struct TrustMarkIssuerIndex {
    store: Arc<dyn KeyValueStore>,
}

impl TrustMarkIssuerIndex {
    /// An index over the given store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The issuers recorded for a mark type
    pub async fn issuers(&self, trust_mark_id: &str) -> Result<Vec<String>> {
        let Some(value) = self.store.get(trust_mark_id).await? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_value(value).map_err(StoreError::from)?)
    }

    /// Record an issuer for a mark type
    pub async fn add_issuer(&self, trust_mark_id: &str, issuer: &str) -> Result<()> {
        let issuer = issuer.to_string();
        self.store
            .modify(
                trust_mark_id,
                Box::new(move |current| {
                    let mut list: Vec<String> = match current {
                        Some(value) => serde_json::from_value(value)?,
                        None => Vec::new(),
                    };
                    if !list.contains(&issuer) {
                        list.push(issuer);
                    }
                    Ok(Some(json!(list)))
                }),
            )
            .await?;
        Ok(())
    }

    /// Remove an issuer from a mark type
    ///
    /// When the removal empties the list: with `drop_empty` the key is
    /// deleted (and nothing is rewritten afterwards); without it the
    /// write is refused and the store is left untouched.
    pub async fn remove_issuer(
        &self,
        trust_mark_id: &str,
        issuer: &str,
        drop_empty: bool,
    ) -> Result<()> {
        let issuer = issuer.to_string();
        self.store
            .modify(
                trust_mark_id,
                Box::new(move |current| {
                    let Some(value) = current else {
                        return Ok(None);
                    };
                    let mut list: Vec<String> = serde_json::from_value(value)?;
                    list.retain(|i| i != &issuer);
                    if list.is_empty() {
                        if drop_empty {
                            Ok(None)
                        } else {
                            Err(StoreError::Refused(
                                "removal would leave an empty issuer list; \
                                 an empty list means any issuer is permitted"
                                    .to_string(),
                            ))
                        }
                    } else {
                        Ok(Some(json!(list)))
                    }
                }),
            )
            .await?;
        Ok(())
    }
}
