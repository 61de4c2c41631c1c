//! Reading trust marks out of the key-value store
//!
//! Store values are JSON objects holding at least a `trust_mark` compact
//! JWS. Candidates are filtered (inner/outer type consistency, expected
//! subject, freshness) and deduplicated per group, preferring the newest
//! `iat` and, on ties, the mark that expires latest; an unexpiring mark
//! beats any expiring one.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::jose::jws;
use crate::message::trust_mark::TrustMarkEntry;
use crate::ports::clock::Clock;
use crate::ports::store::KeyValueStore;

const DEFAULT_LEEWAY: i64 = 60;

struct Candidate {
    entry: TrustMarkEntry,
    iat: i64,
    exp: Option<i64>,
}

// Unexpiring marks rank above any expiration time.
fn exp_rank(exp: Option<i64>) -> (u8, i64) {
    match exp {
        None => (1, 0),
        Some(value) => (0, value),
    }
}

/// Supplies the trust marks an entity should advertise
pub struct TrustMarksSource {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    sub: Option<String>,
    by_issuer: bool,
    leeway: i64,
}

impl TrustMarksSource {
    /// A source reading from the given store
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            sub: None,
            by_issuer: true,
            leeway: DEFAULT_LEEWAY,
        }
    }

    /// Only accept marks about this subject
    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Group per mark type only instead of per `(type, issuer)`
    pub fn with_by_issuer(mut self, by_issuer: bool) -> Self {
        self.by_issuer = by_issuer;
        self
    }

    /// Accept `iat` values up to this many seconds in the future
    pub fn with_leeway(mut self, leeway: i64) -> Self {
        self.leeway = leeway;
        self
    }

    /// Select the marks to advertise, optionally for a given entity
    ///
    /// The configured subject takes precedence over `entity_id`. The
    /// result is deterministic: sorted by group key, one mark per group.
    pub async fn trust_marks(&self, entity_id: Option<&str>) -> Result<Vec<TrustMarkEntry>> {
        let now = self.clock.now();
        let expected_sub = self.sub.as_deref().or(entity_id);

        let mut best: BTreeMap<(String, String), Candidate> = BTreeMap::new();
        let mut skipped: BTreeMap<&'static str, u32> = BTreeMap::new();
        let mut skip = |reason: &'static str, key: &str| {
            *skipped.entry(reason).or_default() += 1;
            debug!(reason, key, "skipping trust mark");
        };

        for key in self.store.keys().await? {
            let Some(value) = self.store.get(&key).await? else {
                continue;
            };
            let Some(token) = value.get("trust_mark").and_then(Value::as_str) else {
                skip("missing_trust_mark", &key);
                continue;
            };
            let Ok(payload) = jws::peek_payload(token) else {
                skip("malformed", &key);
                continue;
            };

            let mark_type = claim_str(&payload, "trust_mark_id")
                .or_else(|| claim_str(&payload, "trust_mark_type"));
            let iss = claim_str(&payload, "iss");
            let sub = claim_str(&payload, "sub");
            let iat = payload.get("iat");
            let (Some(mark_type), Some(iss), Some(sub), Some(iat)) = (mark_type, iss, sub, iat)
            else {
                skip("missing_required_claims", &key);
                continue;
            };

            let outer_type = value
                .get("trust_mark_id")
                .or_else(|| value.get("trust_mark_type"))
                .and_then(Value::as_str);
            if outer_type.is_some_and(|outer| outer != mark_type) {
                skip("type_mismatch", &key);
                continue;
            }

            if expected_sub.is_some_and(|expected| expected != sub) {
                skip("sub_mismatch", &key);
                continue;
            }

            let Some(iat) = iat.as_i64() else {
                skip("iat_not_int", &key);
                continue;
            };
            if iat > now + self.leeway {
                skip("iat_in_future", &key);
                continue;
            }

            let exp = match payload.get("exp") {
                None | Some(Value::Null) => None,
                Some(value) => match value.as_i64() {
                    Some(exp) => Some(exp),
                    None => {
                        skip("exp_not_int", &key);
                        continue;
                    }
                },
            };
            if exp.is_some_and(|exp| exp <= now) {
                skip("expired", &key);
                continue;
            }

            let group = if self.by_issuer {
                (mark_type.to_string(), iss.to_string())
            } else {
                (mark_type.to_string(), String::new())
            };
            let candidate = Candidate {
                entry: TrustMarkEntry {
                    trust_mark_id: mark_type.to_string(),
                    trust_mark: token.to_string(),
                },
                iat,
                exp,
            };
            match best.get(&group) {
                Some(current)
                    if (candidate.iat, exp_rank(candidate.exp))
                        <= (current.iat, exp_rank(current.exp)) =>
                {
                    skip("older_duplicate", &key);
                }
                _ => {
                    best.insert(group, candidate);
                }
            }
        }

        if !skipped.is_empty() {
            debug!(?skipped, "trust mark selection summary");
        }

        Ok(best.into_values().map(|c| c.entry).collect())
    }
}

fn claim_str<'a>(payload: &'a Value, name: &str) -> Option<&'a str> {
    payload.get(name).and_then(Value::as_str)
}
