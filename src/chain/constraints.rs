//! Constraint enforcement along a trust chain
//!
//! Two constraint families accumulate while walking from the anchor to the
//! leaf: `max_path_length`, which bounds the number of intermediates below
//! the statement that first sets it, and naming constraints, which bound
//! the subjects that may appear anywhere below. An identifier covers
//! another when the latter is an equal or more label-specific DNS name,
//! compared from the top-level label down.

use tracing::{debug, warn};

use crate::message::entity_statement::{Constraints, EntityStatement, NamingConstraints};

fn remove_scheme(url: &str) -> Option<&str> {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
}

/// Whether `a` is equal to or more specific than `b`
///
/// Hosts are compared label-by-label from the TLD side; an empty label in
/// `b` (a leading-dot pattern) matches any remaining label of `a`.
pub fn more_specific(a: &str, b: &str) -> bool {
    let (Some(a_host), Some(b_host)) = (remove_scheme(a), remove_scheme(b)) else {
        warn!(a, b, "naming constraint on non-http(s) identifier");
        return false;
    };
    let a_labels: Vec<&str> = a_host.split('.').collect();
    let b_labels: Vec<&str> = b_host.split('.').collect();
    if a_labels.len() < b_labels.len() {
        return false;
    }
    for (x, y) in a_labels.iter().rev().zip(b_labels.iter().rev()) {
        if x != y {
            return y.is_empty();
        }
    }
    true
}

/// Whether a subject is covered by any identifier in the list
fn covered_by(subject: &str, identifiers: &[String]) -> bool {
    identifiers.iter().any(|id| more_specific(subject, id))
}

// Replace entries that a new, more specific constraint narrows; keep the
// rest.
fn update_specs(new_constraints: &[String], old_constraints: &[String]) -> Vec<String> {
    let mut updated = Vec::new();
    for old in old_constraints {
        let mut replaced = false;
        for new in new_constraints {
            if more_specific(new, old) {
                updated.push(new.clone());
                replaced = true;
            }
        }
        if !replaced {
            updated.push(old.clone());
        }
    }
    updated
}

/// Accumulated naming constraints while walking a chain
#[derive(Debug, Clone, Default)]
pub struct NamingState {
    permitted: Option<Vec<String>>,
    excluded: Option<Vec<String>>,
}

impl NamingState {
    /// Fold a statement's naming constraints into the accumulated state
    pub fn absorb(&mut self, constraints: &NamingConstraints) {
        for (new, slot) in [
            (&constraints.permitted, &mut self.permitted),
            (&constraints.excluded, &mut self.excluded),
        ] {
            let Some(new) = new else { continue };
            if new.is_empty() {
                continue;
            }
            match slot {
                None => *slot = Some(new.clone()),
                Some(current) => *current = update_specs(new, current),
            }
        }
    }

    /// Whether a subject passes the accumulated constraints
    pub fn permits(&self, subject: &str) -> bool {
        if let Some(excluded) = &self.excluded {
            if covered_by(subject, excluded) {
                return false;
            }
        }
        if let Some(permitted) = &self.permitted {
            if !covered_by(subject, permitted) {
                return false;
            }
        }
        true
    }
}

// One step of the max_path_length bookkeeping. The first statement that
// names a limit sets the ceiling; every later subordinate step consumes
// one, and a later statement may only lower what remains. Negative means
// exceeded.
fn calculate_path_length(constraints: &Constraints, current: i64, assigned: bool) -> i64 {
    match constraints.max_path_length {
        None => {
            if assigned {
                current - 1
            } else {
                current
            }
        }
        Some(stated) if stated >= 0 => {
            if !assigned {
                return stated;
            }
            let remaining = current - 1;
            if remaining < stated {
                debug!("subordinate cannot increase max_path_length");
                return -1;
            }
            stated
        }
        Some(_) => {
            debug!("negative max_path_length");
            -1
        }
    }
}

/// Whether a verified chain fulfills the constraints it carries
///
/// `chain` is ordered anchor-issued statement first, leaf configuration
/// last. Naming constraints are checked against every subject including
/// the leaf.
pub fn meets_restrictions(chain: &[EntityStatement]) -> bool {
    let Some((leaf, superiors)) = chain.split_last() else {
        return false;
    };

    let mut current_max_path: i64 = 0;
    let mut assigned = false;
    let mut naming = NamingState::default();

    for statement in superiors {
        if let Some(constraints) = &statement.constraints {
            current_max_path = calculate_path_length(constraints, current_max_path, assigned);
            assigned = true;
            if current_max_path < 0 {
                debug!(sub = %statement.sub, "max_path_length exceeded");
                return false;
            }
            if let Some(nc) = &constraints.naming_constraints {
                naming.absorb(nc);
            }
        } else if assigned {
            current_max_path -= 1;
            if current_max_path < 0 {
                debug!(sub = %statement.sub, "max_path_length exceeded");
                return false;
            }
        }

        if !naming.permits(&statement.sub) {
            debug!(sub = %statement.sub, "naming constraints violated");
            return false;
        }
    }

    if !naming.permits(&leaf.sub) {
        debug!(sub = %leaf.sub, "naming constraints violated at leaf");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(iss: &str, sub: &str, constraints: Option<Constraints>) -> EntityStatement {
        EntityStatement {
            iat: 1000,
            exp: 2000,
            constraints,
            ..EntityStatement::new(iss, sub)
        }
    }

    fn max_path(n: i64) -> Constraints {
        Constraints {
            max_path_length: Some(n),
            ..Constraints::default()
        }
    }

    fn naming(permitted: Option<&[&str]>, excluded: Option<&[&str]>) -> Constraints {
        Constraints {
            naming_constraints: Some(NamingConstraints {
                permitted: permitted.map(|p| p.iter().map(|s| s.to_string()).collect()),
                excluded: excluded.map(|e| e.iter().map(|s| s.to_string()).collect()),
            }),
            ..Constraints::default()
        }
    }

    #[test]
    fn more_specific_compares_from_the_tld() {
        assert!(more_specific(
            "https://rp.umu.se",
            "https://umu.se"
        ));
        assert!(more_specific("https://umu.se", "https://umu.se"));
        assert!(!more_specific("https://umu.se", "https://rp.umu.se"));
        assert!(!more_specific("https://rp.lu.se", "https://umu.se"));
        // Leading-dot pattern covers any single deeper label
        assert!(more_specific("https://rp.umu.se", "https://.umu.se"));
        // Non-http identifiers never match
        assert!(!more_specific("urn:example", "https://umu.se"));
    }

    #[test]
    fn update_specs_narrows_to_more_specific_entries() {
        let old = vec!["https://umu.se".to_string()];
        let new = vec!["https://rp.umu.se".to_string()];
        assert_eq!(update_specs(&new, &old), new);

        // Unrelated constraints are kept
        let unrelated = vec!["https://lu.se".to_string()];
        assert_eq!(update_specs(&unrelated, &old), old);
    }

    #[test]
    fn path_length_zero_forbids_intermediates() {
        // TA(max_path=0) -> IM -> leaf: the IM step exceeds the budget
        let chain = vec![
            statement("https://ta.example.org", "https://im.example.org", Some(max_path(0))),
            statement("https://im.example.org", "https://rp.example.org", None),
            statement("https://rp.example.org", "https://rp.example.org", None),
        ];
        assert!(!meets_restrictions(&chain));

        // With a budget of one intermediate the same chain passes
        let chain = vec![
            statement("https://ta.example.org", "https://im.example.org", Some(max_path(1))),
            statement("https://im.example.org", "https://rp.example.org", None),
            statement("https://rp.example.org", "https://rp.example.org", None),
        ];
        assert!(meets_restrictions(&chain));
    }

    #[test]
    fn subordinate_cannot_raise_the_ceiling() {
        let chain = vec![
            statement("https://ta.example.org", "https://a.example.org", Some(max_path(1))),
            statement("https://a.example.org", "https://b.example.org", Some(max_path(5))),
            statement("https://b.example.org", "https://rp.example.org", None),
            statement("https://rp.example.org", "https://rp.example.org", None),
        ];
        assert!(!meets_restrictions(&chain));
    }

    #[test]
    fn excluded_subject_fails_even_at_the_leaf() {
        let chain = vec![
            statement(
                "https://ta.example.org",
                "https://im.example.org",
                Some(naming(None, Some(&["https://rp.example.org"]))),
            ),
            statement("https://im.example.org", "https://rp.example.org", None),
            statement("https://rp.example.org", "https://rp.example.org", None),
        ];
        assert!(!meets_restrictions(&chain));
    }

    #[test]
    fn permitted_list_must_cover_all_subjects() {
        let permitted = naming(Some(&["https://example.org", "https://.example.org"]), None);
        let ok = vec![
            statement("https://ta.example.org", "https://im.example.org", Some(permitted.clone())),
            statement("https://im.example.org", "https://rp.example.org", None),
            statement("https://rp.example.org", "https://rp.example.org", None),
        ];
        assert!(meets_restrictions(&ok));

        let outsider = vec![
            statement("https://ta.example.org", "https://im.example.org", Some(permitted)),
            statement("https://im.example.org", "https://rp.example.net", None),
            statement("https://rp.example.net", "https://rp.example.net", None),
        ];
        assert!(!meets_restrictions(&outsider));
    }

    #[test]
    fn chain_without_constraints_passes() {
        let chain = vec![
            statement("https://ta.example.org", "https://rp.example.org", None),
            statement("https://rp.example.org", "https://rp.example.org", None),
        ];
        assert!(meets_restrictions(&chain));
    }
}
