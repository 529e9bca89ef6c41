//! Text lookup against per-location disposal rules.
//!
//! A query is matched in two passes:
//!
//! 1. Keyword spotting: every rule key and alias is tried longest-first and
//!    the first one contained in the query wins. Aliases resolve to their
//!    canonical rule.
//! 2. Fuzzy suggestions: when no keyword is present, the whole query is compared
//!    against every term by normalized Levenshtein similarity.

use serde::Serialize;
use thiserror::Error;

use crate::models::{DisposalRule, RuleSet, RulesConfig};

/// Minimum similarity for a term to be suggested at all.
pub const SUGGESTION_CUTOFF: f64 = 0.6;

/// A lone suggestion above this similarity is offered as "did you mean".
pub const CONFIDENT_SUGGESTION: f64 = 0.7;

pub const MAX_SUGGESTIONS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RulesError {
    #[error("No rules for location '{location}' (known: {known})")]
    UnknownLocation { location: String, known: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found {
        /// Term spotted in the query
        keyword: String,
        /// Rule key the keyword resolved to; differs from `keyword` for aliases
        item: String,
        rule: DisposalRule,
    },
    Suggestion {
        suggestion: String,
    },
    MultipleSuggestions {
        suggestions: Vec<String>,
    },
    NotFound {
        notes: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lookup {
    pub query: String,
    pub location: String,
    pub source: String,
    #[serde(flatten)]
    pub outcome: LookupOutcome,
}

pub struct RulesLookup {
    rules: RulesConfig,
}

impl RulesLookup {
    pub fn new(rules: RulesConfig) -> Self {
        Self { rules }
    }

    pub fn locations(&self) -> Vec<&str> {
        self.rules.location_names()
    }

    pub fn lookup(&self, location: &str, description: &str) -> Result<Lookup, RulesError> {
        let set = self
            .rules
            .get_location(location)
            .ok_or_else(|| RulesError::UnknownLocation {
                location: location.to_string(),
                known: self.rules.location_names().join(", "),
            })?;

        let query = description.trim().to_lowercase();
        tracing::debug!("Looking up '{}' in rules for {}", query, set.source);

        let outcome = lookup_in(set, &query);
        Ok(Lookup {
            query,
            location: location.trim().to_lowercase(),
            source: set.source.clone(),
            outcome,
        })
    }
}

fn lookup_in(set: &RuleSet, query: &str) -> LookupOutcome {
    if query.is_empty() {
        return LookupOutcome::NotFound {
            notes: "Please enter an item description.".to_string(),
        };
    }

    let terms = valid_terms(set);

    if let Some(found) = terms.iter().find(|term| query.contains(term.as_str())) {
        return resolve(set, found);
    }

    let suggestions = suggest(query, &terms);
    match suggestions.as_slice() {
        [] => LookupOutcome::NotFound {
            notes: format!("Item not found or no close match in rules for {}.", set.source),
        },
        [(only, score)] if *score > CONFIDENT_SUGGESTION => LookupOutcome::Suggestion {
            suggestion: only.clone(),
        },
        many => LookupOutcome::MultipleSuggestions {
            suggestions: many.iter().map(|(term, _)| term.clone()).collect(),
        },
    }
}

/// Rule keys and alias keys, lower-cased and deduplicated, longest first.
fn valid_terms(set: &RuleSet) -> Vec<String> {
    let mut terms: Vec<String> = set
        .rules
        .keys()
        .chain(set.aliases.keys())
        .map(|t| t.to_lowercase())
        .collect();
    // Ties broken alphabetically so spotting is deterministic
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    terms.dedup();
    terms
}

fn resolve(set: &RuleSet, keyword: &str) -> LookupOutcome {
    let rule_for = |key: &str| {
        set.rules
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(k, rule)| (k.clone(), rule.clone()))
    };

    if let Some((item, rule)) = rule_for(keyword) {
        return LookupOutcome::Found {
            keyword: keyword.to_string(),
            item,
            rule,
        };
    }

    let target = set
        .aliases
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(keyword))
        .map(|(_, target)| target.as_str())
        .unwrap_or_default();

    match rule_for(target) {
        Some((item, rule)) => LookupOutcome::Found {
            keyword: keyword.to_string(),
            item,
            rule,
        },
        None => LookupOutcome::NotFound {
            notes: format!(
                "Item '{}' (alias for '{}') not specifically listed in rules for {}.",
                keyword, target, set.source
            ),
        },
    }
}

/// Up to [`MAX_SUGGESTIONS`] terms at or above the cutoff, best first.
fn suggest(query: &str, terms: &[String]) -> Vec<(String, f64)> {
    let mut scored: Vec<(String, f64)> = terms
        .iter()
        .map(|term| (term.clone(), strsim::normalized_levenshtein(query, term)))
        .filter(|(_, score)| *score >= SUGGESTION_CUTOFF)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(MAX_SUGGESTIONS);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn rule_set() -> RuleSet {
        let mut rules = IndexMap::new();
        rules.insert("battery".to_string(), DisposalRule::new("Hazardous Waste", "Drop-off only."));
        rules.insert("light bulb".to_string(), DisposalRule::new("Trash", "CFLs are hazardous."));
        rules.insert("soda can".to_string(), DisposalRule::new("Recyclable", "Empty and rinse."));
        rules.insert("soda cap".to_string(), DisposalRule::new("Trash", "Too small to sort."));
        rules.insert("plastic bag".to_string(), DisposalRule::new("Trash", "Store drop-off."));

        let mut aliases = IndexMap::new();
        aliases.insert("batteries".to_string(), "battery".to_string());
        aliases.insert("bag".to_string(), "plastic bag".to_string());
        aliases.insert("clamshell".to_string(), "plastic container".to_string());

        RuleSet {
            source: "Testville".to_string(),
            rules,
            aliases,
        }
    }

    fn lookup(query: &str) -> LookupOutcome {
        let mut config = RulesConfig::default();
        config.locations.insert("testville".to_string(), rule_set());
        RulesLookup::new(config).lookup("Testville", query).unwrap().outcome
    }

    #[test]
    fn test_exact_keyword() {
        match lookup("Battery") {
            LookupOutcome::Found { keyword, item, rule } => {
                assert_eq!(keyword, "battery");
                assert_eq!(item, "battery");
                assert_eq!(rule.category, "Hazardous Waste");
            }
            other => panic!("Expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_longest_keyword_wins() {
        // "plastic bag" beats the shorter alias "bag"
        match lookup("an old plastic bag from the store") {
            LookupOutcome::Found { keyword, item, .. } => {
                assert_eq!(keyword, "plastic bag");
                assert_eq!(item, "plastic bag");
            }
            other => panic!("Expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_alias_resolves() {
        match lookup("dead batteries") {
            LookupOutcome::Found { keyword, item, .. } => {
                assert_eq!(keyword, "batteries");
                assert_eq!(item, "battery");
            }
            other => panic!("Expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_alias_to_unknown_item() {
        match lookup("takeout clamshell") {
            LookupOutcome::NotFound { notes } => {
                assert!(notes.contains("alias for 'plastic container'"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_single_confident_suggestion() {
        assert_eq!(
            lookup("batery"),
            LookupOutcome::Suggestion {
                suggestion: "battery".to_string()
            }
        );
    }

    #[test]
    fn test_multiple_suggestions() {
        match lookup("soda c") {
            LookupOutcome::MultipleSuggestions { suggestions } => {
                assert_eq!(suggestions, vec!["soda can".to_string(), "soda cap".to_string()]);
            }
            other => panic!("Expected MultipleSuggestions, got {:?}", other),
        }
    }

    #[test]
    fn test_not_found() {
        assert!(matches!(lookup("xyzzy"), LookupOutcome::NotFound { .. }));
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(
            lookup("   "),
            LookupOutcome::NotFound {
                notes: "Please enter an item description.".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_location() {
        let lookup = RulesLookup::new(RulesConfig::default());
        assert!(matches!(
            lookup.lookup("atlantis", "can"),
            Err(RulesError::UnknownLocation { .. })
        ));
    }

    #[test]
    fn test_valid_terms_order() {
        let terms = valid_terms(&rule_set());
        assert_eq!(terms.first().map(String::as_str), Some("plastic bag"));
        assert_eq!(terms.last().map(String::as_str), Some("bag"));
        assert!(terms.windows(2).all(|w| w[0].len() >= w[1].len()));
    }
}
