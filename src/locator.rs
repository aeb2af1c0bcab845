//! Ordered locator strategies for remote UI targets.
//!
//! Element identifiers in the remote application are generated per render, so
//! every semantic target carries a list of structural predicates. The first
//! predicate that yields exactly one element wins; ties and misses fall
//! through to the next one.

use std::fmt;

use tracing::trace;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::driver::{Browser, DriverError, ElementId, ElementQuery};

/// How a human-readable label is compared against rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Whitespace-normalized equality.
    Exact,
    /// Case- and accent-insensitive containment, punctuation ignored.
    Fuzzy,
}

/// One structural way of finding a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The query matches exactly one element.
    Unique(ElementQuery),
    /// The `index`-th match (0-based) of a query whose matches have a known order.
    Nth { query: ElementQuery, index: usize },
    /// Exactly one of the candidates renders text matching `label`.
    Labelled {
        candidates: ElementQuery,
        label: String,
        rule: MatchRule,
    },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Unique(query) => write!(f, "unique {query}"),
            Predicate::Nth { query, index } => write!(f, "nth[{index}] {query}"),
            Predicate::Labelled {
                candidates,
                label,
                rule: MatchRule::Exact,
            } => write!(f, "label == {label:?} in {candidates}"),
            Predicate::Labelled {
                candidates,
                label,
                rule: MatchRule::Fuzzy,
            } => write!(f, "label ~ {label:?} in {candidates}"),
        }
    }
}

/// Ordered predicates for one semantic target. Stateless and reusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorStrategy {
    name: String,
    predicates: Vec<Predicate>,
}

impl LocatorStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicates: Vec::new(),
        }
    }

    pub fn unique(mut self, query: ElementQuery) -> Self {
        self.predicates.push(Predicate::Unique(query));
        self
    }

    pub fn nth(mut self, query: ElementQuery, index: usize) -> Self {
        self.predicates.push(Predicate::Nth { query, index });
        self
    }

    pub fn labelled(mut self, candidates: ElementQuery, label: &str, rule: MatchRule) -> Self {
        self.predicates.push(Predicate::Labelled {
            candidates,
            label: label.to_string(),
            rule,
        });
        self
    }

    /// Semantic name, e.g. "sector selector".
    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

/// Outcome of one resolution pass over the current document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found { element: ElementId, matched: String },
    /// Every predicate missed or was ambiguous; one line per predicate tried.
    Missing { attempted: Vec<String> },
}

/// Try each predicate of `strategy` in order against the live document.
pub async fn resolve<B: Browser>(
    browser: &mut B,
    strategy: &LocatorStrategy,
) -> Result<Resolution, DriverError> {
    let mut attempted = Vec::with_capacity(strategy.predicates.len());

    for predicate in &strategy.predicates {
        let hits = match predicate {
            Predicate::Unique(query) => browser.find_all(query).await?,
            Predicate::Nth { query, index } => {
                let found = browser.find_all(query).await?;
                found.into_iter().nth(*index).into_iter().collect()
            }
            Predicate::Labelled {
                candidates,
                label,
                rule,
            } => {
                let mut hits = Vec::new();
                for element in browser.find_all(candidates).await? {
                    let text = browser.text(&element).await?;
                    if label_matches(&text, label, *rule) {
                        hits.push(element);
                    }
                }
                hits
            }
        };

        if let [element] = hits.as_slice() {
            trace!(locator = strategy.name(), %predicate, "resolved");
            return Ok(Resolution::Found {
                element: element.clone(),
                matched: predicate.to_string(),
            });
        }
        attempted.push(format!("{predicate} ({} matches)", hits.len()));
    }

    Ok(Resolution::Missing { attempted })
}

/// Whether rendered `text` carries `label` under `rule`.
pub fn label_matches(text: &str, label: &str, rule: MatchRule) -> bool {
    match rule {
        MatchRule::Exact => collapse_whitespace(text) == collapse_whitespace(label),
        MatchRule::Fuzzy => {
            let needle = fold(label);
            !needle.is_empty() && fold(text).contains(&needle)
        }
    }
}

/// Lowercase, strip accents, turn punctuation into spaces and collapse runs of
/// whitespace: "Campo  VIP - Cortesía!" becomes "campo vip cortesia".
pub fn fold(text: &str) -> String {
    let stripped: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&stripped)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
