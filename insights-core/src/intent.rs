//! Intent extraction
//!
//! Maps a free-text question to a structured [`Intent`]: a candidate
//! metric, a resolved time window, and filter dimension/value pairs.
//! Extraction never fails; malformed input produces an unresolved Intent
//! with explanatory notes so downstream stages can degrade gracefully
//! instead of erroring.
//!
//! The pipeline:
//! 1. locate a time phrase by scanning token windows through the time-range
//!    resolver (longest window wins), defaulting to the trailing 30 days
//!    with a note when absent or unparseable;
//! 2. rank catalog candidates against the remaining text;
//! 3. accept the top candidate only if it clears the acceptance threshold,
//!    otherwise record the near misses;
//! 4. map recognized value tokens onto the metric's permitted dimensions.

use crate::catalog::{MatchOutcome, MetricCatalog};
use crate::timerange;
use crate::types::{Intent, TimeRange};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Longest token window considered a time phrase ("from A to B").
const MAX_PHRASE_TOKENS: usize = 4;

/// Extracts intents against a fixed catalog.
pub struct IntentExtractor<'a> {
    catalog: &'a MetricCatalog,
}

impl<'a> IntentExtractor<'a> {
    pub fn new(catalog: &'a MetricCatalog) -> Self {
        Self { catalog }
    }

    /// Extract an intent from a question.
    ///
    /// `explicit_phrase` (when the caller supplies a separate time phrase)
    /// takes precedence over any phrase found in the question text. The
    /// reference instant is explicit so extraction is reproducible.
    pub fn extract(
        &self,
        question: &str,
        explicit_phrase: Option<&str>,
        reference: DateTime<Utc>,
    ) -> Intent {
        let mut notes = Vec::new();
        let tokens = tokenize(question);

        let (range, remaining) = match explicit_phrase {
            Some(phrase) => (resolve_or_default(phrase, reference, &mut notes), tokens),
            None => self.scan_for_phrase(&tokens, reference, &mut notes),
        };

        let search_text = remaining.join(" ");
        let (metric_id, similarity, candidates) = match self.catalog.resolve(&search_text) {
            MatchOutcome::Resolved(hit) => {
                tracing::debug!(
                    metric = %hit.metric_id,
                    similarity = hit.similarity,
                    "Resolved metric for question"
                );
                (Some(hit.metric_id), hit.similarity, Vec::new())
            }
            MatchOutcome::Ambiguous(hits) => {
                let names: Vec<&str> = hits.iter().map(|h| h.metric_id.as_str()).collect();
                notes.push(format!(
                    "no metric cleared the acceptance threshold; closest candidates: {}",
                    names.join(", ")
                ));
                (None, 0.0, hits)
            }
            MatchOutcome::NoMatch => {
                notes.push("no registered metric matched the question".to_string());
                (None, 0.0, Vec::new())
            }
        };

        let (filters, ambiguous_filters) = match metric_id.as_deref() {
            Some(id) => self.extract_filters(id, &remaining, &mut notes),
            None => (BTreeMap::new(), 0),
        };

        Intent {
            metric_id,
            range,
            filters,
            similarity,
            candidates,
            ambiguous_filters,
            notes,
        }
    }

    /// Find the longest token window that resolves as a time phrase.
    ///
    /// Returns the resolved range (or the default window, with a note) and
    /// the tokens left over for metric matching.
    fn scan_for_phrase(
        &self,
        tokens: &[String],
        reference: DateTime<Utc>,
        notes: &mut Vec<String>,
    ) -> (TimeRange, Vec<String>) {
        for len in (1..=MAX_PHRASE_TOKENS.min(tokens.len())).rev() {
            for start in 0..=tokens.len() - len {
                let candidate = tokens[start..start + len].join(" ");
                if let Ok(range) = timerange::resolve(&candidate, reference) {
                    let mut remaining = tokens[..start].to_vec();
                    remaining.extend_from_slice(&tokens[start + len..]);
                    return (range, remaining);
                }
            }
        }

        notes.push(format!(
            "no time phrase recognized; defaulted to trailing {} days",
            timerange::DEFAULT_WINDOW_DAYS
        ));
        (timerange::default_window(reference), tokens.to_vec())
    }

    /// Match remaining tokens against the metric's permitted dimension values.
    fn extract_filters(
        &self,
        metric_id: &str,
        tokens: &[String],
        notes: &mut Vec<String>,
    ) -> (BTreeMap<String, String>, usize) {
        let Some(def) = self.catalog.get(metric_id) else {
            return (BTreeMap::new(), 0);
        };

        let mut filters = BTreeMap::new();
        let mut ambiguous = 0;

        for token in tokens {
            let matching: Vec<&str> = def
                .dimensions
                .iter()
                .filter(|(_, values)| values.iter().any(|v| v == token))
                .map(|(dim, _)| dim.as_str())
                .collect();

            match matching.as_slice() {
                [] => {}
                [dim] => {
                    filters.insert(dim.to_string(), token.clone());
                }
                many => {
                    ambiguous += 1;
                    notes.push(format!(
                        "ambiguous filter value '{}' matches dimensions: {}; ignored",
                        token,
                        many.join(", ")
                    ));
                }
            }
        }

        (filters, ambiguous)
    }
}

/// Lowercased whitespace tokens with edge punctuation trimmed.
///
/// Hyphens are kept so absolute dates survive tokenization.
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn resolve_or_default(
    phrase: &str,
    reference: DateTime<Utc>,
    notes: &mut Vec<String>,
) -> TimeRange {
    match timerange::resolve(phrase, reference) {
        Ok(range) => range,
        Err(_) => {
            tracing::warn!(phrase, "Unparseable time phrase; using default window");
            notes.push(format!(
                "time phrase {:?} not recognized; defaulted to trailing {} days",
                phrase,
                timerange::DEFAULT_WINDOW_DAYS
            ));
            timerange::default_window(reference)
        }
    }
}
