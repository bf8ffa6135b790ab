//! Metric catalog: the registry of known metrics
//!
//! The catalog is built once from a registration source (the built-in
//! registry, a TOML registration file, or definitions supplied by the
//! embedding application) and is read-only thereafter, so unsynchronized
//! concurrent reads are safe. Every downstream component receives the
//! catalog explicitly; nothing reads ambient global state.
//!
//! Free-text search returns ranked candidates and a typed outcome
//! ([`MatchOutcome`]) rather than a silent best guess: callers always see
//! whether a lookup resolved, was ambiguous, or found nothing.

use crate::error::{Error, Result};
use crate::types::{MetricDefinition, SearchHit};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Minimum similarity for a candidate to clear acceptance.
pub const SIMILARITY_ACCEPT: f64 = 0.55;

/// Minimum similarity for a candidate to appear in search results at all.
pub const MIN_CANDIDATE_SIMILARITY: f64 = 0.3;

/// Number of near-miss candidates reported on ambiguity.
pub const TOP_K_CANDIDATES: usize = 3;

/// Question words ignored when matching free text against metric names.
const STOPWORDS: &[&str] = &[
    "what", "whats", "are", "is", "was", "were", "the", "a", "an", "of", "for", "in", "on", "and",
    "show", "me", "my", "our", "us", "how", "many", "much", "over", "by", "per", "with", "please",
    "tell", "give", "do", "does", "did", "get", "report",
];

/// Outcome of resolving free text against the catalog.
///
/// Never a silent best guess: ambiguity and misses are explicit.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Exactly one candidate cleared the acceptance threshold
    Resolved(SearchHit),
    /// Candidates exist but none cleared the threshold
    Ambiguous(Vec<SearchHit>),
    /// Nothing even close
    NoMatch,
}

/// Shape of a TOML registration file: a list of `[[metrics]]` tables.
#[derive(Debug, Deserialize)]
struct RegistrationFile {
    metrics: Vec<MetricDefinition>,
}

/// Read-only registry of metric definitions.
pub struct MetricCatalog {
    metrics: BTreeMap<String, MetricDefinition>,
    version: String,
}

impl MetricCatalog {
    /// Build a catalog from explicit definitions.
    ///
    /// Fails on duplicate identifiers; definitions are immutable once
    /// registered.
    pub fn from_definitions(definitions: Vec<MetricDefinition>) -> Result<Self> {
        let mut metrics = BTreeMap::new();
        for def in definitions {
            if def.id.trim().is_empty() {
                return Err(Error::Catalog("metric id must not be empty".to_string()));
            }
            if metrics.contains_key(&def.id) {
                return Err(Error::Catalog(format!("duplicate metric id: {}", def.id)));
            }
            metrics.insert(def.id.clone(), def);
        }

        if metrics.is_empty() {
            tracing::warn!("Catalog loaded with no metrics registered");
        }

        let version = fingerprint(&metrics);
        tracing::info!(metrics = metrics.len(), version = %version, "Metric catalog loaded");

        Ok(Self { metrics, version })
    }

    /// Build the catalog from the built-in streaming-metrics registry.
    pub fn with_builtin() -> Self {
        // Built-in definitions are statically valid, so this cannot fail
        match Self::from_definitions(builtin_metrics()) {
            Ok(catalog) => catalog,
            Err(_) => unreachable!("built-in metric registry is valid"),
        }
    }

    /// Load the catalog from a TOML registration file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Catalog(format!("failed to read registration file {:?}: {}", path, e))
        })?;
        let file: RegistrationFile = toml::from_str(&content)
            .map_err(|e| Error::Catalog(format!("failed to parse registration file: {}", e)))?;
        Self::from_definitions(file.metrics)
    }

    /// Look up a metric by exact identifier.
    pub fn lookup(&self, id: &str) -> Result<&MetricDefinition> {
        self.metrics
            .get(id)
            .ok_or_else(|| Error::UnknownMetric(id.to_string()))
    }

    /// Look up a metric by identifier, returning `None` on a miss.
    pub fn get(&self, id: &str) -> Option<&MetricDefinition> {
        self.metrics.get(id)
    }

    /// Rank all metrics by textual similarity to the given free text.
    ///
    /// Results are ordered by descending similarity with ties broken by
    /// metric id, so the ordering is total and deterministic. Candidates
    /// below [`MIN_CANDIDATE_SIMILARITY`] are omitted.
    pub fn search(&self, text: &str) -> Vec<SearchHit> {
        let query = significant_tokens(text);
        if query.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .metrics
            .values()
            .filter_map(|def| {
                let similarity = metric_similarity(&query, def);
                if similarity >= MIN_CANDIDATE_SIMILARITY {
                    Some(SearchHit {
                        metric_id: def.id.clone(),
                        display_name: def.display_name.clone(),
                        similarity,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.metric_id.cmp(&b.metric_id))
        });
        hits
    }

    /// Resolve free text to a typed outcome.
    pub fn resolve(&self, text: &str) -> MatchOutcome {
        let mut hits = self.search(text);
        match hits.first() {
            Some(top) if top.similarity >= SIMILARITY_ACCEPT => MatchOutcome::Resolved(top.clone()),
            Some(_) => {
                hits.truncate(TOP_K_CANDIDATES);
                MatchOutcome::Ambiguous(hits)
            }
            None => MatchOutcome::NoMatch,
        }
    }

    /// Content fingerprint of the registered definitions.
    ///
    /// Changes whenever any definition changes; used as the cache key
    /// component that invalidates cached answers across catalog reloads.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterate over all definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.values()
    }
}

fn fingerprint(metrics: &BTreeMap<String, MetricDefinition>) -> String {
    let mut hasher = Sha256::new();
    for def in metrics.values() {
        hasher.update(def.id.as_bytes());
        hasher.update([0]);
        hasher.update(def.display_name.as_bytes());
        hasher.update([0]);
        hasher.update(def.source_table.as_bytes());
        hasher.update([0]);
        hasher.update(def.query_template.as_bytes());
        hasher.update([0]);
        for synonym in &def.synonyms {
            hasher.update(synonym.as_bytes());
            hasher.update([0]);
        }
        for (dim, values) in &def.dimensions {
            hasher.update(dim.as_bytes());
            hasher.update([0]);
            for value in values {
                hasher.update(value.as_bytes());
                hasher.update([0]);
            }
        }
    }
    hex::encode(hasher.finalize())
}

/// Lowercased alphanumeric tokens with question stopwords removed.
pub(crate) fn significant_tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Similarity of query tokens against a metric's names.
///
/// Dice coefficient (`2|A∩B| / (|A|+|B|)`) computed per name variant
/// (identifier, display name, each synonym); the best variant wins.
fn metric_similarity(query: &BTreeSet<String>, def: &MetricDefinition) -> f64 {
    let mut variants: Vec<BTreeSet<String>> = Vec::with_capacity(2 + def.synonyms.len());
    variants.push(significant_tokens(&def.id.replace('_', " ")));
    variants.push(significant_tokens(&def.display_name));
    for synonym in &def.synonyms {
        variants.push(significant_tokens(synonym));
    }

    variants
        .iter()
        .map(|name| dice(query, name))
        .fold(0.0, f64::max)
}

fn dice(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    (2 * shared) as f64 / (a.len() + b.len()) as f64
}

/// The built-in streaming-media metric registry.
fn builtin_metrics() -> Vec<MetricDefinition> {
    use crate::types::{Aggregation, Cadence};

    let regions = || {
        vec![
            "us".to_string(),
            "emea".to_string(),
            "apac".to_string(),
            "latam".to_string(),
        ]
    };
    let plans = || {
        vec![
            "basic".to_string(),
            "standard".to_string(),
            "premium".to_string(),
        ]
    };
    let devices = || vec!["mobile".to_string(), "tv".to_string(), "web".to_string()];

    vec![
        MetricDefinition {
            id: "total_subscribers".to_string(),
            display_name: "Total Subscribers".to_string(),
            synonyms: vec![
                "subscribers".to_string(),
                "subscriber count".to_string(),
                "subs".to_string(),
            ],
            source_table: "subscriptions".to_string(),
            value_column: "subscriber_count".to_string(),
            unit: "count".to_string(),
            aggregation: Aggregation::Last,
            cadence: Cadence::Daily,
            dimensions: BTreeMap::from([
                ("region".to_string(), regions()),
                ("plan".to_string(), plans()),
            ]),
            query_template: "SELECT subscriber_count AS value FROM subscriptions \
                             WHERE event_date >= '{start}' AND event_date < '{end}'{filters} \
                             ORDER BY event_date DESC LIMIT 1"
                .to_string(),
        },
        MetricDefinition {
            id: "monthly_revenue".to_string(),
            display_name: "Monthly Revenue".to_string(),
            synonyms: vec![
                "revenue".to_string(),
                "mrr".to_string(),
                "monthly recurring revenue".to_string(),
            ],
            source_table: "billing".to_string(),
            value_column: "revenue_usd".to_string(),
            unit: "usd".to_string(),
            aggregation: Aggregation::Sum,
            cadence: Cadence::Monthly,
            dimensions: BTreeMap::from([
                ("region".to_string(), regions()),
                ("plan".to_string(), plans()),
            ]),
            query_template: "SELECT SUM(revenue_usd) AS value FROM billing \
                             WHERE event_date >= '{start}' AND event_date < '{end}'{filters}"
                .to_string(),
        },
        MetricDefinition {
            id: "churn_rate".to_string(),
            display_name: "Churn Rate".to_string(),
            synonyms: vec!["churn".to_string(), "cancellation rate".to_string()],
            source_table: "retention".to_string(),
            value_column: "churn_pct".to_string(),
            unit: "percent".to_string(),
            aggregation: Aggregation::Avg,
            cadence: Cadence::Daily,
            dimensions: BTreeMap::from([
                ("region".to_string(), regions()),
                ("plan".to_string(), plans()),
            ]),
            query_template: "SELECT AVG(churn_pct) AS value FROM retention \
                             WHERE event_date >= '{start}' AND event_date < '{end}'{filters}"
                .to_string(),
        },
        MetricDefinition {
            id: "engagement_rate".to_string(),
            display_name: "Engagement Rate".to_string(),
            synonyms: vec![
                "engagement".to_string(),
                "active user rate".to_string(),
            ],
            source_table: "engagement".to_string(),
            value_column: "engagement_pct".to_string(),
            unit: "percent".to_string(),
            aggregation: Aggregation::Avg,
            cadence: Cadence::Daily,
            dimensions: BTreeMap::from([
                ("region".to_string(), regions()),
                ("device".to_string(), devices()),
            ]),
            query_template: "SELECT AVG(engagement_pct) AS value FROM engagement \
                             WHERE event_date >= '{start}' AND event_date < '{end}'{filters}"
                .to_string(),
        },
        MetricDefinition {
            id: "watch_hours".to_string(),
            display_name: "Watch Hours".to_string(),
            synonyms: vec![
                "watch time".to_string(),
                "viewing hours".to_string(),
                "hours watched".to_string(),
            ],
            source_table: "playback".to_string(),
            value_column: "hours".to_string(),
            unit: "hours".to_string(),
            aggregation: Aggregation::Sum,
            cadence: Cadence::Daily,
            dimensions: BTreeMap::from([
                ("region".to_string(), regions()),
                ("device".to_string(), devices()),
            ]),
            query_template: "SELECT SUM(hours) AS value FROM playback \
                             WHERE event_date >= '{start}' AND event_date < '{end}'{filters}"
                .to_string(),
        },
        MetricDefinition {
            id: "content_downloads".to_string(),
            display_name: "Content Downloads".to_string(),
            synonyms: vec!["downloads".to_string(), "offline downloads".to_string()],
            source_table: "downloads".to_string(),
            value_column: "download_count".to_string(),
            unit: "count".to_string(),
            aggregation: Aggregation::Sum,
            cadence: Cadence::Daily,
            dimensions: BTreeMap::from([
                ("region".to_string(), regions()),
                ("device".to_string(), devices()),
            ]),
            query_template: "SELECT SUM(download_count) AS value FROM downloads \
                             WHERE event_date >= '{start}' AND event_date < '{end}'{filters}"
                .to_string(),
        },
    ]
}
