//! Core domain types for insights-core
//!
//! These types carry a question from extraction through planning, execution,
//! and analysis. Everything except [`MetricDefinition`] is created per
//! request and discarded once the response is returned.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Metric** | A named, catalog-registered measurable quantity with a data source and aggregation |
//! | **Intent** | The structured interpretation of a question (metric + time range + filters) |
//! | **Query Plan** | The deterministic, executable rendering of an Intent |
//! | **Confidence** | A formula-derived score for how well an Intent resolved, not a model probability |
//! | **Freshness** | Recency of the latest observation, bucketed into descriptive bands |
//! | **Completeness** | Fraction of expected cadence slots that hold a value |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================
// Metric definitions
// ============================================

/// Default aggregation applied when a metric is reduced to a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Sum all observations in the window
    Sum,
    /// Average of observations in the window
    Avg,
    /// Most recent observation in the window
    Last,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Last => "last",
        }
    }
}

/// Expected observation cadence for a metric's underlying series.
///
/// Drives the completeness calculation: one expected slot per cadence unit
/// over the metric's reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        }
    }

    /// Length of one cadence slot in days.
    pub fn slot_days(&self) -> i64 {
        match self {
            Cadence::Daily => 1,
            Cadence::Weekly => 7,
            Cadence::Monthly => 30,
        }
    }

    /// Number of slots in the metric's reporting period.
    ///
    /// 30 days daily, 12 weeks weekly, 12 months monthly.
    pub fn reporting_slots(&self) -> i64 {
        match self {
            Cadence::Daily => 30,
            Cadence::Weekly => 12,
            Cadence::Monthly => 12,
        }
    }
}

/// A registered metric: the unit of the catalog.
///
/// Immutable once registered; the catalog is the sole owner and hands out
/// shared references. The query template is parameterized with `{start}`,
/// `{end}`, and `{filters}` placeholders filled in by the plan builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Unique identifier (e.g., "total_subscribers")
    pub id: String,
    /// Human-friendly name (e.g., "Total Subscribers")
    pub display_name: String,
    /// Alternate names accepted during search
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Underlying table or view holding the series
    pub source_table: String,
    /// Column holding the observed value
    pub value_column: String,
    /// Unit of the value ("count", "usd", "percent", "hours")
    pub unit: String,
    /// Aggregation applied when answering with a scalar
    pub aggregation: Aggregation,
    /// Expected observation cadence
    pub cadence: Cadence,
    /// Permitted filter dimensions mapped to their permitted values.
    ///
    /// BTreeMap so dimension iteration order is stable.
    #[serde(default)]
    pub dimensions: BTreeMap<String, Vec<String>>,
    /// SQL template with `{start}` / `{end}` / `{filters}` placeholders
    pub query_template: String,
}

// ============================================
// Time ranges
// ============================================

/// A resolved, bounded time window: inclusive start, exclusive end.
///
/// Carries the originating phrase for traceability and whether the
/// documented default window was applied in place of an unparseable or
/// missing phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The phrase that produced this range
    pub phrase: String,
    /// True when the default window was substituted for the phrase
    pub fallback: bool,
}

impl TimeRange {
    /// Window length in whole days (end - start).
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

// ============================================
// Intent
// ============================================

/// A ranked catalog candidate produced by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub metric_id: String,
    pub display_name: String,
    /// Similarity in [0,1] against the search text
    pub similarity: f64,
}

/// The structured interpretation of a question.
///
/// Created once per question and never mutated; downstream stages only
/// read it. `metric_id` is `None` when no candidate cleared the acceptance
/// threshold, in which case `candidates` holds the near misses and `notes`
/// records the ambiguity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Accepted metric, if any candidate cleared the threshold
    pub metric_id: Option<String>,
    /// Resolved window for the question
    pub range: TimeRange,
    /// Extracted filter dimension -> value pairs (stable iteration order)
    pub filters: BTreeMap<String, String>,
    /// Similarity of the accepted candidate (0.0 when unresolved)
    pub similarity: f64,
    /// Top-ranked near-miss candidates, for explanations
    pub candidates: Vec<SearchHit>,
    /// Count of filter values that matched more than one dimension
    pub ambiguous_filters: usize,
    /// Ambiguities and fallbacks encountered during extraction
    pub notes: Vec<String>,
}

impl Intent {
    /// Whether extraction settled on a metric.
    pub fn is_resolved(&self) -> bool {
        self.metric_id.is_some()
    }
}

// ============================================
// Query plans and answers
// ============================================

/// The deterministic, executable rendering of an Intent.
///
/// Identical Intent + catalog state always yields byte-identical `sql`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub metric_id: String,
    /// Rendered query text
    pub sql: String,
    /// Exact window used to render the query
    pub range: TimeRange,
    /// Exact filters used to render the query
    pub filters: BTreeMap<String, String>,
}

/// The final product of `ask_question`.
///
/// `sql` is exactly the plan's text (empty when no plan could be built);
/// the answer text is never edited after execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Natural-language answer text
    pub text: String,
    /// Rendered query text; equals `plan.sql` exactly, empty if unresolved
    pub sql: String,
    /// Confidence in [0,1], from the documented scoring formula
    pub confidence: f64,
    /// The plan that was executed, if the intent resolved
    pub plan: Option<QueryPlan>,
    /// Scalar value produced by execution, if any
    pub value: Option<f64>,
    /// Extraction notes carried through for traceability
    pub notes: Vec<String>,
}

/// The product of `generate_query`: the plan without execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub sql: String,
    pub metric_name: String,
    pub time_range: TimeRange,
}

// ============================================
// Comparison
// ============================================

/// Categorical relationship between two compared metrics.
///
/// A monotonic function of the correlation coefficient; `Insufficient`
/// replaces a numeric coefficient when too few aligned pairs exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Positive,
    Negative,
    None,
    Insufficient,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Positive => "positive",
            Relationship::Negative => "negative",
            Relationship::None => "none",
            Relationship::Insufficient => "insufficient data",
        }
    }
}

/// Result of comparing two metrics over a shared window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub metric_a: String,
    pub metric_b: String,
    /// The single window shared by both series fetches
    pub range: TimeRange,
    /// Pearson coefficient in [-1,1]; `None` when data was insufficient
    pub correlation: Option<f64>,
    pub relationship: Relationship,
    /// Template-generated summary of the relationship
    pub insight: String,
    /// Number of time-aligned pairs the coefficient was computed over
    pub paired_points: usize,
    /// Observations dropped because the other series had no matching point
    pub dropped_points: usize,
    /// Warnings (e.g., excessive dropped pairs)
    pub notes: Vec<String>,
}

// ============================================
// Data quality
// ============================================

/// Bucketed recency of a metric's latest observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Latest observation within the fresh window
    Current,
    /// Latest observation N days old
    Stale { days: i64 },
    /// Latest observation beyond the very-stale bound
    VeryStale,
    /// No observations at all
    NoData,
}

impl Freshness {
    /// Human-readable band description.
    pub fn describe(&self) -> String {
        match self {
            Freshness::Current => "current".to_string(),
            Freshness::Stale { days } => format!("stale: {} days", days),
            Freshness::VeryStale => "very stale".to_string(),
            Freshness::NoData => "no data".to_string(),
        }
    }
}

/// Result of a data-quality check for one metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub metric_id: String,
    /// Weighted score in [0,100]; see the quality module for the formula
    pub quality_score: u8,
    pub freshness: Freshness,
    /// Fraction of expected cadence slots populated in the reporting period
    pub completeness: f64,
    /// Ordered issue descriptions; non-empty iff the score is unacceptable
    pub issues: Vec<String>,
}

// ============================================
// Series data
// ============================================

/// One observation from the data-access collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub ts: DateTime<Utc>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(ts: DateTime<Utc>, value: f64) -> Self {
        Self { ts, value }
    }
}
