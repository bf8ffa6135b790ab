//! The insights engine
//!
//! Owns the immutable [`MetricCatalog`] and the data-access collaborator,
//! and exposes the four public operations:
//!
//! - [`ask_question`](InsightsEngine::ask_question): question -> explained,
//!   confidence-scored [`Answer`]
//! - [`generate_query`](InsightsEngine::generate_query): question -> query
//!   text without execution
//! - [`compare_metrics`](InsightsEngine::compare_metrics): relationship
//!   between two metrics over a shared window
//! - [`check_data_quality`](InsightsEngine::check_data_quality): freshness,
//!   completeness, and issues for one metric
//!
//! All operations are side-effect-free computations over their inputs and
//! the read-only catalog; they may run concurrently. Every operation takes
//! the reference instant explicitly so results are reproducible. Ambiguity
//! inside question answering degrades into a low-confidence explained
//! Answer; comparison and quality checks surface unknown metrics and data
//! failures as errors because no partial answer makes sense there.

use crate::analysis::{ComparisonAnalyzer, QualityChecker};
use crate::cache::AnswerCache;
use crate::catalog::MetricCatalog;
use crate::config::Config;
use crate::data::SeriesSource;
use crate::error::Result;
use crate::intent::IntentExtractor;
use crate::plan;
use crate::scoring;
use crate::timerange;
use crate::types::{
    Aggregation, Answer, ComparisonResult, GeneratedQuery, Intent, MetricDefinition, QualityReport,
    QueryPlan, SeriesPoint,
};
use chrono::{DateTime, Utc};
use std::sync::Mutex;

pub struct InsightsEngine {
    catalog: MetricCatalog,
    source: Box<dyn SeriesSource>,
    cache: Mutex<AnswerCache>,
}

impl InsightsEngine {
    /// Create an engine over an explicit catalog and data source.
    pub fn new(catalog: MetricCatalog, source: Box<dyn SeriesSource>) -> Self {
        Self {
            catalog,
            source,
            cache: Mutex::new(AnswerCache::default()),
        }
    }

    /// Create an engine from configuration: the registration file when
    /// configured, otherwise the built-in registry.
    pub fn from_config(config: &Config, source: Box<dyn SeriesSource>) -> Result<Self> {
        let catalog = match &config.catalog.registration_file {
            Some(path) => MetricCatalog::load_from(path)?,
            None => MetricCatalog::with_builtin(),
        };
        Ok(Self::new(catalog, source))
    }

    /// The catalog this engine answers from.
    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Answer a natural-language question.
    ///
    /// Never fails on ambiguity: an unresolved question produces an
    /// explanatory Answer with confidence pinned low and no query executed.
    /// Data-access failures are surfaced as errors.
    pub fn ask_question(
        &self,
        question: &str,
        time_phrase: Option<&str>,
        reference: DateTime<Utc>,
    ) -> Result<Answer> {
        let cache_key = AnswerCache::key(
            "ask_question",
            self.catalog.version(),
            &[question, time_phrase.unwrap_or(""), &reference.to_rfc3339()],
        );
        if let Some(cached) = self.cached_answer(&cache_key, reference) {
            tracing::debug!(question, "Serving cached answer");
            return Ok(cached);
        }

        let extractor = IntentExtractor::new(&self.catalog);
        let intent = extractor.extract(question, time_phrase, reference);
        let confidence = scoring::confidence(&intent);

        let answer = if intent.is_resolved() {
            let plan = plan::build_plan(&intent, &self.catalog)?;
            let def = self.catalog.lookup(&plan.metric_id)?;
            self.execute(def, &plan, &intent, confidence)?
        } else {
            Self::unresolved_answer(&intent)
        };

        tracing::info!(
            question,
            metric = intent.metric_id.as_deref().unwrap_or("<unresolved>"),
            confidence,
            "Answered question"
        );

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(cache_key, answer.clone());
        }
        Ok(answer)
    }

    /// Generate the query for a question without executing it.
    ///
    /// Unlike [`ask_question`](Self::ask_question) there is no answer text
    /// to degrade into, so an unresolved question surfaces
    /// [`Error::UnresolvedIntent`].
    pub fn generate_query(
        &self,
        question: &str,
        reference: DateTime<Utc>,
    ) -> Result<GeneratedQuery> {
        let extractor = IntentExtractor::new(&self.catalog);
        let intent = extractor.extract(question, None, reference);
        let plan = plan::build_plan(&intent, &self.catalog)?;
        let def = self.catalog.lookup(&plan.metric_id)?;

        Ok(GeneratedQuery {
            sql: plan.sql,
            metric_name: def.display_name.clone(),
            time_range: plan.range,
        })
    }

    /// Compare two metrics over the window named by `phrase`.
    pub fn compare_metrics(
        &self,
        metric_a: &str,
        metric_b: &str,
        phrase: &str,
        reference: DateTime<Utc>,
    ) -> Result<ComparisonResult> {
        ComparisonAnalyzer::new(&self.catalog, self.source.as_ref())
            .compare(metric_a, metric_b, phrase, reference)
    }

    /// Check the data quality of one metric's underlying series.
    pub fn check_data_quality(
        &self,
        metric_id: &str,
        reference: DateTime<Utc>,
    ) -> Result<QualityReport> {
        QualityChecker::new(&self.catalog, self.source.as_ref()).check(metric_id, reference)
    }

    /// Serve a cached answer only if a fresh time-range resolution for the
    /// cached plan's phrase and this reference instant matches the cached
    /// bounds exactly.
    fn cached_answer(&self, key: &str, reference: DateTime<Utc>) -> Option<Answer> {
        let mut cache = self.cache.lock().ok()?;
        let cached = cache.get(key)?.clone();

        if let Some(cached_plan) = &cached.plan {
            let fresh = match timerange::resolve(&cached_plan.range.phrase, reference) {
                Ok(range) => range,
                Err(_) => timerange::default_window(reference),
            };
            if fresh.start != cached_plan.range.start || fresh.end != cached_plan.range.end {
                tracing::warn!(key, "Cached answer range no longer matches; discarding");
                cache.remove(key);
                return None;
            }
        }

        Some(cached)
    }

    /// Run a plan and package the answer.
    fn execute(
        &self,
        def: &MetricDefinition,
        plan: &QueryPlan,
        intent: &Intent,
        confidence: f64,
    ) -> Result<Answer> {
        let series = self
            .source
            .fetch_series(&plan.metric_id, &plan.range, &plan.filters)?;

        let value = aggregate(def.aggregation, &series);
        let scope = if plan.filters.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = plan
                .filters
                .iter()
                .map(|(dim, v)| format!("{} = {}", dim, v))
                .collect();
            format!(" ({})", parts.join(", "))
        };

        let text = match value {
            Some(v) => format!(
                "{}{} over {}: {} {}.",
                def.display_name,
                scope,
                plan.range.phrase,
                format_value(v),
                def.unit
            ),
            None => format!(
                "{}{} over {}: no data was recorded in this window.",
                def.display_name, scope, plan.range.phrase
            ),
        };

        Ok(Answer {
            text,
            sql: plan.sql.clone(),
            confidence,
            plan: Some(plan.clone()),
            value,
            notes: intent.notes.clone(),
        })
    }

    /// Explain an unresolved question instead of guessing a query.
    fn unresolved_answer(intent: &Intent) -> Answer {
        let text = if intent.candidates.is_empty() {
            "I could not match that question to a registered metric.".to_string()
        } else {
            let names: Vec<String> = intent
                .candidates
                .iter()
                .map(|c| format!("{} ({:.0}%)", c.display_name, c.similarity * 100.0))
                .collect();
            format!(
                "I could not confidently match that question to a metric. Closest candidates: {}.",
                names.join(", ")
            )
        };

        Answer {
            text,
            sql: String::new(),
            confidence: scoring::LOW_CONFIDENCE,
            plan: None,
            value: None,
            notes: intent.notes.clone(),
        }
    }
}

/// Reduce a series to a scalar with the metric's default aggregation.
fn aggregate(aggregation: Aggregation, series: &[SeriesPoint]) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    match aggregation {
        Aggregation::Sum => Some(series.iter().map(|p| p.value).sum()),
        Aggregation::Avg => Some(series.iter().map(|p| p.value).sum::<f64>() / series.len() as f64),
        Aggregation::Last => series.iter().max_by_key(|p| p.ts).map(|p| p.value),
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemorySeriesStore;
    use crate::error::Error;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 13, 0, 0, 0).unwrap()
    }

    fn daily(metric: &str, store: &mut MemorySeriesStore, values: &[f64]) {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                SeriesPoint::new(
                    reference() - chrono::Duration::days((values.len() - i) as i64)
                        + chrono::Duration::hours(12),
                    v,
                )
            })
            .collect();
        store.insert(metric, points);
    }

    fn engine() -> InsightsEngine {
        let mut store = MemorySeriesStore::new();
        daily("total_subscribers", &mut store, &[1000.0, 1010.0, 1025.0]);
        daily("churn_rate", &mut store, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        daily("engagement_rate", &mut store, &[9.0, 8.0, 7.0, 6.0, 5.0]);
        InsightsEngine::new(MetricCatalog::with_builtin(), Box::new(store))
    }

    #[test]
    fn test_ask_question_total_subscribers() {
        let engine = engine();
        let answer = engine
            .ask_question("What are total subscribers?", Some("last 30 days"), reference())
            .unwrap();

        assert!(answer.confidence > 0.8);
        assert!(!answer.sql.is_empty());
        assert_eq!(answer.sql, answer.plan.as_ref().unwrap().sql);
        // Aggregation is Last: newest observation wins
        assert_eq!(answer.value, Some(1025.0));
        assert!(answer.text.contains("Total Subscribers"));
        assert_eq!(answer.plan.as_ref().unwrap().range.days(), 30);
    }

    #[test]
    fn test_ask_question_defaults_window_with_note() {
        let engine = engine();
        let answer = engine
            .ask_question("What are total subscribers?", None, reference())
            .unwrap();

        assert!(answer.confidence > 0.8);
        let plan = answer.plan.as_ref().unwrap();
        assert_eq!(plan.range.days(), timerange::DEFAULT_WINDOW_DAYS);
        assert!(plan.range.fallback);
        assert!(answer.notes.iter().any(|n| n.contains("defaulted")));
    }

    #[test]
    fn test_ask_question_unresolved_is_explained_not_executed() {
        let engine = engine();
        let answer = engine
            .ask_question("rate of inflation", None, reference())
            .unwrap();

        assert_eq!(answer.confidence, scoring::LOW_CONFIDENCE);
        assert!(answer.sql.is_empty());
        assert!(answer.plan.is_none());
        assert!(answer.value.is_none());
        assert!(answer.text.contains("candidates"));
    }

    #[test]
    fn test_ask_question_no_match_at_all() {
        let engine = engine();
        let answer = engine
            .ask_question("average llama wool output", None, reference())
            .unwrap();

        assert_eq!(answer.confidence, scoring::LOW_CONFIDENCE);
        assert!(answer.text.contains("could not match"));
        assert!(!answer.notes.is_empty());
    }

    #[test]
    fn test_generate_query() {
        let engine = engine();
        let generated = engine
            .generate_query("monthly revenue for the last quarter", reference())
            .unwrap();

        assert_eq!(generated.metric_name, "Monthly Revenue");
        assert!(generated.sql.contains("FROM billing"));
        assert!(!generated.time_range.fallback);
    }

    #[test]
    fn test_generate_query_unresolved_surfaces() {
        let engine = engine();
        assert!(matches!(
            engine.generate_query("average llama wool output", reference()),
            Err(Error::UnresolvedIntent(_))
        ));
    }

    #[test]
    fn test_compare_metrics_through_engine() {
        let engine = engine();
        let result = engine
            .compare_metrics("churn_rate", "engagement_rate", "last 90 days", reference())
            .unwrap();

        assert!(result.correlation.unwrap() < -0.3);
        assert_eq!(result.relationship, crate::types::Relationship::Negative);
    }

    #[test]
    fn test_check_data_quality_through_engine() {
        let engine = engine();
        let report = engine.check_data_quality("churn_rate", reference()).unwrap();
        assert_eq!(report.metric_id, "churn_rate");
        assert!(report.quality_score > 0);
    }

    #[test]
    fn test_answers_are_deterministic() {
        let engine = engine();
        let a = engine
            .ask_question("churn rate last 90 days", None, reference())
            .unwrap();
        let b = engine
            .ask_question("churn rate last 90 days", None, reference())
            .unwrap();

        assert_eq!(a.sql, b.sql);
        assert_eq!(a.text, b.text);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn test_cache_serves_repeat_question_once() {
        struct CountingSource {
            inner: MemorySeriesStore,
            calls: std::sync::Arc<AtomicUsize>,
        }
        impl SeriesSource for CountingSource {
            fn fetch_series(
                &self,
                metric_id: &str,
                range: &crate::types::TimeRange,
                filters: &BTreeMap<String, String>,
            ) -> Result<Vec<SeriesPoint>> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.inner.fetch_series(metric_id, range, filters)
            }
        }

        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let mut inner = MemorySeriesStore::new();
        daily("churn_rate", &mut inner, &[1.0, 2.0]);
        let source = CountingSource {
            inner,
            calls: calls.clone(),
        };
        let engine = InsightsEngine::new(MetricCatalog::with_builtin(), Box::new(source));

        let a = engine
            .ask_question("churn rate last 7 days", None, reference())
            .unwrap();
        let b = engine
            .ask_question("churn rate last 7 days", None, reference())
            .unwrap();

        assert_eq!(a.sql, b.sql);
        // Second request was a cache hit; the source was only consulted once
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A different reference instant misses the cache and re-resolves
        let later = reference() + chrono::Duration::hours(1);
        let c = engine
            .ask_question("churn rate last 7 days", None, later)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_ne!(a.plan.as_ref().unwrap().range, c.plan.as_ref().unwrap().range);
    }

    #[test]
    fn test_data_access_failure_propagates() {
        struct FailingSource;
        impl SeriesSource for FailingSource {
            fn fetch_series(
                &self,
                metric_id: &str,
                _range: &crate::types::TimeRange,
                _filters: &BTreeMap<String, String>,
            ) -> Result<Vec<SeriesPoint>> {
                Err(Error::DataAccess {
                    metric_id: metric_id.to_string(),
                    message: "connection refused".to_string(),
                })
            }
        }

        let engine = InsightsEngine::new(MetricCatalog::with_builtin(), Box::new(FailingSource));
        assert!(matches!(
            engine.ask_question("churn rate last 7 days", None, reference()),
            Err(Error::DataAccess { .. })
        ));
        assert!(matches!(
            engine.check_data_quality("churn_rate", reference()),
            Err(Error::DataAccess { .. })
        ));
    }

    #[test]
    fn test_empty_window_answer_mentions_no_data() {
        let engine = engine();
        let answer = engine
            .ask_question("content downloads last 7 days", None, reference())
            .unwrap();

        assert!(answer.value.is_none());
        assert!(answer.text.contains("no data"));
        assert!(!answer.sql.is_empty());
    }
}
