//! Metric comparison
//!
//! Computes the statistical relationship between two metrics over a single
//! shared window. Observations are paired by timestamp; unpaired points are
//! dropped before the coefficient is computed, and an excessive drop rate
//! is reported as a note rather than silently absorbed. Too few pairs (or
//! a constant series, where the coefficient is undefined) yield an explicit
//! insufficient-data outcome instead of a numeric of convenience.

use crate::catalog::MetricCatalog;
use crate::data::SeriesSource;
use crate::error::Result;
use crate::timerange;
use crate::types::{ComparisonResult, Relationship, SeriesPoint, TimeRange};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Correlation at or above this is labeled positive.
pub const POSITIVE_THRESHOLD: f64 = 0.3;

/// Correlation at or below this is labeled negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.3;

/// |r| at or above this is described as "strong".
pub const STRONG_MAGNITUDE: f64 = 0.7;

/// Minimum aligned pairs for a meaningful coefficient.
pub const MIN_PAIRED_POINTS: usize = 3;

/// Dropped-pair fraction above which a warning note is attached.
pub const MAX_DROPPED_FRACTION: f64 = 0.2;

/// Compares two metrics through the catalog and a data source.
pub struct ComparisonAnalyzer<'a> {
    catalog: &'a MetricCatalog,
    source: &'a dyn SeriesSource,
}

impl<'a> ComparisonAnalyzer<'a> {
    pub fn new(catalog: &'a MetricCatalog, source: &'a dyn SeriesSource) -> Self {
        Self { catalog, source }
    }

    /// Compare two metrics over the window named by `phrase`.
    ///
    /// Both identifiers must exist in the catalog; the window is resolved
    /// once and shared by both fetches so the series always cover identical
    /// bounds.
    pub fn compare(
        &self,
        metric_a: &str,
        metric_b: &str,
        phrase: &str,
        reference: DateTime<Utc>,
    ) -> Result<ComparisonResult> {
        let def_a = self.catalog.lookup(metric_a)?;
        let def_b = self.catalog.lookup(metric_b)?;
        let range = timerange::resolve(phrase, reference)?;

        let no_filters = BTreeMap::new();
        let series_a = self.source.fetch_series(&def_a.id, &range, &no_filters)?;
        let series_b = self.source.fetch_series(&def_b.id, &range, &no_filters)?;

        let (pairs, dropped) = align(&series_a, &series_b);
        let total = series_a.len() + series_b.len();

        let mut notes = Vec::new();
        if total > 0 && dropped as f64 / total as f64 > MAX_DROPPED_FRACTION {
            notes.push(format!(
                "{} of {} observations had no matching point in the other series and were dropped",
                dropped, total
            ));
        }

        let correlation = pearson(&pairs);
        let relationship = label(correlation);
        let insight = insight_text(
            &def_a.display_name,
            &def_b.display_name,
            relationship,
            correlation,
            &range,
        );

        tracing::debug!(
            metric_a = %def_a.id,
            metric_b = %def_b.id,
            paired = pairs.len(),
            dropped,
            ?relationship,
            "Computed metric comparison"
        );

        Ok(ComparisonResult {
            metric_a: def_a.id.clone(),
            metric_b: def_b.id.clone(),
            range,
            correlation,
            relationship,
            insight,
            paired_points: pairs.len(),
            dropped_points: dropped,
            notes,
        })
    }
}

/// Pair observations by exact timestamp; returns pairs and the count of
/// observations dropped from either side.
fn align(a: &[SeriesPoint], b: &[SeriesPoint]) -> (Vec<(f64, f64)>, usize) {
    let by_ts: BTreeMap<DateTime<Utc>, f64> = b.iter().map(|p| (p.ts, p.value)).collect();
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|p| by_ts.get(&p.ts).map(|&v| (p.value, v)))
        .collect();
    let dropped = (a.len() - pairs.len()) + (b.len() - pairs.len());
    (pairs, dropped)
}

/// Pearson coefficient over aligned pairs.
///
/// `None` when fewer than [`MIN_PAIRED_POINTS`] pairs exist or either side
/// has zero variance (the coefficient is undefined for a constant series).
fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < MIN_PAIRED_POINTS {
        return None;
    }

    let nf = n as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Relationship label: a monotonic function of the coefficient.
fn label(correlation: Option<f64>) -> Relationship {
    match correlation {
        Some(r) if r >= POSITIVE_THRESHOLD => Relationship::Positive,
        Some(r) if r <= NEGATIVE_THRESHOLD => Relationship::Negative,
        Some(_) => Relationship::None,
        None => Relationship::Insufficient,
    }
}

/// Template-generated insight text; never free-form.
fn insight_text(
    name_a: &str,
    name_b: &str,
    relationship: Relationship,
    correlation: Option<f64>,
    range: &TimeRange,
) -> String {
    match (relationship, correlation) {
        (Relationship::Insufficient, _) | (_, None) => format!(
            "Insufficient overlapping data to relate {} and {} over {}.",
            name_a, name_b, range.phrase
        ),
        (Relationship::None, Some(r)) => format!(
            "{} and {} show no meaningful relationship (r = {:.2}) over {}.",
            name_a, name_b, r, range.phrase
        ),
        (rel, Some(r)) => {
            let strength = if r.abs() >= STRONG_MAGNITUDE {
                "strong"
            } else {
                "moderate"
            };
            format!(
                "{} and {} show a {} {} relationship (r = {:.2}) over {}: as one moves, the other tends to move {}.",
                name_a,
                name_b,
                strength,
                rel.as_str(),
                r,
                range.phrase,
                if rel == Relationship::Positive { "with it" } else { "against it" },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemorySeriesStore;
    use crate::error::Error;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 13, 0, 0, 0).unwrap()
    }

    fn daily_points(values: &[f64]) -> Vec<SeriesPoint> {
        // One point per day walking back from the day before the reference
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                SeriesPoint::new(
                    reference() - chrono::Duration::days((values.len() - i) as i64),
                    v,
                )
            })
            .collect()
    }

    fn analyzer_fixture(
        a: &[f64],
        b: &[f64],
    ) -> (MetricCatalog, MemorySeriesStore) {
        let catalog = MetricCatalog::with_builtin();
        let store = MemorySeriesStore::new()
            .with_series("churn_rate", daily_points(a))
            .with_series("engagement_rate", daily_points(b));
        (catalog, store)
    }

    #[test]
    fn test_opposed_trends_are_negative() {
        // Churn rising while engagement falls
        let (catalog, store) = analyzer_fixture(
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            &[9.0, 8.0, 7.0, 6.0, 5.0, 4.0],
        );
        let analyzer = ComparisonAnalyzer::new(&catalog, &store);
        let result = analyzer
            .compare("churn_rate", "engagement_rate", "last 90 days", reference())
            .unwrap();

        let r = result.correlation.unwrap();
        assert!(r < -0.3, "expected strong negative correlation, got {}", r);
        assert_eq!(result.relationship, Relationship::Negative);
        assert!(result.insight.contains("negative"));
        assert_eq!(result.paired_points, 6);
        assert_eq!(result.dropped_points, 0);
    }

    #[test]
    fn test_correlation_is_symmetric() {
        let (catalog, store) = analyzer_fixture(
            &[1.0, 3.0, 2.0, 5.0, 4.0, 6.0],
            &[2.0, 4.0, 3.0, 7.0, 6.0, 9.0],
        );
        let analyzer = ComparisonAnalyzer::new(&catalog, &store);
        let ab = analyzer
            .compare("churn_rate", "engagement_rate", "last 30 days", reference())
            .unwrap();
        let ba = analyzer
            .compare("engagement_rate", "churn_rate", "last 30 days", reference())
            .unwrap();

        assert_eq!(ab.correlation, ba.correlation);
        assert_eq!(ab.relationship, ba.relationship);
    }

    #[test]
    fn test_shared_window_alignment() {
        let (catalog, store) = analyzer_fixture(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        let analyzer = ComparisonAnalyzer::new(&catalog, &store);
        let result = analyzer
            .compare("churn_rate", "engagement_rate", "last 2 weeks", reference())
            .unwrap();
        assert_eq!(result.range.days(), 14);
    }

    #[test]
    fn test_unknown_metric_is_an_error() {
        let (catalog, store) = analyzer_fixture(&[1.0], &[1.0]);
        let analyzer = ComparisonAnalyzer::new(&catalog, &store);
        assert!(matches!(
            analyzer.compare("churn_rate", "no_such", "last 30 days", reference()),
            Err(Error::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_zero_overlap_is_insufficient_not_numeric() {
        let catalog = MetricCatalog::with_builtin();
        // Disjoint timestamps: engagement observed only at a different hour
        let store = MemorySeriesStore::new()
            .with_series("churn_rate", daily_points(&[1.0, 2.0, 3.0]))
            .with_series(
                "engagement_rate",
                daily_points(&[4.0, 5.0, 6.0])
                    .into_iter()
                    .map(|p| SeriesPoint::new(p.ts + chrono::Duration::hours(1), p.value))
                    .collect(),
            );
        let analyzer = ComparisonAnalyzer::new(&catalog, &store);
        let result = analyzer
            .compare("churn_rate", "engagement_rate", "last 30 days", reference())
            .unwrap();

        assert_eq!(result.relationship, Relationship::Insufficient);
        assert_eq!(result.correlation, None);
        assert!(result.insight.contains("Insufficient"));
    }

    #[test]
    fn test_constant_series_is_insufficient() {
        let (catalog, store) = analyzer_fixture(&[5.0, 5.0, 5.0, 5.0], &[1.0, 2.0, 3.0, 4.0]);
        let analyzer = ComparisonAnalyzer::new(&catalog, &store);
        let result = analyzer
            .compare("churn_rate", "engagement_rate", "last 30 days", reference())
            .unwrap();
        assert_eq!(result.relationship, Relationship::Insufficient);
        assert_eq!(result.correlation, None);
    }

    #[test]
    fn test_excessive_dropped_pairs_noted() {
        let catalog = MetricCatalog::with_builtin();
        // Engagement has many observations churn lacks
        let store = MemorySeriesStore::new()
            .with_series("churn_rate", daily_points(&[1.0, 2.0, 3.0]))
            .with_series(
                "engagement_rate",
                daily_points(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
            );
        let analyzer = ComparisonAnalyzer::new(&catalog, &store);
        let result = analyzer
            .compare("churn_rate", "engagement_rate", "last 30 days", reference())
            .unwrap();

        assert!(result.dropped_points > 0);
        assert!(result.notes.iter().any(|n| n.contains("dropped")));
    }

    #[test]
    fn test_unparseable_phrase_surfaces() {
        let (catalog, store) = analyzer_fixture(&[1.0], &[1.0]);
        let analyzer = ComparisonAnalyzer::new(&catalog, &store);
        assert!(matches!(
            analyzer.compare("churn_rate", "engagement_rate", "whenever", reference()),
            Err(Error::UnparseableTimeRange(_))
        ));
    }
}
