//! Data quality checking
//!
//! Scores the freshness and completeness of a metric's underlying series
//! over its reporting period. The score is a fixed weighted combination so
//! identical series state always produces identical reports:
//!
//! ```text
//! quality_score = floor(60 * completeness + 40 * freshness_factor)
//! ```
//!
//! with freshness factors Current 1.0, Stale 0.5, VeryStale/NoData 0.0.
//! The issue rules and [`ACCEPTABLE_QUALITY`] are chosen together so the
//! issue list is non-empty exactly when the score falls below the
//! acceptable threshold.

use crate::catalog::MetricCatalog;
use crate::data::SeriesSource;
use crate::error::Result;
use crate::types::{Freshness, QualityReport, SeriesPoint, TimeRange};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Weight of completeness in the score.
pub const WEIGHT_COMPLETENESS: f64 = 60.0;

/// Weight of the freshness factor in the score.
pub const WEIGHT_FRESHNESS: f64 = 40.0;

/// Latest observation at most this many days old counts as current.
pub const FRESH_DAYS: i64 = 2;

/// Beyond this many days the series is very stale.
pub const VERY_STALE_DAYS: i64 = 14;

/// Completeness below this adds a missing-data issue.
pub const COMPLETENESS_THRESHOLD: f64 = 0.9;

/// Scores at or above this are acceptable and carry no issues.
///
/// floor(60 * 0.9 + 40 * 1.0): the minimum score attainable when no issue
/// rule fires, which makes "issues non-empty iff score below threshold"
/// hold exactly.
pub const ACCEPTABLE_QUALITY: u8 = 94;

/// Checks series quality for catalog metrics.
pub struct QualityChecker<'a> {
    catalog: &'a MetricCatalog,
    source: &'a dyn SeriesSource,
}

impl<'a> QualityChecker<'a> {
    pub fn new(catalog: &'a MetricCatalog, source: &'a dyn SeriesSource) -> Self {
        Self { catalog, source }
    }

    /// Produce a quality report for one metric.
    ///
    /// The reporting period is derived from the metric's cadence (30 days
    /// daily, 12 weeks weekly, 12 months monthly), trailing back from the
    /// explicit reference instant.
    pub fn check(&self, metric_id: &str, reference: DateTime<Utc>) -> Result<QualityReport> {
        let def = self.catalog.lookup(metric_id)?;

        let slots = def.cadence.reporting_slots();
        let slot_days = def.cadence.slot_days();
        let period_days = slots * slot_days;
        let range = TimeRange {
            start: reference - chrono::Duration::days(period_days),
            end: reference,
            phrase: format!("last {} days", period_days),
            fallback: false,
        };

        let series = self.source.fetch_series(&def.id, &range, &BTreeMap::new())?;

        if series.is_empty() {
            tracing::warn!(metric = %def.id, "No data available for quality check");
            return Ok(QualityReport {
                metric_id: def.id.clone(),
                quality_score: 0,
                freshness: Freshness::NoData,
                completeness: 0.0,
                issues: vec!["no data available".to_string()],
            });
        }

        let freshness = bucket_freshness(&series, reference);
        let filled = filled_slots(&series, &range, slot_days);
        let completeness = filled as f64 / slots as f64;

        let freshness_factor = match freshness {
            Freshness::Current => 1.0,
            Freshness::Stale { .. } => 0.5,
            Freshness::VeryStale | Freshness::NoData => 0.0,
        };
        let quality_score =
            (WEIGHT_COMPLETENESS * completeness + WEIGHT_FRESHNESS * freshness_factor).floor()
                as u8;

        let mut issues = Vec::new();
        if completeness < COMPLETENESS_THRESHOLD {
            issues.push(format!(
                "missing data: only {}/{} expected {} observations present",
                filled,
                slots,
                def.cadence.as_str()
            ));
        }
        match freshness {
            Freshness::Current => {}
            Freshness::Stale { days } => {
                issues.push(format!("stale data: latest observation is {} days old", days));
            }
            Freshness::VeryStale => {
                issues.push(format!(
                    "stale data: latest observation is more than {} days old",
                    VERY_STALE_DAYS
                ));
            }
            Freshness::NoData => {}
        }

        tracing::debug!(
            metric = %def.id,
            quality_score,
            completeness,
            freshness = %freshness.describe(),
            "Computed quality report"
        );

        Ok(QualityReport {
            metric_id: def.id.clone(),
            quality_score,
            freshness,
            completeness,
            issues,
        })
    }
}

fn bucket_freshness(series: &[SeriesPoint], reference: DateTime<Utc>) -> Freshness {
    let latest = match series.iter().map(|p| p.ts).max() {
        Some(ts) => ts,
        None => return Freshness::NoData,
    };
    let days = (reference - latest).num_days();
    if days <= FRESH_DAYS {
        Freshness::Current
    } else if days <= VERY_STALE_DAYS {
        Freshness::Stale { days }
    } else {
        Freshness::VeryStale
    }
}

/// Count distinct cadence slots holding at least one observation.
fn filled_slots(series: &[SeriesPoint], range: &TimeRange, slot_days: i64) -> i64 {
    let slots: BTreeSet<i64> = series
        .iter()
        .filter(|p| p.ts >= range.start && p.ts < range.end)
        .map(|p| (p.ts - range.start).num_days() / slot_days)
        .collect();
    slots.len() as i64
}
