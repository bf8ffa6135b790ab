//! Data-access seam
//!
//! The engine never persists raw series data itself; it fetches through the
//! [`SeriesSource`] trait supplied by the embedding application. The call is
//! assumed to perform blocking I/O; failures are surfaced to the caller of
//! the single request and never retried by the engine.

use crate::error::Result;
use crate::types::{SeriesPoint, TimeRange};
use std::collections::BTreeMap;

/// Data-access collaborator: ordered observations for a metric.
///
/// Implementations must return points sorted by ascending timestamp and
/// restricted to `[range.start, range.end)`. Filters are the extracted
/// dimension -> value pairs for the request.
pub trait SeriesSource: Send + Sync {
    fn fetch_series(
        &self,
        metric_id: &str,
        range: &TimeRange,
        filters: &BTreeMap<String, String>,
    ) -> Result<Vec<SeriesPoint>>;
}

/// In-memory series store.
///
/// Used by the test suite and by embedding callers that already hold their
/// series in memory. Filters are accepted but not applied; a real source
/// would push them into its query.
#[derive(Debug, Default)]
pub struct MemorySeriesStore {
    series: BTreeMap<String, Vec<SeriesPoint>>,
}

impl MemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or extend) the series for a metric.
    pub fn insert(&mut self, metric_id: &str, points: Vec<SeriesPoint>) {
        let entry = self.series.entry(metric_id.to_string()).or_default();
        entry.extend(points);
        entry.sort_by_key(|p| p.ts);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_series(mut self, metric_id: &str, points: Vec<SeriesPoint>) -> Self {
        self.insert(metric_id, points);
        self
    }
}

impl SeriesSource for MemorySeriesStore {
    fn fetch_series(
        &self,
        metric_id: &str,
        range: &TimeRange,
        _filters: &BTreeMap<String, String>,
    ) -> Result<Vec<SeriesPoint>> {
        Ok(self
            .series
            .get(metric_id)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.ts >= range.start && p.ts < range.end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}
