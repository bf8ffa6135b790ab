//! Confidence scoring
//!
//! The confidence attached to an answer is a transparent formula over three
//! named inputs, not an opaque model output. All weights are fixed constants
//! so scores are reproducible and comparable across runs:
//!
//! ```text
//! confidence = 0.60 * metric_similarity
//!            + 0.25 * time_component      (1.0 explicit, 0.4 defaulted)
//!            + 0.15 * filter_component    (1.0 - 0.5 per ambiguous filter)
//! ```
//!
//! An unresolved metric bypasses the formula entirely and pins the score to
//! [`LOW_CONFIDENCE`]. The result is clamped to [0,1].

use crate::types::Intent;

/// Weight of the metric-match similarity.
pub const WEIGHT_METRIC: f64 = 0.60;

/// Weight of the time-phrase component.
pub const WEIGHT_TIME: f64 = 0.25;

/// Weight of the filter component.
pub const WEIGHT_FILTERS: f64 = 0.15;

/// Time component when the window came from the documented default.
pub const DEFAULTED_TIME_COMPONENT: f64 = 0.4;

/// Penalty per filter value that matched more than one dimension.
pub const AMBIGUOUS_FILTER_PENALTY: f64 = 0.5;

/// Fixed score for answers produced from an unresolved intent.
pub const LOW_CONFIDENCE: f64 = 0.1;

/// Score an intent.
///
/// Deterministic: depends only on the intent's recorded similarity, whether
/// its window was defaulted, and its ambiguous-filter count.
pub fn confidence(intent: &Intent) -> f64 {
    if !intent.is_resolved() {
        return LOW_CONFIDENCE;
    }

    let time_component = if intent.range.fallback {
        DEFAULTED_TIME_COMPONENT
    } else {
        1.0
    };

    let filter_component =
        (1.0 - AMBIGUOUS_FILTER_PENALTY * intent.ambiguous_filters as f64).max(0.0);

    let score = WEIGHT_METRIC * intent.similarity
        + WEIGHT_TIME * time_component
        + WEIGHT_FILTERS * filter_component;

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeRange;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn intent(similarity: f64, fallback: bool, ambiguous_filters: usize) -> Intent {
        Intent {
            metric_id: Some("m".to_string()),
            range: TimeRange {
                start: Utc.with_ymd_and_hms(2025, 5, 14, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2025, 6, 13, 0, 0, 0).unwrap(),
                phrase: "last 30 days".to_string(),
                fallback,
            },
            filters: BTreeMap::new(),
            similarity,
            candidates: vec![],
            ambiguous_filters,
            notes: vec![],
        }
    }

    #[test]
    fn test_exact_match_explicit_time_is_full_confidence() {
        let score = confidence(&intent(1.0, false, 0));
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_exact_match_defaulted_time_stays_above_threshold() {
        // 0.60 + 0.25*0.4 + 0.15 = 0.85
        let score = confidence(&intent(1.0, true, 0));
        assert!((score - 0.85).abs() < 1e-9);
        assert!(score > 0.8);
    }

    #[test]
    fn test_ambiguous_filters_penalized() {
        let none = confidence(&intent(1.0, false, 0));
        let one = confidence(&intent(1.0, false, 1));
        let three = confidence(&intent(1.0, false, 3));
        assert!(one < none);
        assert!((none - one - 0.075).abs() < 1e-9);
        // Filter component floors at zero
        assert!((three - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_unresolved_intent_is_low_confidence() {
        let mut unresolved = intent(0.0, true, 0);
        unresolved.metric_id = None;
        assert_eq!(confidence(&unresolved), LOW_CONFIDENCE);
    }

    #[test]
    fn test_score_is_deterministic() {
        let a = confidence(&intent(0.7, false, 1));
        let b = confidence(&intent(0.7, false, 1));
        assert_eq!(a, b);
    }
}
