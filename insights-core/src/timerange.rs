//! Time-range resolution
//!
//! Turns phrases like "last 30 days" into concrete bounded windows
//! (inclusive start, exclusive end). Resolution is deterministic: the
//! reference instant is always an explicit parameter, never read from an
//! ambient clock, so identical inputs resolve identically in tests and in
//! production.
//!
//! ## Grammar
//!
//! | Phrase | Window |
//! |--------|--------|
//! | `last N days/weeks/months/quarters/years` | `[reference - N units, reference)` |
//! | `last week/month/quarter/year` | N = 1 |
//! | `this week/month/year` | `[period start, reference)` |
//! | `year to date`, `ytd` | `[Jan 1, reference)` |
//! | `today` | `[midnight, reference)` |
//! | `yesterday` | `[midnight - 1d, midnight)` |
//! | `[from] YYYY-MM-DD to YYYY-MM-DD` | end date exclusive (next midnight) |
//!
//! `past` is accepted as a synonym for `last`. Anything else is an
//! [`Error::UnparseableTimeRange`]; callers that must not fail fall back to
//! [`default_window`] and record the fallback in extraction notes.

use crate::error::{Error, Result};
use crate::types::TimeRange;
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

/// The documented fallback window: trailing 30 days from the reference.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Resolve a time phrase against an explicit reference instant.
pub fn resolve(phrase: &str, reference: DateTime<Utc>) -> Result<TimeRange> {
    let normalized = phrase.trim().to_lowercase();
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let (start, end) = match tokens.as_slice() {
        ["last" | "past", n, unit] => relative_window(reference, parse_count(n, phrase)?, unit, phrase)?,
        ["last" | "past", unit] => relative_window(reference, 1, unit, phrase)?,
        ["this", "week"] => (start_of_week(reference), reference),
        ["this", "month"] => (start_of_month(reference), reference),
        ["this", "year"] | ["year", "to", "date"] | ["ytd"] => (start_of_year(reference), reference),
        ["today"] => (midnight(reference.date_naive()), reference),
        ["yesterday"] => {
            let today = midnight(reference.date_naive());
            (today - chrono::Duration::days(1), today)
        }
        ["from", a, "to", b] | [a, "to", b] => absolute_window(a, b, phrase)?,
        _ => return Err(Error::UnparseableTimeRange(phrase.to_string())),
    };

    if start >= end {
        return Err(Error::UnparseableTimeRange(phrase.to_string()));
    }

    Ok(TimeRange {
        start,
        end,
        phrase: phrase.trim().to_string(),
        fallback: false,
    })
}

/// The documented default window: trailing 30 days, flagged as a fallback.
pub fn default_window(reference: DateTime<Utc>) -> TimeRange {
    TimeRange {
        start: reference - chrono::Duration::days(DEFAULT_WINDOW_DAYS),
        end: reference,
        phrase: format!("last {} days", DEFAULT_WINDOW_DAYS),
        fallback: true,
    }
}

fn parse_count(token: &str, phrase: &str) -> Result<u32> {
    let n: u32 = token
        .parse()
        .map_err(|_| Error::UnparseableTimeRange(phrase.to_string()))?;
    if n == 0 {
        return Err(Error::UnparseableTimeRange(phrase.to_string()));
    }
    Ok(n)
}

fn relative_window(
    reference: DateTime<Utc>,
    n: u32,
    unit: &str,
    phrase: &str,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = match unit.trim_end_matches('s') {
        "day" => reference - chrono::Duration::days(n as i64),
        "week" => reference - chrono::Duration::weeks(n as i64),
        "month" => sub_months(reference, n, phrase)?,
        "quarter" => sub_months(reference, n * 3, phrase)?,
        "year" => sub_months(reference, n * 12, phrase)?,
        _ => return Err(Error::UnparseableTimeRange(phrase.to_string())),
    };
    Ok((start, reference))
}

fn sub_months(reference: DateTime<Utc>, months: u32, phrase: &str) -> Result<DateTime<Utc>> {
    reference
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| Error::UnparseableTimeRange(phrase.to_string()))
}

fn absolute_window(a: &str, b: &str, phrase: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start_date = parse_date(a, phrase)?;
    let end_date = parse_date(b, phrase)?;
    // Inclusive end date on input, exclusive bound on output
    let end_exclusive = end_date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::UnparseableTimeRange(phrase.to_string()))?;
    Ok((midnight(start_date), midnight(end_exclusive)))
}

fn parse_date(token: &str, phrase: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .map_err(|_| Error::UnparseableTimeRange(phrase.to_string()))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn start_of_week(reference: DateTime<Utc>) -> DateTime<Utc> {
    let date = reference.date_naive();
    let days_from_monday = date.weekday().num_days_from_monday() as i64;
    midnight(date) - chrono::Duration::days(days_from_monday)
}

fn start_of_month(reference: DateTime<Utc>) -> DateTime<Utc> {
    let date = reference.date_naive();
    midnight(date - Days::new(date.day0() as u64))
}

fn start_of_year(reference: DateTime<Utc>) -> DateTime<Utc> {
    let date = reference.date_naive();
    midnight(date - Days::new(date.ordinal0() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        // Mid-month, mid-week (a Friday), with a time-of-day component
        Utc.with_ymd_and_hms(2025, 6, 13, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_last_n_days() {
        let range = resolve("last 30 days", reference()).unwrap();
        assert_eq!(range.end, reference());
        assert_eq!(range.days(), 30);
        assert!(!range.fallback);
        assert_eq!(range.phrase, "last 30 days");
    }

    #[test]
    fn test_past_is_synonym_for_last() {
        let a = resolve("last 2 weeks", reference()).unwrap();
        let b = resolve("past 2 weeks", reference()).unwrap();
        assert_eq!(a.start, b.start);
        assert_eq!(a.end, b.end);
    }

    #[test]
    fn test_singular_unit_means_one() {
        let range = resolve("last quarter", reference()).unwrap();
        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2025, 3, 13, 14, 30, 0).unwrap()
        );
        assert_eq!(range.end, reference());
    }

    #[test]
    fn test_last_n_months() {
        let range = resolve("last 3 months", reference()).unwrap();
        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2025, 3, 13, 14, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_this_month() {
        let range = resolve("this month", reference()).unwrap();
        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(range.end, reference());
    }

    #[test]
    fn test_this_week_starts_monday() {
        let range = resolve("this week", reference()).unwrap();
        // 2025-06-13 is a Friday; the week began Monday 2025-06-09
        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2025, 6, 9, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_year_to_date() {
        let range = resolve("year to date", reference()).unwrap();
        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        let ytd = resolve("ytd", reference()).unwrap();
        assert_eq!(ytd.start, range.start);
    }

    #[test]
    fn test_yesterday() {
        let range = resolve("yesterday", reference()).unwrap();
        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2025, 6, 12, 0, 0, 0).unwrap()
        );
        assert_eq!(
            range.end,
            Utc.with_ymd_and_hms(2025, 6, 13, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_absolute_pair_end_exclusive() {
        let range = resolve("2025-01-01 to 2025-03-31", reference()).unwrap();
        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        // Inclusive end date becomes exclusive next-midnight bound
        assert_eq!(
            range.end,
            Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()
        );

        let with_from = resolve("from 2025-01-01 to 2025-03-31", reference()).unwrap();
        assert_eq!(with_from.start, range.start);
        assert_eq!(with_from.end, range.end);
    }

    #[test]
    fn test_unparseable_phrases() {
        for phrase in ["next 5 days", "whenever", "last zero days", "last 0 days", ""] {
            assert!(
                matches!(
                    resolve(phrase, reference()),
                    Err(Error::UnparseableTimeRange(_))
                ),
                "expected failure for {:?}",
                phrase
            );
        }
    }

    #[test]
    fn test_inverted_absolute_pair_rejected() {
        assert!(resolve("2025-03-31 to 2025-01-01", reference()).is_err());
    }

    #[test]
    fn test_default_window() {
        let range = default_window(reference());
        assert_eq!(range.days(), DEFAULT_WINDOW_DAYS);
        assert_eq!(range.end, reference());
        assert!(range.fallback);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = resolve("last 90 days", reference()).unwrap();
        let b = resolve("last 90 days", reference()).unwrap();
        assert_eq!(a, b);
    }
}
