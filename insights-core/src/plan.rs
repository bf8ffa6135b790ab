//! Query plan building
//!
//! Renders an [`Intent`] into a concrete [`QueryPlan`] from the metric's
//! registered template. Rendering is a pure function of the intent and the
//! catalog state: the same intent against the same catalog always yields
//! byte-identical query text. Filters iterate in `BTreeMap` order and
//! timestamps use one fixed format, so there is no hidden nondeterminism.

use crate::catalog::MetricCatalog;
use crate::error::{Error, Result};
use crate::types::{Intent, QueryPlan, TimeRange};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Timestamp format used for `{start}` / `{end}` substitution.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Build a deterministic plan for a resolved intent.
///
/// Fails with [`Error::UnresolvedIntent`] when the intent carries no
/// metric; callers answering questions must catch that case and explain
/// the ambiguity instead of guessing a query.
pub fn build_plan(intent: &Intent, catalog: &MetricCatalog) -> Result<QueryPlan> {
    let metric_id = intent
        .metric_id
        .as_deref()
        .ok_or_else(|| Error::UnresolvedIntent("no metric resolved from question".to_string()))?;

    let def = catalog.lookup(metric_id)?;
    let sql = render(&def.query_template, &intent.range, &intent.filters);

    Ok(QueryPlan {
        metric_id: metric_id.to_string(),
        sql,
        range: intent.range.clone(),
        filters: intent.filters.clone(),
    })
}

fn render(template: &str, range: &TimeRange, filters: &BTreeMap<String, String>) -> String {
    template
        .replace("{start}", &format_ts(range.start))
        .replace("{end}", &format_ts(range.end))
        .replace("{filters}", &render_filters(filters))
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// `" AND dim = 'value'"` per filter, in dimension order.
fn render_filters(filters: &BTreeMap<String, String>) -> String {
    filters
        .iter()
        .map(|(dim, value)| format!(" AND {} = '{}'", dim, value.replace('\'', "''")))
        .collect()
}
