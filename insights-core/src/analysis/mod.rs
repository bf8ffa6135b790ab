//! Derived analyses over the metric catalog
//!
//! Comparison (statistical relationship between two metrics over a shared
//! window) and data quality (freshness, completeness, issue list). Both
//! bypass intent extraction: callers supply metric identifiers directly,
//! which are resolved against the catalog and fail loudly when absent.

pub mod compare;
pub mod quality;

pub use compare::ComparisonAnalyzer;
pub use quality::QualityChecker;
