//! Error types for insights-core

use thiserror::Error;

/// Main error type for the insights-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Metric identifier not in the catalog and no acceptable fuzzy match
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// Time phrase not covered by the resolver grammar
    #[error("unparseable time range: {0:?}")]
    UnparseableTimeRange(String),

    /// Intent has no resolved metric, so no query can be built
    #[error("unresolved intent: {0}")]
    UnresolvedIntent(String),

    /// Data-access collaborator failed; never retried by the engine
    #[error("data access failure for {metric_id}: {message}")]
    DataAccess { metric_id: String, message: String },

    /// Not enough observations to produce a meaningful result
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Catalog registration error
    #[error("catalog error: {0}")]
    Catalog(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for insights-core
pub type Result<T> = std::result::Result<T, Error>;
