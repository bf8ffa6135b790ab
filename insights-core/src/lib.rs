//! # insights-core
//!
//! Core library for insights - a deterministic natural-language metrics
//! engine.
//!
//! This library provides:
//! - A read-only metric catalog with ranked free-text search
//! - Deterministic time-range resolution with an explicit reference instant
//! - Intent extraction, query planning, and transparent confidence scoring
//! - Metric comparison and data-quality analysis
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! A question flows through four stages:
//! - **Extract:** the intent extractor consults the catalog and the
//!   time-range resolver to build an immutable [`Intent`]
//! - **Score:** confidence is a fixed formula over the intent, never an
//!   opaque model output
//! - **Plan:** the plan builder renders byte-stable query text from the
//!   metric's registered template
//! - **Execute:** series are fetched through the [`SeriesSource`]
//!   collaborator and packaged into an explained [`Answer`]
//!
//! Comparison and quality checks bypass extraction and resolve catalog
//! entries directly from supplied identifiers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use insights_core::{InsightsEngine, MemorySeriesStore, MetricCatalog};
//!
//! let catalog = MetricCatalog::with_builtin();
//! let source = Box::new(MemorySeriesStore::new());
//! let engine = InsightsEngine::new(catalog, source);
//!
//! let answer = engine
//!     .ask_question("What are total subscribers?", Some("last 30 days"), Utc::now())
//!     .expect("data access failed");
//! println!("{} (confidence {:.2})", answer.text, answer.confidence);
//! ```

// Re-export commonly used items at the crate root
pub use cache::AnswerCache;
pub use catalog::{MatchOutcome, MetricCatalog};
pub use config::Config;
pub use data::{MemorySeriesStore, SeriesSource};
pub use engine::InsightsEngine;
pub use error::{Error, Result};
pub use intent::IntentExtractor;
pub use types::*;

// Public modules
pub mod analysis;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod intent;
pub mod logging;
pub mod plan;
pub mod scoring;
pub mod timerange;
pub mod types;
