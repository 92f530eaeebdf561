//! # Cumulative Series Engine
//!
//! Turns the raw records of one dataset into per-group cumulative series and
//! a summary table.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** no I/O and no knowledge of the exchange. Depends only on
//!   `core-types`.
//! - **Profile driven:** an `AggregationProfile` says how a dataset is grouped,
//!   which timestamp orders it and which metrics accumulate. The engine itself
//!   is dataset-agnostic.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: aggregates records and summarizes the result.
//! - `GroupedSeries` / `Series`: the cumulative series, keyed by group.
//! - `Summary`: final totals per group, combined row last.

pub mod engine;
pub mod error;
pub mod profile;
pub mod report;
pub mod series;

pub use engine::{AnalyticsEngine, filter_records};
pub use error::AnalyticsError;
pub use profile::{AggregationProfile, Metric};
pub use report::{GroupSummary, Summary};
pub use series::{ALL_KEY, GroupedSeries, Series, SeriesPoint, UNKNOWN_KEY};
