//! Analysis modules.
//!
//! `aggregator` holds the reusable statistics, `handlers` the canned
//! views built on top of them.

pub mod aggregator;
pub mod handlers;

pub use handlers::AnalysisSettings;
