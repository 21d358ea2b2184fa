//! Aggregation of prediction rows into chart-ready series.
//!
//! Every function in this module is pure: it reads the row list and returns
//! new values without touching the network or the filesystem. Missing
//! optional columns yield empty series, never errors.

pub mod aggregator;
pub mod distribution;
pub mod groups;
pub mod insights;
pub mod rounds;
pub mod stats;

pub use aggregator::{aggregate, aggregate_response, AggregationResult};
pub use insights::{generate_findings, generate_recommendations, ExecutiveSummary};
