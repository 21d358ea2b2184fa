//! HTTP access to the external prediction service.

pub mod predict;

pub use predict::PredictionClient;
