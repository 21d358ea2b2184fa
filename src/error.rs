//! Errors surfaced by the prediction call.

use thiserror::Error;

/// Failure modes of an upload to the prediction service.
///
/// Every variant is shown to the user as a single message; none is retried.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Cannot connect to the prediction service at {url}")]
    Connect { url: String },

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Failed to process the file: {detail}")]
    Status { status: u16, detail: String },

    #[error("Unexpected response from the prediction service: {0}")]
    Decode(String),

    #[error("Failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("The analysis finished but returned no predictions")]
    EmptyResult,

    #[error("Request failed: {0}")]
    Transport(String),
}

impl PredictError {
    /// Whether the error is the soft "no predictions" outcome.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, PredictError::EmptyResult)
    }
}
