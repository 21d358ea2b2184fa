//! Application state threaded through the command handlers.
//!
//! Each handler takes the current state by value and returns the next one.
//! The aggregation of a response is computed once when the response is
//! loaded and kept alongside it until the response is replaced.

use crate::analysis::{aggregate_response, AggregationResult};
use crate::config::Config;
use crate::models::{ApiResponse, HistoryEntry};
use tracing::debug;

/// Message shown when the service returned no predictions.
pub const EMPTY_RESULT_MESSAGE: &str =
    "The analysis finished but returned no predictions. Check that the file has the expected columns.";

/// Which screen the results are shown on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// Waiting for a file.
    #[default]
    Upload,
    /// Showing a loaded analysis.
    Results,
}

/// A response together with its aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAnalysis {
    pub file_name: String,
    pub response: ApiResponse,
    pub result: AggregationResult,
    /// Set when the analysis was reopened from the history.
    pub history_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub view: View,
    pub current: Option<LoadedAnalysis>,
    pub error: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh analysis came back from the service.
    pub fn on_analysis_complete(self, file_name: &str, response: ApiResponse, config: &Config) -> Self {
        if response.predictions.is_empty() {
            return Self {
                view: View::Upload,
                current: None,
                error: Some(EMPTY_RESULT_MESSAGE.to_string()),
            };
        }

        Self {
            view: View::Results,
            current: Some(load(file_name, response, None, config)),
            error: None,
        }
    }

    /// The upload failed. The previous results are dropped.
    pub fn on_analysis_failed(self, message: impl Into<String>) -> Self {
        Self {
            view: View::Upload,
            current: None,
            error: Some(message.into()),
        }
    }

    /// A history entry replaces whatever is loaded.
    pub fn on_history_loaded(self, entry: &HistoryEntry, config: &Config) -> Self {
        Self {
            view: View::Results,
            current: Some(load(
                &entry.file_name,
                entry.results.clone(),
                Some(entry.id),
                config,
            )),
            error: None,
        }
    }

    /// Back to an empty upload screen.
    pub fn on_new_analysis(self) -> Self {
        Self::default()
    }
}

fn load(
    file_name: &str,
    response: ApiResponse,
    history_id: Option<u64>,
    config: &Config,
) -> LoadedAnalysis {
    debug!(
        "Loading {} with {} prediction rows",
        file_name,
        response.predictions.len()
    );
    let result = aggregate_response(&response, config);

    LoadedAnalysis {
        file_name: file_name.to_string(),
        response,
        result,
        history_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SAMPLE_RESPONSE: &str = include_str!("../fixtures/sample_response.json");

    fn sample() -> ApiResponse {
        serde_json::from_str(SAMPLE_RESPONSE).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let state = AppState::new();
        assert_eq!(state.view, View::Upload);
        assert!(state.current.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_analysis_complete_loads_results() {
        let config = Config::default();
        let state = AppState::new()
            .on_analysis_failed("previous failure")
            .on_analysis_complete("sessions.csv", sample(), &config);

        assert_eq!(state.view, View::Results);
        assert!(state.error.is_none());
        let current = state.current.as_ref().unwrap();
        assert_eq!(current.file_name, "sessions.csv");
        assert_eq!(current.result.row_count, 8);
        assert_eq!(current.history_id, None);
    }

    #[test]
    fn test_empty_predictions_stay_on_upload() {
        let config = Config::default();
        let response = ApiResponse {
            total_rows: 3,
            ..Default::default()
        };
        let state = AppState::new().on_analysis_complete("empty.csv", response, &config);

        assert_eq!(state.view, View::Upload);
        assert!(state.current.is_none());
        assert_eq!(state.error.as_deref(), Some(EMPTY_RESULT_MESSAGE));
    }

    #[test]
    fn test_failure_clears_results() {
        let config = Config::default();
        let state = AppState::new()
            .on_analysis_complete("sessions.csv", sample(), &config)
            .on_analysis_failed("Cannot connect");

        assert_eq!(state.view, View::Upload);
        assert!(state.current.is_none());
        assert_eq!(state.error.as_deref(), Some("Cannot connect"));
    }

    #[test]
    fn test_history_load_replaces_response() {
        let config = Config::default();
        let mut small = sample();
        small.predictions.truncate(2);
        let entry = HistoryEntry {
            id: 4,
            timestamp: Utc::now(),
            file_name: "old.csv".to_string(),
            total_rows: small.total_rows,
            processed_rows: small.processed_rows,
            results: small,
        };

        let state = AppState::new()
            .on_analysis_complete("sessions.csv", sample(), &config)
            .on_history_loaded(&entry, &config);

        let current = state.current.as_ref().unwrap();
        assert_eq!(current.file_name, "old.csv");
        assert_eq!(current.history_id, Some(4));
        assert_eq!(current.result.row_count, 2);
        assert_eq!(current.result, aggregate_response(&entry.results, &config));
    }

    #[test]
    fn test_new_analysis_resets() {
        let config = Config::default();
        let state = AppState::new()
            .on_analysis_complete("sessions.csv", sample(), &config)
            .on_new_analysis();
        assert_eq!(state, AppState::default());
    }
}
