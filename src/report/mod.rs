//! Report assembly and rendering.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report};

use crate::analysis::insights::{Finding, Recommendation};
use crate::analysis::{generate_findings, generate_recommendations, AggregationResult, ExecutiveSummary};
use crate::models::{PredictionRow, Target};
use crate::state::LoadedAnalysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the analysed response came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSource {
    /// Fresh upload to the prediction service.
    Upload { service_url: String },
    /// Reopened from the local history.
    History { id: u64 },
    /// Read from a saved response file.
    SavedResponse { path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub file_name: String,
    pub generated_at: DateTime<Utc>,
    pub source: ReportSource,
    /// History id the analysis was saved under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_as: Option<u64>,
    pub tool_version: String,
}

/// Predictions of one row, numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLine {
    pub row: usize,
    pub target1: Option<f64>,
    pub target2: Option<f64>,
    pub target3: Option<f64>,
}

/// Per-row predictions in response order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionTable {
    /// Rows in the response, listed or not.
    pub total_rows: usize,
    pub rows: Vec<PredictionLine>,
}

impl PredictionTable {
    /// Lists the first `limit` rows, or every row when `limit` is 0.
    pub fn from_rows(rows: &[PredictionRow], limit: usize) -> Self {
        let take = if limit == 0 { rows.len() } else { limit };
        Self {
            total_rows: rows.len(),
            rows: rows
                .iter()
                .take(take)
                .enumerate()
                .map(|(i, row)| PredictionLine {
                    row: i + 1,
                    target1: row.prediction(Target::Target1),
                    target2: row.prediction(Target::Target2),
                    target3: row.prediction(Target::Target3),
                })
                .collect(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.rows.len() < self.total_rows
    }
}

/// Everything rendered into a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: ExecutiveSummary,
    pub findings: Vec<Finding>,
    pub aggregation: AggregationResult,
    #[serde(default)]
    pub predictions: PredictionTable,
    pub recommendations: Vec<Recommendation>,
}

impl Report {
    /// Build the report of a loaded analysis.
    ///
    /// A report of a reopened history entry points back at that entry.
    /// `prediction_rows` caps the per-row table, 0 keeps every row.
    pub fn build(
        analysis: &LoadedAnalysis,
        source: ReportSource,
        saved_as: Option<u64>,
        prediction_rows: usize,
    ) -> Self {
        let summary = ExecutiveSummary::build(&analysis.file_name, &analysis.response, &analysis.result);
        let findings = generate_findings(&summary, &analysis.result);
        let recommendations = generate_recommendations(&summary, &analysis.result);

        Self {
            metadata: ReportMetadata {
                file_name: analysis.file_name.clone(),
                generated_at: Utc::now(),
                source,
                saved_as: saved_as.or(analysis.history_id),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            summary,
            findings,
            aggregation: analysis.result.clone(),
            predictions: PredictionTable::from_rows(&analysis.response.predictions, prediction_rows),
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<PredictionRow> {
        (0..n)
            .map(|i| PredictionRow {
                target1: Some(i as f64),
                target2: Some(f64::NAN),
                target3: None,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_prediction_table_limit() {
        let table = PredictionTable::from_rows(&rows(5), 2);
        assert_eq!(table.total_rows, 5);
        assert_eq!(table.rows.len(), 2);
        assert!(table.is_truncated());
        assert_eq!(table.rows[1].row, 2);
        assert_eq!(table.rows[1].target1, Some(1.0));
        assert_eq!(table.rows[1].target2, None);
    }

    #[test]
    fn test_prediction_table_zero_limit_lists_all() {
        let table = PredictionTable::from_rows(&rows(5), 0);
        assert_eq!(table.rows.len(), 5);
        assert!(!table.is_truncated());

        let table = PredictionTable::from_rows(&rows(3), 10);
        assert_eq!(table.rows.len(), 3);
        assert!(PredictionTable::from_rows(&[], 10).rows.is_empty());
    }
}
