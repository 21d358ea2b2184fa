//! Data models for the analytics dashboard.
//!
//! This module contains the wire types exchanged with the prediction
//! service and the records kept in the local analysis history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the three prediction targets produced by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Target1,
    Target2,
    Target3,
}

impl Target {
    /// All targets in display order.
    pub const ALL: [Target; 3] = [Target::Target1, Target::Target2, Target::Target3];

    /// Position of the target in `ALL`.
    pub fn index(&self) -> usize {
        match self {
            Target::Target1 => 0,
            Target::Target2 => 1,
            Target::Target3 => 2,
        }
    }

    /// Column holding the ground truth, when the uploaded file carries it.
    pub fn ground_truth_column(&self) -> &'static str {
        match self {
            Target::Target1 => "Target1",
            Target::Target2 => "Target2",
            Target::Target3 => "Target3",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Target1 => write!(f, "Target 1"),
            Target::Target2 => write!(f, "Target 2"),
            Target::Target3 => write!(f, "Target 3"),
        }
    }
}

/// A scalar cell from the uploaded spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl CellValue {
    /// Returns the value if the cell holds a finite number.
    ///
    /// Text that merely looks like a number is not coerced.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// Whether the cell marks membership in a one-hot indicator column.
    pub fn is_set(&self) -> bool {
        match self {
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::Bool(b) => *b,
            CellValue::Text(s) => {
                let s = s.trim();
                s == "1" || s.eq_ignore_ascii_case("true")
            }
            CellValue::Null => false,
        }
    }

    /// String form used when bucketing ordinal responses.
    pub fn as_key(&self) -> String {
        match self {
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Null => "null".to_string(),
        }
    }
}

/// Formats a number without a trailing `.0` when it is integral.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One analyzed record returned by the prediction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// Predicted value for target 1.
    #[serde(rename = "PREDICAO_Target1", default)]
    pub target1: Option<f64>,
    /// Predicted value for target 2.
    #[serde(rename = "PREDICAO_Target2", default)]
    pub target2: Option<f64>,
    /// Predicted value for target 3.
    #[serde(rename = "PREDICAO_Target3", default)]
    pub target3: Option<f64>,
    /// The original input columns of the row.
    #[serde(default)]
    pub original_data: BTreeMap<String, CellValue>,
}

impl PredictionRow {
    /// Returns the finite prediction for a target, if any.
    pub fn prediction(&self, target: Target) -> Option<f64> {
        let value = match target {
            Target::Target1 => self.target1,
            Target::Target2 => self.target2,
            Target::Target3 => self.target3,
        };
        value.filter(|v| v.is_finite())
    }

    /// Returns the raw cell for a column.
    pub fn cell(&self, column: &str) -> Option<&CellValue> {
        self.original_data.get(column)
    }

    /// Returns a column's value when it is a finite number.
    pub fn number(&self, column: &str) -> Option<f64> {
        self.cell(column).and_then(CellValue::as_number)
    }

    /// Returns the ground-truth value for a target, if the file carries it.
    pub fn actual(&self, target: Target) -> Option<f64> {
        self.number(target.ground_truth_column())
    }
}

/// One cell of the correlation heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub x: String,
    pub y: f64,
}

/// One row (feature) of the correlation heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRow {
    /// Feature name.
    pub id: String,
    pub data: Vec<HeatmapCell>,
}

/// Full response of the prediction endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Number of rows in the uploaded file.
    pub total_rows: usize,
    /// Number of rows the service managed to predict.
    pub processed_rows: usize,
    /// Prediction rows, in file order.
    #[serde(default)]
    pub predictions: Vec<PredictionRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2_score_target1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2_score_target2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2_score_target3: Option<f64>,
    /// Optional feature correlation matrix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_heatmap_data: Option<Vec<HeatmapRow>>,
}

impl ApiResponse {
    /// Returns the R² score reported for a target.
    pub fn r2_score(&self, target: Target) -> Option<f64> {
        match target {
            Target::Target1 => self.r2_score_target1,
            Target::Target2 => self.r2_score_target2,
            Target::Target3 => self.r2_score_target3,
        }
        .filter(|v| v.is_finite())
    }
}

/// A persisted analysis in the local history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Auto-incremented identifier.
    pub id: u64,
    /// When the analysis was saved.
    pub timestamp: DateTime<Utc>,
    /// Name of the analyzed file.
    pub file_name: String,
    pub total_rows: usize,
    pub processed_rows: usize,
    /// The complete service response.
    pub results: ApiResponse,
}
