//! Schema detection for uploaded spreadsheets.
//!
//! The prediction rows carry whatever columns the user uploaded. This module
//! inspects them once and records which optional analyses the data supports,
//! so the aggregation step can branch on a typed record instead of probing
//! column names ad hoc.

use crate::config::{ColumnsConfig, ScoringConfig};
use crate::models::{PredictionRow, Target};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Which optional analyses a row list supports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Total-time column used for the time histogram.
    pub time_column: Option<String>,
    /// Bases of `<base>_R/_G/_B` colour triplets.
    pub color_bases: Vec<String>,
    /// Whether the single hex colour column is present.
    pub has_color_hex: bool,
    /// Likert columns present in the first row.
    pub likert_columns: Vec<String>,
    /// One-hot cluster indicator columns, ordered by cluster number.
    pub cluster_columns: Vec<String>,
    /// Names of the rounds whose three counters are all present.
    pub rounds: Vec<String>,
    /// Whether the whole-game counters are present.
    pub has_total_round: bool,
    /// Funnel stages with at least one of their columns present.
    #[serde(default)]
    pub funnel_stages: Vec<String>,
    /// Targets whose ground-truth column is present.
    pub ground_truth: Vec<Target>,
}

impl Capabilities {
    /// Inspect a row list.
    pub fn detect(
        rows: &[PredictionRow],
        columns: &ColumnsConfig,
        scoring: &ScoringConfig,
    ) -> Self {
        let present: BTreeSet<&str> = rows
            .iter()
            .flat_map(|row| row.original_data.keys().map(String::as_str))
            .collect();

        let time_column = columns
            .time
            .iter()
            .find(|c| present.contains(c.as_str()))
            .cloned();

        let color_bases = present
            .iter()
            .filter(|k| k.starts_with(columns.color_prefix.as_str()))
            .filter_map(|k| k.strip_suffix("_R"))
            .map(str::to_string)
            .collect();

        let has_color_hex = present.contains(columns.color_hex.as_str());

        let likert_columns = match rows.first() {
            Some(first) => columns
                .likert
                .iter()
                .filter(|c| first.original_data.contains_key(c.as_str()))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let mut cluster_columns: Vec<String> = present
            .iter()
            .filter(|k| k.starts_with(columns.cluster_prefix.as_str()))
            .map(|k| k.to_string())
            .collect();
        cluster_columns.sort_by_key(|c| {
            let suffix = &c[columns.cluster_prefix.len()..];
            (suffix.parse::<u32>().unwrap_or(u32::MAX), c.clone())
        });

        let has_counters =
            |counters: [&str; 3]| counters.iter().all(|c| present.contains(c));

        let rounds = scoring
            .rounds
            .iter()
            .filter(|r| has_counters(r.counters()))
            .map(|r| r.name.clone())
            .collect();

        let has_total_round = has_counters(scoring.total.counters());

        let funnel_stages = scoring
            .funnel
            .iter()
            .filter(|stage| stage.columns.iter().any(|c| present.contains(c.as_str())))
            .map(|stage| stage.name.clone())
            .collect();

        let ground_truth = Target::ALL
            .into_iter()
            .filter(|t| present.contains(t.ground_truth_column()))
            .collect();

        let capabilities = Self {
            time_column,
            color_bases,
            has_color_hex,
            likert_columns,
            cluster_columns,
            rounds,
            has_total_round,
            funnel_stages,
            ground_truth,
        };

        debug!("Detected capabilities: {:?}", capabilities);
        capabilities
    }

    pub fn has_cluster_columns(&self) -> bool {
        !self.cluster_columns.is_empty()
    }

    pub fn has_round_data(&self) -> bool {
        !self.rounds.is_empty() || self.has_total_round
    }

    pub fn has_color_data(&self) -> bool {
        self.has_color_hex || !self.color_bases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::CellValue;

    fn row(cells: &[(&str, f64)]) -> PredictionRow {
        PredictionRow {
            original_data: cells
                .iter()
                .map(|(k, v)| (k.to_string(), CellValue::Number(*v)))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_empty() {
        let config = Config::default();
        let caps = Capabilities::detect(&[], &config.columns, &config.scoring);
        assert_eq!(caps, Capabilities::default());
        assert!(!caps.has_round_data());
        assert!(!caps.has_cluster_columns());
    }

    #[test]
    fn test_detect_columns() {
        let config = Config::default();
        let rows = vec![
            row(&[
                ("T0498", 120.0),
                ("F0705", 3.0),
                ("Cluster_10", 0.0),
                ("Cluster_2", 1.0),
                ("Cor0101_R", 10.0),
                ("Cor0101_G", 10.0),
                ("Cor0101_B", 10.0),
                ("Q0401", 5.0),
                ("Q0402", 1.0),
                ("Q0403", 0.0),
                ("Target2", 0.5),
            ]),
            row(&[("F0706", 2.0), ("Q0413", 3.0)]),
        ];

        let caps = Capabilities::detect(&rows, &config.columns, &config.scoring);
        assert_eq!(caps.time_column.as_deref(), Some("T0498"));
        assert_eq!(caps.color_bases, vec!["Cor0101"]);
        assert!(!caps.has_color_hex);
        assert!(caps.has_color_data());
        // Only the first row decides which Likert columns are shown.
        assert_eq!(caps.likert_columns, vec!["F0705"]);
        assert_eq!(caps.cluster_columns, vec!["Cluster_2", "Cluster_10"]);
        assert_eq!(caps.rounds, vec!["Round 1"]);
        assert!(!caps.has_total_round);
        assert!(caps.has_round_data());
        assert_eq!(caps.funnel_stages, vec!["Round 1", "Completed"]);
        assert_eq!(caps.ground_truth, vec![Target::Target2]);
    }

    #[test]
    fn test_time_column_preference() {
        let config = Config::default();
        let rows = vec![row(&[("T0498", 1.0), ("TempoTotal", 2.0)])];
        let caps = Capabilities::detect(&rows, &config.columns, &config.scoring);
        assert_eq!(caps.time_column.as_deref(), Some("TempoTotal"));
    }
}
