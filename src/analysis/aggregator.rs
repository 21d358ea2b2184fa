//! Builds the full aggregation bundle for a prediction row list.
//!
//! This module runs schema detection once and then calls each aggregate
//! the detected columns support. Aggregates whose columns are absent are
//! left at their empty default.

use crate::analysis::distribution::{
    compute_categorical_distribution, compute_histogram, compute_likert_table, CategorySlice,
    ColorFamilyClassifier, HistogramBin, LikertRow,
};
use crate::analysis::groups::{
    compute_cluster_comparison, compute_cluster_distribution, compute_grouped_series,
    compute_prediction_vs_actual, ClusterComparison, FieldRef, GroupSelector, PointSeries,
};
use crate::analysis::rounds::{
    compute_evolution, compute_funnel, compute_round_breakdown, compute_round_times,
    EvolutionPoint, FunnelStage, RoundBreakdown, RoundTime,
};
use crate::analysis::stats::{compute_target_stats, compute_top_bottom, TargetStats, TopBottom};
use crate::config::{Config, FunnelStageConfig, RoundConfig};
use crate::models::{ApiResponse, HeatmapRow, PredictionRow, Target};
use crate::schema::Capabilities;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of top and bottom performers kept per target.
pub const PERFORMERS_PER_TARGET: usize = 3;

/// Target plotted against the time column in the per-group scatter.
pub const SCATTER_TARGET: Target = Target::Target1;

/// Every derived series of one row list.
///
/// A pure function of the rows and the configuration. It is rebuilt, never
/// patched, whenever the rows change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub row_count: usize,
    pub capabilities: Capabilities,
    pub target_stats: [TargetStats; 3],
    pub time_histogram: Vec<HistogramBin>,
    pub color_distribution: Vec<CategorySlice>,
    pub likert_table: Vec<LikertRow>,
    /// Time vs. predicted [`SCATTER_TARGET`], one series per group.
    pub time_vs_prediction: Vec<PointSeries>,
    pub cluster_distribution: Vec<CategorySlice>,
    pub cluster_comparison: Vec<ClusterComparison>,
    pub prediction_vs_actual: Vec<PointSeries>,
    pub top_bottom: Vec<TopBottom>,
    pub round_breakdown: Vec<RoundBreakdown>,
    pub round_times: Vec<RoundTime>,
    pub funnel: Vec<FunnelStage>,
    pub evolution: Vec<EvolutionPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub heatmap: Vec<HeatmapRow>,
}

impl AggregationResult {
    /// Whole-game counters, when the rows carry them.
    ///
    /// The total is always the last breakdown entry.
    pub fn total_breakdown(&self) -> Option<&RoundBreakdown> {
        if self.capabilities.has_total_round {
            self.round_breakdown.last()
        } else {
            None
        }
    }

    /// Per-round breakdowns, without the whole-game total.
    pub fn round_breakdowns(&self) -> &[RoundBreakdown] {
        match self.total_breakdown() {
            Some(_) => &self.round_breakdown[..self.round_breakdown.len() - 1],
            None => &self.round_breakdown,
        }
    }
}

/// Aggregates a complete service response, carrying its heatmap through.
pub fn aggregate_response(response: &ApiResponse, config: &Config) -> AggregationResult {
    let mut result = aggregate(&response.predictions, config);
    result.heatmap = response.correlation_heatmap_data.clone().unwrap_or_default();
    result
}

/// Computes every aggregate the rows support.
pub fn aggregate(rows: &[PredictionRow], config: &Config) -> AggregationResult {
    let caps = Capabilities::detect(rows, &config.columns, &config.scoring);
    let selector = GroupSelector::new(caps.cluster_columns.clone(), &config.columns.cluster_prefix);

    let mut result = AggregationResult {
        row_count: rows.len(),
        target_stats: compute_target_stats(rows),
        top_bottom: compute_top_bottom(rows, PERFORMERS_PER_TARGET),
        ..Default::default()
    };

    if let Some(ref column) = caps.time_column {
        result.time_histogram = compute_histogram(rows, column);
        result.time_vs_prediction = compute_grouped_series(
            rows,
            &selector,
            &FieldRef::Column(column.clone()),
            &FieldRef::Prediction(SCATTER_TARGET),
        );
    }

    if caps.has_color_data() {
        let classifier = ColorFamilyClassifier {
            triplet_bases: caps.color_bases.clone(),
            hex_column: caps
                .has_color_hex
                .then(|| config.columns.color_hex.clone()),
        };
        result.color_distribution = compute_categorical_distribution(rows, &classifier);
    }

    if !caps.likert_columns.is_empty() {
        result.likert_table = compute_likert_table(rows, &caps.likert_columns);
    }

    if caps.has_cluster_columns() {
        result.cluster_distribution = compute_cluster_distribution(rows, &selector);
        result.cluster_comparison = compute_cluster_comparison(rows, &selector);
    }

    if !caps.ground_truth.is_empty() {
        result.prediction_vs_actual = compute_prediction_vs_actual(rows, &caps.ground_truth);
    }

    if caps.has_round_data() {
        let rounds = present_rounds(config, &caps);
        result.round_breakdown = compute_round_breakdown(rows, &rounds);
        result.round_times = compute_round_times(rows, &rounds);
        result.evolution = compute_evolution(rows, &rounds, &selector);
    }

    if !caps.funnel_stages.is_empty() {
        let stages: Vec<&FunnelStageConfig> = config
            .scoring
            .funnel
            .iter()
            .filter(|s| caps.funnel_stages.contains(&s.name))
            .collect();
        result.funnel = compute_funnel(rows, &stages);
    }

    debug!(
        "Aggregated {} rows: {} histogram bins, {} colour families, {} groups, {} rounds",
        result.row_count,
        result.time_histogram.len(),
        result.color_distribution.len(),
        result.cluster_distribution.len(),
        result.round_breakdown.len()
    );

    result.capabilities = caps;
    result
}

/// Configured rounds whose counters are present, followed by the total.
fn present_rounds<'a>(config: &'a Config, caps: &Capabilities) -> Vec<&'a RoundConfig> {
    let mut rounds: Vec<&RoundConfig> = config
        .scoring
        .rounds
        .iter()
        .filter(|r| caps.rounds.contains(&r.name))
        .collect();

    if caps.has_total_round {
        rounds.push(&config.scoring.total);
    }

    rounds
}
