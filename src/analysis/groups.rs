//! Cluster-grouped series.
//!
//! Rows are assigned to a group through one-hot indicator columns
//! (`Cluster_0`, `Cluster_1`, ...). A row with no indicator set lands in the
//! [`UNGROUPED`] bucket instead of being dropped.

use crate::analysis::distribution::CategorySlice;
use crate::analysis::stats::mean;
use crate::models::{PredictionRow, Target};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of the bucket for rows without a group.
pub const UNGROUPED: &str = "Ungrouped";

const GROUP_PALETTE: [&str; 8] = [
    "#8b5cf6", "#3b82f6", "#22c55e", "#f97316", "#ef4444", "#06b6d4", "#eab308", "#d946ef",
];
const UNGROUPED_COLOR: &str = "#9ca3af";

/// Assigns rows to groups by their first set indicator column.
#[derive(Debug, Clone, Default)]
pub struct GroupSelector {
    columns: Vec<String>,
    prefix: String,
}

impl GroupSelector {
    /// `columns` must already be in display order.
    pub fn new(columns: Vec<String>, prefix: &str) -> Self {
        Self {
            columns,
            prefix: prefix.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Display label of an indicator column, e.g. `Cluster_2` -> `Cluster 2`.
    pub fn label(&self, column: &str) -> String {
        match column.strip_prefix(&self.prefix) {
            Some(suffix) if !suffix.is_empty() => format!("Cluster {}", suffix),
            _ => column.to_string(),
        }
    }

    /// Index of the row's group in `columns`, `None` when ungrouped.
    fn group_index(&self, row: &PredictionRow) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| row.cell(c).map(|v| v.is_set()).unwrap_or(false))
    }

    /// Splits rows into labelled groups.
    ///
    /// Groups follow indicator order with the ungrouped bucket last. Empty
    /// groups are omitted. Rows keep their input order and 1-based position.
    pub fn partition<'a>(&self, rows: &'a [PredictionRow]) -> Vec<Group<'a>> {
        let mut buckets: Vec<Vec<(usize, &'a PredictionRow)>> =
            vec![Vec::new(); self.columns.len() + 1];

        for (i, row) in rows.iter().enumerate() {
            let slot = self.group_index(row).unwrap_or(self.columns.len());
            buckets[slot].push((i + 1, row));
        }

        buckets
            .into_iter()
            .enumerate()
            .filter(|(_, members)| !members.is_empty())
            .map(|(slot, members)| {
                let label = match self.columns.get(slot) {
                    Some(column) => self.label(column),
                    None => UNGROUPED.to_string(),
                };
                Group {
                    label,
                    color: group_color(slot, self.columns.len()),
                    members,
                }
            })
            .collect()
    }
}

fn group_color(slot: usize, group_count: usize) -> &'static str {
    if slot == group_count {
        UNGROUPED_COLOR
    } else {
        GROUP_PALETTE[slot % GROUP_PALETTE.len()]
    }
}

/// Rows belonging to one group.
#[derive(Debug, Clone)]
pub struct Group<'a> {
    pub label: String,
    pub color: &'static str,
    /// `(1-based row number, row)` pairs in input order.
    pub members: Vec<(usize, &'a PredictionRow)>,
}

/// A numeric field of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    /// Predicted value of a target.
    Prediction(Target),
    /// Numeric input column.
    Column(String),
}

impl FieldRef {
    pub fn value(&self, row: &PredictionRow) -> Option<f64> {
        match self {
            FieldRef::Prediction(target) => row.prediction(*target),
            FieldRef::Column(column) => row.number(column),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Prediction(target) => write!(f, "Predicted {}", target),
            FieldRef::Column(column) => write!(f, "{}", column),
        }
    }
}

/// A scatter point tied to its source row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// 1-based row number.
    pub row: usize,
}

/// A named scatter series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSeries {
    pub id: String,
    pub points: Vec<Point>,
}

/// One scatter series per group.
///
/// A point is kept only when both coordinates are present and
/// non-negative. Groups without a single valid point produce no series.
pub fn compute_grouped_series(
    rows: &[PredictionRow],
    selector: &GroupSelector,
    x: &FieldRef,
    y: &FieldRef,
) -> Vec<PointSeries> {
    selector
        .partition(rows)
        .into_iter()
        .filter_map(|group| {
            let points: Vec<Point> = group
                .members
                .iter()
                .filter_map(|(n, row)| match (x.value(row), y.value(row)) {
                    (Some(px), Some(py)) if px >= 0.0 && py >= 0.0 => Some(Point {
                        x: px,
                        y: py,
                        row: *n,
                    }),
                    _ => None,
                })
                .collect();

            (!points.is_empty()).then(|| PointSeries {
                id: group.label,
                points,
            })
        })
        .collect()
}

/// Row count per group.
pub fn compute_cluster_distribution(
    rows: &[PredictionRow],
    selector: &GroupSelector,
) -> Vec<CategorySlice> {
    selector
        .partition(rows)
        .into_iter()
        .map(|group| CategorySlice {
            id: group.label.clone(),
            label: group.label,
            value: group.members.len(),
            color: group.color.to_string(),
        })
        .collect()
}

/// Average predictions of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterComparison {
    pub group: String,
    pub rows: usize,
    /// Mean prediction per target, `None` when no row of the group has one.
    pub means: [Option<f64>; 3],
}

/// Per-group mean prediction of every target.
pub fn compute_cluster_comparison(
    rows: &[PredictionRow],
    selector: &GroupSelector,
) -> Vec<ClusterComparison> {
    selector
        .partition(rows)
        .into_iter()
        .map(|group| {
            let means = Target::ALL.map(|target| {
                let values: Vec<f64> = group
                    .members
                    .iter()
                    .filter_map(|(_, r)| r.prediction(target))
                    .collect();
                (!values.is_empty()).then(|| mean(&values))
            });
            ClusterComparison {
                rows: group.members.len(),
                group: group.label,
                means,
            }
        })
        .collect()
}

/// `(actual, predicted)` series for targets that carry a ground truth.
pub fn compute_prediction_vs_actual(rows: &[PredictionRow], targets: &[Target]) -> Vec<PointSeries> {
    targets
        .iter()
        .filter_map(|&target| {
            let points: Vec<Point> = rows
                .iter()
                .enumerate()
                .filter_map(|(i, row)| {
                    Some(Point {
                        x: row.actual(target)?,
                        y: row.prediction(target)?,
                        row: i + 1,
                    })
                })
                .collect();

            (!points.is_empty()).then(|| PointSeries {
                id: target.to_string(),
                points,
            })
        })
        .collect()
}
