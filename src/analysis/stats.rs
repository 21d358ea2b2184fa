//! Per-target prediction statistics.

use crate::models::{PredictionRow, Target};
use serde::{Deserialize, Serialize};

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the population standard deviation given a pre-computed mean.
/// Returns 0.0 for fewer than two values.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// Percentage of `part` in `total`, 0 when `total` is not positive.
pub fn pct(part: f64, total: f64) -> f64 {
    if total <= 0.0 {
        0.0
    } else {
        part / total * 100.0
    }
}

/// Summary statistics of one prediction target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetStats {
    pub target: Option<Target>,
    /// Sum of present predictions divided by the number of rows.
    pub mean: f64,
    /// Population standard deviation of the present predictions.
    pub std: f64,
    /// Rows that carried a prediction for this target.
    pub count: usize,
}

/// Mean and standard deviation of each target.
///
/// Rows without a prediction for a target are left out of that target's
/// standard deviation and count, independently of the other targets.
pub fn compute_target_stats(rows: &[PredictionRow]) -> [TargetStats; 3] {
    Target::ALL.map(|target| {
        let values: Vec<f64> = rows.iter().filter_map(|r| r.prediction(target)).collect();

        let mean_over_rows = if rows.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / rows.len() as f64
        };

        TargetStats {
            target: Some(target),
            mean: mean_over_rows,
            std: stddev(&values, mean(&values)),
            count: values.len(),
        }
    })
}

/// A single ranked prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Performer {
    /// 1-based position of the row in the upload.
    pub row: usize,
    pub value: f64,
}

/// Highest and lowest predictions of one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopBottom {
    pub target: Option<Target>,
    /// Highest first.
    pub top: Vec<Performer>,
    /// Lowest first.
    pub bottom: Vec<Performer>,
}

/// The `n` highest and `n` lowest predictions of every target.
pub fn compute_top_bottom(rows: &[PredictionRow], n: usize) -> Vec<TopBottom> {
    Target::ALL
        .into_iter()
        .map(|target| {
            let mut ranked: Vec<Performer> = rows
                .iter()
                .enumerate()
                .filter_map(|(i, r)| {
                    r.prediction(target).map(|value| Performer { row: i + 1, value })
                })
                .collect();

            // Stable sort keeps file order among equal predictions.
            ranked.sort_by(|a, b| b.value.total_cmp(&a.value));

            let top = ranked.iter().take(n).copied().collect();
            let bottom = ranked.iter().rev().take(n).copied().collect();

            TopBottom {
                target: Some(target),
                top,
                bottom,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(t1: Option<f64>, t2: Option<f64>, t3: Option<f64>) -> PredictionRow {
        PredictionRow {
            target1: t1,
            target2: t2,
            target3: t3,
            ..Default::default()
        }
    }

    #[test]
    fn test_mean_and_stddev() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[2.0, 4.0]), 3.0);
        assert_eq!(stddev(&[5.0], 5.0), 0.0);
        assert_eq!(stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 5.0), 2.0);
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(pct(10.0, 0.0), 0.0);
        assert_eq!(pct(1.0, 4.0), 25.0);
    }

    #[test]
    fn test_target_stats_empty() {
        let stats = compute_target_stats(&[]);
        for s in stats {
            assert_eq!(s.mean, 0.0);
            assert_eq!(s.std, 0.0);
            assert_eq!(s.count, 0);
        }
    }

    #[test]
    fn test_target_stats_missing_values_are_per_target() {
        let rows = vec![
            row(Some(2.0), Some(10.0), None),
            row(Some(4.0), None, None),
            row(None, Some(20.0), Some(1.0)),
        ];

        let [t1, t2, t3] = compute_target_stats(&rows);
        assert!((t1.mean - 2.0).abs() < 1e-9); // (2 + 4) / 3 rows
        assert!((t1.std - 1.0).abs() < 1e-9);
        assert_eq!(t1.count, 2);
        assert!((t2.mean - 10.0).abs() < 1e-9);
        assert!((t2.std - 5.0).abs() < 1e-9);
        assert_eq!(t3.count, 1);
        assert_eq!(t3.std, 0.0);
    }

    #[test]
    fn test_target_stats_order_invariant() {
        let rows = vec![
            row(Some(1.5), Some(3.0), Some(7.0)),
            row(Some(9.25), None, Some(2.0)),
            row(None, Some(4.5), Some(0.5)),
            row(Some(3.0), Some(8.0), None),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();
        let mut rotated = rows.clone();
        rotated.rotate_left(1);

        let base = compute_target_stats(&rows);
        for other in [compute_target_stats(&reversed), compute_target_stats(&rotated)] {
            for (a, b) in base.iter().zip(other.iter()) {
                assert!((a.mean - b.mean).abs() < 1e-9);
                assert!((a.std - b.std).abs() < 1e-9);
                assert_eq!(a.count, b.count);
            }
        }
    }

    #[test]
    fn test_top_bottom() {
        let rows = vec![
            row(Some(5.0), None, None),
            row(Some(1.0), None, None),
            row(Some(9.0), None, None),
            row(None, None, None),
            row(Some(3.0), None, None),
        ];

        let ranked = compute_top_bottom(&rows, 3);
        assert_eq!(ranked.len(), 3);

        let t1 = &ranked[0];
        let top: Vec<usize> = t1.top.iter().map(|p| p.row).collect();
        let bottom: Vec<usize> = t1.bottom.iter().map(|p| p.row).collect();
        assert_eq!(top, vec![3, 1, 5]);
        assert_eq!(bottom, vec![2, 5, 1]);
        assert!(ranked[1].top.is_empty());
    }
}
