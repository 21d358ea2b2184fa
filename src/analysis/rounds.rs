//! Round-level aggregates: response breakdown, times, funnel and evolution.

use crate::analysis::groups::GroupSelector;
use crate::analysis::stats::{mean, pct};
use crate::config::{FunnelStageConfig, RoundConfig};
use crate::models::PredictionRow;
use serde::{Deserialize, Serialize};

/// Hits, errors and omissions of one round across all rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundBreakdown {
    pub round: String,
    pub hits: f64,
    pub errors: f64,
    pub omissions: f64,
    pub hit_pct: f64,
    pub error_pct: f64,
    pub omission_pct: f64,
}

impl RoundBreakdown {
    pub fn answered(&self) -> f64 {
        self.hits + self.errors + self.omissions
    }
}

/// Sums each counter over all rows, then takes percentages of the grand
/// total. Percentages are aggregate shares, not averages of per-row shares.
pub fn compute_round_breakdown(rows: &[PredictionRow], rounds: &[&RoundConfig]) -> Vec<RoundBreakdown> {
    if rows.is_empty() {
        return Vec::new();
    }

    rounds
        .iter()
        .map(|round| {
            let sum = |column: &str| -> f64 { rows.iter().filter_map(|r| r.number(column)).sum() };

            let hits = sum(&round.hits);
            let errors = sum(&round.errors);
            let omissions = sum(&round.omissions);
            let total = hits + errors + omissions;

            RoundBreakdown {
                round: round.name.clone(),
                hits,
                errors,
                omissions,
                hit_pct: pct(hits, total),
                error_pct: pct(errors, total),
                omission_pct: pct(omissions, total),
            }
        })
        .collect()
}

/// Average time spent in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTime {
    pub round: String,
    pub mean_seconds: f64,
    /// Rows with a numeric time.
    pub count: usize,
}

/// Mean round time over rows that recorded one. Rounds without a time
/// column, or without any numeric value, are left out.
pub fn compute_round_times(rows: &[PredictionRow], rounds: &[&RoundConfig]) -> Vec<RoundTime> {
    rounds
        .iter()
        .filter_map(|round| {
            let column = round.time.as_deref()?;
            let values: Vec<f64> = rows.iter().filter_map(|r| r.number(column)).collect();
            if values.is_empty() {
                return None;
            }
            Some(RoundTime {
                round: round.name.clone(),
                mean_seconds: mean(&values),
                count: values.len(),
            })
        })
        .collect()
}

/// One funnel step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage: String,
    pub count: usize,
    /// Share of the first stage's count, in `[0, 100]`.
    pub percentage: f64,
}

/// Counts rows reaching each stage.
///
/// Each stage counts the rows whose stage columns sum to more than zero,
/// independently of the other stages. Percentages are shares of the first
/// stage's count, capped at 100 when a later stage outnumbers it.
pub fn compute_funnel(rows: &[PredictionRow], stages: &[&FunnelStageConfig]) -> Vec<FunnelStage> {
    if rows.is_empty() {
        return Vec::new();
    }

    let counts: Vec<usize> = stages
        .iter()
        .map(|stage| {
            rows.iter()
                .filter(|row| {
                    let score: f64 = stage.columns.iter().filter_map(|c| row.number(c)).sum();
                    score > 0.0
                })
                .count()
        })
        .collect();

    let first = counts.first().copied().unwrap_or(0);
    stages
        .iter()
        .zip(counts)
        .map(|(stage, count)| FunnelStage {
            stage: stage.name.clone(),
            count,
            percentage: pct(count as f64, first as f64).min(100.0),
        })
        .collect()
}

/// Percentage drop from the previous stage, for each stage after the first.
pub fn funnel_drop_offs(funnel: &[FunnelStage]) -> Vec<(String, f64)> {
    funnel
        .windows(2)
        .map(|w| {
            let drop = if w[0].count == 0 {
                0.0
            } else {
                w[0].count.saturating_sub(w[1].count) as f64 / w[0].count as f64 * 100.0
            };
            (w[1].stage.clone(), drop)
        })
        .collect()
}

/// Normalised score of one group in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupScore {
    pub group: String,
    pub score: f64,
    pub rows: usize,
}

/// Normalised scores of one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionPoint {
    pub round: String,
    /// The maximum the hits were normalised against.
    pub round_max: f64,
    /// Whether `round_max` came from the data rather than configuration.
    pub observed_max: bool,
    pub overall: f64,
    pub groups: Vec<GroupScore>,
}

/// Average `hits / round_max * 100` per round, overall and per group.
///
/// `round_max` is the configured maximum score of the round, or the highest
/// value observed in the data when none is configured. Rounds whose maximum
/// is not positive are skipped, as are rows without a numeric hit count.
pub fn compute_evolution(
    rows: &[PredictionRow],
    rounds: &[&RoundConfig],
    selector: &GroupSelector,
) -> Vec<EvolutionPoint> {
    let groups = if selector.is_empty() {
        Vec::new()
    } else {
        selector.partition(rows)
    };

    rounds
        .iter()
        .filter_map(|round| {
            let column = round.hits.as_str();
            let values: Vec<f64> = rows.iter().filter_map(|r| r.number(column)).collect();

            let observed = values.iter().copied().reduce(f64::max)?;
            let configured = round.max_score.filter(|m| *m > 0.0);
            let round_max = configured.unwrap_or(observed);
            if round_max <= 0.0 {
                return None;
            }

            let normalised = |vs: &[f64]| mean(&vs.iter().map(|v| v / round_max * 100.0).collect::<Vec<_>>());

            let group_scores = groups
                .iter()
                .filter_map(|group| {
                    let vs: Vec<f64> = group
                        .members
                        .iter()
                        .filter_map(|(_, r)| r.number(column))
                        .collect();
                    (!vs.is_empty()).then(|| GroupScore {
                        group: group.label.clone(),
                        score: normalised(&vs),
                        rows: vs.len(),
                    })
                })
                .collect();

            Some(EvolutionPoint {
                round: round.name.clone(),
                round_max,
                observed_max: configured.is_none(),
                overall: normalised(&values),
                groups: group_scores,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
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
    fn test_breakdown_uses_aggregate_totals() {
        let scoring = ScoringConfig::default();
        let rows = vec![
            row(&[("Q0401", 40.0), ("Q0402", 5.0), ("Q0403", 0.0)]),
            row(&[("Q0401", 20.0), ("Q0402", 0.0), ("Q0403", 0.0)]),
        ];

        let breakdown = compute_round_breakdown(&rows, &[&scoring.rounds[0]]);
        let r1 = &breakdown[0];
        assert_eq!(r1.hits, 60.0);
        assert_eq!(r1.errors, 5.0);
        assert_eq!(r1.omissions, 0.0);
        assert!((r1.hit_pct - 60.0 / 65.0 * 100.0).abs() < 1e-9);
        assert!((r1.error_pct - 5.0 / 65.0 * 100.0).abs() < 1e-9);
        assert_eq!(r1.omission_pct, 0.0);
        assert_eq!(r1.answered(), 65.0);
    }

    #[test]
    fn test_breakdown_zero_total() {
        let scoring = ScoringConfig::default();
        let rows = vec![row(&[("Q0401", 0.0), ("Q0402", 0.0), ("Q0403", 0.0)])];
        let breakdown = compute_round_breakdown(&rows, &[&scoring.rounds[0]]);
        assert_eq!(breakdown[0].hit_pct, 0.0);
        assert!(compute_round_breakdown(&[], &[&scoring.rounds[0]]).is_empty());
    }

    #[test]
    fn test_round_times() {
        let scoring = ScoringConfig::default();
        let rows = vec![
            row(&[("T0404", 30.0), ("T0408", 10.0)]),
            row(&[("T0404", 50.0)]),
        ];
        let rounds: Vec<&RoundConfig> = scoring.rounds.iter().collect();

        let times = compute_round_times(&rows, &rounds);
        assert_eq!(times.len(), 2);
        assert_eq!(times[0].mean_seconds, 40.0);
        assert_eq!(times[0].count, 2);
        assert_eq!(times[1].round, "Round 2");
        assert_eq!(times[1].mean_seconds, 10.0);
    }

    #[test]
    fn test_funnel_counts_each_stage_independently() {
        let scoring = ScoringConfig::default();
        let stages: Vec<&FunnelStageConfig> = scoring.funnel.iter().collect();
        let rows = vec![
            row(&[("Q0401", 3.0), ("Q0405", 2.0), ("Q0409", 1.0), ("Q0413", 6.0)]),
            row(&[("Q0401", 3.0), ("Q0405", 1.0)]),
            row(&[("Q0402", 1.0)]),
            // Skipped round 1 but still counts for the later stages.
            row(&[("Q0405", 4.0), ("Q0409", 2.0), ("Q0413", 6.0)]),
        ];

        let funnel = compute_funnel(&rows, &stages);
        let counts: Vec<usize> = funnel.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![3, 3, 2, 2]);
        assert_eq!(funnel[0].percentage, 100.0);
        assert!((funnel[2].percentage - 200.0 / 3.0).abs() < 1e-9);
        assert!(funnel
            .iter()
            .all(|s| (0.0..=100.0).contains(&s.percentage)));

        let drops = funnel_drop_offs(&funnel);
        assert_eq!(drops[0].0, "Round 2");
        assert_eq!(drops[0].1, 0.0);
        assert!((drops[1].1 - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(drops[2].1, 0.0);
    }

    #[test]
    fn test_funnel_later_stage_larger_than_first() {
        let scoring = ScoringConfig::default();
        let stages: Vec<&FunnelStageConfig> = scoring.funnel.iter().collect();
        let rows = vec![
            row(&[("Q0401", 1.0), ("Q0413", 5.0)]),
            row(&[("Q0413", 5.0)]),
        ];

        let funnel = compute_funnel(&rows, &stages);
        assert_eq!(funnel[3].count, 2);
        assert_eq!(funnel[3].percentage, 100.0);
        assert!(funnel_drop_offs(&funnel).iter().all(|(_, d)| *d >= 0.0));
    }

    #[test]
    fn test_funnel_empty_and_unreached() {
        let scoring = ScoringConfig::default();
        let stages: Vec<&FunnelStageConfig> = scoring.funnel.iter().collect();
        assert!(compute_funnel(&[], &stages).is_empty());

        let funnel = compute_funnel(&[row(&[("Other", 1.0)])], &stages);
        assert!(funnel.iter().all(|s| s.count == 0 && s.percentage == 0.0));
    }

    #[test]
    fn test_evolution_observed_and_configured_max() {
        let mut scoring = ScoringConfig::default();
        scoring.rounds[1].max_score = Some(20.0);
        let rows = vec![
            row(&[("Q0401", 10.0), ("Q0405", 10.0), ("Cluster_0", 1.0)]),
            row(&[("Q0401", 5.0), ("Q0405", 5.0), ("Cluster_1", 1.0)]),
            row(&[("Cluster_1", 1.0)]),
        ];
        let selector = GroupSelector::new(
            vec!["Cluster_0".to_string(), "Cluster_1".to_string()],
            "Cluster_",
        );
        let rounds: Vec<&RoundConfig> = scoring.rounds.iter().collect();

        let evolution = compute_evolution(&rows, &rounds, &selector);
        // Round 3 has no data at all.
        assert_eq!(evolution.len(), 2);

        let r1 = &evolution[0];
        assert!(r1.observed_max);
        assert_eq!(r1.round_max, 10.0);
        assert!((r1.overall - 75.0).abs() < 1e-9);
        assert_eq!(r1.groups.len(), 2);
        assert_eq!(r1.groups[0].score, 100.0);
        assert_eq!(r1.groups[1].score, 50.0);
        assert_eq!(r1.groups[1].rows, 1);

        let r2 = &evolution[1];
        assert!(!r2.observed_max);
        assert!((r2.overall - 37.5).abs() < 1e-9);
    }

    #[test]
    fn test_evolution_skips_zero_max() {
        let scoring = ScoringConfig::default();
        let rows = vec![row(&[("Q0401", 0.0)])];
        let evolution = compute_evolution(&rows, &[&scoring.rounds[0]], &GroupSelector::default());
        assert!(evolution.is_empty());
        assert!(compute_evolution(&[], &[&scoring.rounds[0]], &GroupSelector::default()).is_empty());
    }
}
