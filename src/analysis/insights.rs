//! Executive summary, key findings and recommendations.
//!
//! Everything here is derived from an [`AggregationResult`] and the
//! service response it came from. No new statistics are computed.

use crate::analysis::aggregator::AggregationResult;
use crate::analysis::groups::UNGROUPED;
use crate::analysis::rounds::funnel_drop_offs;
use crate::analysis::stats::pct;
use crate::models::{format_number, ApiResponse, Target};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Funnel steps losing more than this share of players are flagged.
pub const DROP_OFF_WARNING_PCT: f64 = 20.0;

/// Model quality bucket derived from the average R².
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelQuality {
    Excellent,
    Good,
    Moderate,
    NoPredictiveValue,
    /// The service reported no R² score.
    Unknown,
}

impl ModelQuality {
    pub fn from_r2(avg_r2: Option<f64>) -> Self {
        match avg_r2 {
            None => ModelQuality::Unknown,
            Some(r2) if r2 > 0.8 => ModelQuality::Excellent,
            Some(r2) if r2 > 0.6 => ModelQuality::Good,
            Some(r2) if r2 > 0.4 => ModelQuality::Moderate,
            Some(_) => ModelQuality::NoPredictiveValue,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ModelQuality::Excellent => "🟢",
            ModelQuality::Good => "🔵",
            ModelQuality::Moderate => "🟡",
            ModelQuality::NoPredictiveValue => "🔴",
            ModelQuality::Unknown => "⚪",
        }
    }
}

impl fmt::Display for ModelQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelQuality::Excellent => write!(f, "Excellent"),
            ModelQuality::Good => write!(f, "Good"),
            ModelQuality::Moderate => write!(f, "Moderate"),
            ModelQuality::NoPredictiveValue => write!(f, "No predictive value"),
            ModelQuality::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Headline numbers of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub file_name: String,
    pub total_rows: usize,
    pub processed_rows: usize,
    /// `processed_rows / total_rows * 100`.
    pub processing_rate: f64,
    pub target_means: [f64; 3],
    pub r2_scores: [Option<f64>; 3],
    /// Mean of the reported R² scores.
    pub average_r2: Option<f64>,
    pub model_quality: ModelQuality,
}

impl ExecutiveSummary {
    pub fn build(file_name: &str, response: &ApiResponse, result: &AggregationResult) -> Self {
        let r2_scores = Target::ALL.map(|t| response.r2_score(t));
        let reported: Vec<f64> = r2_scores.iter().flatten().copied().collect();
        let average_r2 =
            (!reported.is_empty()).then(|| reported.iter().sum::<f64>() / reported.len() as f64);

        Self {
            file_name: file_name.to_string(),
            total_rows: response.total_rows,
            processed_rows: response.processed_rows,
            processing_rate: pct(response.processed_rows as f64, response.total_rows as f64),
            target_means: result.target_stats.map(|s| s.mean),
            r2_scores,
            average_r2,
            model_quality: ModelQuality::from_r2(average_r2),
        }
    }
}

/// Kind of a key finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Insight,
    Pattern,
    Achievement,
    Discovery,
}

impl FindingKind {
    pub fn label(&self) -> &'static str {
        match self {
            FindingKind::Insight => "💡 Insight",
            FindingKind::Pattern => "🔍 Pattern",
            FindingKind::Achievement => "✅ Achievement",
            FindingKind::Discovery => "⚡ Discovery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
}

/// Statements about the most notable aggregates.
pub fn generate_findings(summary: &ExecutiveSummary, result: &AggregationResult) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(r2) = summary.average_r2 {
        findings.push(Finding {
            kind: FindingKind::Insight,
            title: "Model quality".to_string(),
            description: format!(
                "Average R² across reported targets is {:.2} ({}).",
                r2, summary.model_quality
            ),
            highlight: Some(format!("R² {:.2}", r2)),
        });
    }

    let largest_group = result
        .cluster_distribution
        .iter()
        .filter(|s| s.label != UNGROUPED)
        .max_by(|a, b| a.value.cmp(&b.value).then_with(|| b.label.cmp(&a.label)));
    if let Some(group) = largest_group {
        let total: usize = result.cluster_distribution.iter().map(|s| s.value).sum();
        findings.push(Finding {
            kind: FindingKind::Pattern,
            title: "Dominant player profile".to_string(),
            description: format!(
                "{} holds {} of {} players.",
                group.label, group.value, total
            ),
            highlight: Some(format!("{:.1}%", pct(group.value as f64, total as f64))),
        });
    }

    if let Some(color) = result.color_distribution.first() {
        let total: usize = result.color_distribution.iter().map(|s| s.value).sum();
        findings.push(Finding {
            kind: FindingKind::Discovery,
            title: "Favourite colour family".to_string(),
            description: format!(
                "{} was picked {} times out of {} colour choices.",
                color.label, color.value, total
            ),
            highlight: Some(color.label.clone()),
        });
    }

    let (hits, answered) = match result.total_breakdown() {
        Some(total) => (total.hits, total.answered()),
        None => result
            .round_breakdowns()
            .iter()
            .fold((0.0, 0.0), |(h, a), r| (h + r.hits, a + r.answered())),
    };
    if answered > 0.0 {
        findings.push(Finding {
            kind: FindingKind::Achievement,
            title: "Overall hit rate".to_string(),
            description: format!(
                "{} correct answers out of {} questions across all rounds.",
                format_number(hits),
                format_number(answered)
            ),
            highlight: Some(format!("{:.1}%", pct(hits, answered))),
        });
    }

    if let Some(last) = result.funnel.last() {
        findings.push(Finding {
            kind: FindingKind::Insight,
            title: "Completion".to_string(),
            description: format!(
                "{} players reached \"{}\".",
                last.count, last.stage
            ),
            highlight: Some(format!("{:.1}%", last.percentage)),
        });
    }

    findings
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "🔴 High"),
            Priority::Medium => write!(f, "🟠 Medium"),
            Priority::Low => write!(f, "🔵 Low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Action,
    Improvement,
    Warning,
    Success,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub title: String,
    pub description: String,
}

/// Suggested next steps, highest priority first.
pub fn generate_recommendations(
    summary: &ExecutiveSummary,
    result: &AggregationResult,
) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    match summary.model_quality {
        ModelQuality::NoPredictiveValue => recs.push(Recommendation {
            kind: RecommendationKind::Warning,
            priority: Priority::High,
            title: "Review the predictive model".to_string(),
            description: "The average R² is at most 0.4. Predictions should not drive decisions until the model is retrained with more or better data.".to_string(),
        }),
        ModelQuality::Moderate => recs.push(Recommendation {
            kind: RecommendationKind::Improvement,
            priority: Priority::Medium,
            title: "Improve model accuracy".to_string(),
            description: "The model explains part of the variance. Adding features or sessions should raise the R².".to_string(),
        }),
        ModelQuality::Excellent | ModelQuality::Good => recs.push(Recommendation {
            kind: RecommendationKind::Success,
            priority: Priority::Low,
            title: "Use the predictions".to_string(),
            description: format!(
                "Model quality is {}. Predictions can support player segmentation.",
                summary.model_quality
            ),
        }),
        ModelQuality::Unknown => {}
    }

    if summary.total_rows > 0 && summary.processed_rows < summary.total_rows {
        recs.push(Recommendation {
            kind: RecommendationKind::Action,
            priority: Priority::Medium,
            title: "Check unprocessed rows".to_string(),
            description: format!(
                "{} of {} rows could not be processed. Look for missing or malformed values.",
                summary.total_rows - summary.processed_rows,
                summary.total_rows
            ),
        });
    }

    for (stage, drop) in funnel_drop_offs(&result.funnel) {
        if drop > DROP_OFF_WARNING_PCT {
            recs.push(Recommendation {
                kind: RecommendationKind::Warning,
                priority: Priority::High,
                title: format!("High drop-off before {}", stage),
                description: format!(
                    "{:.1}% of players stop before \"{}\". Review the difficulty of the preceding round.",
                    drop, stage
                ),
            });
        }
    }

    if let Some(weakest) = result
        .round_breakdowns()
        .iter()
        .filter(|r| r.answered() > 0.0)
        .min_by(|a, b| a.hit_pct.total_cmp(&b.hit_pct))
    {
        if weakest.hit_pct < 50.0 {
            recs.push(Recommendation {
                kind: RecommendationKind::Improvement,
                priority: Priority::Medium,
                title: format!("Rebalance {}", weakest.round),
                description: format!(
                    "Only {:.1}% of answers in {} were correct.",
                    weakest.hit_pct, weakest.round
                ),
            });
        }
    }

    if result.capabilities.has_cluster_columns() && result.cluster_distribution.len() > 1 {
        recs.push(Recommendation {
            kind: RecommendationKind::Action,
            priority: Priority::Low,
            title: "Tailor content per profile".to_string(),
            description: format!(
                "Players split into {} groups with different predicted outcomes. Compare them in the cluster section.",
                result.cluster_distribution.len()
            ),
        });
    }

    recs.sort_by_key(|r| r.priority);
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::distribution::CategorySlice;
    use crate::analysis::rounds::{FunnelStage, RoundBreakdown};

    fn response(r2: [Option<f64>; 3]) -> ApiResponse {
        ApiResponse {
            total_rows: 10,
            processed_rows: 8,
            r2_score_target1: r2[0],
            r2_score_target2: r2[1],
            r2_score_target3: r2[2],
            ..Default::default()
        }
    }

    fn stage(name: &str, count: usize, percentage: f64) -> FunnelStage {
        FunnelStage {
            stage: name.to_string(),
            count,
            percentage,
        }
    }

    #[test]
    fn test_model_quality_thresholds() {
        assert_eq!(ModelQuality::from_r2(Some(0.81)), ModelQuality::Excellent);
        assert_eq!(ModelQuality::from_r2(Some(0.8)), ModelQuality::Good);
        assert_eq!(ModelQuality::from_r2(Some(0.5)), ModelQuality::Moderate);
        assert_eq!(ModelQuality::from_r2(Some(0.4)), ModelQuality::NoPredictiveValue);
        assert_eq!(ModelQuality::from_r2(None), ModelQuality::Unknown);
    }

    #[test]
    fn test_summary_averages_reported_scores_only() {
        let summary = ExecutiveSummary::build(
            "sessions.csv",
            &response([Some(0.9), None, Some(0.7)]),
            &AggregationResult::default(),
        );
        assert!((summary.average_r2.unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(summary.model_quality, ModelQuality::Good);
        assert_eq!(summary.processing_rate, 80.0);
        assert_eq!(summary.file_name, "sessions.csv");
    }

    #[test]
    fn test_summary_zero_rows() {
        let summary = ExecutiveSummary::build("x.csv", &ApiResponse::default(), &AggregationResult::default());
        assert_eq!(summary.processing_rate, 0.0);
        assert_eq!(summary.average_r2, None);
        assert_eq!(summary.model_quality, ModelQuality::Unknown);
    }

    #[test]
    fn test_recommendations_sorted_by_priority() {
        let result = AggregationResult {
            funnel: vec![
                stage("Round 1", 10, 100.0),
                stage("Round 2", 5, 50.0),
                stage("Round 3", 5, 50.0),
            ],
            ..Default::default()
        };
        let summary = ExecutiveSummary::build("x.csv", &response([Some(0.95), None, None]), &result);

        let recs = generate_recommendations(&summary, &result);
        assert!(recs.windows(2).all(|w| w[0].priority <= w[1].priority));
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[0].title, "High drop-off before Round 2");
        // 2 unprocessed rows + excellent model
        assert!(recs.iter().any(|r| r.title == "Check unprocessed rows"));
        assert_eq!(recs.last().map(|r| r.kind), Some(RecommendationKind::Success));
        assert!(!recs.iter().any(|r| r.title.contains("Round 3")));
    }

    #[test]
    fn test_findings() {
        let result = AggregationResult {
            cluster_distribution: vec![
                CategorySlice {
                    id: "Cluster 0".to_string(),
                    label: "Cluster 0".to_string(),
                    value: 3,
                    color: "#8b5cf6".to_string(),
                },
                CategorySlice {
                    id: UNGROUPED.to_string(),
                    label: UNGROUPED.to_string(),
                    value: 5,
                    color: "#9ca3af".to_string(),
                },
            ],
            round_breakdown: vec![RoundBreakdown {
                round: "Round 1".to_string(),
                hits: 60.0,
                errors: 5.0,
                omissions: 0.0,
                hit_pct: 60.0 / 65.0 * 100.0,
                error_pct: 5.0 / 65.0 * 100.0,
                omission_pct: 0.0,
            }],
            ..Default::default()
        };
        let summary = ExecutiveSummary::build("x.csv", &response([None, None, None]), &result);

        let findings = generate_findings(&summary, &result);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].title, "Dominant player profile");
        assert_eq!(findings[0].highlight.as_deref(), Some("37.5%"));
        assert_eq!(findings[1].kind, FindingKind::Achievement);
        assert_eq!(findings[1].highlight.as_deref(), Some("92.3%"));
    }

    fn breakdown(round: &str, hits: f64, errors: f64) -> RoundBreakdown {
        let total = hits + errors;
        RoundBreakdown {
            round: round.to_string(),
            hits,
            errors,
            omissions: 0.0,
            hit_pct: pct(hits, total),
            error_pct: pct(errors, total),
            omission_pct: 0.0,
        }
    }

    fn hit_rate(findings: &[Finding]) -> &Finding {
        findings
            .iter()
            .find(|f| f.title == "Overall hit rate")
            .unwrap()
    }

    #[test]
    fn test_hit_rate_prefers_total_counters() {
        let mut result = AggregationResult {
            round_breakdown: vec![
                breakdown("Round 1", 25.0, 15.0),
                breakdown("Round 2", 10.0, 15.0),
                breakdown("Total", 60.0, 5.0),
            ],
            ..Default::default()
        };
        result.capabilities.has_total_round = true;
        let summary = ExecutiveSummary::build("x.csv", &response([None, None, None]), &result);

        let findings = generate_findings(&summary, &result);
        let finding = hit_rate(&findings);
        assert_eq!(finding.highlight.as_deref(), Some("92.3%"));
        assert!(finding.description.starts_with("60 correct answers out of 65"));

        // The weakest round is a real round, never the total.
        let recs = generate_recommendations(&summary, &result);
        assert!(recs.iter().any(|r| r.title == "Rebalance Round 2"));
        assert!(!recs.iter().any(|r| r.title == "Rebalance Total"));
    }

    #[test]
    fn test_hit_rate_sums_rounds_without_total() {
        let result = AggregationResult {
            round_breakdown: vec![
                breakdown("Round 1", 25.0, 15.0),
                breakdown("Round 2", 10.0, 15.0),
            ],
            ..Default::default()
        };
        let summary = ExecutiveSummary::build("x.csv", &response([None, None, None]), &result);

        let findings = generate_findings(&summary, &result);
        let finding = hit_rate(&findings);
        assert_eq!(finding.highlight.as_deref(), Some("53.8%"));
        assert!(finding.description.starts_with("35 correct answers out of 65"));
    }

    #[test]
    fn test_empty_result_has_no_findings() {
        let result = AggregationResult::default();
        let summary = ExecutiveSummary::build("x.csv", &ApiResponse::default(), &result);
        assert!(generate_findings(&summary, &result).is_empty());
        assert!(generate_recommendations(&summary, &result).is_empty());
    }
}
