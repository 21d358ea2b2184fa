//! Markdown report generation.
//!
//! This module renders a [`Report`] as Markdown, one section per chart of
//! the dashboard, with a placeholder wherever the data did not support the
//! chart.

use super::{PredictionTable, Report, ReportMetadata, ReportSource};
use crate::analysis::distribution::{CategorySlice, ColorFamily, HistogramBin, LikertRow};
use crate::analysis::groups::{ClusterComparison, PointSeries};
use crate::analysis::insights::{
    ExecutiveSummary, Finding, Recommendation, DROP_OFF_WARNING_PCT,
};
use crate::analysis::rounds::{funnel_drop_offs, EvolutionPoint, FunnelStage, RoundBreakdown, RoundTime};
use crate::analysis::stats::{mean, pct, TargetStats, TopBottom};
use crate::analysis::AggregationResult;
use crate::models::{format_number, HeatmapRow, Target};
use anyhow::Result;

/// Shown in place of a chart whose columns are missing.
const NO_DATA: &str = "_No data available for this chart._\n\n";

/// Width of the longest text bar.
const BAR_WIDTH: usize = 30;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();
    let agg = &report.aggregation;

    output.push_str("# InsightQuest Analysis Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents());
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_target_stats_section(&agg.target_stats, &report.summary));
    output.push_str(&generate_findings_section(&report.findings));
    output.push_str(&generate_histogram_section(agg));
    output.push_str(&generate_color_section(&agg.color_distribution));
    output.push_str(&generate_likert_section(&agg.likert_table));
    output.push_str(&generate_cluster_section(agg));
    output.push_str(&generate_scatter_section(agg));
    output.push_str(&generate_prediction_table_section(&report.predictions));
    output.push_str(&generate_performers_section(&agg.top_bottom));
    output.push_str(&generate_rounds_section(&agg.round_breakdown, &agg.round_times));
    output.push_str(&generate_funnel_section(&agg.funnel));
    output.push_str(&generate_evolution_section(&agg.evolution));
    output.push_str(&generate_heatmap_section(&agg.heatmap));
    output.push_str(&generate_recommendations_section(&report.recommendations));
    output.push_str(&generate_footer(&report.metadata));

    output
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **File:** `{}`\n", metadata.file_name));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    let source = match &metadata.source {
        ReportSource::Upload { service_url } => format!("prediction service at {}", service_url),
        ReportSource::History { id } => format!("history entry #{}", id),
        ReportSource::SavedResponse { path } => format!("saved response `{}`", path),
    };
    section.push_str(&format!("- **Source:** {}\n", source));
    section.push_str("\n");

    section
}

fn generate_table_of_contents() -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    for title in [
        "Executive Summary",
        "Target Statistics",
        "Key Findings",
        "Time Distribution",
        "Colour Preferences",
        "Likert Responses",
        "Player Profiles",
        "Predictions",
        "Prediction Results",
        "Top and Bottom Performers",
        "Round Performance",
        "Completion Funnel",
        "Performance Evolution",
        "Feature Correlations",
        "Recommendations",
    ] {
        let anchor = title.to_lowercase().replace(' ', "-");
        toc.push_str(&format!("- [{}](#{})\n", title, anchor));
    }
    toc.push_str("\n");

    toc
}

fn generate_summary_section(summary: &ExecutiveSummary) -> String {
    let mut section = String::new();

    section.push_str("## Executive Summary\n\n");
    section.push_str("| Total Rows | Processed | Processing Rate | Model Quality | Avg R² |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {:.1}% | {} {} | {} |\n\n",
        summary.total_rows,
        summary.processed_rows,
        summary.processing_rate,
        summary.model_quality.emoji(),
        summary.model_quality,
        fmt_opt(summary.average_r2, 3),
    ));

    section
}

fn generate_target_stats_section(stats: &[TargetStats; 3], summary: &ExecutiveSummary) -> String {
    let mut section = String::new();

    section.push_str("## Target Statistics\n\n");
    section.push_str("| Target | Mean | Std Dev | Predictions | R² |\n");
    section.push_str("|:---|---:|---:|---:|---:|\n");
    for target in Target::ALL {
        let s = &stats[target.index()];
        section.push_str(&format!(
            "| {} | {:.2} | {:.2} | {} | {} |\n",
            target,
            s.mean,
            s.std,
            s.count,
            fmt_opt(summary.r2_scores[target.index()], 3),
        ));
    }
    section.push_str("\n");

    section
}

fn generate_findings_section(findings: &[Finding]) -> String {
    let mut section = String::new();

    section.push_str("## Key Findings\n\n");
    if findings.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    for finding in findings {
        section.push_str(&format!("### {} - {}\n\n", finding.kind.label(), finding.title));
        if let Some(ref highlight) = finding.highlight {
            section.push_str(&format!("**{}**\n\n", highlight));
        }
        section.push_str(&format!("{}\n\n", finding.description));
    }

    section
}

fn generate_histogram_section(agg: &AggregationResult) -> String {
    let mut section = String::new();

    section.push_str("## Time Distribution\n\n");
    if agg.time_histogram.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    if let Some(ref column) = agg.capabilities.time_column {
        section.push_str(&format!("*Column: `{}`*\n\n", column));
    }
    section.push_str(&histogram_table(&agg.time_histogram));

    section
}

fn histogram_table(bins: &[HistogramBin]) -> String {
    let max = bins.iter().map(|b| b.count).max().unwrap_or(0);
    let mut table = String::new();

    table.push_str("| Range | Players | |\n");
    table.push_str("|:---|---:|:---|\n");
    for bin in bins {
        table.push_str(&format!("| {} | {} | {} |\n", bin.range, bin.count, bar(bin.count, max)));
    }
    table.push_str("\n");

    table
}

fn generate_color_section(slices: &[CategorySlice]) -> String {
    let mut section = String::new();

    section.push_str("## Colour Preferences\n\n");
    if slices.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    let total: usize = slices.iter().map(|s| s.value).sum();
    section.push_str("| Family | Choices | Share | Swatch | Rule |\n");
    section.push_str("|:---|---:|---:|:---:|:---|\n");
    for slice in slices {
        let rule = ColorFamily::from_label(&slice.label)
            .map(|f| f.rule())
            .unwrap_or("-");
        section.push_str(&format!(
            "| {} | {} | {:.1}% | `{}` | {} |\n",
            slice.label,
            slice.value,
            pct(slice.value as f64, total as f64),
            slice.color,
            rule
        ));
    }
    section.push_str("\n");

    section
}

fn generate_likert_section(rows: &[LikertRow]) -> String {
    let mut section = String::new();

    section.push_str("## Likert Responses\n\n");
    if rows.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    section.push_str("| Question | 1 | 2 | 3 | 4 | 5 | Total |\n");
    section.push_str("|:---|---:|---:|---:|---:|---:|---:|\n");
    for row in rows {
        section.push_str(&format!("| {} |", row.metric));
        for response in 1..=5 {
            section.push_str(&format!(" {} |", row.count(response)));
        }
        section.push_str(&format!(" {} |\n", row.total()));
    }
    section.push_str("\n");

    section
}

fn generate_cluster_section(agg: &AggregationResult) -> String {
    let mut section = String::new();

    section.push_str("## Player Profiles\n\n");
    if agg.cluster_distribution.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    let total: usize = agg.cluster_distribution.iter().map(|s| s.value).sum();
    section.push_str("### Distribution\n\n");
    section.push_str("| Profile | Players | Share |\n");
    section.push_str("|:---|---:|---:|\n");
    for slice in &agg.cluster_distribution {
        section.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            slice.label,
            slice.value,
            pct(slice.value as f64, total as f64)
        ));
    }
    section.push_str("\n");

    section.push_str(&cluster_comparison_table(&agg.cluster_comparison));

    section
}

fn cluster_comparison_table(rows: &[ClusterComparison]) -> String {
    let mut table = String::new();

    table.push_str("### Average Predictions by Profile\n\n");
    table.push_str("| Profile | Players | Target 1 | Target 2 | Target 3 |\n");
    table.push_str("|:---|---:|---:|---:|---:|\n");
    for row in rows {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            row.group,
            row.rows,
            fmt_opt(row.means[0], 2),
            fmt_opt(row.means[1], 2),
            fmt_opt(row.means[2], 2),
        ));
    }
    table.push_str("\n");

    table
}

fn generate_scatter_section(agg: &AggregationResult) -> String {
    let mut section = String::new();

    section.push_str("## Predictions\n\n");

    section.push_str("### Time vs. Predicted Target 1\n\n");
    if agg.time_vs_prediction.is_empty() {
        section.push_str(NO_DATA);
    } else {
        section.push_str(&series_table(&agg.time_vs_prediction, "Mean Time", "Mean Prediction"));
    }

    section.push_str("### Predicted vs. Actual\n\n");
    if agg.prediction_vs_actual.is_empty() {
        section.push_str(NO_DATA);
    } else {
        section.push_str("| Target | Points | Mean Actual | Mean Predicted | Mean Abs. Error |\n");
        section.push_str("|:---|---:|---:|---:|---:|\n");
        for series in &agg.prediction_vs_actual {
            let errors: Vec<f64> = series.points.iter().map(|p| (p.y - p.x).abs()).collect();
            let (mx, my) = series_means(series);
            section.push_str(&format!(
                "| {} | {} | {:.2} | {:.2} | {:.2} |\n",
                series.id,
                series.points.len(),
                mx,
                my,
                mean(&errors)
            ));
        }
        section.push_str("\n");
    }

    section
}

fn generate_prediction_table_section(table: &PredictionTable) -> String {
    let mut section = String::new();

    section.push_str("## Prediction Results\n\n");
    if table.rows.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    section.push_str("| # | Target 1 | Target 2 | Target 3 |\n");
    section.push_str("|---:|---:|---:|---:|\n");
    for line in &table.rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            line.row,
            fmt_opt(line.target1, 3),
            fmt_opt(line.target2, 3),
            fmt_opt(line.target3, 3)
        ));
    }
    section.push_str("\n");

    if table.is_truncated() {
        section.push_str(&format!(
            "_Showing the first {} of {} rows. Use `--prediction-rows 0` to list every row._\n\n",
            table.rows.len(),
            table.total_rows
        ));
    }

    section
}

fn series_table(series: &[PointSeries], x_label: &str, y_label: &str) -> String {
    let mut table = String::new();

    table.push_str(&format!("| Series | Points | {} | {} |\n", x_label, y_label));
    table.push_str("|:---|---:|---:|---:|\n");
    for s in series {
        let (mx, my) = series_means(s);
        table.push_str(&format!(
            "| {} | {} | {:.2} | {:.2} |\n",
            s.id,
            s.points.len(),
            mx,
            my
        ));
    }
    table.push_str("\n");

    table
}

fn series_means(series: &PointSeries) -> (f64, f64) {
    let xs: Vec<f64> = series.points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = series.points.iter().map(|p| p.y).collect();
    (mean(&xs), mean(&ys))
}

fn generate_performers_section(ranked: &[TopBottom]) -> String {
    let mut section = String::new();

    section.push_str("## Top and Bottom Performers\n\n");
    if ranked.iter().all(|r| r.top.is_empty()) {
        section.push_str(NO_DATA);
        return section;
    }

    for entry in ranked.iter().filter(|r| !r.top.is_empty()) {
        let name = entry.target.map(|t| t.to_string()).unwrap_or_default();
        section.push_str(&format!("### {}\n\n", name));
        section.push_str("| Rank | Top (row) | Value | Bottom (row) | Value |\n");
        section.push_str("|:---:|:---|---:|:---|---:|\n");

        let rows = entry.top.len().max(entry.bottom.len());
        for i in 0..rows {
            let top = entry.top.get(i);
            let bottom = entry.bottom.get(i);
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                i + 1,
                top.map(|p| format!("#{}", p.row)).unwrap_or_default(),
                top.map(|p| format!("{:.2}", p.value)).unwrap_or_default(),
                bottom.map(|p| format!("#{}", p.row)).unwrap_or_default(),
                bottom.map(|p| format!("{:.2}", p.value)).unwrap_or_default(),
            ));
        }
        section.push_str("\n");
    }

    section
}

fn generate_rounds_section(breakdown: &[RoundBreakdown], times: &[RoundTime]) -> String {
    let mut section = String::new();

    section.push_str("## Round Performance\n\n");
    if breakdown.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    section.push_str("| Round | Hits | Errors | Omissions | Hit % | Error % | Omission % |\n");
    section.push_str("|:---|---:|---:|---:|---:|---:|---:|\n");
    for r in breakdown {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {:.2}% | {:.2}% | {:.2}% |\n",
            r.round,
            format_number(r.hits),
            format_number(r.errors),
            format_number(r.omissions),
            r.hit_pct,
            r.error_pct,
            r.omission_pct
        ));
    }
    section.push_str("\n");

    if !times.is_empty() {
        section.push_str("### Average Time per Round\n\n");
        section.push_str("| Round | Mean Time | Players |\n");
        section.push_str("|:---|---:|---:|\n");
        for t in times {
            section.push_str(&format!("| {} | {:.1}s | {} |\n", t.round, t.mean_seconds, t.count));
        }
        section.push_str("\n");
    }

    section
}

fn generate_funnel_section(funnel: &[FunnelStage]) -> String {
    let mut section = String::new();

    section.push_str("## Completion Funnel\n\n");
    if funnel.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    let drops = funnel_drop_offs(funnel);
    section.push_str("| Stage | Players | % of Start | Drop-off | |\n");
    section.push_str("|:---|---:|---:|---:|:---|\n");
    for (i, stage) in funnel.iter().enumerate() {
        let drop = i.checked_sub(1).and_then(|j| drops.get(j)).map(|(_, d)| *d);
        let warning = match drop {
            Some(d) if d > DROP_OFF_WARNING_PCT => "⚠️",
            _ => "",
        };
        section.push_str(&format!(
            "| {} | {} | {:.1}% | {} | {} |\n",
            stage.stage,
            stage.count,
            stage.percentage,
            drop.map(|d| format!("{:.1}%", d)).unwrap_or_else(|| "-".to_string()),
            warning
        ));
    }
    section.push_str("\n");

    section
}

fn generate_evolution_section(evolution: &[EvolutionPoint]) -> String {
    let mut section = String::new();

    section.push_str("## Performance Evolution\n\n");
    if evolution.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    // Column set is the union of groups, in first-seen order.
    let mut groups: Vec<&str> = Vec::new();
    for point in evolution {
        for g in &point.groups {
            if !groups.contains(&g.group.as_str()) {
                groups.push(&g.group);
            }
        }
    }

    section.push_str("| Round | Max Score | Overall |");
    for g in &groups {
        section.push_str(&format!(" {} |", g));
    }
    section.push_str("\n|:---|---:|---:|");
    section.push_str(&"---:|".repeat(groups.len()));
    section.push_str("\n");

    for point in evolution {
        let max = if point.observed_max {
            format!("{}*", format_number(point.round_max))
        } else {
            format_number(point.round_max)
        };
        section.push_str(&format!("| {} | {} | {:.1}% |", point.round, max, point.overall));
        for g in &groups {
            let score = point.groups.iter().find(|s| s.group == *g).map(|s| s.score);
            section.push_str(&format!(" {} |", fmt_pct(score)));
        }
        section.push_str("\n");
    }
    section.push_str("\n");

    if evolution.iter().any(|p| p.observed_max) {
        section.push_str(
            "\\* Highest score observed in this file. Set `max_score` for the round in the configuration to use the real maximum.\n\n",
        );
    }

    section
}

fn generate_heatmap_section(heatmap: &[HeatmapRow]) -> String {
    let mut section = String::new();

    section.push_str("## Feature Correlations\n\n");
    if heatmap.is_empty() {
        section.push_str(NO_DATA);
        return section;
    }

    let columns: Vec<&str> = heatmap[0].data.iter().map(|c| c.x.as_str()).collect();
    section.push_str("| |");
    for c in &columns {
        section.push_str(&format!(" {} |", c));
    }
    section.push_str("\n|:---|");
    section.push_str(&"---:|".repeat(columns.len()));
    section.push_str("\n");

    for row in heatmap {
        section.push_str(&format!("| **{}** |", row.id));
        for c in &columns {
            let value = row.data.iter().find(|cell| cell.x == *c).map(|cell| cell.y);
            section.push_str(&format!(" {} |", fmt_opt(value, 2)));
        }
        section.push_str("\n");
    }
    section.push_str("\n");

    section
}

fn generate_recommendations_section(recommendations: &[Recommendation]) -> String {
    let mut section = String::new();

    section.push_str("## Recommendations\n\n");
    if recommendations.is_empty() {
        section.push_str("No recommendations for this analysis.\n\n");
        return section;
    }

    for (i, rec) in recommendations.iter().enumerate() {
        section.push_str(&format!(
            "{}. **{}** ({})\n   {}\n",
            i + 1,
            rec.title,
            rec.priority,
            rec.description
        ));
    }
    section.push_str("\n");

    section
}

fn generate_footer(metadata: &ReportMetadata) -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    if let Some(id) = metadata.saved_as {
        footer.push_str(&format!(
            "*Saved to history as #{}. Reopen with `insightquest history show {}`.*\n\n",
            id, id
        ));
    }
    footer.push_str(&format!(
        "*Report generated by InsightQuest v{}*\n",
        metadata.tool_version
    ));

    footer
}

fn bar(value: usize, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let len = (value * BAR_WIDTH).div_ceil(max);
    "█".repeat(len)
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "-".to_string(),
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::ApiResponse;
    use crate::state::AppState;

    const SAMPLE_RESPONSE: &str = include_str!("../../fixtures/sample_response.json");

    fn sample_report() -> Report {
        let response: ApiResponse = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        let state = AppState::new().on_analysis_complete("sessions.csv", response, &Config::default());
        let analysis = state.current.unwrap();
        Report::build(&analysis, ReportSource::History { id: 3 }, Some(3), 100)
    }

    fn empty_report() -> Report {
        let analysis = crate::state::LoadedAnalysis {
            file_name: "empty.csv".to_string(),
            response: ApiResponse::default(),
            result: AggregationResult::default(),
            history_id: None,
        };
        Report::build(
            &analysis,
            ReportSource::SavedResponse {
                path: "resp.json".to_string(),
            },
            None,
            100,
        )
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&sample_report());

        assert!(markdown.starts_with("# InsightQuest Analysis Report"));
        assert!(markdown.contains("## Executive Summary"));
        assert!(markdown.contains("`sessions.csv`"));
        assert!(markdown.contains("history entry #3"));
        assert!(markdown.contains("| 30-60s | 3 |"));
        assert!(markdown.contains("| Blue | 5 |"));
        assert!(markdown.contains("| Total | 60 | 5 | 0 | 92.31% |"));
        assert!(markdown.contains("Cluster 0"));
        assert!(markdown.contains("## Feature Correlations"));
        assert!(markdown.contains("insightquest history show 3"));
        assert!(markdown.contains("| 1 | 12.500 | 0.800 | 3.000 |"));
        assert!(markdown.contains("| 8 | 8.000 | 0.500 | 2.000 |"));
        assert!(!markdown.contains("Showing the first"));
    }

    #[test]
    fn test_prediction_table_is_capped() {
        let response: ApiResponse = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        let state = AppState::new().on_analysis_complete("sessions.csv", response, &Config::default());
        let analysis = state.current.unwrap();
        let report = Report::build(&analysis, ReportSource::History { id: 3 }, None, 2);

        let section = generate_prediction_table_section(&report.predictions);
        assert!(section.contains("| 2 | 14.000 | 0.600 | 2.500 |"));
        assert!(!section.contains("| 3 |"));
        assert!(section.contains("_Showing the first 2 of 8 rows."));

        let json = generate_json_report(&report).unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.predictions.total_rows, 8);
        assert_eq!(parsed.predictions.rows.len(), 2);
    }

    #[test]
    fn test_placeholders_for_missing_data() {
        let markdown = generate_markdown_report(&empty_report());

        assert!(markdown.contains("## Time Distribution\n\n_No data available"));
        assert!(markdown.contains("## Completion Funnel\n\n_No data available"));
        assert!(markdown.contains("## Player Profiles\n\n_No data available"));
        assert!(markdown.contains("## Prediction Results\n\n_No data available"));
        assert!(markdown.contains("No recommendations"));
        assert!(!markdown.contains("Saved to history"));
    }

    #[test]
    fn test_funnel_drop_off_warning() {
        let funnel = vec![
            FunnelStage {
                stage: "Round 1".to_string(),
                count: 10,
                percentage: 100.0,
            },
            FunnelStage {
                stage: "Round 2".to_string(),
                count: 7,
                percentage: 70.0,
            },
            FunnelStage {
                stage: "Round 3".to_string(),
                count: 6,
                percentage: 60.0,
            },
        ];

        let section = generate_funnel_section(&funnel);
        assert!(section.contains("| Round 1 | 10 | 100.0% | - |  |"));
        assert!(section.contains("| Round 2 | 7 | 70.0% | 30.0% | ⚠️ |"));
        assert!(section.contains("| Round 3 | 6 | 60.0% | 14.3% |  |"));
    }

    #[test]
    fn test_bar_scaling() {
        assert_eq!(bar(0, 0), "");
        assert_eq!(bar(10, 10).chars().count(), BAR_WIDTH);
        assert_eq!(bar(1, 10).chars().count(), 3);
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&sample_report()).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"time_histogram\""));
        assert!(json.contains("\"kind\": \"history\""));
        assert!(json.contains("\"predictions\""));

        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.summary.file_name, "sessions.csv");
    }
}
