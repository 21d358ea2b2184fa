//! `.insightquest.toml` settings.
//!
//! Besides the service and output options, the file carries the column
//! conventions of the uploaded spreadsheets: which columns hold time,
//! colours, Likert answers, cluster indicators and round counters.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".insightquest.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Prediction service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Analysis history settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Column-name conventions of the uploaded spreadsheets.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Round, funnel and score settings.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path for the report.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Rows listed in the report's prediction table. 0 lists every row.
    #[serde(default = "default_prediction_rows")]
    pub prediction_rows: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            verbose: false,
            prediction_rows: default_prediction_rows(),
        }
    }
}

fn default_output() -> String {
    "insightquest_report.md".to_string()
}

fn default_prediction_rows() -> usize {
    100
}

/// Prediction service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the prediction service.
    #[serde(default = "default_service_url")]
    pub url: String,

    /// Upload endpoint path.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: default_service_url(),
            endpoint: default_endpoint(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_service_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_endpoint() -> String {
    "/predict/upload-csv".to_string()
}

fn default_timeout() -> u64 {
    300 // training-side inference on large sheets can take minutes
}

/// Local history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Save each successful analysis.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Location of the history file.
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_history_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_history_path() -> PathBuf {
    PathBuf::from(".insightquest").join("history.json")
}

/// Column-name conventions. Every column is optional in the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    /// Candidate total-time columns, first present wins.
    #[serde(default = "default_time_columns")]
    pub time: Vec<String>,

    /// Column holding a single `#RRGGBB` colour.
    #[serde(default = "default_color_hex")]
    pub color_hex: String,

    /// Prefix of `<prefix>*_R/_G/_B` colour triplets.
    #[serde(default = "default_color_prefix")]
    pub color_prefix: String,

    /// Likert (1-5) survey columns.
    #[serde(default = "default_likert_columns")]
    pub likert: Vec<String>,

    /// Prefix of the one-hot cluster indicator columns.
    #[serde(default = "default_cluster_prefix")]
    pub cluster_prefix: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            time: default_time_columns(),
            color_hex: default_color_hex(),
            color_prefix: default_color_prefix(),
            likert: default_likert_columns(),
            cluster_prefix: default_cluster_prefix(),
        }
    }
}

fn default_time_columns() -> Vec<String> {
    vec!["TempoTotal".to_string(), "T0498".to_string()]
}

fn default_color_hex() -> String {
    "Cor0202".to_string()
}

fn default_color_prefix() -> String {
    "Cor".to_string()
}

fn default_likert_columns() -> Vec<String> {
    (705..=713).map(|n| format!("F0{}", n)).collect()
}

fn default_cluster_prefix() -> String {
    "Cluster_".to_string()
}

/// Counter columns of one game round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Display name.
    pub name: String,
    /// Correct answers column.
    pub hits: String,
    /// Wrong answers column.
    pub errors: String,
    /// Unanswered questions column.
    pub omissions: String,
    /// Time spent in the round, if recorded.
    #[serde(default)]
    pub time: Option<String>,
    /// Highest achievable hit count. When unset, the highest value observed
    /// in the current dataset is used instead.
    #[serde(default)]
    pub max_score: Option<f64>,
}

impl RoundConfig {
    fn new(name: &str, hits: &str, errors: &str, omissions: &str, time: &str) -> Self {
        Self {
            name: name.to_string(),
            hits: hits.to_string(),
            errors: errors.to_string(),
            omissions: omissions.to_string(),
            time: Some(time.to_string()),
            max_score: None,
        }
    }

    /// The three counter columns.
    pub fn counters(&self) -> [&str; 3] {
        [&self.hits, &self.errors, &self.omissions]
    }
}

/// A funnel stage: reached when the listed columns sum to more than zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStageConfig {
    pub name: String,
    pub columns: Vec<String>,
}

/// Round, funnel and score settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Per-round counters, in play order.
    #[serde(default = "default_rounds")]
    pub rounds: Vec<RoundConfig>,

    /// Whole-game counters.
    #[serde(default = "default_total_round")]
    pub total: RoundConfig,

    /// Completion funnel stages, in order.
    #[serde(default = "default_funnel")]
    pub funnel: Vec<FunnelStageConfig>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            total: default_total_round(),
            funnel: default_funnel(),
        }
    }
}

fn default_rounds() -> Vec<RoundConfig> {
    vec![
        RoundConfig::new("Round 1", "Q0401", "Q0402", "Q0403", "T0404"),
        RoundConfig::new("Round 2", "Q0405", "Q0406", "Q0407", "T0408"),
        RoundConfig::new("Round 3", "Q0409", "Q0410", "Q0411", "T0412"),
    ]
}

fn default_total_round() -> RoundConfig {
    RoundConfig::new("Total", "Q0413", "Q0414", "Q0415", "T0498")
}

fn default_funnel() -> Vec<FunnelStageConfig> {
    let mut stages: Vec<FunnelStageConfig> = default_rounds()
        .into_iter()
        .map(|round| FunnelStageConfig {
            columns: round.counters().iter().map(|c| c.to_string()).collect(),
            name: round.name,
        })
        .collect();

    let total = default_total_round();
    stages.push(FunnelStageConfig {
        name: "Completed".to_string(),
        columns: total.counters().iter().map(|c| c.to_string()).collect(),
    });

    stages
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.service_url {
            self.service.url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.service.timeout_seconds = timeout;
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(ref path) = args.history_file {
            self.history.path = path.clone();
        }
        if let Some(rows) = args.prediction_rows {
            self.general.prediction_rows = rows;
        }

        // Flags always override
        if args.no_history {
            self.history.enabled = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Full URL of the upload endpoint.
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}",
            self.service.url.trim_end_matches('/'),
            self.service.endpoint.trim_start_matches('/')
        )
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.url, "http://127.0.0.1:8000");
        assert_eq!(config.columns.time, vec!["TempoTotal", "T0498"]);
        assert_eq!(config.columns.likert.len(), 9);
        assert_eq!(config.columns.likert[0], "F0705");
        assert_eq!(config.columns.likert[8], "F0713");
        assert_eq!(config.scoring.rounds.len(), 3);
        assert_eq!(config.scoring.total.hits, "Q0413");
        assert_eq!(config.scoring.funnel.len(), 4);
        assert_eq!(config.scoring.funnel[3].name, "Completed");
        assert!(config.history.enabled);
        assert_eq!(config.general.prediction_rows, 100);
    }

    #[test]
    fn test_merge_with_args() {
        use clap::Parser;

        let args = crate::cli::Args::try_parse_from([
            "insightquest",
            "analyze",
            "sessions.csv",
            "--prediction-rows",
            "0",
            "--no-history",
            "--timeout",
            "5",
        ])
        .unwrap();

        let mut config = Config::default();
        config.merge_with_args(&args);
        assert_eq!(config.general.prediction_rows, 0);
        assert!(!config.history.enabled);
        assert_eq!(config.service.timeout_seconds, 5);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
format = "json"
verbose = true

[service]
url = "https://ml.example.com/api/"
timeout_seconds = 60

[columns]
likert = ["F0705", "F0706"]

[scoring.total]
name = "Total"
hits = "Q0413"
errors = "Q0414"
omissions = "Q0415"
max_score = 45.0
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert!(config.general.verbose);
        assert_eq!(config.service.timeout_seconds, 60);
        assert_eq!(config.service.endpoint, "/predict/upload-csv");
        assert_eq!(config.columns.likert, vec!["F0705", "F0706"]);
        assert_eq!(config.columns.cluster_prefix, "Cluster_");
        assert_eq!(config.scoring.total.max_score, Some(45.0));
        assert_eq!(config.scoring.total.time, None);
        assert_eq!(config.scoring.rounds.len(), 3);
        assert_eq!(
            config.upload_url(),
            "https://ml.example.com/api/predict/upload-csv"
        );
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[service]"));
        assert!(toml_str.contains("[columns]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.scoring.rounds, Config::default().scoring.rounds);
    }
}
