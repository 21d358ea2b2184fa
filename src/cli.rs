//! Command-line arguments and subcommands.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// InsightQuest - predictive analytics for game-session spreadsheets
///
/// Uploads a CSV/XLSX of game sessions to the prediction service and turns
/// the returned predictions into distributions, cluster comparisons,
/// completion funnels and round-by-round evolution, written as a Markdown
/// or JSON report.
///
/// Examples:
///   insightquest analyze sessions.csv
///   insightquest analyze sessions.xlsx --format json --output report.json
///   insightquest report saved_response.json
///   insightquest history list
///   insightquest history show 3
///   insightquest init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .insightquest.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Prediction service base URL
    #[arg(long, global = true, env = "INSIGHTQUEST_SERVICE_URL", value_name = "URL")]
    pub service_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output file path for the report
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// History file location
    #[arg(long, global = true, value_name = "FILE")]
    pub history_file: Option<PathBuf>,

    /// Do not save this analysis to the history
    #[arg(long, global = true)]
    pub no_history: bool,

    /// Rows listed in the prediction table (0 lists every row)
    #[arg(long, global = true, value_name = "N")]
    pub prediction_rows: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Upload a spreadsheet to the prediction service and build a report
    Analyze {
        /// CSV or XLSX file with one game session per row
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Build a report from a saved prediction-service JSON response
    Report {
        /// JSON file holding a prediction response
        #[arg(value_name = "RESPONSE_JSON")]
        response: PathBuf,
    },
    /// Browse or manage previous analyses
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Generate a default .insightquest.toml configuration file
    InitConfig,
}

/// History subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryAction {
    /// List saved analyses, most recent first
    List,
    /// Rebuild the report of a saved analysis
    Show {
        #[arg(value_name = "ID")]
        id: u64,
    },
    /// Delete one saved analysis
    Delete {
        #[arg(value_name = "ID")]
        id: u64,
    },
    /// Delete every saved analysis
    Clear,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.service_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Service URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Command::Analyze { file } => {
                if !file.is_file() {
                    return Err(format!("Input file does not exist: {}", file.display()));
                }
                let supported = file
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_ascii_lowercase().as_str(), "csv" | "xlsx" | "xls"))
                    .unwrap_or(false);
                if !supported {
                    return Err(format!(
                        "Unsupported file type: {} (expected .csv or .xlsx)",
                        file.display()
                    ));
                }
            }
            Command::Report { response } => {
                if !response.is_file() {
                    return Err(format!(
                        "Response file does not exist: {}",
                        response.display()
                    ));
                }
            }
            Command::History { .. } | Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
