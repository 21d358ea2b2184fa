//! InsightQuest - predictive analytics for game-session spreadsheets
//!
//! A CLI tool that uploads session data to an external prediction service,
//! aggregates the returned predictions into chart-ready series and writes
//! them as a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, I/O, unknown history entry, etc.)
//!   2 - The analysis returned no predictions

mod analysis;
mod cli;
mod client;
mod config;
mod error;
mod history;
mod models;
mod report;
mod schema;
mod state;

use anyhow::{anyhow, bail, Context, Result};
use cli::{Args, Command, HistoryAction, OutputFormat};
use client::PredictionClient;
use config::Config;
use history::HistoryStore;
use indicatif::{ProgressBar, ProgressStyle};
use models::ApiResponse;
use report::{Report, ReportSource};
use state::{AppState, LoadedAnalysis, View, EMPTY_RESULT_MESSAGE};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    init_logging(&args);

    info!("InsightQuest v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::DEFAULT_CONFIG_FILE))?;

    println!(
        "✅ Created {} with default settings.",
        config::DEFAULT_CONFIG_FILE
    );
    println!("   Edit it to set the service URL, column names and round maximum scores.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch the subcommand. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.command {
        Command::Analyze { ref file } => handle_analyze(file, &config, args.quiet).await,
        Command::Report { ref response } => handle_report(response, &config),
        Command::History { ref action } => handle_history(action, &config),
        Command::InitConfig => handle_init_config().map(|_| 0),
    }
}

/// Upload a file, build its report and save it to the history.
async fn handle_analyze(file: &Path, config: &Config, quiet: bool) -> Result<i32> {
    let start_time = Instant::now();
    let file_name = display_name(file);

    println!("📤 Uploading {} to the prediction service", file_name);
    println!("   Service: {}", config.upload_url());
    println!("   Timeout: {}s", config.service.timeout_seconds);

    let client = PredictionClient::new(config)?;

    let spinner = (!quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Waiting for predictions...");
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let outcome = client.upload_and_predict(file).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let (state, empty_result) = match outcome {
        Ok(response) => (
            AppState::new().on_analysis_complete(&file_name, response, config),
            false,
        ),
        Err(e) if e.is_empty_result() => (
            AppState::new().on_analysis_failed(EMPTY_RESULT_MESSAGE),
            true,
        ),
        Err(e) => (AppState::new().on_analysis_failed(e.to_string()), false),
    };

    if state.view == View::Upload {
        let message = state.error.as_deref().unwrap_or("Analysis failed");
        if empty_result {
            eprintln!("\n⚠️  {}", message);
            return Ok(2);
        }
        error!("Analysis of {} failed: {}", file_name, message);
        eprintln!("\n❌ {}", message);
        return Ok(1);
    }

    let analysis = state
        .current
        .as_ref()
        .ok_or_else(|| anyhow!("Analysis finished without results"))?;

    let saved_as = if config.history.enabled {
        save_to_history(&config.history.path, analysis)
    } else {
        debug!("History disabled, not saving");
        None
    };

    let report = Report::build(
        analysis,
        ReportSource::Upload {
            service_url: config.service.url.clone(),
        },
        saved_as,
        config.general.prediction_rows,
    );
    let output = write_report(&report, config)?;

    print_summary(&report, &output, config.general.verbose);
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());

    Ok(0)
}

/// Save an analysis to the history. Failures are logged, never fatal.
fn save_to_history(path: &Path, analysis: &LoadedAnalysis) -> Option<u64> {
    let saved = HistoryStore::open(path)
        .and_then(|mut store| store.add(&analysis.file_name, &analysis.response));

    match saved {
        Ok(entry) => Some(entry.id),
        Err(e) => {
            warn!("Could not save the analysis to the history: {:#}", e);
            None
        }
    }
}

/// Build a report from a saved service response.
fn handle_report(path: &Path, config: &Config) -> Result<i32> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read response file: {}", path.display()))?;
    let response: ApiResponse = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse response file: {}", path.display()))?;

    let state = AppState::new().on_analysis_complete(&display_name(path), response, config);
    if let Some(ref message) = state.error {
        eprintln!("\n⚠️  {}", message);
        return Ok(2);
    }

    let analysis = state
        .current
        .as_ref()
        .ok_or_else(|| anyhow!("Response produced no results"))?;

    let report = Report::build(
        analysis,
        ReportSource::SavedResponse {
            path: path.display().to_string(),
        },
        None,
        config.general.prediction_rows,
    );
    let output = write_report(&report, config)?;
    print_summary(&report, &output, config.general.verbose);

    Ok(0)
}

fn handle_history(action: &HistoryAction, config: &Config) -> Result<i32> {
    let mut store = HistoryStore::open(&config.history.path)?;

    match action {
        HistoryAction::List => {
            let entries = store.list();
            if entries.is_empty() {
                println!("📭 No saved analyses in {}", store.path().display());
                return Ok(0);
            }

            println!("📚 {} saved analyses:\n", entries.len());
            for entry in entries {
                println!(
                    "   #{:<4} {}  {}  ({}/{} rows)",
                    entry.id,
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.file_name,
                    entry.processed_rows,
                    entry.total_rows
                );
            }
        }
        HistoryAction::Show { id } => {
            let entry = store
                .get(*id)
                .ok_or_else(|| anyhow!("No history entry with id {}", id))?;

            let state = AppState::new().on_history_loaded(entry, config);
            let analysis = state
                .current
                .as_ref()
                .ok_or_else(|| anyhow!("History entry #{} produced no results", id))?;

            let report = Report::build(
                analysis,
                ReportSource::History { id: *id },
                None,
                config.general.prediction_rows,
            );
            let output = write_report(&report, config)?;
            print_summary(&report, &output, config.general.verbose);
        }
        HistoryAction::Delete { id } => {
            if !store.delete(*id)? {
                bail!("No history entry with id {}", id);
            }
            println!("🗑️  Deleted history entry #{}", id);
        }
        HistoryAction::Clear => {
            let removed = store.clear()?;
            println!("🗑️  Removed {} history entries", removed);
        }
    }

    Ok(0)
}

/// Render the report in the configured format and write it out.
fn write_report(report: &Report, config: &Config) -> Result<PathBuf> {
    println!("\n📝 Generating report...");

    let content = match config.general.format {
        OutputFormat::Json => report::generate_json_report(report)?,
        OutputFormat::Markdown => report::generate_markdown_report(report),
    };

    let path = output_path(config);
    std::fs::write(&path, &content)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    info!("Report written to {}", path.display());
    Ok(path)
}

/// Report path, switching the default file's extension to match the format.
fn output_path(config: &Config) -> PathBuf {
    let path = PathBuf::from(&config.general.output);
    let is_default = config.general.output == config::GeneralConfig::default().output;

    if is_default && config.general.format == OutputFormat::Json {
        path.with_extension("json")
    } else {
        path
    }
}

fn print_summary(report: &Report, output: &Path, verbose: bool) {
    let summary = &report.summary;
    let agg = &report.aggregation;

    println!("\n📊 Analysis Summary:");
    println!("   File: {}", summary.file_name);
    println!(
        "   Rows: {}/{} processed ({:.1}%)",
        summary.processed_rows, summary.total_rows, summary.processing_rate
    );
    println!(
        "   Model quality: {} {}",
        summary.model_quality.emoji(),
        summary.model_quality
    );
    println!(
        "   Means: T1 {:.2} | T2 {:.2} | T3 {:.2}",
        summary.target_means[0], summary.target_means[1], summary.target_means[2]
    );
    println!(
        "   Charts: {} time bins, {} colour families, {} profiles, {} rounds",
        agg.time_histogram.len(),
        agg.color_distribution.len(),
        agg.cluster_distribution.len(),
        agg.round_breakdown.len()
    );
    if verbose {
        let caps = &agg.capabilities;
        println!(
            "   Columns: time {}, {} colour sets, {} Likert, {} clusters, {} rounds",
            caps.time_column.as_deref().unwrap_or("none"),
            caps.color_bases.len(),
            caps.likert_columns.len(),
            caps.cluster_columns.len(),
            caps.rounds.len()
        );
    }
    if let Some(id) = report.metadata.saved_as {
        println!("   Saved to history as #{}", id);
    }
    println!("\n✅ Report saved to: {}", output.display());
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
