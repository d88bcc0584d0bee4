//! MameStats - streaming statistics for MAME XML catalogs
//!
//! A CLI tool that reads a `-listxml` machine catalog in a single pass and
//! reports machine counts, driver and feature status tables, and ROM names
//! whose size disagrees between machines.
//!
//! Exit codes:
//!   0 - Success (no conflicts, or no --fail-on-conflict set)
//!   1 - Runtime error (unreadable or malformed catalog, bad config, etc.)
//!   2 - ROM conflicts found with --fail-on-conflict

mod analysis;
mod cli;
mod config;
mod decoder;
mod error;
mod models;
mod report;

use analysis::AnalysisOptions;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::{Report, ReportMetadata};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("MameStats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_analysis(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .mamestats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", config::CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    eprintln!("✅ Created {} with default settings.", config::CONFIG_FILE);
    eprintln!("   Edit it to customize the record tag, conflict checks, and report output.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so a report written to stdout stays clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
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

/// Run the complete analysis workflow. Returns exit code (0 or 2).
fn run_analysis(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let input = args
        .input
        .clone()
        .context("An input catalog file is required")?;

    // Step 1: Open the catalog
    let file = File::open(&input)
        .with_context(|| format!("Failed to open catalog: {}", input.display()))?;
    let total_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
    info!("Reading catalog: {} ({} bytes)", input.display(), total_bytes);

    let progress = if config.general.progress {
        Some(create_progress_bar(total_bytes))
    } else {
        None
    };

    // Step 2: Stream and aggregate
    let options = AnalysisOptions::from(&config);
    let result = analysis::analyze(BufReader::new(file), &options, progress.as_ref());

    if let Some(ref bar) = progress {
        bar.finish_and_clear();
    }

    let analysis = result.with_context(|| format!("Failed to analyze {}", input.display()))?;

    // Step 3: Build the report
    let duration = start_time.elapsed().as_secs_f64();

    let metadata = ReportMetadata {
        input: input.display().to_string(),
        build: analysis.build,
        analysis_date: Utc::now(),
        bytes_read: analysis.bytes_read,
        duration_seconds: duration,
        checked_fields: options.checked_fields.clone(),
    };

    let report = Report::new(
        metadata,
        analysis.statistics,
        config.report.include_all_rom_counts,
    );

    // Step 4: Render and write
    let output = match config.general.format {
        OutputFormat::Text => report::generate_text_report(&report),
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, config.report.max_shared_roms)
        }
        OutputFormat::Json => report::generate_json_report(&report)?,
    };

    let output_path = config.general.output.as_ref().map(PathBuf::from);
    report::write_report(&output, output_path.as_deref())?;

    let stats = &report.statistics;
    info!(
        "Machines: {} total, {} standard | Conflicts: {} | Duration: {:.1}s",
        stats.machines.total,
        stats.machines.standard,
        stats.roms.conflicts.len(),
        duration
    );
    if let Some(ref path) = output_path {
        info!("Report saved to: {}", path.display());
    }

    // Check --fail-on-conflict
    if args.fail_on_conflict && !stats.roms.conflicts.is_empty() {
        eprintln!(
            "\n⛔ {} ROM conflict(s) found. Failing (exit code 2).",
            stats.roms.conflicts.len()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Create a byte-based progress bar for reading the catalog.
fn create_progress_bar(total_bytes: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
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
            info!("Loaded default config from {}", config::CONFIG_FILE);
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
