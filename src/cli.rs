//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// MameStats - streaming statistics for MAME XML catalogs
///
/// Reads a `mame -listxml` catalog in a single pass and reports machine
/// counts, driver and feature status tables, and ROMs whose size disagrees
/// between machines.
///
/// Examples:
///   mamestats mame.xml
///   mamestats mame.xml --format markdown --output stats.md
///   mamestats mame.xml --format json --check-hashes
///   mamestats hbmame.xml --record-tag game
///   mamestats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Catalog XML file to analyze
    #[arg(value_name = "INPUT", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// If not specified, the report is written to stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .mamestats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output (includes sampled machines)
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress bar)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format (text, markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Element name that delimits a record
    #[arg(long, value_name = "TAG", env = "MAMESTATS_RECORD_TAG")]
    pub record_tag: Option<String>,

    /// Log every Nth standard machine at debug level (0 disables)
    #[arg(long, value_name = "COUNT")]
    pub sample_interval: Option<u64>,

    /// Also flag ROMs whose CRC or SHA-1 differs between machines
    ///
    /// By default only ROM sizes are compared.
    #[arg(long)]
    pub check_hashes: bool,

    /// Do not show a progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Exit with code 2 if any ROM conflict is found
    ///
    /// Useful for CI pipelines that validate catalog builds.
    #[arg(long)]
    pub fail_on_conflict: bool,

    /// Generate a default .mamestats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain key = value lines (default)
    #[default]
    Text,
    /// Markdown format
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
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref input) = self.input else {
            return Err("An input catalog file is required".to_string());
        };

        if !input.exists() {
            return Err(format!("Input file does not exist: {}", input.display()));
        }
        if !input.is_file() {
            return Err(format!("Input path is not a file: {}", input.display()));
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref tag) = self.record_tag {
            if tag.trim().is_empty() {
                return Err("Record tag must not be empty".to_string());
            }
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
