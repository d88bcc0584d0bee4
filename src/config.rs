//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.mamestats.toml` files.

use crate::cli::OutputFormat;
use crate::decoder::DEFAULT_RECORD_TAG;
use crate::models::ConflictField;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".mamestats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Record decoder settings.
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report output file path; stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Show a progress bar while reading the catalog.
    #[serde(default = "default_true")]
    pub progress: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: None,
            format: OutputFormat::default(),
            progress: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Record decoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Element name of a record.
    #[serde(default = "default_record_tag")]
    pub record_tag: String,

    /// Log every Nth standard machine at debug level (0 disables).
    #[serde(default = "default_sample_interval")]
    pub sample_interval: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            record_tag: default_record_tag(),
            sample_interval: default_sample_interval(),
        }
    }
}

fn default_record_tag() -> String {
    DEFAULT_RECORD_TAG.to_string()
}

fn default_sample_interval() -> u64 {
    1000
}

/// Aggregation settings.
///
/// ROM sizes are always checked; hash checks are opt-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Also flag ROMs whose CRC differs from the first occurrence.
    #[serde(default)]
    pub check_crc: bool,

    /// Also flag ROMs whose SHA-1 differs from the first occurrence.
    #[serde(default)]
    pub check_sha1: bool,
}

impl AnalysisConfig {
    /// ROM fields to check for conflicts.
    pub fn checked_fields(&self) -> Vec<ConflictField> {
        let mut fields = vec![ConflictField::Size];
        if self.check_crc {
            fields.push(ConflictField::Crc);
        }
        if self.check_sha1 {
            fields.push(ConflictField::Sha1);
        }
        fields
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the occurrence count of every ROM name in JSON output.
    #[serde(default)]
    pub include_all_rom_counts: bool,

    /// Maximum shared ROM names listed in Markdown output (0 = all).
    #[serde(default = "default_max_shared_roms")]
    pub max_shared_roms: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_all_rom_counts: false,
            max_shared_roms: default_max_shared_roms(),
        }
    }
}

fn default_max_shared_roms() -> usize {
    50
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
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        if let Some(ref tag) = args.record_tag {
            self.decoder.record_tag = tag.clone();
        }
        if let Some(interval) = args.sample_interval {
            self.decoder.sample_interval = interval;
        }

        if args.check_hashes {
            self.analysis.check_crc = true;
            self.analysis.check_sha1 = true;
        }

        // Flags always override
        if args.no_progress || args.quiet {
            self.general.progress = false;
        }
    }

    /// Check the merged configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.decoder.record_tag.trim().is_empty() {
            anyhow::bail!("Record tag must not be empty");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
