//! Data models for the catalog statistics tool.
//!
//! This module contains the decoded record types (machines, ROMs, driver
//! and feature annotations) and the statistics and report structures
//! produced from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Frequency table keyed by an observed attribute value.
///
/// The value space is open: the empty string is a valid key and stands for
/// an absent attribute.
pub type Tally = BTreeMap<String, u64>;

/// Classification bucket of a machine.
///
/// Exactly one bucket applies, chosen by the priority
/// mechanical, bios, device, standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Mechanical,
    Bios,
    Device,
    Standard,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Mechanical => write!(f, "mechanical"),
            Bucket::Bios => write!(f, "bios"),
            Bucket::Device => write!(f, "device"),
            Bucket::Standard => write!(f, "standard"),
        }
    }
}

/// One ROM image belonging to a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rom {
    /// File name; shared across machines and used as the consistency key.
    pub name: String,
    /// Size in bytes as written in the catalog (may be empty).
    pub size: String,
    /// CRC32 hash (may be empty).
    pub crc: String,
    /// SHA-1 hash (may be empty).
    pub sha1: String,
}

impl Rom {
    /// Returns the value of the given checked field.
    pub fn field(&self, field: ConflictField) -> &str {
        match field {
            ConflictField::Size => &self.size,
            ConflictField::Crc => &self.crc,
            ConflictField::Sha1 => &self.sha1,
        }
    }
}

impl fmt::Display for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}/{}", self.name, self.size, self.crc, self.sha1)
    }
}

/// Emulation quality of a machine's driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Driver {
    /// Overall status: good, imperfect, preliminary, or anything else.
    pub status: String,
    pub emulation: String,
    pub cocktail: String,
    pub savestate: String,
}

/// Per-capability emulation annotation (sound, graphics, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feature {
    /// The `type` attribute.
    pub kind: String,
    pub status: String,
    pub overall: String,
}

/// One decoded `<machine>` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub name: String,
    pub sourcefile: Option<String>,
    pub cloneof: Option<String>,
    pub romof: Option<String>,
    pub description: String,
    pub year: String,
    pub mechanical: bool,
    pub bios: bool,
    pub device: bool,
    pub runnable: bool,
    pub roms: Vec<Rom>,
    pub driver: Driver,
    pub features: Vec<Feature>,
}

impl Default for Machine {
    fn default() -> Self {
        Self {
            name: String::new(),
            sourcefile: None,
            cloneof: None,
            romof: None,
            description: String::new(),
            year: String::new(),
            mechanical: false,
            bios: false,
            device: false,
            // The catalog DTD defaults `runnable` to "yes".
            runnable: true,
            roms: Vec::new(),
            driver: Driver::default(),
            features: Vec::new(),
        }
    }
}

impl Machine {
    /// Returns the classification bucket, first matching flag wins.
    pub fn bucket(&self) -> Bucket {
        if self.mechanical {
            Bucket::Mechanical
        } else if self.bios {
            Bucket::Bios
        } else if self.device {
            Bucket::Device
        } else {
            Bucket::Standard
        }
    }
}

/// ROM attribute checked for first-writer-wins consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictField {
    Size,
    Crc,
    Sha1,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::Size => write!(f, "size"),
            ConflictField::Crc => write!(f, "crc"),
            ConflictField::Sha1 => write!(f, "sha1"),
        }
    }
}

/// A ROM occurrence that disagrees with the first occurrence of its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Machine the conflicting occurrence belongs to.
    pub machine: String,
    /// Which attribute disagreed.
    pub field: ConflictField,
    /// Value recorded by the first occurrence of this name.
    pub expected: String,
    pub name: String,
    pub size: String,
    pub crc: String,
    pub sha1: String,
}

impl Conflict {
    /// Identifier of the conflicting entry, `name-size-crc-sha1`.
    pub fn id(&self) -> String {
        format!("{}-{}-{}-{}", self.name, self.size, self.crc, self.sha1)
    }

    /// The value of the disagreeing field on this occurrence.
    pub fn field_value(&self) -> &str {
        match self.field {
            ConflictField::Size => &self.size,
            ConflictField::Crc => &self.crc,
            ConflictField::Sha1 => &self.sha1,
        }
    }
}

/// Machine counts per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineCounts {
    pub total: u64,
    pub mechanical: u64,
    pub bios: u64,
    pub device: u64,
    pub standard: u64,
}

/// Driver frequency tables over standard machines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStats {
    pub status: Tally,
    pub emulation: Tally,
    pub cocktail: Tally,
    pub savestate: Tally,
    /// Machines whose driver status is exactly "good".
    pub good: u64,
    /// Machines whose driver status is exactly "imperfect".
    pub imperfect: u64,
    /// Machines whose driver status is exactly "preliminary".
    pub preliminary: u64,
}

/// Feature frequency tables over standard machines, one count per feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStats {
    #[serde(rename = "type")]
    pub kind: Tally,
    pub status: Tally,
    pub overall: Tally,
}

/// ROM name statistics over standard machines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomStats {
    /// Occurrences of every ROM name.
    #[serde(skip_serializing_if = "Tally::is_empty")]
    pub occurrences: Tally,
    /// Names seen more than once.
    pub shared: Tally,
    /// Number of distinct ROM names.
    pub distinct_names: usize,
    /// First-seen value per checked field, keyed by ROM name.
    #[serde(skip)]
    pub expected: BTreeMap<String, BTreeMap<ConflictField, String>>,
    pub conflicts: Vec<Conflict>,
}

#[cfg(test)]
impl RomStats {
    /// Returns the size recorded by the first occurrence of `name`.
    pub fn expected_size(&self, name: &str) -> Option<&str> {
        self.expected_value(name, ConflictField::Size)
    }

    /// Returns the first-seen value of `field` for `name`.
    pub fn expected_value(&self, name: &str, field: ConflictField) -> Option<&str> {
        self.expected
            .get(name)
            .and_then(|fields| fields.get(&field))
            .map(String::as_str)
    }

    /// Returns how many times `name` occurred.
    pub fn count(&self, name: &str) -> u64 {
        self.occurrences.get(name).copied().unwrap_or(0)
    }
}

/// Aggregate statistics for a whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub machines: MachineCounts,
    pub driver: DriverStats,
    pub features: FeatureStats,
    pub roms: RomStats,
}

/// Metadata about the statistics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the analyzed catalog.
    pub input: String,
    /// Catalog build string from the root element, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Bytes consumed from the catalog.
    pub bytes_read: u64,
    /// Duration of the analysis in seconds.
    pub duration_seconds: f64,
    /// ROM fields checked for conflicts.
    pub checked_fields: Vec<ConflictField>,
}

/// The complete statistics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub statistics: Statistics,
}

impl Report {
    /// Creates a report, dropping the full per-name ROM counts unless requested.
    pub fn new(metadata: ReportMetadata, mut statistics: Statistics, include_all_rom_counts: bool) -> Self {
        if !include_all_rom_counts {
            statistics.roms.occurrences.clear();
        }
        Self {
            metadata,
            statistics,
        }
    }
}
