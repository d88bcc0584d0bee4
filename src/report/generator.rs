//! Report generation.
//!
//! This module renders a [`Report`] as plain `key = value` text, as a
//! Markdown document, or as JSON.

use crate::analysis::{conflicts_by_name, sorted_by_count, tally_total};
use crate::models::{Conflict, DriverStats, FeatureStats, Report, ReportMetadata, RomStats, Tally};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Label shown for the empty-string key of a frequency table.
const EMPTY_KEY: &str = "(none)";

fn display_key(key: &str) -> &str {
    if key.is_empty() {
        EMPTY_KEY
    } else {
        key
    }
}

/// Generate a plain `key = value` report.
///
/// Sections follow the order driver tables, feature tables, machine
/// counts, status counts, shared ROM names, conflicts.
pub fn generate_text_report(report: &Report) -> String {
    let stats = &report.statistics;
    let mut out = String::new();

    out.push_str(&format!("input = {}\n", report.metadata.input));
    if let Some(ref build) = report.metadata.build {
        out.push_str(&format!("build = {}\n", build));
    }

    push_tally_lines(&mut out, "driver.status", &stats.driver.status);
    push_tally_lines(&mut out, "driver.emulation", &stats.driver.emulation);
    push_tally_lines(&mut out, "driver.cocktail", &stats.driver.cocktail);
    push_tally_lines(&mut out, "driver.savestate", &stats.driver.savestate);
    push_tally_lines(&mut out, "feature.type", &stats.features.kind);
    push_tally_lines(&mut out, "feature.status", &stats.features.status);
    push_tally_lines(&mut out, "feature.overall", &stats.features.overall);

    let m = &stats.machines;
    out.push_str(&format!("count = {}\n", m.standard));
    out.push_str(&format!("mechanical = {}\n", m.mechanical));
    out.push_str(&format!("bios = {}\n", m.bios));
    out.push_str(&format!("device = {}\n", m.device));
    out.push_str(&format!("total = {}\n", m.total));
    out.push_str(&format!("good = {}\n", stats.driver.good));
    out.push_str(&format!("imperfect = {}\n", stats.driver.imperfect));
    out.push_str(&format!("preliminary = {}\n", stats.driver.preliminary));

    for (name, count) in &stats.roms.shared {
        out.push_str(&format!("rom[{}] = {}\n", name, count));
    }
    out.push_str(&format!("rom_names = {}\n", stats.roms.distinct_names));

    out.push_str(&format!("conflicts = {}\n", stats.roms.conflicts.len()));
    for conflict in &stats.roms.conflicts {
        out.push_str(&format!(
            "conflict = {} ({} {}, expected {}, machine {})\n",
            conflict.id(),
            conflict.field,
            conflict.field_value(),
            display_key(&conflict.expected),
            conflict.machine
        ));
    }

    out
}

fn push_tally_lines(out: &mut String, prefix: &str, table: &Tally) {
    for (key, count) in table {
        out.push_str(&format!("{}[{}] = {}\n", prefix, key, count));
    }
}

/// Generate a complete Markdown report.
///
/// `max_shared_roms` limits the shared ROM table (0 lists every name).
pub fn generate_markdown_report(report: &Report, max_shared_roms: usize) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# MAME Catalog Statistics\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_machines_section(report));
    output.push_str(&generate_driver_section(&report.statistics.driver));
    output.push_str(&generate_features_section(&report.statistics.features));
    output.push_str(&generate_roms_section(&report.statistics.roms, max_shared_roms));
    output.push_str(&generate_conflicts_section(&report.statistics.roms.conflicts));

    // Footer
    output.push_str("---\n\n");
    output.push_str("*Report generated by MameStats*\n");

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Catalog:** `{}`\n", metadata.input));
    if let Some(ref build) = metadata.build {
        section.push_str(&format!("- **Build:** {}\n", build));
    }
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Bytes Read:** {}\n", metadata.bytes_read));
    let fields: Vec<String> = metadata.checked_fields.iter().map(|f| f.to_string()).collect();
    section.push_str(&format!("- **Conflict Checks:** {}\n", fields.join(", ")));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the machine counts section.
fn generate_machines_section(report: &Report) -> String {
    let m = &report.statistics.machines;
    let mut section = String::new();

    section.push_str("## Machines\n\n");
    section.push_str("| Standard | Mechanical | BIOS | Device | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | **{}** |\n\n",
        m.standard, m.mechanical, m.bios, m.device, m.total
    ));

    section
}

/// Generate the driver status section.
fn generate_driver_section(driver: &DriverStats) -> String {
    let mut section = String::new();

    section.push_str("## Driver Status\n\n");
    section.push_str("| Good | Imperfect | Preliminary |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} |\n\n",
        driver.good, driver.imperfect, driver.preliminary
    ));

    section.push_str(&generate_tally_table("Status", &driver.status));
    section.push_str(&generate_tally_table("Emulation", &driver.emulation));
    section.push_str(&generate_tally_table("Cocktail", &driver.cocktail));
    section.push_str(&generate_tally_table("Save State", &driver.savestate));

    section
}

/// Generate the emulated features section.
fn generate_features_section(features: &FeatureStats) -> String {
    let mut section = String::new();

    section.push_str("## Features\n\n");

    if tally_total(&features.kind) == 0 {
        section.push_str("No feature annotations were found.\n\n");
        return section;
    }

    section.push_str(&generate_tally_table("Type", &features.kind));
    section.push_str(&generate_tally_table("Status", &features.status));
    section.push_str(&generate_tally_table("Overall", &features.overall));

    section
}

/// Generate a two-column table for a frequency table, highest count first.
fn generate_tally_table(title: &str, table: &Tally) -> String {
    if table.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str(&format!("### {}\n\n", title));
    section.push_str("| Value | Count |\n");
    section.push_str("|:---|:---:|\n");

    for (key, count) in sorted_by_count(table) {
        section.push_str(&format!("| {} | {} |\n", display_key(key), count));
    }
    section.push('\n');

    section
}

/// Generate the ROM names section.
fn generate_roms_section(roms: &RomStats, max_shared_roms: usize) -> String {
    let mut section = String::new();

    section.push_str("## ROMs\n\n");
    section.push_str(&format!("- **Distinct Names:** {}\n", roms.distinct_names));
    section.push_str(&format!("- **Shared Names:** {}\n\n", roms.shared.len()));

    if roms.shared.is_empty() {
        return section;
    }

    let shared = sorted_by_count(&roms.shared);
    let limit = if max_shared_roms == 0 {
        shared.len()
    } else {
        max_shared_roms.min(shared.len())
    };

    section.push_str("| ROM | Machines |\n");
    section.push_str("|:---|:---:|\n");
    for (name, count) in &shared[..limit] {
        section.push_str(&format!("| `{}` | {} |\n", name, count));
    }
    if limit < shared.len() {
        section.push_str(&format!("\n*{} more shared names not listed.*\n", shared.len() - limit));
    }
    section.push('\n');

    section
}

/// Generate the conflicts section.
fn generate_conflicts_section(conflicts: &[Conflict]) -> String {
    let mut section = String::new();

    section.push_str("## Conflicts\n\n");

    if conflicts.is_empty() {
        section.push_str("No ROM conflicts were found.\n\n");
        return section;
    }

    for (name, entries) in conflicts_by_name(conflicts) {
        section.push_str(&format!("### `{}`\n\n", name));
        section.push_str("| Machine | Field | Expected | Found | CRC | SHA-1 |\n");
        section.push_str("|:---|:---:|:---|:---|:---|:---|\n");

        for conflict in entries {
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                conflict.machine,
                conflict.field,
                display_key(&conflict.expected),
                display_key(conflict.field_value()),
                conflict.crc,
                conflict.sha1
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file, or to stdout when no path is given.
pub fn write_report(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create report file: {}", path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(content.as_bytes())
                .context("Failed to write report to stdout")?;
        }
    }

    Ok(())
}
