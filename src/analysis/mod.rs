//! Catalog analysis pipeline.
//!
//! Drives the record decoder and the aggregator in lock-step: one machine
//! is fully decoded, then fully aggregated, before the next token is read.

pub mod aggregator;

pub use aggregator::*;

use crate::decoder::{RecordReader, DEFAULT_RECORD_TAG};
use crate::error::Result;
use crate::models::{Bucket, ConflictField, Machine, Statistics};
use indicatif::ProgressBar;
use std::io::BufRead;
use tracing::{debug, info, trace};

/// Records between progress bar updates.
const PROGRESS_EVERY: u64 = 4096;

/// Settings for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Element name of a record.
    pub record_tag: String,
    /// Log every Nth standard machine (0 disables sampling).
    pub sample_interval: u64,
    /// ROM fields checked for conflicts.
    pub checked_fields: Vec<ConflictField>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            record_tag: DEFAULT_RECORD_TAG.to_string(),
            sample_interval: 1000,
            checked_fields: vec![ConflictField::Size],
        }
    }
}

impl From<&crate::config::Config> for AnalysisOptions {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            record_tag: config.decoder.record_tag.clone(),
            sample_interval: config.decoder.sample_interval,
            checked_fields: config.analysis.checked_fields(),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub statistics: Statistics,
    /// Catalog build string, if the root element carried one.
    pub build: Option<String>,
    /// Records decoded.
    pub records: u64,
    /// Bytes consumed from the source.
    pub bytes_read: u64,
}

/// Stream every record out of `source` and aggregate it.
///
/// The first decoding error aborts the run; no partial statistics are
/// returned.
pub fn analyze<R: BufRead>(
    source: R,
    options: &AnalysisOptions,
    progress: Option<&ProgressBar>,
) -> Result<Analysis> {
    let mut reader = RecordReader::from_reader(source).with_record_tag(&options.record_tag);
    let mut aggregator = Aggregator::with_checked_fields(&options.checked_fields);

    debug!(
        "Analyzing <{}> records, checking {:?}",
        options.record_tag,
        aggregator.checked_fields()
    );

    while let Some(machine) = reader.next() {
        let machine = machine?;
        let bucket = aggregator.add(&machine);
        trace!("{} counted as {}", machine.name, bucket);

        if bucket == Bucket::Standard
            && options.sample_interval > 0
            && aggregator.standard_count() % options.sample_interval == 0
        {
            log_sample(&machine);
        }

        if let Some(bar) = progress {
            if reader.records_read() % PROGRESS_EVERY == 0 {
                bar.set_position(reader.byte_position());
            }
        }
    }

    let bytes_read = reader.byte_position();
    if let Some(bar) = progress {
        bar.set_position(bytes_read);
    }

    let records = reader.records_read();
    let build = reader.build().map(String::from);
    let statistics = aggregator.finish();

    info!(
        "Analyzed {} machines ({} standard, {} conflicts)",
        records,
        statistics.machines.standard,
        statistics.roms.conflicts.len()
    );

    Ok(Analysis {
        statistics,
        build,
        records,
        bytes_read,
    })
}

/// Log a sampled machine with its ROM list.
fn log_sample(machine: &Machine) {
    debug!(
        "{}: {} ({}{}{})",
        machine.name,
        machine.description,
        machine.year,
        machine
            .cloneof
            .as_deref()
            .map(|parent| format!(", clone of {}", parent))
            .unwrap_or_default(),
        if machine.runnable { "" } else { ", not runnable" }
    );
    for rom in &machine.roms {
        debug!(" - {}", rom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    const SAMPLE: &str = include_str!("../../fixtures/mame_sample.xml");

    fn run(xml: &str) -> Result<Analysis> {
        analyze(xml.as_bytes(), &AnalysisOptions::default(), None)
    }

    #[test]
    fn test_analyze_sample_catalog() {
        let analysis = run(SAMPLE).unwrap();
        let stats = &analysis.statistics;

        assert_eq!(analysis.records, 6);
        assert_eq!(analysis.build.as_deref(), Some("0.262 (mame0262)"));
        assert!(analysis.bytes_read >= SAMPLE.trim_end().len() as u64);

        assert_eq!(stats.machines.total, 6);
        assert_eq!(stats.machines.bios, 1);
        assert_eq!(stats.machines.device, 1);
        assert_eq!(stats.machines.mechanical, 1);
        assert_eq!(stats.machines.standard, 3);

        assert_eq!(stats.driver.good, 2);
        assert_eq!(stats.driver.imperfect, 1);
        assert_eq!(stats.driver.preliminary, 0);
        assert_eq!(stats.driver.emulation.get("good"), Some(&3));
        assert_eq!(stats.driver.cocktail.get(""), Some(&2));
        assert_eq!(stats.driver.cocktail.get("preliminary"), Some(&1));
        assert_eq!(stats.driver.savestate.get("unsupported"), Some(&1));

        assert_eq!(stats.features.kind.get("sound"), Some(&1));
        assert_eq!(stats.features.kind.get("palette"), Some(&1));
        assert_eq!(stats.features.status.get("imperfect"), Some(&2));
        assert_eq!(stats.features.status.get("unemulated"), None);

        assert_eq!(stats.roms.distinct_names, 6);
        assert_eq!(stats.roms.shared.len(), 2);
        assert_eq!(stats.roms.shared.get("pm1_prg2.6k"), Some(&2));
        assert_eq!(stats.roms.count("sp-s2.sp1"), 0);

        assert_eq!(stats.roms.conflicts.len(), 1);
        assert_eq!(stats.roms.conflicts[0].name, "pm1-4.4a");
        assert_eq!(stats.roms.conflicts[0].machine, "pacman");
        assert_eq!(stats.roms.expected_size("pm1-4.4a"), Some("256"));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let first = run(SAMPLE).unwrap();
        let second = run(SAMPLE).unwrap();

        assert_eq!(first.statistics, second.statistics);
        assert_eq!(
            serde_json::to_string(&first.statistics).unwrap(),
            serde_json::to_string(&second.statistics).unwrap()
        );
    }

    #[test]
    fn test_no_records() {
        let analysis = run(r#"<mame build="0.1"></mame>"#).unwrap();

        assert_eq!(analysis.records, 0);
        assert_eq!(analysis.statistics, Statistics::default());
    }

    #[test]
    fn test_decode_error_aborts_run() {
        let truncated = &SAMPLE[..SAMPLE.len() / 2];
        let err = run(truncated).unwrap_err();

        assert!(matches!(err, CatalogError::Malformed { .. }));
    }

    #[test]
    fn test_progress_bar_reaches_end() {
        let bar = ProgressBar::hidden();
        bar.set_length(SAMPLE.len() as u64);
        let analysis = analyze(SAMPLE.as_bytes(), &AnalysisOptions::default(), Some(&bar)).unwrap();

        assert_eq!(bar.position(), analysis.bytes_read);
        assert!(bar.position() > 0);
    }

    #[test]
    fn test_hash_checks_from_options() {
        let xml = r#"<mame>
            <machine name="one"><rom name="a" size="1" crc="aa"/></machine>
            <machine name="two"><rom name="a" size="1" crc="bb"/></machine>
        </mame>"#;

        let options = AnalysisOptions {
            checked_fields: vec![ConflictField::Size, ConflictField::Crc],
            ..AnalysisOptions::default()
        };
        let analysis = analyze(xml.as_bytes(), &options, None).unwrap();

        assert_eq!(analysis.statistics.roms.conflicts.len(), 1);
        assert_eq!(analysis.statistics.roms.conflicts[0].field, ConflictField::Crc);
        assert!(run(xml).unwrap().statistics.roms.conflicts.is_empty());
    }
}
