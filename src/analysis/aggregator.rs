//! Running statistics over decoded machines.
//!
//! The aggregator is fed one machine at a time and keeps counters,
//! frequency tables and the ROM name consistency map. It performs no I/O
//! and cannot fail.

use crate::models::{Bucket, Conflict, ConflictField, Machine, Statistics, Tally};
use std::collections::BTreeMap;

/// Incremental aggregation state for one run.
#[derive(Debug, Clone)]
pub struct Aggregator {
    checked: Vec<ConflictField>,
    stats: Statistics,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Creates an aggregator that checks ROM sizes only.
    pub fn new() -> Self {
        Self::with_checked_fields(&[ConflictField::Size])
    }

    /// Creates an aggregator checking the given ROM fields for conflicts.
    pub fn with_checked_fields(fields: &[ConflictField]) -> Self {
        let mut checked = fields.to_vec();
        checked.sort();
        checked.dedup();

        Self {
            checked,
            stats: Statistics::default(),
        }
    }

    /// ROM fields checked for first-writer-wins consistency.
    pub fn checked_fields(&self) -> &[ConflictField] {
        &self.checked
    }

    /// Number of standard machines aggregated so far.
    pub fn standard_count(&self) -> u64 {
        self.stats.machines.standard
    }

    /// Adds one machine and returns the bucket it was counted in.
    ///
    /// Only standard machines contribute to the driver, feature and ROM
    /// statistics.
    pub fn add(&mut self, machine: &Machine) -> Bucket {
        let bucket = machine.bucket();
        let counts = &mut self.stats.machines;
        counts.total += 1;

        match bucket {
            Bucket::Mechanical => counts.mechanical += 1,
            Bucket::Bios => counts.bios += 1,
            Bucket::Device => counts.device += 1,
            Bucket::Standard => {
                counts.standard += 1;
                self.add_driver(machine);
                self.add_features(machine);
                self.add_roms(machine);
            }
        }

        bucket
    }

    fn add_driver(&mut self, machine: &Machine) {
        let driver = &machine.driver;
        let stats = &mut self.stats.driver;

        tally(&mut stats.status, &driver.status);
        tally(&mut stats.emulation, &driver.emulation);
        tally(&mut stats.cocktail, &driver.cocktail);
        tally(&mut stats.savestate, &driver.savestate);

        match driver.status.as_str() {
            "good" => stats.good += 1,
            "imperfect" => stats.imperfect += 1,
            "preliminary" => stats.preliminary += 1,
            _ => {}
        }
    }

    fn add_features(&mut self, machine: &Machine) {
        let stats = &mut self.stats.features;

        for feature in &machine.features {
            tally(&mut stats.kind, &feature.kind);
            tally(&mut stats.status, &feature.status);
            tally(&mut stats.overall, &feature.overall);
        }
    }

    fn add_roms(&mut self, machine: &Machine) {
        let roms = &mut self.stats.roms;

        for rom in &machine.roms {
            tally(&mut roms.occurrences, &rom.name);

            match roms.expected.get(&rom.name) {
                None => {
                    let first: BTreeMap<ConflictField, String> = self
                        .checked
                        .iter()
                        .map(|&field| (field, rom.field(field).to_string()))
                        .collect();
                    roms.expected.insert(rom.name.clone(), first);
                }
                Some(expected) => {
                    for &field in &self.checked {
                        let Some(value) = expected.get(&field) else {
                            continue;
                        };
                        if value != rom.field(field) {
                            roms.conflicts.push(Conflict {
                                machine: machine.name.clone(),
                                field,
                                expected: value.clone(),
                                name: rom.name.clone(),
                                size: rom.size.clone(),
                                crc: rom.crc.clone(),
                                sha1: rom.sha1.clone(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Finishes the run and returns the final statistics.
    pub fn finish(mut self) -> Statistics {
        let roms = &mut self.stats.roms;
        roms.distinct_names = roms.occurrences.len();
        roms.shared = roms
            .occurrences
            .iter()
            .filter(|&(_, &count)| count > 1)
            .map(|(name, &count)| (name.clone(), count))
            .collect();

        self.stats
    }
}

/// Increment the count for `key`, allocating only on first sighting.
fn tally(table: &mut Tally, key: &str) {
    if let Some(count) = table.get_mut(key) {
        *count += 1;
    } else {
        table.insert(key.to_string(), 1);
    }
}

/// Entries of a frequency table sorted by count (highest first), then key.
pub fn sorted_by_count(table: &Tally) -> Vec<(&str, u64)> {
    let mut entries: Vec<(&str, u64)> = table.iter().map(|(k, &v)| (k.as_str(), v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
}

/// Sum of all counts in a frequency table.
pub fn tally_total(table: &Tally) -> u64 {
    table.values().sum()
}

/// Conflicts grouped by ROM name.
pub fn conflicts_by_name(conflicts: &[Conflict]) -> BTreeMap<&str, Vec<&Conflict>> {
    let mut grouped: BTreeMap<&str, Vec<&Conflict>> = BTreeMap::new();

    for conflict in conflicts {
        grouped.entry(conflict.name.as_str()).or_default().push(conflict);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Driver, Feature, Rom};

    fn rom(name: &str, size: &str) -> Rom {
        Rom {
            name: name.to_string(),
            size: size.to_string(),
            crc: format!("crc-{}", size),
            sha1: String::new(),
        }
    }

    fn standard(name: &str, roms: Vec<Rom>) -> Machine {
        Machine {
            name: name.to_string(),
            roms,
            driver: Driver {
                status: "good".to_string(),
                ..Driver::default()
            },
            ..Machine::default()
        }
    }

    fn feature(kind: &str, status: &str) -> Feature {
        Feature {
            kind: kind.to_string(),
            status: status.to_string(),
            overall: String::new(),
        }
    }

    fn scenario(second_size: &str) -> Statistics {
        let mut agg = Aggregator::new();

        agg.add(&Machine {
            name: "neogeo".to_string(),
            bios: true,
            ..Machine::default()
        });
        agg.add(&Machine {
            name: "pinball".to_string(),
            mechanical: true,
            ..Machine::default()
        });
        agg.add(&standard("game", vec![rom("a", "10"), rom("a", second_size)]));

        agg.finish()
    }

    #[test]
    fn test_empty_run() {
        let stats = Aggregator::new().finish();

        assert_eq!(stats, Statistics::default());
        assert!(stats.roms.conflicts.is_empty());
        assert_eq!(stats.roms.distinct_names, 0);
    }

    #[test]
    fn test_matching_sizes_no_conflict() {
        let stats = scenario("10");

        assert_eq!(stats.machines.total, 3);
        assert_eq!(stats.machines.standard, 1);
        assert_eq!(stats.machines.mechanical, 1);
        assert_eq!(stats.machines.bios, 1);
        assert_eq!(stats.machines.device, 0);
        assert!(stats.roms.conflicts.is_empty());
        assert_eq!(stats.roms.count("a"), 2);
        assert_eq!(stats.roms.shared.get("a"), Some(&2));
        assert_eq!(stats.roms.distinct_names, 1);
    }

    #[test]
    fn test_differing_size_conflict() {
        let stats = scenario("20");

        assert_eq!(stats.roms.conflicts.len(), 1);
        let conflict = &stats.roms.conflicts[0];
        assert_eq!(conflict.name, "a");
        assert_eq!(conflict.size, "20");
        assert_eq!(conflict.expected, "10");
        assert_eq!(conflict.field, ConflictField::Size);
        assert_eq!(conflict.machine, "game");
        assert_eq!(stats.roms.expected_size("a"), Some("10"));
    }

    #[test]
    fn test_first_writer_wins_across_records() {
        let mut agg = Aggregator::new();
        agg.add(&standard("one", vec![rom("a", "10")]));
        agg.add(&standard("two", vec![rom("a", "20")]));
        agg.add(&standard("three", vec![rom("a", "20")]));
        agg.add(&standard("four", vec![rom("a", "10")]));
        let stats = agg.finish();

        let machines: Vec<&str> = stats.roms.conflicts.iter().map(|c| c.machine.as_str()).collect();
        assert_eq!(machines, vec!["two", "three"]);
        assert_eq!(stats.roms.expected_size("a"), Some("10"));
        assert_eq!(stats.roms.count("a"), 4);
    }

    #[test]
    fn test_empty_first_size_is_kept() {
        let mut agg = Aggregator::new();
        agg.add(&standard("one", vec![rom("a", "")]));
        agg.add(&standard("two", vec![rom("a", "10")]));
        let stats = agg.finish();

        assert_eq!(stats.roms.expected_size("a"), Some(""));
        assert_eq!(stats.roms.conflicts.len(), 1);
    }

    #[test]
    fn test_non_standard_roms_ignored() {
        let mut agg = Aggregator::new();
        let mut device = standard("z80", vec![rom("a", "99")]);
        device.device = true;
        agg.add(&device);
        agg.add(&standard("game", vec![rom("a", "10")]));
        let stats = agg.finish();

        assert_eq!(stats.roms.count("a"), 1);
        assert_eq!(stats.roms.expected_size("a"), Some("10"));
        assert!(stats.roms.conflicts.is_empty());
        assert_eq!(stats.driver.status.get("good"), Some(&1));
    }

    #[test]
    fn test_driver_tables_and_scalars() {
        let mut agg = Aggregator::new();
        for status in ["good", "good", "imperfect", "preliminary", "broken", ""] {
            let mut m = standard("m", Vec::new());
            m.driver.status = status.to_string();
            m.driver.savestate = "supported".to_string();
            agg.add(&m);
        }
        let stats = agg.finish();

        assert_eq!(stats.driver.good, 2);
        assert_eq!(stats.driver.imperfect, 1);
        assert_eq!(stats.driver.preliminary, 1);
        assert_eq!(stats.driver.status.get("broken"), Some(&1));
        assert_eq!(stats.driver.status.get(""), Some(&1));
        assert_eq!(stats.driver.emulation.get(""), Some(&6));
        assert_eq!(stats.driver.savestate.get("supported"), Some(&6));
        assert_eq!(tally_total(&stats.driver.cocktail), 6);
    }

    #[test]
    fn test_feature_tables_count_per_feature() {
        let mut agg = Aggregator::new();
        let mut m = standard("m", Vec::new());
        m.features = vec![feature("sound", "imperfect"), feature("sound", "unemulated")];
        agg.add(&m);
        let stats = agg.finish();

        assert_eq!(stats.features.kind.get("sound"), Some(&2));
        assert_eq!(stats.features.status.get("imperfect"), Some(&1));
        assert_eq!(stats.features.status.get("unemulated"), Some(&1));
        assert_eq!(stats.features.overall.get(""), Some(&2));
    }

    #[test]
    fn test_total_equals_bucket_sum() {
        let mut agg = Aggregator::new();
        let flags = [
            (false, false, false),
            (true, true, true),
            (false, true, true),
            (false, false, true),
            (true, false, false),
            (false, false, false),
        ];
        for (mechanical, bios, device) in flags {
            agg.add(&Machine {
                mechanical,
                bios,
                device,
                ..Machine::default()
            });
        }
        let m = agg.finish().machines;

        assert_eq!(m.total, 6);
        assert_eq!(m.total, m.mechanical + m.bios + m.device + m.standard);
        assert_eq!((m.mechanical, m.bios, m.device, m.standard), (2, 1, 1, 2));
    }

    #[test]
    fn test_hash_checks_opt_in() {
        let first = Rom {
            name: "a".to_string(),
            size: "10".to_string(),
            crc: "aaaa".to_string(),
            sha1: "1111".to_string(),
        };
        let second = Rom {
            crc: "bbbb".to_string(),
            ..first.clone()
        };

        let mut size_only = Aggregator::new();
        size_only.add(&standard("one", vec![first.clone()]));
        size_only.add(&standard("two", vec![second.clone()]));
        assert!(size_only.finish().roms.conflicts.is_empty());

        let mut hashes =
            Aggregator::with_checked_fields(&[ConflictField::Sha1, ConflictField::Size, ConflictField::Crc]);
        assert_eq!(
            hashes.checked_fields(),
            &[ConflictField::Size, ConflictField::Crc, ConflictField::Sha1]
        );
        hashes.add(&standard("one", vec![first]));
        hashes.add(&standard("two", vec![second]));
        let stats = hashes.finish();

        assert_eq!(stats.roms.conflicts.len(), 1);
        assert_eq!(stats.roms.conflicts[0].field, ConflictField::Crc);
        assert_eq!(stats.roms.conflicts[0].expected, "aaaa");
        assert_eq!(stats.roms.expected_value("a", ConflictField::Sha1), Some("1111"));
    }

    #[test]
    fn test_sorted_by_count() {
        let table: Tally = [("b".to_string(), 2), ("a".to_string(), 2), ("c".to_string(), 5)]
            .into_iter()
            .collect();

        let sorted = sorted_by_count(&table);
        assert_eq!(sorted, vec![("c", 5), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn test_conflicts_by_name() {
        let mut agg = Aggregator::new();
        agg.add(&standard("one", vec![rom("a", "1"), rom("b", "1")]));
        agg.add(&standard("two", vec![rom("a", "2"), rom("b", "2")]));
        agg.add(&standard("three", vec![rom("a", "3")]));
        let stats = agg.finish();

        let grouped = conflicts_by_name(&stats.roms.conflicts);
        assert_eq!(grouped.get("a").map(|v| v.len()), Some(2));
        assert_eq!(grouped.get("b").map(|v| v.len()), Some(1));
    }
}
