//! Streaming record decoder for MAME XML catalogs.
//!
//! This module pulls tokens from a forward-only byte stream and yields one
//! fully decoded [`Machine`] per record element. Only the subtree of the
//! current record is held in memory, so catalogs of any size can be read
//! in a single pass.

use crate::error::{CatalogError, Result};
use crate::models::{Driver, Feature, Machine, Rom};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use tracing::{debug, trace};

/// Element name of a record in `-listxml` output.
pub const DEFAULT_RECORD_TAG: &str = "machine";

/// Text-valued children of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Description,
    Year,
}

impl TextField {
    fn target(self, machine: &mut Machine) -> &mut String {
        match self {
            TextField::Description => &mut machine.description,
            TextField::Year => &mut machine.year,
        }
    }
}

/// What the outer cursor found, extracted before the token buffer is reused.
enum Step {
    Record { machine: Machine, closed: bool },
    Continue,
    Eof,
}

/// A streaming record reader.
///
/// Reads from any `BufRead` source and yields machines as their closing tag
/// is consumed. Record elements are recognized at any nesting depth. The
/// sequence stops at the first error and cannot be restarted.
pub struct RecordReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    record_tag: Vec<u8>,
    /// Open elements outside of any record.
    depth: usize,
    seen_root: bool,
    build: Option<String>,
    records: u64,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    /// Creates a record reader over a buffered byte stream.
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            buf: Vec::with_capacity(4096),
            record_tag: DEFAULT_RECORD_TAG.as_bytes().to_vec(),
            depth: 0,
            seen_root: false,
            build: None,
            records: 0,
            done: false,
        }
    }

    /// Uses a different element name as the record boundary.
    pub fn with_record_tag(mut self, tag: &str) -> Self {
        self.record_tag = tag.as_bytes().to_vec();
        self
    }

    /// The `build` attribute of the root element, once the root has been read.
    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    /// Number of bytes consumed from the stream so far.
    pub fn byte_position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    /// Number of records yielded so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Advances the cursor to the next record and decodes it.
    fn next_record(&mut self) -> Result<Option<Machine>> {
        loop {
            self.buf.clear();

            let step = {
                let event = self
                    .reader
                    .read_event_into(&mut self.buf)
                    .map_err(|e| CatalogError::from_xml(self.reader.buffer_position() as u64, e))?;
                let pos = self.reader.buffer_position() as u64;

                match event {
                    Event::Start(e) => {
                        if e.local_name().as_ref() == self.record_tag.as_slice() {
                            Step::Record {
                                machine: machine_header(&e, pos)?,
                                closed: false,
                            }
                        } else {
                            Self::skip_element(&mut self.seen_root, &mut self.build, &e, pos)?;
                            self.depth += 1;
                            Step::Continue
                        }
                    }
                    Event::Empty(e) => {
                        if e.local_name().as_ref() == self.record_tag.as_slice() {
                            Step::Record {
                                machine: machine_header(&e, pos)?,
                                closed: true,
                            }
                        } else {
                            Self::skip_element(&mut self.seen_root, &mut self.build, &e, pos)?;
                            Step::Continue
                        }
                    }
                    Event::End(_) => {
                        self.depth = self.depth.saturating_sub(1);
                        Step::Continue
                    }
                    Event::Text(e) => {
                        e.unescape().map_err(|err| CatalogError::from_xml(pos, err))?;
                        Step::Continue
                    }
                    Event::CData(e) => {
                        std::str::from_utf8(&e)
                            .map_err(|err| CatalogError::malformed(pos, err.to_string()))?;
                        Step::Continue
                    }
                    Event::Eof => Step::Eof,
                    _ => Step::Continue,
                }
            };

            match step {
                Step::Record {
                    machine,
                    closed: true,
                } => {
                    self.records += 1;
                    return Ok(Some(machine));
                }
                Step::Record {
                    machine,
                    closed: false,
                } => {
                    let machine = self.decode_body(machine)?;
                    self.records += 1;
                    trace!("Decoded machine {}", machine.name);
                    return Ok(Some(machine));
                }
                Step::Eof => {
                    if self.depth > 0 {
                        return Err(CatalogError::malformed(
                            self.byte_position(),
                            format!("unexpected end of document with {} unclosed element(s)", self.depth),
                        ));
                    }
                    debug!("Reached end of catalog after {} records", self.records);
                    return Ok(None);
                }
                Step::Continue => {}
            }
        }
    }

    /// Checks an element outside of any record, capturing the root `build`.
    fn skip_element(
        seen_root: &mut bool,
        build: &mut Option<String>,
        e: &BytesStart<'_>,
        pos: u64,
    ) -> Result<()> {
        if *seen_root {
            check_element(e, pos)
        } else {
            *seen_root = true;
            *build = root_build(e, pos)?;
            Ok(())
        }
    }

    /// Consumes the rest of a record subtree, matching end tag included.
    fn decode_body(&mut self, mut machine: Machine) -> Result<Machine> {
        let mut depth = 1usize;
        let mut capture: Option<TextField> = None;

        loop {
            self.buf.clear();

            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| CatalogError::from_xml(self.reader.buffer_position() as u64, e))?;
            let pos = self.reader.buffer_position() as u64;

            match event {
                Event::Start(e) => {
                    depth += 1;
                    if depth == 2 {
                        capture = apply_child(&mut machine, &e, pos)?;
                    } else {
                        check_element(&e, pos)?;
                    }
                }
                Event::Empty(e) => {
                    if depth == 1 {
                        apply_child(&mut machine, &e, pos)?;
                    } else {
                        check_element(&e, pos)?;
                    }
                }
                Event::End(_) => {
                    depth -= 1;
                    match depth {
                        0 => return Ok(machine),
                        1 => capture = None,
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| CatalogError::from_xml(pos, err))?;
                    if let (2, Some(field)) = (depth, capture) {
                        field.target(&mut machine).push_str(&text);
                    }
                }
                Event::CData(e) => {
                    let text = std::str::from_utf8(&e)
                        .map_err(|err| CatalogError::malformed(pos, err.to_string()))?;
                    if let (2, Some(field)) = (depth, capture) {
                        field.target(&mut machine).push_str(text);
                    }
                }
                Event::Eof => {
                    return Err(CatalogError::malformed(
                        pos,
                        format!("unexpected end of document inside record '{}'", machine.name),
                    ));
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Machine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_record() {
            Ok(Some(machine)) => Some(Ok(machine)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterates attributes with their unescaped values, failing on malformed
/// attribute syntax, bad escapes or invalid UTF-8.
fn for_each_attr<F>(e: &BytesStart<'_>, pos: u64, mut f: F) -> Result<()>
where
    F: FnMut(&[u8], Cow<'_, str>),
{
    for attr in e.attributes() {
        let attr = attr.map_err(|err| CatalogError::malformed(pos, err.to_string()))?;
        let key = attr.key.local_name();
        std::str::from_utf8(key.as_ref())
            .map_err(|err| CatalogError::malformed(pos, format!("attribute name: {}", err)))?;
        let value = attr
            .unescape_value()
            .map_err(|err| CatalogError::from_xml(pos, err))?;
        f(key.as_ref(), value);
    }
    Ok(())
}

fn check_name(e: &BytesStart<'_>, pos: u64) -> Result<()> {
    std::str::from_utf8(e.name().as_ref())
        .map_err(|err| CatalogError::malformed(pos, format!("element name: {}", err)))?;
    Ok(())
}

/// Validates the name and attributes of an element whose content is ignored.
fn check_element(e: &BytesStart<'_>, pos: u64) -> Result<()> {
    check_name(e, pos)?;
    for_each_attr(e, pos, |_, _| {})
}

/// Parses a catalog yes/no flag.
fn is_yes(value: &str) -> bool {
    value == "yes"
}

fn root_build(e: &BytesStart<'_>, pos: u64) -> Result<Option<String>> {
    check_name(e, pos)?;
    let mut build = None;
    for_each_attr(e, pos, |key, value| {
        if key == b"build" {
            build = Some(value.into_owned());
        }
    })?;
    if let Some(ref b) = build {
        debug!("Catalog build: {}", b);
    }
    Ok(build)
}

/// Decodes the attributes of the record element itself.
fn machine_header(e: &BytesStart<'_>, pos: u64) -> Result<Machine> {
    check_name(e, pos)?;
    let mut machine = Machine::default();
    for_each_attr(e, pos, |key, value| match key {
        b"name" => machine.name = value.into_owned(),
        b"sourcefile" => machine.sourcefile = Some(value.into_owned()),
        b"cloneof" => machine.cloneof = Some(value.into_owned()),
        b"romof" => machine.romof = Some(value.into_owned()),
        b"isbios" => machine.bios = is_yes(&value),
        b"isdevice" => machine.device = is_yes(&value),
        b"ismechanical" => machine.mechanical = is_yes(&value),
        b"runnable" => machine.runnable = value != "no",
        _ => {}
    })?;
    Ok(machine)
}

/// Applies a direct child element of a record. Returns the text field the
/// child's character data belongs to, if any.
fn apply_child(machine: &mut Machine, e: &BytesStart<'_>, pos: u64) -> Result<Option<TextField>> {
    check_name(e, pos)?;
    match e.local_name().as_ref() {
        b"rom" => {
            machine.roms.push(rom(e, pos)?);
            Ok(None)
        }
        b"driver" => {
            machine.driver = driver(e, pos)?;
            Ok(None)
        }
        b"feature" => {
            machine.features.push(feature(e, pos)?);
            Ok(None)
        }
        name => {
            let field = match name {
                b"description" => Some(TextField::Description),
                b"year" => Some(TextField::Year),
                _ => None,
            };
            for_each_attr(e, pos, |_, _| {})?;
            if let Some(field) = field {
                field.target(machine).clear();
            }
            Ok(field)
        }
    }
}

fn rom(e: &BytesStart<'_>, pos: u64) -> Result<Rom> {
    let mut rom = Rom::default();
    for_each_attr(e, pos, |key, value| match key {
        b"name" => rom.name = value.into_owned(),
        b"size" => rom.size = value.into_owned(),
        b"crc" => rom.crc = value.into_owned(),
        b"sha1" => rom.sha1 = value.into_owned(),
        _ => {}
    })?;
    Ok(rom)
}

fn driver(e: &BytesStart<'_>, pos: u64) -> Result<Driver> {
    let mut driver = Driver::default();
    for_each_attr(e, pos, |key, value| match key {
        b"status" => driver.status = value.into_owned(),
        b"emulation" => driver.emulation = value.into_owned(),
        b"cocktail" => driver.cocktail = value.into_owned(),
        b"savestate" => driver.savestate = value.into_owned(),
        _ => {}
    })?;
    Ok(driver)
}

fn feature(e: &BytesStart<'_>, pos: u64) -> Result<Feature> {
    let mut feature = Feature::default();
    for_each_attr(e, pos, |key, value| match key {
        b"type" => feature.kind = value.into_owned(),
        b"status" => feature.status = value.into_owned(),
        b"overall" => feature.overall = value.into_owned(),
        _ => {}
    })?;
    Ok(feature)
}
