//! Streaming record parser for watch-list sections
//!
//! Each source section is read with one `SectionReader`, a lazy iterator that
//! yields one typed row per logical record together with its position. Only
//! the record in flight is buffered: a single `csv::ByteRecord` is reused for
//! every row, and the raw bytes are hashed as they stream past so the reload
//! report can carry a content hash per list.
//!
//! Malformed rows come out as `ReadError::Row` and iteration continues, even
//! when every row of a section is malformed. Header mismatches, missing
//! required columns and I/O failures come out as `ReadError::Structural`,
//! after which the iterator is fused.

pub mod csl;
pub mod sdn;

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Read};
use std::marker::PhantomData;

use chrono::NaiveDate;
use csv::ByteRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::{RowError, RowErrorKind, StructuralError};
use crate::model::SourceList;

pub use csl::CslRow;
pub use sdn::{AddressRow, AlternateIdentityRow, CommentRow, SdnRow};

/// OFAC null marker for absent values
const NULL_MARKER: &str = "-0-";

/// End-of-file marker (SUB) terminating OFAC files
const EOF_MARKER: &[u8] = b"\x1a";

/// A named section of a source list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// SDN core records
    Sdn,
    Addresses,
    AlternateIdentities,
    Comments,
    /// Consolidated Screening List records (single unified format)
    CslUs,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Sdn,
        Section::Addresses,
        Section::AlternateIdentities,
        Section::Comments,
        Section::CslUs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Sdn => "sdn",
            Section::Addresses => "addresses",
            Section::AlternateIdentities => "alternate_identities",
            Section::Comments => "comments",
            Section::CslUs => "csl_us",
        }
    }

    /// The list this section belongs to
    pub fn source_list(&self) -> SourceList {
        match self {
            Section::Sdn
            | Section::Addresses
            | Section::AlternateIdentities
            | Section::Comments => SourceList::UsOfac,
            Section::CslUs => SourceList::UsCsl,
        }
    }

    /// File name the publisher uses for this section
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Section::Sdn => "sdn.csv",
            Section::Addresses => "add.csv",
            Section::AlternateIdentities => "alt.csv",
            Section::Comments => "sdn_comments.csv",
            Section::CslUs => "csl.csv",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record was read from
///
/// `line` is 1-based; `record` is the zero-based record index in the section.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RecordPosition {
    pub line: u64,
    pub record: u64,
}

impl fmt::Display for RecordPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} (record {})", self.line, self.record)
    }
}

/// A parsed row and the position it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Positioned<T> {
    pub position: RecordPosition,
    pub row: T,
}

/// How a section treats its first record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMode {
    /// Headerless layout; a header row is accepted if it matches the columns
    Optional,
    /// First record is a header; columns are resolved by name
    Required,
}

/// A typed row of one section layout
pub trait SectionRecord: Sized {
    const SECTION: Section;
    /// Column names in layout order
    const COLUMNS: &'static [&'static str];
    /// Columns that must be present in a `Required` header
    const REQUIRED_COLUMNS: &'static [&'static str];
    const HEADER: HeaderMode;

    fn from_fields(fields: &Fields<'_>) -> Result<Self, RowErrorKind>;
}

/// Failure produced while iterating a section
#[derive(Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Row(RowError),
    #[error(transparent)]
    Structural(StructuralError),
}

impl ReadError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReadError::Structural(_))
    }
}

/// Field accessor over the record in flight, addressed by layout column
pub struct Fields<'a> {
    record: &'a ByteRecord,
    columns: &'a [Option<usize>],
}

impl<'a> Fields<'a> {
    /// Raw cell for a layout column, trimmed; absent columns read as empty
    pub fn raw(&self, column: usize) -> Cow<'a, str> {
        let bytes = self
            .columns
            .get(column)
            .copied()
            .flatten()
            .and_then(|idx| self.record.get(idx))
            .unwrap_or_default();
        match String::from_utf8_lossy(bytes) {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
            Cow::Owned(s) => Cow::Owned(s.trim().to_string()),
        }
    }

    /// Cleaned text value: trimmed, with the null marker mapped to empty
    pub fn text(&self, column: usize) -> String {
        let raw = self.raw(column);
        if raw == NULL_MARKER {
            String::new()
        } else {
            raw.into_owned()
        }
    }

    /// A required identifier made of ASCII digits
    pub fn numeric_id(&self, column: usize, field: &'static str) -> Result<String, RowErrorKind> {
        let value = self.text(column);
        if value.is_empty() {
            return Err(RowErrorKind::MissingValue { field });
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RowErrorKind::InvalidNumber { field, value });
        }
        Ok(value)
    }

    /// A required sequence number
    pub fn sequence(&self, column: usize, field: &'static str) -> Result<u32, RowErrorKind> {
        let value = self.text(column);
        if value.is_empty() {
            return Err(RowErrorKind::MissingValue { field });
        }
        value
            .parse::<u32>()
            .map_err(|_| RowErrorKind::InvalidNumber { field, value })
    }

    /// An optional count such as tonnage; thousands separators are accepted
    pub fn optional_number(
        &self,
        column: usize,
        field: &'static str,
    ) -> Result<Option<u64>, RowErrorKind> {
        let value = self.text(column);
        if value.is_empty() {
            return Ok(None);
        }
        let digits: String = value.chars().filter(|c| *c != ',' && *c != ' ').collect();
        digits
            .parse::<u64>()
            .map(Some)
            .map_err(|_| RowErrorKind::InvalidNumber { field, value })
    }

    /// An optional `YYYY-MM-DD` date
    pub fn optional_date(
        &self,
        column: usize,
        field: &'static str,
    ) -> Result<Option<NaiveDate>, RowErrorKind> {
        let value = self.text(column);
        if value.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| RowErrorKind::InvalidDate { field, value })
    }

    /// A `;`-separated multi-value cell
    pub fn list(&self, column: usize) -> Vec<String> {
        split_multi(&self.text(column))
    }
}

/// Split a `;`-separated cell into trimmed, non-empty values
pub fn split_multi(cell: &str) -> Vec<String> {
    cell.split(';')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// `Read` adapter that hashes every byte it passes through
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    /// Hex SHA-256 of the bytes read so far
    pub fn hex_digest(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}

/// Lazy typed-row iterator over one section
pub struct SectionReader<R: Read, T: SectionRecord> {
    inner: csv::Reader<HashingReader<R>>,
    record: ByteRecord,
    columns: Vec<Option<usize>>,
    expected_len: usize,
    header_checked: bool,
    done: bool,
    accepted: u64,
    rejected: u64,
    _row: PhantomData<T>,
}

impl<R: Read, T: SectionRecord> SectionReader<R, T> {
    pub fn new(reader: R) -> Self {
        let inner = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(HashingReader::new(reader));

        Self {
            inner,
            record: ByteRecord::new(),
            columns: (0..T::COLUMNS.len()).map(Some).collect(),
            expected_len: T::COLUMNS.len(),
            header_checked: false,
            done: false,
            accepted: 0,
            rejected: 0,
            _row: PhantomData,
        }
    }

    /// Hex SHA-256 of the section bytes consumed so far
    pub fn content_hash(&self) -> String {
        self.inner.get_ref().hex_digest()
    }

    pub fn bytes_read(&self) -> u64 {
        self.inner.get_ref().bytes_read()
    }

    /// Rows parsed successfully so far
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Rows rejected so far
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn record_position(&self) -> RecordPosition {
        self.record
            .position()
            .map(|p| RecordPosition {
                line: p.line(),
                record: p.record(),
            })
            .unwrap_or_default()
    }

    /// Inspect the first non-blank record. Returns true when it was a header.
    fn inspect_header(&mut self) -> Result<bool, StructuralError> {
        let found: Vec<String> = self
            .record
            .iter()
            .enumerate()
            .map(|(idx, cell)| header_cell(idx, cell))
            .collect();

        match T::HEADER {
            HeaderMode::Optional => {
                let first = found.first().map(String::as_str).unwrap_or_default();
                if first != T::COLUMNS[0] {
                    return Ok(false);
                }
                let matches = found.len() == T::COLUMNS.len()
                    && found.iter().zip(T::COLUMNS).all(|(f, c)| f == c);
                if !matches {
                    return Err(StructuralError::HeaderMismatch {
                        section: T::SECTION,
                        expected: T::COLUMNS.iter().map(|c| c.to_string()).collect(),
                        found,
                    });
                }
                Ok(true)
            }
            HeaderMode::Required => {
                for required in T::REQUIRED_COLUMNS {
                    if !found.iter().any(|f| f == required) {
                        return Err(StructuralError::MissingColumn {
                            section: T::SECTION,
                            column: required,
                        });
                    }
                }
                self.columns = T::COLUMNS
                    .iter()
                    .map(|column| found.iter().position(|f| f == column))
                    .collect();
                self.expected_len = found.len();
                Ok(true)
            }
        }
    }
}

impl<R: Read, T: SectionRecord> Iterator for SectionReader<R, T> {
    type Item = Result<Positioned<T>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            match self.inner.read_byte_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(source) => {
                    self.done = true;
                    return Some(Err(ReadError::Structural(StructuralError::Read {
                        section: T::SECTION,
                        source,
                    })));
                }
            }

            if is_blank(&self.record) {
                continue;
            }

            if !self.header_checked {
                self.header_checked = true;
                match self.inspect_header() {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(e) => {
                        self.done = true;
                        return Some(Err(ReadError::Structural(e)));
                    }
                }
            }

            let position = self.record_position();

            if self.record.len() != self.expected_len {
                self.rejected += 1;
                return Some(Err(ReadError::Row(RowError {
                    section: T::SECTION,
                    position,
                    kind: RowErrorKind::FieldCount {
                        expected: self.expected_len,
                        found: self.record.len(),
                    },
                })));
            }

            let fields = Fields {
                record: &self.record,
                columns: &self.columns,
            };
            return match T::from_fields(&fields) {
                Ok(row) => {
                    self.accepted += 1;
                    Some(Ok(Positioned { position, row }))
                }
                Err(kind) => {
                    self.rejected += 1;
                    Some(Err(ReadError::Row(RowError {
                        section: T::SECTION,
                        position,
                        kind,
                    })))
                }
            };
        }
    }
}

/// Normalized header cell; strips a UTF-8 byte order mark from the first cell
fn header_cell(idx: usize, cell: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(cell);
    let mut text: &str = &decoded;
    if idx == 0 {
        text = text.trim_start_matches('\u{feff}');
    }
    text.trim().to_ascii_lowercase()
}

/// Empty lines and the trailing end-of-file marker carry no record
fn is_blank(record: &ByteRecord) -> bool {
    record
        .iter()
        .all(|cell| cell.trim_ascii().is_empty() || cell == EOF_MARKER)
}
