//! Tabular source reader: the only place input files are opened.
//!
//! Every source is comma-delimited with a header row. Columns are addressed by
//! fixed zero-based index. Rows are visited exactly once, in file order.
//!
//! Rows are read as raw bytes. A cell is only decoded as UTF-8 when a phase
//! asks for it, so columns nobody reads may hold any encoding.
//!
//! RULE: phases never open files themselves. They hand a closure to
//! `TabularSource::scan` and report row-level problems as `RowDefect`;
//! the source decides, per `MalformedRowPolicy`, whether a defect is fatal.

use crate::{
    config::MalformedRowPolicy,
    error::{ReconError, ReconResult},
};
use csv::{ByteRecord, ReaderBuilder};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// A problem with a single row. Fatal or skipped depending on policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDefect(pub String);

/// How an empty quantity cell is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyQuantity {
    Zero,
    Rejected,
}

/// One data row, borrowed from the reader for the duration of a callback.
#[derive(Debug, Clone, Copy)]
pub struct SourceRow<'a> {
    /// 1-based line number in the file (the header is line 1).
    pub line: u64,
    record: &'a ByteRecord,
}

impl<'a> SourceRow<'a> {
    /// Field at `index` as text. "" past the end of the row, though `scan`
    /// never hands out rows shorter than the requested width.
    pub fn field(&self, index: usize) -> Result<&'a str, RowDefect> {
        let raw = self.record.get(index).unwrap_or_default();
        std::str::from_utf8(raw)
            .map_err(|_| RowDefect(format!("column {index}: not valid UTF-8")))
    }

    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    /// Parse a non-negative integer quantity. Surrounding whitespace is ignored.
    pub fn quantity(&self, index: usize, empty: EmptyQuantity) -> Result<u64, RowDefect> {
        let raw = self.field(index)?.trim();
        if raw.is_empty() {
            return match empty {
                EmptyQuantity::Zero => Ok(0),
                EmptyQuantity::Rejected => {
                    Err(RowDefect(format!("column {index}: quantity is required")))
                }
            };
        }
        raw.parse::<u64>()
            .map_err(|_| RowDefect(format!("column {index}: '{raw}' is not a non-negative integer")))
    }
}

/// Counters for a completed scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub rows_read:    u64,
    pub rows_skipped: u64,
}

pub struct TabularSource {
    name:   String,
    policy: MalformedRowPolicy,
    reader: csv::Reader<Box<dyn Read>>,
}

impl TabularSource {
    /// Open `path` as the source called `name` (used in error messages and logs).
    pub fn open(name: &str, path: &Path, policy: MalformedRowPolicy) -> ReconResult<Self> {
        let file = File::open(path).map_err(|cause| ReconError::SourceUnavailable {
            source_name: name.to_string(),
            path: path.display().to_string(),
            cause,
        })?;
        log::debug!("opened {name} source: {}", path.display());
        Ok(Self::from_reader(name, BufReader::new(file), policy))
    }

    /// Wrap any reader. Used by tests and by callers that already hold the data.
    pub fn from_reader<R: Read + 'static>(name: &str, reader: R, policy: MalformedRowPolicy) -> Self {
        let reader: Box<dyn Read> = Box::new(reader);
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Self {
            name: name.to_string(),
            policy,
            reader,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Visit every data row once. Rows shorter than `width` columns and rows
    /// for which `visit` returns a `RowDefect` are handled per policy.
    pub fn scan<F>(&mut self, width: usize, mut visit: F) -> ReconResult<ScanStats>
    where
        F: FnMut(SourceRow<'_>) -> Result<(), RowDefect>,
    {
        let mut stats = ScanStats::default();
        let mut record = ByteRecord::new();

        while self.read_next(&mut record)? {
            stats.rows_read += 1;
            let line = record.position().map_or(0, |p| p.line());
            let row = SourceRow { line, record: &record };

            let outcome = if row.len() < width {
                Err(RowDefect(format!(
                    "expected at least {width} columns, found {}",
                    row.len()
                )))
            } else {
                visit(row)
            };

            if let Err(RowDefect(detail)) = outcome {
                match self.policy {
                    MalformedRowPolicy::Fail => {
                        return Err(ReconError::MalformedRow {
                            source_name: self.name.clone(),
                            line,
                            detail,
                        });
                    }
                    MalformedRowPolicy::Skip => {
                        log::warn!("{} line {line}: skipping malformed row: {detail}", self.name);
                        stats.rows_skipped += 1;
                    }
                }
            }
        }

        log::debug!(
            "{}: {} rows read, {} skipped",
            self.name,
            stats.rows_read,
            stats.rows_skipped
        );
        Ok(stats)
    }

    fn read_next(&mut self, record: &mut ByteRecord) -> ReconResult<bool> {
        self.reader
            .read_byte_record(record)
            .map_err(|cause| ReconError::SourceRead {
                source_name: self.name.clone(),
                cause,
            })
    }
}
