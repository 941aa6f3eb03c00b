//! CSV sheets for bulk insertion.
//!
//! Layout: the header's first two columns hold the date and time of
//! collection, every further column names a parameter. Each data row lines up
//! positionally with the header.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use std::io::Read;

use crate::error::{AppError, AppResult};

/// Date/time layouts accepted in the first two columns.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// A data row that passed structural checks.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRow {
    /// Line the row starts on, counted from the header line as 0.
    pub index: usize,
    pub timestamp: i64,
    /// One cell per parameter column, untrimmed.
    pub cells: Vec<String>,
}

/// A data row that could not be used, with enough context to fix the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Line the row starts on, counted from the header line as 0.
    pub index: usize,
    /// The row as written in the file.
    pub raw: String,
    pub reason: String,
}

impl From<RejectedRow> for AppError {
    fn from(row: RejectedRow) -> Self {
        Self::InvalidRow {
            index: row.index,
            raw: row.raw,
            reason: row.reason,
        }
    }
}

/// One record with its location in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// Line the record starts on, counted from the header line as 0.
    pub line: usize,
    /// Record text exactly as written, without the line terminator.
    pub raw: String,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CsvSheet {
    pub parameters: Vec<String>,
    pub rows: Vec<TimedRow>,
    pub rejected: Vec<RejectedRow>,
}

impl CsvSheet {
    /// Read a sheet from CSV text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` or `AppError::Csv` on unreadable input and `AppError::InvalidRow`
    /// (index 0) when the header is missing or too short.
    pub fn read<R: Read>(mut input: R, offset: FixedOffset) -> AppResult<Self> {
        let mut text = String::new();
        input.read_to_string(&mut text)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut located: Vec<(u64, u64, Vec<String>)> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let (line, byte) = record.position().map_or((0, 0), |p| (p.line(), p.byte()));
            located.push((line, byte, record.iter().map(str::to_string).collect()));
        }

        let ends: Vec<u64> = located
            .iter()
            .skip(1)
            .map(|(_, byte, _)| *byte)
            .chain(std::iter::once(text.len() as u64))
            .collect();

        let records: Vec<(u64, String, Vec<String>)> = located
            .into_iter()
            .zip(ends)
            .map(|((line, byte, cells), end)| {
                let span = usize::try_from(byte)
                    .ok()
                    .zip(usize::try_from(end).ok())
                    .and_then(|(start, end)| text.get(start..end));
                match span {
                    Some(span) => {
                        // A record's position can sit before the blank lines skipped ahead of it
                        let body = span.trim_start_matches(['\r', '\n']);
                        let skipped = span[..span.len() - body.len()].matches('\n').count() as u64;
                        let raw = body.trim_end_matches(['\r', '\n']).to_string();
                        (line + skipped, raw, cells)
                    }
                    None => (line, cells.join(","), cells),
                }
            })
            .collect();

        let mut records = records.into_iter();
        let Some((header_line, _, header)) = records.next() else {
            return Err(AppError::BadRequest("CSV input is empty".to_string()));
        };
        let rows = records
            .map(|(line, raw, cells)| SourceRecord {
                line: usize::try_from(line.saturating_sub(header_line)).unwrap_or(usize::MAX),
                raw,
                cells,
            })
            .collect();

        Self::from_source(header, rows, offset)
    }

    /// Build a sheet from already split records. Row `i` of `rows` gets index
    /// `i + 1` and its cells joined by commas as raw text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRow` (index 0) if the header has fewer than two columns.
    pub fn from_records(
        header: Vec<String>,
        rows: Vec<Vec<String>>,
        offset: FixedOffset,
    ) -> AppResult<Self> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, cells)| SourceRecord {
                line: i + 1,
                raw: cells.join(","),
                cells,
            })
            .collect();
        Self::from_source(header, rows, offset)
    }

    /// Build a sheet from located records.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRow` (index 0) if the header has fewer than two columns.
    pub fn from_source(
        header: Vec<String>,
        rows: Vec<SourceRecord>,
        offset: FixedOffset,
    ) -> AppResult<Self> {
        if header.len() < 2 {
            return Err(AppError::InvalidRow {
                index: 0,
                raw: header.join(","),
                reason: "header needs date and time columns".to_string(),
            });
        }

        let width = header.len();
        let parameters: Vec<String> = header[2..].iter().map(|h| h.trim().to_string()).collect();
        let mut sheet = Self {
            parameters,
            ..Self::default()
        };

        for record in rows {
            let SourceRecord { line: index, raw, cells } = record;

            // Rows of empty cells carry no data
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }

            if cells.len() != width {
                let reason = format!("expected {width} columns, found {}", cells.len());
                sheet.reject(index, raw, reason);
                continue;
            }

            let Some(timestamp) = parse_timestamp(&cells[0], &cells[1], offset) else {
                sheet.reject(index, raw, "unrecognized date/time".to_string());
                continue;
            };

            sheet.rows.push(TimedRow {
                index,
                timestamp,
                cells: cells[2..].to_vec(),
            });
        }

        Ok(sheet)
    }

    fn reject(&mut self, index: usize, raw: String, reason: String) {
        tracing::warn!(row = index, raw = %raw, reason = %reason, "Rejected CSV row");
        self.rejected.push(RejectedRow { index, raw, reason });
    }
}

/// Combine a date cell and a time cell into epoch milliseconds.
///
/// The pair is read as wall-clock time at `offset`. An empty time means midnight.
#[must_use]
pub fn parse_timestamp(date: &str, time: &str, offset: FixedOffset) -> Option<i64> {
    let date = date.trim();
    let time = time.trim();

    let naive = if time.is_empty() {
        DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(date, f).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    } else {
        let combined = format!("{date} {time}");
        DATETIME_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(&combined, f).ok())
    }?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|t| t.timestamp_millis())
}
