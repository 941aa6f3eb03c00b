use chrono::{DateTime, SecondsFormat};
use std::io::Write;

use crate::error::AppResult;
use crate::series::models::AlignedSeries;

/// Render an epoch-millisecond timestamp as RFC 3339 (UTC).
#[must_use]
pub fn format_timestamp(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Write the aligned table as CSV: a `timestamp` column, then one column per
/// series. Empty cells stay empty.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn write_csv<W: Write>(aligned: &AlignedSeries, writer: W) -> AppResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(aligned.columns.len() + 1);
    header.push("timestamp".to_string());
    header.extend(aligned.columns.iter().map(|c| c.parameter.name.clone()));
    csv_writer.write_record(&header)?;

    for row in aligned.rows() {
        let mut record = Vec::with_capacity(row.cells.len() + 1);
        record.push(format_timestamp(row.timestamp));
        record.extend(
            row.cells
                .iter()
                .map(|c| c.as_ref().map(ToString::to_string).unwrap_or_default()),
        );
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}
