use chrono::{FixedOffset, Offset, Utc};
use std::io::Read;

use crate::backend::Backend;
use crate::config::{Config, DEFAULT_INSERT_BATCH_BYTES};
use crate::error::{AppError, AppResult};
use crate::insertion::batch::{CellIssue, InsertBatch, build_batches, insertions_from_sheet};
use crate::insertion::rows::{CsvSheet, RejectedRow};

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Largest serialized size of one `insertData` payload.
    pub batch_bytes: usize,
    /// Offset the sheet's date/time cells are written in.
    pub utc_offset: FixedOffset,
    /// Abort before sending anything if any row is rejected.
    pub strict: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_bytes: DEFAULT_INSERT_BATCH_BYTES,
            utc_offset: Utc.fix(),
            strict: false,
        }
    }
}

impl ImportOptions {
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the configured offset is out of range.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let utc_offset = FixedOffset::east_opt(config.csv_utc_offset_minutes * 60).ok_or_else(|| {
            AppError::BadRequest(format!(
                "UTC offset of {} minutes is out of range",
                config.csv_utc_offset_minutes
            ))
        })?;
        Ok(Self {
            batch_bytes: config.insert_batch_bytes,
            utc_offset,
            strict: config.csv_strict,
        })
    }
}

/// What an import did.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Data rows that passed structural checks.
    pub rows_read: usize,
    pub insertions: usize,
    pub batches_sent: usize,
    pub rejected_rows: Vec<RejectedRow>,
    pub skipped_cells: Vec<CellIssue>,
}

impl ImportReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected_rows.is_empty() && self.skipped_cells.is_empty()
    }
}

/// Parse a sheet and split it into batches without sending anything.
///
/// # Errors
///
/// Returns the first rejected row as `AppError::InvalidRow` in strict mode.
pub fn plan_import(sheet: &CsvSheet, options: &ImportOptions) -> AppResult<(Vec<InsertBatch>, ImportReport)> {
    if options.strict
        && let Some(first) = sheet.rejected.first()
    {
        return Err(first.clone().into());
    }

    let (insertions, skipped_cells) = insertions_from_sheet(sheet);
    let report = ImportReport {
        rows_read: sheet.rows.len(),
        insertions: insertions.len(),
        batches_sent: 0,
        rejected_rows: sheet.rejected.clone(),
        skipped_cells,
    };

    let mut batches = Vec::new();
    build_batches(insertions, options.batch_bytes, |batch| batches.push(batch));
    Ok((batches, report))
}

/// Read CSV from `input` and send it to the backend, one batch at a time.
///
/// Each batch is awaited before the next is sent, so batches reach the backend
/// in file order. The first failing batch stops the import.
///
/// # Errors
///
/// Returns CSV/structure errors before anything is sent, or the error of the
/// first batch that failed.
pub async fn import_csv<R: Read>(
    backend: &dyn Backend,
    input: R,
    options: &ImportOptions,
) -> AppResult<ImportReport> {
    let sheet = CsvSheet::read(input, options.utc_offset)?;
    let (batches, mut report) = plan_import(&sheet, options)?;

    tracing::info!(
        rows = report.rows_read,
        insertions = report.insertions,
        batches = batches.len(),
        rejected_rows = report.rejected_rows.len(),
        skipped_cells = report.skipped_cells.len(),
        "Starting CSV import"
    );

    for (i, batch) in batches.iter().enumerate() {
        if let Err(e) = backend.insert_data(&batch.payload()).await {
            tracing::error!(
                error = %e,
                batch = i,
                batches_committed = report.batches_sent,
                "CSV import stopped"
            );
            return Err(e);
        }
        report.batches_sent += 1;
        tracing::debug!(batch = i, insertions = batch.len(), size = batch.serialized_size(), "batch_sent");
    }

    tracing::info!(batches = report.batches_sent, "CSV import completed");
    Ok(report)
}
