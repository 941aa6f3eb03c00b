//! Size-bounded grouping of insertions for `insertData` requests.
//!
//! A batch's size is the exact byte length of the JSON array it is sent as
//! (`[{"name":..,"values":[{"timestamp":..,"value":..},..]},..]`). The size is
//! tracked incrementally, so checking whether the next insertion fits does not
//! re-serialize the batch.

use std::collections::{HashMap, HashSet};

use crate::backend::models::{InsertGroup, InsertValue};
use crate::insertion::rows::CsvSheet;

/// Serialized length of `{"name":` + `,"values":[` + `]}`.
const GROUP_OVERHEAD: usize = 8 + 11 + 2;
/// Serialized length of `[]`.
const EMPTY_ARRAY: usize = 2;

/// One value destined for one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    pub parameter: String,
    pub value: InsertValue,
}

/// A cell that held text but no usable number. Skipped, not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellIssue {
    pub row: usize,
    pub parameter: String,
    pub raw: String,
}

/// Turn sheet rows into insertions, in row-then-column order.
///
/// Blank cells produce nothing. Cells that do not parse as a finite number are
/// skipped and reported.
#[must_use]
pub fn insertions_from_sheet(sheet: &CsvSheet) -> (Vec<Insertion>, Vec<CellIssue>) {
    let mut insertions = Vec::new();
    let mut issues = Vec::new();

    for row in &sheet.rows {
        for (parameter, cell) in sheet.parameters.iter().zip(&row.cells) {
            let raw = cell.trim();
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => insertions.push(Insertion {
                    parameter: parameter.clone(),
                    value: InsertValue {
                        timestamp: row.timestamp,
                        value,
                    },
                }),
                _ => {
                    tracing::warn!(row = row.index, parameter = %parameter, raw = %raw, "Skipping non-numeric cell");
                    issues.push(CellIssue {
                        row: row.index,
                        parameter: parameter.clone(),
                        raw: raw.to_string(),
                    });
                }
            }
        }
    }

    (insertions, issues)
}

/// A pending upload unit.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBatch {
    insertions: Vec<Insertion>,
    names: HashSet<String>,
    size: usize,
}

impl Default for InsertBatch {
    fn default() -> Self {
        Self {
            insertions: Vec::new(),
            names: HashSet::new(),
            size: EMPTY_ARRAY,
        }
    }
}

impl InsertBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insertions in the order they were added.
    #[must_use]
    pub fn insertions(&self) -> &[Insertion] {
        &self.insertions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.insertions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty()
    }

    /// Serialized size of [`InsertBatch::payload`] in bytes.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        self.size
    }

    /// Size the batch would have after adding `insertion`.
    #[must_use]
    pub fn projected_size(&self, insertion: &Insertion) -> usize {
        self.size + self.growth(insertion)
    }

    fn growth(&self, insertion: &Insertion) -> usize {
        let value_len = json_len(&insertion.value);
        if self.names.contains(&insertion.parameter) {
            // `,` + value
            1 + value_len
        } else {
            let separator = usize::from(!self.names.is_empty());
            separator + GROUP_OVERHEAD + json_len(&insertion.parameter) + value_len
        }
    }

    pub fn push(&mut self, insertion: Insertion) {
        self.size += self.growth(&insertion);
        self.names.insert(insertion.parameter.clone());
        self.insertions.push(insertion);
    }

    /// Group the insertions per parameter, in first-seen order, as sent on the wire.
    #[must_use]
    pub fn payload(&self) -> Vec<InsertGroup> {
        let mut groups: Vec<InsertGroup> = Vec::with_capacity(self.names.len());
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(self.names.len());
        for ins in &self.insertions {
            match index.get(ins.parameter.as_str()) {
                Some(&i) => groups[i].values.push(ins.value),
                None => {
                    index.insert(&ins.parameter, groups.len());
                    groups.push(InsertGroup {
                        name: ins.parameter.clone(),
                        values: vec![ins.value],
                    });
                }
            }
        }
        groups
    }
}

fn json_len<T: serde::Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_vec(value).map_or(0, |v| v.len())
}

/// Accumulates insertions and hands out full batches.
#[derive(Debug)]
pub struct BatchBuilder {
    threshold: usize,
    current: InsertBatch,
}

impl BatchBuilder {
    /// `threshold` is the largest serialized size a batch may reach. A single
    /// insertion larger than that still goes out, alone in its batch.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            current: InsertBatch::new(),
        }
    }

    /// Add an insertion. Returns the previous batch if this one did not fit in it.
    pub fn push(&mut self, insertion: Insertion) -> Option<InsertBatch> {
        let full = if !self.current.is_empty()
            && self.current.projected_size(&insertion) > self.threshold
        {
            Some(std::mem::take(&mut self.current))
        } else {
            None
        };

        self.current.push(insertion);
        if self.current.len() == 1 && self.current.serialized_size() > self.threshold {
            tracing::warn!(
                size = self.current.serialized_size(),
                threshold = self.threshold,
                "Single insertion exceeds batch threshold"
            );
        }
        full
    }

    /// Hand out whatever is left.
    #[must_use]
    pub fn finish(self) -> Option<InsertBatch> {
        (!self.current.is_empty()).then_some(self.current)
    }
}

/// Split `insertions` into batches of at most `threshold` bytes, passing each
/// batch to `transmit` in input order.
pub fn build_batches<F>(insertions: impl IntoIterator<Item = Insertion>, threshold: usize, mut transmit: F)
where
    F: FnMut(InsertBatch),
{
    let mut builder = BatchBuilder::new(threshold);
    for insertion in insertions {
        if let Some(batch) = builder.push(insertion) {
            tracing::debug!(insertions = batch.len(), size = batch.serialized_size(), "batch_emitted");
            transmit(batch);
        }
    }
    if let Some(batch) = builder.finish() {
        tracing::debug!(insertions = batch.len(), size = batch.serialized_size(), "batch_emitted");
        transmit(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ins(parameter: &str, timestamp: i64, value: f64) -> Insertion {
        Insertion {
            parameter: parameter.to_string(),
            value: InsertValue { timestamp, value },
        }
    }

    #[test]
    fn tracked_size_matches_serialization() {
        let mut batch = InsertBatch::new();
        assert_eq!(batch.serialized_size(), serde_json::to_vec(&batch.payload()).unwrap().len());

        for i in [
            ins("Temp", 0, 5.0),
            ins("pH", 0, 6.25),
            ins("Temp", 3_600_000, -1.5e-3),
            ins("Dissolved \"O2\"", 7_200_000, 12.0),
        ] {
            let projected = batch.projected_size(&i);
            batch.push(i);
            assert_eq!(batch.serialized_size(), projected);
            assert_eq!(
                batch.serialized_size(),
                serde_json::to_vec(&batch.payload()).unwrap().len()
            );
        }
    }

    #[test]
    fn payload_groups_by_first_appearance() {
        let mut batch = InsertBatch::new();
        batch.push(ins("Temp", 0, 5.0));
        batch.push(ins("pH", 0, 6.0));
        batch.push(ins("Temp", 1, 7.0));

        let payload = batch.payload();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].name, "Temp");
        assert_eq!(payload[0].values.len(), 2);
        assert_eq!(payload[1].name, "pH");
    }

    #[test]
    fn builder_flushes_before_overflow() {
        // one Temp group with one value serializes to 56 bytes, each extra value adds 28
        let mut builder = BatchBuilder::new(90);
        assert!(builder.push(ins("Temp", 0, 1.0)).is_none());
        let emitted = builder.push(ins("Temp", 1, 2.0));
        assert!(emitted.is_none(), "second value still fits");
        let emitted = builder.push(ins("Temp", 2, 3.0)).expect("third value overflows");
        assert_eq!(emitted.len(), 2);
        assert!(emitted.serialized_size() <= 90);
        assert_eq!(builder.finish().unwrap().len(), 1);
    }

    #[test]
    fn oversized_insertion_goes_out_alone() {
        let mut batches = Vec::new();
        build_batches(
            vec![ins("Temp", 0, 1.0), ins("pH", 0, 2.0)],
            10,
            |b| batches.push(b),
        );
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 1));
    }
}
