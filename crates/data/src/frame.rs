//! Row-major fingerprint table
//!
//! A [`FingerprintFrame`] is the storage behind a dataset: one row per
//! observed fingerprint, indexed by `(browser_id, time_of_collect)`, one
//! column per candidate attribute. Cells hold the collected value as text
//! or nothing at all when the attribute could not be collected.
//!
//! Missing cells are never dropped by the counting kernels: every kernel
//! reads cells through [`FingerprintFrame::text_value`], which coerces a
//! missing cell to the distinct category [`MISSING_VALUE_TEXT`].

use chrono::NaiveDateTime;
use fpselect_core::{Error, Result};
use rustc_hash::FxHashMap;

/// Name of the mandatory browser identifier column
pub const BROWSER_ID: &str = "browser_id";

/// Name of the mandatory collection time column
pub const TIME_OF_COLLECT: &str = "time_of_collect";

/// Textual category that missing cells coerce to in the counting kernels
pub const MISSING_VALUE_TEXT: &str = "missing";

/// One observed fingerprint: the index pair plus one cell per attribute
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintRow {
    /// Identifier of the browser the fingerprint was collected from
    pub browser_id: i64,
    /// When the fingerprint was collected
    pub time_of_collect: NaiveDateTime,
    /// One cell per attribute column, `None` when the value is missing
    pub values: Vec<Option<String>>,
}

/// A read-only fingerprint table
#[derive(Debug, Clone)]
pub struct FingerprintFrame {
    attribute_names: Vec<String>,
    column_by_name: FxHashMap<String, usize>,
    rows: Vec<FingerprintRow>,
}

impl FingerprintFrame {
    /// Build a frame from its attribute column names and rows
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] when a row does not have one
    /// cell per attribute column.
    pub fn new(
        attribute_names: Vec<String>,
        rows: Vec<FingerprintRow>,
    ) -> Result<Self> {
        for (row_index, row) in rows.iter().enumerate() {
            if row.values.len() != attribute_names.len() {
                return Err(Error::InvalidParameter(format!(
                    "row {row_index} has {} cells but the frame has {} attribute columns",
                    row.values.len(),
                    attribute_names.len()
                )));
            }
        }
        let column_by_name = attribute_names
            .iter()
            .enumerate()
            .map(|(column, name)| (name.clone(), column))
            .collect();
        Ok(Self {
            attribute_names,
            column_by_name,
            rows,
        })
    }

    /// The attribute column names, in file order
    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows of the frame
    pub fn rows(&self) -> &[FingerprintRow] {
        &self.rows
    }

    /// Index of the attribute column with this name
    ///
    /// # Errors
    /// Returns [`Error::KeyNotFound`] when the frame has no such column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.column_by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::KeyNotFound(format!("no column named {name} in the dataset")))
    }

    /// The raw cell at `(row, column)`, `None` when the value is missing
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows[row].values[column].as_deref()
    }

    /// The cell at `(row, column)` in its textual form
    ///
    /// Missing cells coerce to [`MISSING_VALUE_TEXT`] so that rows with
    /// missing values keep contributing to frequency counts.
    pub fn text_value(&self, row: usize, column: usize) -> &str {
        self.value(row, column).unwrap_or(MISSING_VALUE_TEXT)
    }

    /// Row indices grouped per browser, each group sorted by collect time
    ///
    /// Browsers appear in first-appearance order; within a group the sort
    /// is stable, so rows sharing a collect time keep their file order.
    pub fn browser_groups(&self) -> Vec<(i64, Vec<usize>)> {
        let mut group_of: FxHashMap<i64, usize> = FxHashMap::default();
        let mut groups: Vec<(i64, Vec<usize>)> = Vec::new();
        for (row_index, row) in self.rows.iter().enumerate() {
            let slot = *group_of.entry(row.browser_id).or_insert_with(|| {
                groups.push((row.browser_id, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(row_index);
        }
        for (_, row_indices) in &mut groups {
            row_indices.sort_by_key(|&row_index| self.rows[row_index].time_of_collect);
        }
        groups
    }

    /// Row indices keeping one fingerprint per browser
    ///
    /// For each browser the rows are ordered by collect time and the
    /// first (`last = false`) or last (`last = true`) one is kept.
    /// Browsers keep their first-appearance order.
    pub fn one_per_browser_rows(&self, last: bool) -> Vec<usize> {
        self.browser_groups()
            .into_iter()
            .filter_map(|(_, row_indices)| {
                if last {
                    row_indices.last().copied()
                } else {
                    row_indices.first().copied()
                }
            })
            .collect()
    }

    /// A new frame holding the given rows, in the given order
    pub fn select_rows(&self, row_indices: &[usize]) -> Self {
        let rows = row_indices
            .iter()
            .map(|&row_index| self.rows[row_index].clone())
            .collect();
        Self {
            attribute_names: self.attribute_names.clone(),
            column_by_name: self.column_by_name.clone(),
            rows,
        }
    }
}
