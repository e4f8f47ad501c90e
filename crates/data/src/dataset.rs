//! Fingerprint datasets
//!
//! A [`FingerprintDataset`] couples a [`FingerprintFrame`] with its
//! candidate attributes and the two cached one-fingerprint-per-browser
//! views. The views are materialized lazily, once each; concurrent
//! callers observe exactly one materialization per slot. When a
//! materialized view turns out to keep every row of the source, the slot
//! stores an alias of the source frame rather than a copy.

use chrono::NaiveDateTime;
use fpselect_core::{Attribute, AttributeSet, Error, Result};
use once_cell::sync::OnceCell;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::frame::{FingerprintFrame, FingerprintRow, BROWSER_ID, TIME_OF_COLLECT};

/// Datetime layouts accepted for the `time_of_collect` column
const TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// A fingerprint dataset: frame, candidate attributes, cached views
pub struct FingerprintDataset {
    frame: Arc<FingerprintFrame>,
    candidate_attributes: AttributeSet,
    label: String,
    first_per_browser: OnceCell<Arc<FingerprintFrame>>,
    last_per_browser: OnceCell<Arc<FingerprintFrame>>,
}

impl FingerprintDataset {
    /// Build a dataset from an already constructed frame
    ///
    /// Candidate attribute ids are assigned left-to-right starting at 1,
    /// following the frame column order.
    pub fn from_frame(frame: FingerprintFrame, label: impl Into<String>) -> Result<Self> {
        let mut candidate_attributes = AttributeSet::new();
        for (column, name) in frame.attribute_names().iter().enumerate() {
            candidate_attributes.add(Attribute::new(column as u32 + 1, name.clone()))?;
        }
        Ok(Self {
            frame: Arc::new(frame),
            candidate_attributes,
            label: label.into(),
            first_per_browser: OnceCell::new(),
            last_per_browser: OnceCell::new(),
        })
    }

    /// Load a dataset from a CSV file
    ///
    /// # Errors
    /// Returns [`Error::MissingMetadata`] when the header lacks the
    /// `browser_id` or `time_of_collect` column.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path)?;
        Self::from_csv(file, label)
    }

    /// Load a dataset from an in-memory CSV stream
    pub fn from_csv_reader(reader: impl Read) -> Result<Self> {
        Self::from_csv(reader, "in-memory")
    }

    fn from_csv(reader: impl Read, label: impl Into<String>) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let browser_id_column = headers.iter().position(|name| name == BROWSER_ID);
        let time_column = headers.iter().position(|name| name == TIME_OF_COLLECT);
        let (browser_id_column, time_column) = match (browser_id_column, time_column) {
            (Some(browser_id_column), Some(time_column)) => (browser_id_column, time_column),
            _ => return Err(Error::MissingMetadata),
        };

        let attribute_columns: Vec<usize> = (0..headers.len())
            .filter(|&column| column != browser_id_column && column != time_column)
            .collect();
        let attribute_names: Vec<String> = attribute_columns
            .iter()
            .map(|&column| headers[column].to_string())
            .collect();

        let mut rows = Vec::new();
        for (record_index, record) in csv_reader.records().enumerate() {
            let record = record?;
            let browser_id = record
                .get(browser_id_column)
                .unwrap_or_default()
                .trim()
                .parse::<i64>()
                .map_err(|_| {
                    Error::InvalidParameter(format!(
                        "row {record_index}: the browser_id is not an integer"
                    ))
                })?;
            let time_of_collect =
                parse_time_of_collect(record.get(time_column).unwrap_or_default()).ok_or_else(
                    || {
                        Error::InvalidParameter(format!(
                            "row {record_index}: the time_of_collect is not a datetime"
                        ))
                    },
                )?;
            let values = attribute_columns
                .iter()
                .map(|&column| {
                    let cell = record.get(column).unwrap_or_default();
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            rows.push(FingerprintRow {
                browser_id,
                time_of_collect,
                values,
            });
        }

        Self::from_frame(FingerprintFrame::new(attribute_names, rows)?, label)
    }

    /// The candidate attributes of the dataset
    pub fn candidate_attributes(&self) -> &AttributeSet {
        &self.candidate_attributes
    }

    /// The full fingerprint table
    pub fn frame(&self) -> &Arc<FingerprintFrame> {
        &self.frame
    }

    /// Label of the dataset, recorded in run parameters
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The view keeping one fingerprint per browser
    ///
    /// Keeps the last fingerprint by collect time when `last` is true,
    /// the earliest otherwise. The view is materialized on first request
    /// and cached; when deduplication removes no row the source frame is
    /// returned unchanged to save memory.
    pub fn one_fp_per_browser(&self, last: bool) -> Arc<FingerprintFrame> {
        let slot = if last {
            &self.last_per_browser
        } else {
            &self.first_per_browser
        };
        Arc::clone(slot.get_or_init(|| {
            let kept_rows = self.frame.one_per_browser_rows(last);
            if kept_rows.len() == self.frame.height() {
                debug!(
                    dataset = %self.label,
                    "every browser contributes a single fingerprint, aliasing the source frame"
                );
                Arc::clone(&self.frame)
            } else {
                debug!(
                    dataset = %self.label,
                    browsers = kept_rows.len(),
                    fingerprints = self.frame.height(),
                    last,
                    "materializing the one-fingerprint-per-browser view"
                );
                Arc::new(self.frame.select_rows(&kept_rows))
            }
        }))
    }
}

fn parse_time_of_collect(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    for format in TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(parsed);
        }
    }
    // Date-only collect times are accepted and anchored at midnight
    chrono::NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

impl fmt::Display for FingerprintDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FingerprintDataset({})", self.label)
    }
}

impl fmt::Debug for FingerprintDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintDataset")
            .field("label", &self.label)
            .field("attributes", &self.candidate_attributes.len())
            .field("fingerprints", &self.frame.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CSV: &str = "\
browser_id,time_of_collect,user_agent,timezone
1,2024-03-01 10:00:00,Firefox,60
1,2024-03-02 10:00:00,Firefox,120
2,2024-03-01 11:00:00,Chrome,
3,2024-03-01 12:00:00,Edge,90
";

    #[test]
    fn test_csv_ingestion_assigns_ids_left_to_right() {
        let dataset = FingerprintDataset::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let candidates = dataset.candidate_attributes();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates.get_by_id(1).unwrap().name(), "user_agent");
        assert_eq!(candidates.get_by_id(2).unwrap().name(), "timezone");
        assert_eq!(dataset.frame().height(), 4);
        assert_eq!(dataset.label(), "in-memory");
    }

    #[test]
    fn test_metadata_columns_can_sit_anywhere() {
        let csv = "\
user_agent,browser_id,timezone,time_of_collect
Firefox,1,60,2024-03-01 10:00:00
";
        let dataset = FingerprintDataset::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(
            dataset.candidate_attributes().names(),
            vec!["user_agent", "timezone"]
        );
        assert_eq!(dataset.frame().rows()[0].browser_id, 1);
    }

    #[test]
    fn test_missing_metadata_columns_are_rejected() {
        let csv = "browser_id,user_agent\n1,Firefox\n";
        let result = FingerprintDataset::from_csv_reader(csv.as_bytes());
        assert!(matches!(result, Err(Error::MissingMetadata)));
    }

    #[test]
    fn test_empty_cells_become_missing_values() {
        let dataset = FingerprintDataset::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let timezone = dataset.frame().column_index("timezone").unwrap();
        assert_eq!(dataset.frame().value(2, timezone), None);
    }

    #[test]
    fn test_date_only_collect_times_are_accepted() {
        let csv = "browser_id,time_of_collect,user_agent\n1,2024-03-01,Firefox\n";
        let dataset = FingerprintDataset::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(
            dataset.frame().rows()[0].time_of_collect,
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_dedup_keeps_first_or_last_fingerprint() {
        let dataset = FingerprintDataset::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let timezone = dataset.frame().column_index("timezone").unwrap();

        let first = dataset.one_fp_per_browser(false);
        assert_eq!(first.height(), 3);
        assert_eq!(first.text_value(0, timezone), "60");

        let last = dataset.one_fp_per_browser(true);
        assert_eq!(last.height(), 3);
        assert_eq!(last.text_value(0, timezone), "120");
    }

    #[test]
    fn test_dedup_slots_are_cached() {
        let dataset = FingerprintDataset::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let first_call = dataset.one_fp_per_browser(true);
        let second_call = dataset.one_fp_per_browser(true);
        assert!(
            Arc::ptr_eq(&first_call, &second_call),
            "the slot should be materialized exactly once"
        );
    }

    #[test]
    fn test_already_deduplicated_view_aliases_the_source() {
        let csv = "\
browser_id,time_of_collect,user_agent
1,2024-03-01 10:00:00,Firefox
2,2024-03-01 11:00:00,Chrome
";
        let dataset = FingerprintDataset::from_csv_reader(csv.as_bytes()).unwrap();
        let view = dataset.one_fp_per_browser(true);
        assert!(
            Arc::ptr_eq(&view, dataset.frame()),
            "a no-op deduplication should alias the source frame"
        );
    }

    #[test]
    fn test_from_csv_path_uses_the_path_as_label() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CSV.as_bytes()).unwrap();
        let dataset = FingerprintDataset::from_csv_path(file.path()).unwrap();
        assert_eq!(dataset.label(), file.path().display().to_string());
        assert_eq!(dataset.frame().height(), 4);
    }

    #[test]
    fn test_non_integer_browser_id_is_rejected() {
        let csv = "browser_id,time_of_collect,user_agent\nabc,2024-03-01,Firefox\n";
        let result = FingerprintDataset::from_csv_reader(csv.as_bytes());
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }
}
