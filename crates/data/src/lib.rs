//! Fingerprint dataset layer
//!
//! This crate holds the tabular side of the engine:
//! - FingerprintFrame: row-major fingerprint table indexed by
//!   `(browser_id, time_of_collect)`
//! - FingerprintDataset: a frame plus its candidate attributes and the
//!   cached one-fingerprint-per-browser views
//! - CSV ingestion of datasets and of the per-attribute cost inputs
//!
//! Frames are read-only after construction and safe to share across the
//! worker pool.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cost_inputs;
pub mod dataset;
pub mod frame;

pub use cost_inputs::{read_average_sizes, read_collection_times, read_instabilities};
pub use dataset::FingerprintDataset;
pub use frame::{FingerprintFrame, FingerprintRow, BROWSER_ID, MISSING_VALUE_TEXT, TIME_OF_COLLECT};
