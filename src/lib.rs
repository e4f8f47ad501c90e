//! # FPSelect
//!
//! An attribute selection engine for browser fingerprinting defenses.
//!
//! Given a dataset of browser fingerprints, the engine searches for a
//! subset of the candidate attributes that keeps the *sensitivity* (the
//! share of users an attacker can impersonate by replaying the most
//! common fingerprints) below a threshold, while minimizing a *usability
//! cost* that grows with every attribute collected (memory, instability,
//! collection time).
//!
//! Three exploration strategies are provided: entropy-greedy,
//! conditional-entropy-greedy, and the FPSelect multi-path best-first
//! lattice search with pruning. Every run produces a serializable
//! exploration trace.
//!
//! # Quick Start
//!
//! ```
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use fpselect::{
//!     AnalysisConfig, Exploration, FingerprintDataset, MemoryInstability, TopKFingerprints,
//! };
//!
//! fn main() -> fpselect::Result<()> {
//!     let csv = "browser_id,time_of_collect,user_agent,timezone\n\
//!                1,2024-03-01 10:00:00,Firefox,60\n\
//!                2,2024-03-01 10:00:00,Chrome,120\n\
//!                3,2024-03-01 10:00:00,Chrome,60\n";
//!     let dataset = Arc::new(FingerprintDataset::from_csv_reader(csv.as_bytes())?);
//!
//!     // Sensitivity: share of users behind the single most common fingerprint
//!     let sensitivity = TopKFingerprints::new(Arc::clone(&dataset), 1)?;
//!     // Usability cost: weighted memory footprint and instability
//!     let usability_cost = MemoryInstability::new(
//!         BTreeMap::from([(1, 20.0), (2, 3.0)]),
//!         BTreeMap::from([(1, 0.1), (2, 0.0)]),
//!         BTreeMap::from([("memory".into(), 1.0), ("instability".into(), 10.0)]),
//!     )?;
//!
//!     let exploration = Exploration::fpselect(
//!         Box::new(sensitivity),
//!         Box::new(usability_cost),
//!         dataset,
//!         0.7,
//!         AnalysisConfig::default(),
//!         2,
//!         true,
//!     )?;
//!     exploration.run()?;
//!     println!("selected attributes: {}", exploration.get_solution()?);
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `fpselect-core` | Attributes, errors, trace data model, configuration |
//! | `fpselect-data` | Fingerprint frames, CSV ingestion, cached views |
//! | `fpselect-concurrency` | Worker pool and cancellation |
//! | `fpselect-measures` | Measure kernels, sensitivity and cost measures |
//! | `fpselect-exploration` | The exploration controller and strategies |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use fpselect_core::{
    format_elapsed, format_timestamp, verify_trace, verify_trace_file, AnalysisConfig,
    AnalysisSection, Attribute, AttributeSet, Error, MultiprocessingSection, Result,
    RunParameters, State, Trace, TraceEntry, TraceResult, NATIVE_ENGINE,
};

pub use fpselect_concurrency::{CancelToken, WorkerPool};

pub use fpselect_data::{
    read_average_sizes, read_collection_times, read_instabilities, FingerprintDataset,
    FingerprintFrame, FingerprintRow, BROWSER_ID, MISSING_VALUE_TEXT, TIME_OF_COLLECT,
};

pub use fpselect_measures::{
    attribute_set_entropy, average_size, dimension, proportion_of_changes, top_k_share, Analysis,
    AttributeSetEntropy, AttributeSetSample, AttributeSetUnicity, AverageFingerprintSize,
    MemoryInstability, MemoryInstabilityTime, ProportionOfChanges, SensitivityMeasure,
    TopKFingerprints, UsabilityCostMeasure,
};

pub use fpselect_exploration::{Exploration, ExplorationHandle};
