//! Measures over fingerprint datasets
//!
//! This crate holds everything that turns a dataset into numbers:
//! - The pure measure kernels: joint entropy, top-k share, instability,
//!   average size
//! - The sensitivity measure interface and its top-k implementation
//! - The usability cost measure interface and the memory/instability and
//!   memory/instability/collection-time implementations
//! - Whole-dataset analyses with CSV export, used to produce the cost
//!   input files
//!
//! The distinguishability kernels operate on the deduplicated view so
//! that every browser contributes exactly once; the stability and size
//! kernels operate on the full table so that every recorded fingerprint
//! contributes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod kernels;
pub mod sensitivity;
pub mod usability;

pub use analysis::{
    Analysis, AttributeSetEntropy, AttributeSetSample, AttributeSetUnicity,
    AverageFingerprintSize, ProportionOfChanges,
};
pub use kernels::{attribute_set_entropy, average_size, proportion_of_changes, top_k_share};
pub use sensitivity::{SensitivityMeasure, TopKFingerprints};
pub use usability::{
    dimension, MemoryInstability, MemoryInstabilityTime, UsabilityCostMeasure,
};
