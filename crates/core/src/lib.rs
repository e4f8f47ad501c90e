//! Core types for the FPSelect attribute selection engine
//!
//! This crate defines the foundational types used throughout the workspace:
//! - Attribute: A candidate fingerprinting attribute (id + name)
//! - AttributeSet: An id-ordered set of attributes with set semantics
//! - Error: Error type hierarchy
//! - State / TraceEntry / Trace: The exploration trace data model
//! - RunParameters: The serialized parameters of an exploration run
//! - AnalysisConfig: Analysis engine and multiprocessing configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod config;
pub mod error;
pub mod trace;

pub use attribute::{Attribute, AttributeSet};
pub use config::{AnalysisConfig, AnalysisSection, MultiprocessingSection, NATIVE_ENGINE};
pub use error::{Error, Result};
pub use trace::{
    format_elapsed, format_timestamp, verify_trace, verify_trace_file, RunParameters, State,
    Trace, TraceEntry, TraceResult,
};
