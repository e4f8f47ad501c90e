//! Error types for the attribute selection engine
//!
//! This module defines all error types used throughout the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! Every error is propagated to the caller: the exploration core never
//! recovers internally. Synchronous callers receive the typed error at the
//! call site; asynchronous callers receive it from the terminal accessors
//! (`get_solution`, `get_execution_time`, `save_exploration_trace`).

use std::io;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the attribute selection engine
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// The dataset lacks the mandatory index columns
    #[error(
        "the required metadata columns `browser_id` and `time_of_collect` \
         are missing from the dataset"
    )]
    MissingMetadata,

    /// An attribute with this id is already present in the set
    #[error("an attribute with the id {id} is already in the set")]
    DuplicateAttributeId {
        /// The id of the attribute that was added twice
        id: u32,
    },

    /// Lookup of an absent attribute id/name or a column missing in a view
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// An operation received an empty input where at least one row or
    /// attribute is required
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// A cost-measure weight map does not have the expected dimension keys
    #[error("incorrect weight dimensions: expected {expected:?}, received {received:?}")]
    IncorrectWeightDimensions {
        /// The dimension keys the measure expects
        expected: Vec<String>,
        /// The dimension keys that were received
        received: Vec<String>,
    },

    /// An accessor was called before the exploration was run
    #[error("the exploration was not run")]
    ExplorationNotRun,

    /// The sensitivity threshold cannot be satisfied even with the complete
    /// set of candidate attributes
    #[error(
        "the sensitivity threshold of {threshold} is unreachable: the minimum \
         sensitivity using all the candidate attributes is {minimum}"
    )]
    ThresholdUnreachable {
        /// The configured sensitivity threshold
        threshold: f64,
        /// The sensitivity of the complete candidate attribute set
        minimum: f64,
    },

    /// A parameter is outside its valid range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A loaded trace has a missing or type-mismatched field
    #[error("trace field `{path}` is missing or has the wrong type")]
    TraceSchema {
        /// Slash-separated path of the offending field
        path: String,
    },

    /// The exploration was cancelled before it terminated
    #[error("the exploration was cancelled")]
    Cancelled,

    /// An asynchronous exploration terminated with an error
    #[error("the exploration failed: {0}")]
    ExplorationFailed(String),
}
