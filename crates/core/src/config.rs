//! Analysis configuration
//!
//! The configuration mirrors the two concerns the engine exposes knobs
//! for: the data-analysis engine label recorded in run parameters, and the
//! multiprocessing policy (whether the measures and the explorations use
//! the worker pool, and how many cores the pool leaves free).
//!
//! The configuration is loaded from a TOML file:
//!
//! ```toml
//! [analysis]
//! engine = "native"
//!
//! [multiprocessing]
//! measures = true
//! explorations = true
//! free_cores = 1
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Label of the built-in data-analysis engine
pub const NATIVE_ENGINE: &str = "native";

/// The `[analysis]` section of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    /// Label of the data-analysis engine, recorded in run parameters
    pub engine: String,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            engine: NATIVE_ENGINE.to_string(),
        }
    }
}

/// The `[multiprocessing]` section of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiprocessingSection {
    /// Whether the measure kernels use the worker pool
    pub measures: bool,
    /// Whether the explorations use the worker pool
    pub explorations: bool,
    /// Number of cores the worker pool leaves free
    pub free_cores: u32,
}

impl Default for MultiprocessingSection {
    fn default() -> Self {
        Self {
            measures: true,
            explorations: true,
            free_cores: 1,
        }
    }
}

/// Configuration of the analysis engine and the multiprocessing policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// The `[analysis]` section
    pub analysis: AnalysisSection,
    /// The `[multiprocessing]` section
    pub multiprocessing: MultiprocessingSection,
}

impl AnalysisConfig {
    /// A configuration that never uses the worker pool
    pub fn single_process() -> Self {
        Self {
            multiprocessing: MultiprocessingSection {
                measures: false,
                explorations: false,
                free_cores: 0,
            },
            ..Self::default()
        }
    }

    /// Parse a configuration from its TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|parse_error| Error::Config(parse_error.to_string()))
    }

    /// Load a configuration from a TOML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }
}
