//! Exploration trace data model
//!
//! An exploration records one [`TraceEntry`] per attribute set it visits,
//! in visit order. The finished run serializes to a [`Trace`]: run
//! parameters, the id-to-name attribute dictionary, the result block, and
//! the ordered exploration entries. Entries store attribute ids rather
//! than names to keep traces compact; the top-level `attributes` map
//! recovers the names.
//!
//! [`verify_trace`] checks a trace loaded from an external file against
//! the expected schema and reports the first offending field path.

use chrono::{Duration, NaiveDateTime};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Error, Result};

/// Classification of a visited attribute set
///
/// The numeric codes are part of the trace file format and must not
/// change: `Explored = 1`, `Pruned = 2`, `Satisfying = 3`, `EmptyNode = 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Visited, does not satisfy the sensitivity threshold
    Explored,
    /// Visited, discarded together with all its strict supersets
    Pruned,
    /// Satisfies the sensitivity threshold
    Satisfying,
    /// Placeholder for the lattice root injected by visualization tooling
    EmptyNode,
}

impl State {
    /// The integer code stored in trace files
    pub fn code(self) -> u8 {
        match self {
            State::Explored => 1,
            State::Pruned => 2,
            State::Satisfying => 3,
            State::EmptyNode => 4,
        }
    }

    /// Decode a trace file state code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(State::Explored),
            2 => Some(State::Pruned),
            3 => Some(State::Satisfying),
            4 => Some(State::EmptyNode),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            State::Explored => "explored",
            State::Pruned => "pruned",
            State::Satisfying => "satisfying",
            State::EmptyNode => "empty_node",
        };
        write!(f, "{label}")
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        State::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown exploration state code {code}")))
    }
}

/// Information recorded for one visited attribute set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Elapsed time since the start of the exploration, `H:MM:SS[.ffffff]`
    pub time: String,
    /// Ids of the attributes of the visited set, sorted ascending
    pub attributes: Vec<u32>,
    /// Sensitivity of the attribute set
    pub sensitivity: f64,
    /// Usability cost of the attribute set
    pub usability_cost: f64,
    /// Per-dimension explanation of the usability cost
    pub cost_explanation: BTreeMap<String, f64>,
    /// Classification of the attribute set
    pub state: State,
    /// Sequence id: the position of this entry in the trace
    pub id: i64,
}

impl TraceEntry {
    /// The placeholder lattice-root node used by trace visualizations
    ///
    /// The empty set is never actually evaluated, so the node carries the
    /// neutral values: sensitivity 1.0 (no fingerprinting at all), zero
    /// cost, and the out-of-band id `-1`.
    pub fn empty_root() -> Self {
        Self {
            time: format_elapsed(Duration::zero()),
            attributes: Vec::new(),
            sensitivity: 1.0,
            usability_cost: 0.0,
            cost_explanation: BTreeMap::new(),
            state: State::EmptyNode,
            id: -1,
        }
    }
}

/// Parameters of an exploration run, serialized into the trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Name of the exploration method
    pub method: String,
    /// Label of the sensitivity measure
    pub sensitivity_measure: String,
    /// Label of the usability cost measure
    pub usability_cost_measure: String,
    /// Label of the dataset
    pub dataset: String,
    /// The sensitivity threshold α
    pub sensitivity_threshold: f64,
    /// Label of the data-analysis engine
    pub analysis_engine: String,
    /// Whether the exploration used the worker pool
    pub multiprocessing: bool,
    /// Number of cores kept free by the worker pool
    pub free_cores: u32,
    /// Number of explored paths (FPSelect only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub explored_paths: Option<u32>,
    /// Whether the pruning methods were used (FPSelect only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pruning: Option<bool>,
}

/// Result block of a finished exploration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    /// Ids of the attributes of the solution
    pub solution: Vec<u32>,
    /// Ids of every attribute set that satisfies the threshold
    pub satisfying_attributes: Vec<Vec<u32>>,
    /// Start time of the run, `YYYY-MM-DD HH:MM:SS.ffffff`
    pub start_time: String,
}

/// A complete serialized exploration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Parameters of the run
    pub parameters: RunParameters,
    /// Id-to-name dictionary of the candidate attributes
    pub attributes: BTreeMap<u32, String>,
    /// Result block
    pub result: TraceResult,
    /// Ordered exploration entries
    pub exploration: Vec<TraceEntry>,
}

impl Trace {
    /// Write the trace as JSON to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load a trace from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let trace = serde_json::from_reader(BufReader::new(file))?;
        Ok(trace)
    }
}

/// Format an elapsed duration the way trace consumers expect
///
/// The format is `H:MM:SS` with a six-digit fractional part appended only
/// when the duration has a sub-second component, and a `N days, ` prefix
/// for runs spanning more than a day.
pub fn format_elapsed(elapsed: Duration) -> String {
    let elapsed = elapsed.max(Duration::zero());
    let total_seconds = elapsed.num_seconds();
    let micros = (elapsed - Duration::seconds(total_seconds))
        .num_microseconds()
        .unwrap_or(0)
        .max(0) as u64;

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    let mut formatted = String::new();
    if days > 0 {
        let plural = if days == 1 { "" } else { "s" };
        formatted.push_str(&format!("{days} day{plural}, "));
    }
    formatted.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
    if micros > 0 {
        formatted.push_str(&format!(".{micros:06}"));
    }
    formatted
}

/// Format a run start time for the trace result block
pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Separator of the field paths reported by [`verify_trace`]
const PATH_SEPARATOR: char = '/';

/// Verify a trace loaded from an external file
///
/// Checks the field types of the trace schema and returns the
/// slash-separated path of the first missing or type-mismatched field, or
/// `None` when the trace is well-formed.
pub fn verify_trace(trace: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    fn path(segments: &[&str]) -> String {
        segments.join(&PATH_SEPARATOR.to_string())
    }

    fn field<'a>(object: &'a Value, segments: &[&str]) -> std::result::Result<&'a Value, String> {
        let mut current = object;
        for (depth, segment) in segments.iter().enumerate() {
            current = current
                .get(segment)
                .ok_or_else(|| path(&segments[..=depth]))?;
        }
        Ok(current)
    }

    fn check(
        object: &Value,
        segments: &[&str],
        predicate: impl Fn(&Value) -> bool,
    ) -> std::result::Result<(), String> {
        let value = field(object, segments)?;
        if predicate(value) {
            Ok(())
        } else {
            Err(path(segments))
        }
    }

    fn is_int(value: &Value) -> bool {
        value.is_i64() || value.is_u64()
    }

    fn is_int_list(value: &Value) -> bool {
        value
            .as_array()
            .is_some_and(|items| items.iter().all(is_int))
    }

    fn run(trace: &Value) -> std::result::Result<(), String> {
        check(trace, &["parameters"], Value::is_object)?;
        check(trace, &["parameters", "method"], Value::is_string)?;
        check(trace, &["parameters", "sensitivity_measure"], Value::is_string)?;
        check(
            trace,
            &["parameters", "usability_cost_measure"],
            Value::is_string,
        )?;
        check(trace, &["parameters", "dataset"], Value::is_string)?;
        check(
            trace,
            &["parameters", "sensitivity_threshold"],
            Value::is_f64,
        )?;
        check(trace, &["parameters", "analysis_engine"], Value::is_string)?;
        check(trace, &["parameters", "multiprocessing"], Value::is_boolean)?;
        check(trace, &["parameters", "free_cores"], is_int)?;
        // FPSelect-only parameters: checked only when present
        if let Some(parameters) = trace.get("parameters") {
            if parameters.get("explored_paths").is_some() {
                check(trace, &["parameters", "explored_paths"], is_int)?;
            }
            if parameters.get("pruning").is_some() {
                check(trace, &["parameters", "pruning"], Value::is_boolean)?;
            }
        }

        check(trace, &["attributes"], |value| {
            value
                .as_object()
                .is_some_and(|names| names.values().all(Value::is_string))
        })?;

        check(trace, &["result"], Value::is_object)?;
        check(trace, &["result", "solution"], is_int_list)?;
        check(trace, &["result", "satisfying_attributes"], |value| {
            value
                .as_array()
                .is_some_and(|sets| sets.iter().all(is_int_list))
        })?;
        check(trace, &["result", "start_time"], Value::is_string)?;

        let exploration = field(trace, &["exploration"])?;
        let entries = exploration
            .as_array()
            .ok_or_else(|| "exploration".to_string())?;
        for entry in entries {
            check(entry, &["attributes"], is_int_list).map_err(in_exploration)?;
            check(entry, &["sensitivity"], Value::is_f64).map_err(in_exploration)?;
            check(entry, &["usability_cost"], Value::is_number).map_err(in_exploration)?;
            check(entry, &["cost_explanation"], |value| {
                value
                    .as_object()
                    .is_some_and(|costs| costs.values().all(Value::is_number))
            })
            .map_err(in_exploration)?;
            check(entry, &["state"], |value| {
                value
                    .as_u64()
                    .and_then(|code| u8::try_from(code).ok())
                    .and_then(State::from_code)
                    .is_some()
            })
            .map_err(in_exploration)?;
            check(entry, &["id"], is_int).map_err(in_exploration)?;
            check(entry, &["time"], Value::is_string).map_err(in_exploration)?;
        }
        Ok(())
    }

    fn in_exploration(field_path: String) -> String {
        format!("exploration{PATH_SEPARATOR}{field_path}")
    }

    run(trace).err()
}

/// Load a trace file and assert it matches the schema
///
/// # Errors
/// Returns [`Error::TraceSchema`] naming the first offending field path.
pub fn verify_trace_file(path: impl AsRef<Path>) -> Result<()> {
    let file = File::open(path)?;
    let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))?;
    match verify_trace(&value) {
        None => Ok(()),
        Some(field_path) => Err(Error::TraceSchema { path: field_path }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_trace() -> Trace {
        Trace {
            parameters: RunParameters {
                method: "FPSelect".into(),
                sensitivity_measure: "TopKFingerprints(sample, 1)".into(),
                usability_cost_measure: "MemoryInstability".into(),
                dataset: "sample.csv".into(),
                sensitivity_threshold: 0.15,
                analysis_engine: "native".into(),
                multiprocessing: false,
                free_cores: 1,
                explored_paths: Some(2),
                pruning: Some(true),
            },
            attributes: BTreeMap::from([
                (1, "user_agent".into()),
                (2, "timezone".into()),
                (3, "do_not_track".into()),
            ]),
            result: TraceResult {
                solution: vec![1, 2],
                satisfying_attributes: vec![vec![1, 2, 3], vec![1, 2]],
                start_time: "2024-03-01 10:00:00.000000".into(),
            },
            exploration: vec![TraceEntry {
                time: "0:00:00.000120".into(),
                attributes: vec![1, 2, 3],
                sensitivity: 0.05,
                usability_cost: 30.0,
                cost_explanation: BTreeMap::from([("memory".to_string(), 30.0)]),
                state: State::Satisfying,
                id: 0,
            }],
        }
    }

    #[test]
    fn test_state_codes_are_stable() {
        assert_eq!(State::Explored.code(), 1);
        assert_eq!(State::Pruned.code(), 2);
        assert_eq!(State::Satisfying.code(), 3);
        assert_eq!(State::EmptyNode.code(), 4);
        for code in 1..=4 {
            assert_eq!(State::from_code(code).unwrap().code(), code);
        }
        assert!(State::from_code(0).is_none());
        assert!(State::from_code(5).is_none());
    }

    #[test]
    fn test_state_serializes_as_integer() {
        let entry = sample_trace().exploration[0].clone();
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["state"], serde_json::json!(3));
        let back: TraceEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back.state, State::Satisfying);
    }

    #[test]
    fn test_empty_root_placeholder() {
        let root = TraceEntry::empty_root();
        assert_eq!(root.id, -1);
        assert_eq!(root.state, State::EmptyNode);
        assert_eq!(root.sensitivity, 1.0);
        assert_eq!(root.usability_cost, 0.0);
        assert!(root.attributes.is_empty());
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::zero()), "0:00:00");
        assert_eq!(format_elapsed(Duration::microseconds(515)), "0:00:00.000515");
        assert_eq!(format_elapsed(Duration::seconds(62)), "0:01:02");
        assert_eq!(
            format_elapsed(Duration::seconds(3_661) + Duration::microseconds(1)),
            "1:01:01.000001"
        );
        assert_eq!(
            format_elapsed(Duration::seconds(90_000)),
            "1 day, 1:00:00"
        );
    }

    #[test]
    fn test_format_timestamp() {
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(10, 2, 3, 42)
            .unwrap();
        assert_eq!(format_timestamp(timestamp), "2024-03-01 10:02:03.000042");
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let trace = sample_trace();
        let first = serde_json::to_string(&trace).unwrap();
        let reloaded: Trace = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string(&reloaded).unwrap();
        assert_eq!(first, second, "write ∘ read should be the identity");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let directory = tempfile::tempdir().unwrap();
        let trace_path = directory.path().join("trace.json");
        let trace = sample_trace();
        trace.save(&trace_path).unwrap();
        let loaded = Trace::load(&trace_path).unwrap();
        assert_eq!(loaded, trace);
    }

    #[test]
    fn test_verify_accepts_a_well_formed_trace() {
        let value = serde_json::to_value(sample_trace()).unwrap();
        assert_eq!(verify_trace(&value), None);
    }

    #[test]
    fn test_verify_reports_the_offending_path() {
        let mut value = serde_json::to_value(sample_trace()).unwrap();
        value["parameters"]["sensitivity_threshold"] = serde_json::json!("not a number");
        assert_eq!(
            verify_trace(&value),
            Some("parameters/sensitivity_threshold".to_string())
        );

        let mut value = serde_json::to_value(sample_trace()).unwrap();
        value["result"]["solution"] = serde_json::json!(["1", "2"]);
        assert_eq!(verify_trace(&value), Some("result/solution".to_string()));

        let mut value = serde_json::to_value(sample_trace()).unwrap();
        value["exploration"][0]["state"] = serde_json::json!(9);
        assert_eq!(verify_trace(&value), Some("exploration/state".to_string()));
    }

    #[test]
    fn test_verify_trace_file_surfaces_the_schema_error() {
        let directory = tempfile::tempdir().unwrap();
        let trace_path = directory.path().join("trace.json");
        sample_trace().save(&trace_path).unwrap();
        assert!(verify_trace_file(&trace_path).is_ok());

        let mut value = serde_json::to_value(sample_trace()).unwrap();
        value["parameters"]["method"] = serde_json::json!(42);
        std::fs::write(&trace_path, serde_json::to_string(&value).unwrap()).unwrap();
        let error = verify_trace_file(&trace_path).unwrap_err();
        assert!(
            matches!(&error, Error::TraceSchema { path } if path == "parameters/method"),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn test_verify_reports_missing_fields() {
        let mut value = serde_json::to_value(sample_trace()).unwrap();
        value["result"]
            .as_object_mut()
            .unwrap()
            .remove("start_time");
        assert_eq!(verify_trace(&value), Some("result/start_time".to_string()));
    }

    #[test]
    fn test_verify_tolerates_empty_node_entries() {
        let mut trace = sample_trace();
        trace.exploration.push(TraceEntry::empty_root());
        let value = serde_json::to_value(trace).unwrap();
        assert_eq!(verify_trace(&value), None);
    }

    #[test]
    fn test_optional_parameters_are_omitted_when_absent() {
        let mut trace = sample_trace();
        trace.parameters.explored_paths = None;
        trace.parameters.pruning = None;
        let value = serde_json::to_value(&trace).unwrap();
        assert!(value["parameters"].get("explored_paths").is_none());
        assert!(value["parameters"].get("pruning").is_none());
        assert_eq!(verify_trace(&value), None);
    }
}
