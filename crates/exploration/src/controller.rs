//! Exploration controller
//!
//! The controller owns everything the three search strategies share: the
//! measures, the dataset, the feasibility check, the run lifecycle, and
//! the mutable run state (trace, best solution, satisfying sets). The
//! strategies only walk the lattice and report what they visit.
//!
//! ## Run state under parallelism
//!
//! The trace vector is extended by the controller thread only; worker
//! threads return partial results that the controller reduces. The
//! minimum cost is a single atomic read by workers without further
//! synchronization: a stale read can keep a few extra candidates in the
//! next FPSelect frontier but never changes the final result, because the
//! cost measure is strictly monotone. Completion is signalled through a
//! condvar so that terminal accessors can block on an asynchronous run.

use chrono::{Duration, Local, NaiveDateTime};
use fpselect_concurrency::{CancelToken, WorkerPool};
use fpselect_core::{
    format_elapsed, format_timestamp, AnalysisConfig, AttributeSet, Error, Result, RunParameters,
    State, Trace, TraceEntry, TraceResult,
};
use fpselect_data::FingerprintDataset;
use fpselect_measures::{SensitivityMeasure, UsabilityCostMeasure};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::conditional_entropy::ConditionalEntropySearch;
use crate::entropy::EntropySearch;
use crate::fpselect::FpSelectSearch;

/// Where a run currently stands
#[derive(Debug, Clone, PartialEq)]
enum RunStatus {
    NotStarted,
    Running,
    Completed,
    Unreachable { threshold: f64, minimum: f64 },
    Cancelled,
    Failed(String),
}

/// Mutable state of a run, shared between the caller and the run thread
struct RunState {
    status: Mutex<RunStatus>,
    finished: Condvar,
    start_time: Mutex<Option<NaiveDateTime>>,
    execution_time: Mutex<Option<Duration>>,
    solution: Mutex<Option<AttributeSet>>,
    min_cost_bits: AtomicU64,
    max_cost_bits: AtomicU64,
    satisfying: Mutex<Vec<AttributeSet>>,
    trace: RwLock<Vec<TraceEntry>>,
    cancel: CancelToken,
}

impl RunState {
    fn new() -> Self {
        Self {
            status: Mutex::new(RunStatus::NotStarted),
            finished: Condvar::new(),
            start_time: Mutex::new(None),
            execution_time: Mutex::new(None),
            solution: Mutex::new(None),
            min_cost_bits: AtomicU64::new(f64::INFINITY.to_bits()),
            max_cost_bits: AtomicU64::new(f64::INFINITY.to_bits()),
            satisfying: Mutex::new(Vec::new()),
            trace: RwLock::new(Vec::new()),
            cancel: CancelToken::new(),
        }
    }
}

/// A search strategy: walks the lattice, reports what it visits
pub(crate) trait SearchStrategy: Send + Sync + 'static {
    /// Method name recorded in the run parameters
    fn method_name(&self) -> &'static str;

    /// Add the strategy-specific run parameters
    fn augment_parameters(&self, _parameters: &mut RunParameters) {}

    /// Search for a solution; feasibility has already been verified
    fn search(&self, exploration: &ExplorationInner) -> Result<()>;
}

/// The shared body of an exploration, behind an `Arc`
pub(crate) struct ExplorationInner {
    pub(crate) sensitivity: Box<dyn SensitivityMeasure>,
    pub(crate) usability_cost: Box<dyn UsabilityCostMeasure>,
    pub(crate) dataset: Arc<FingerprintDataset>,
    pub(crate) threshold: f64,
    pub(crate) config: AnalysisConfig,
    pub(crate) pool: WorkerPool,
    strategy: Box<dyn SearchStrategy>,
    state: RunState,
}

impl ExplorationInner {
    /// The worker pool, when the configuration parallelizes explorations
    pub(crate) fn exploration_pool(&self) -> Option<&WorkerPool> {
        if self.config.multiprocessing.explorations && self.pool.width() > 1 {
            Some(&self.pool)
        } else {
            None
        }
    }

    /// The cancellation token observed at task boundaries
    pub(crate) fn cancel_token(&self) -> &CancelToken {
        &self.state.cancel
    }

    /// Cost of the complete candidate set, set by the feasibility check
    pub(crate) fn max_cost(&self) -> f64 {
        f64::from_bits(self.state.max_cost_bits.load(Ordering::Relaxed))
    }

    /// Cost of the best solution found so far (`+∞` before the first one)
    ///
    /// Read by workers without further synchronization.
    pub(crate) fn min_cost(&self) -> f64 {
        f64::from_bits(self.state.min_cost_bits.load(Ordering::Relaxed))
    }

    /// Unconditionally install a solution and its cost
    pub(crate) fn set_solution(&self, solution: AttributeSet, cost: f64) {
        debug!(solution = %solution, cost, "updating the solution");
        *self.state.solution.lock() = Some(solution);
        self.state
            .min_cost_bits
            .store(cost.to_bits(), Ordering::Relaxed);
    }

    /// Install a solution when it improves on the current minimum cost
    pub(crate) fn improve_solution(&self, solution: &AttributeSet, cost: f64) -> bool {
        if cost < self.min_cost() {
            self.set_solution(solution.clone(), cost);
            true
        } else {
            false
        }
    }

    /// Record an attribute set that satisfies the sensitivity threshold
    pub(crate) fn add_satisfying(&self, attribute_set: AttributeSet) {
        self.state.satisfying.lock().push(attribute_set);
    }

    /// Elapsed time since the start of the run
    pub(crate) fn elapsed(&self) -> Duration {
        match *self.state.start_time.lock() {
            Some(start_time) => Local::now().naive_local() - start_time,
            None => Duration::zero(),
        }
    }

    /// Build a trace entry for a visited attribute set
    ///
    /// The sequence id is assigned when the entry is appended.
    pub(crate) fn trace_entry(
        &self,
        attribute_set: &AttributeSet,
        sensitivity: f64,
        usability_cost: f64,
        cost_explanation: BTreeMap<String, f64>,
        state: State,
    ) -> TraceEntry {
        TraceEntry {
            time: format_elapsed(self.elapsed()),
            attributes: attribute_set.ids(),
            sensitivity,
            usability_cost,
            cost_explanation,
            state,
            id: 0,
        }
    }

    /// Append one trace entry (controller thread only)
    pub(crate) fn push_trace(&self, entry: TraceEntry) {
        self.append_trace(vec![entry]);
    }

    /// Append trace entries in order, assigning their sequence ids
    ///
    /// Only the controller thread appends; readers always observe a
    /// prefix-consistent snapshot.
    pub(crate) fn append_trace(&self, entries: Vec<TraceEntry>) {
        let mut trace = self.state.trace.write();
        for mut entry in entries {
            entry.id = trace.len() as i64;
            debug!(
                id = entry.id,
                attributes = ?entry.attributes,
                sensitivity = entry.sensitivity,
                usability_cost = entry.usability_cost,
                state = %entry.state,
                "visited an attribute set"
            );
            trace.push(entry);
        }
    }

    /// Verify that the sensitivity threshold is reachable at all
    ///
    /// Evaluates the complete candidate set: its cost becomes the maximum
    /// cost, and its sensitivity is the lowest the dataset can offer. The
    /// candidate set is recorded as the first trace entry.
    fn check_threshold_reachable(&self) -> Result<()> {
        let candidate_attributes = self.dataset.candidate_attributes();
        info!(
            threshold = self.threshold,
            candidates = candidate_attributes.len(),
            "checking that the sensitivity threshold is reachable"
        );

        let (max_cost, max_cost_explanation) =
            self.usability_cost.evaluate(candidate_attributes)?;
        self.state
            .max_cost_bits
            .store(max_cost.to_bits(), Ordering::Relaxed);
        debug!(max_cost, "cost of the complete candidate set");

        let minimum_sensitivity = self.sensitivity.evaluate(candidate_attributes)?;
        debug!(minimum_sensitivity, "minimum reachable sensitivity");

        let reachable = minimum_sensitivity <= self.threshold;
        let state = if reachable {
            self.add_satisfying(candidate_attributes.clone());
            State::Satisfying
        } else {
            State::Explored
        };
        self.push_trace(self.trace_entry(
            candidate_attributes,
            minimum_sensitivity,
            max_cost,
            max_cost_explanation,
            state,
        ));

        if reachable {
            Ok(())
        } else {
            warn!(
                threshold = self.threshold,
                minimum_sensitivity,
                "the sensitivity threshold is unreachable even with all the candidate attributes"
            );
            Err(Error::ThresholdUnreachable {
                threshold: self.threshold,
                minimum: minimum_sensitivity,
            })
        }
    }

    /// Move the run from `NotStarted` to `Running`
    fn begin(&self) -> Result<()> {
        let mut status = self.state.status.lock();
        match *status {
            RunStatus::NotStarted => {}
            RunStatus::Running => {
                return Err(Error::InvalidParameter(
                    "the exploration is already running".into(),
                ))
            }
            _ => {
                return Err(Error::InvalidParameter(
                    "the exploration was already run".into(),
                ))
            }
        }
        *status = RunStatus::Running;
        *self.state.start_time.lock() = Some(Local::now().naive_local());
        Ok(())
    }

    /// Feasibility check plus the strategy search
    fn execute(&self) -> Result<()> {
        info!(method = self.strategy.method_name(), "starting the exploration");
        self.check_threshold_reachable()?;
        info!("the sensitivity threshold is reachable, searching for a solution");
        self.strategy.search(self)?;
        Ok(())
    }

    /// Record the terminal status and wake the blocked accessors
    fn finish(&self, outcome: &Result<()>) {
        let elapsed = self.elapsed();
        let mut status = self.state.status.lock();
        *status = match outcome {
            Ok(()) => {
                *self.state.execution_time.lock() = Some(elapsed);
                info!(
                    execution_time = %format_elapsed(elapsed),
                    explored = self.state.trace.read().len(),
                    satisfying = self.state.satisfying.lock().len(),
                    "the exploration is done"
                );
                RunStatus::Completed
            }
            Err(Error::ThresholdUnreachable { threshold, minimum }) => RunStatus::Unreachable {
                threshold: *threshold,
                minimum: *minimum,
            },
            Err(Error::Cancelled) => RunStatus::Cancelled,
            Err(other) => RunStatus::Failed(other.to_string()),
        };
        drop(status);
        self.state.finished.notify_all();
    }

    /// Block until the run leaves the `Running` state
    fn wait_terminal(&self) -> Result<RunStatus> {
        let mut status = self.state.status.lock();
        if *status == RunStatus::NotStarted {
            return Err(Error::ExplorationNotRun);
        }
        while *status == RunStatus::Running {
            self.state.finished.wait(&mut status);
        }
        Ok(status.clone())
    }

    /// The error a non-completed terminal status surfaces to accessors
    fn terminal_error(status: RunStatus) -> Error {
        match status {
            RunStatus::Unreachable { threshold, minimum } => {
                Error::ThresholdUnreachable { threshold, minimum }
            }
            RunStatus::Cancelled => Error::Cancelled,
            RunStatus::Failed(message) => Error::ExplorationFailed(message),
            RunStatus::NotStarted => Error::ExplorationNotRun,
            RunStatus::Running | RunStatus::Completed => {
                Error::ExplorationFailed("the exploration is not in a terminal state".into())
            }
        }
    }

    /// The satisfying sets in discovery order, first occurrences only
    fn satisfying_snapshot(&self) -> Vec<AttributeSet> {
        let satisfying = self.state.satisfying.lock();
        let mut seen = Vec::new();
        for attribute_set in satisfying.iter() {
            if !seen.contains(attribute_set) {
                seen.push(attribute_set.clone());
            }
        }
        seen
    }
}

/// An attribute-set exploration: measures, dataset, strategy, run state
///
/// Create one with [`Exploration::entropy`],
/// [`Exploration::conditional_entropy`], or [`Exploration::fpselect`],
/// then [`run`](Exploration::run) it synchronously or spawn it with
/// [`run_async`](Exploration::run_async). All accessors fail with
/// [`Error::ExplorationNotRun`] before the run is started.
#[derive(Clone)]
pub struct Exploration {
    inner: Arc<ExplorationInner>,
}

impl Exploration {
    /// The entropy-greedy exploration: rank by marginal entropy, grow one
    /// selection until it satisfies the threshold
    pub fn entropy(
        sensitivity: Box<dyn SensitivityMeasure>,
        usability_cost: Box<dyn UsabilityCostMeasure>,
        dataset: Arc<FingerprintDataset>,
        sensitivity_threshold: f64,
        config: AnalysisConfig,
    ) -> Result<Self> {
        Self::with_strategy(
            Box::new(EntropySearch),
            sensitivity,
            usability_cost,
            dataset,
            sensitivity_threshold,
            config,
        )
    }

    /// The conditional-entropy-greedy exploration
    pub fn conditional_entropy(
        sensitivity: Box<dyn SensitivityMeasure>,
        usability_cost: Box<dyn UsabilityCostMeasure>,
        dataset: Arc<FingerprintDataset>,
        sensitivity_threshold: f64,
        config: AnalysisConfig,
    ) -> Result<Self> {
        Self::with_strategy(
            Box::new(ConditionalEntropySearch),
            sensitivity,
            usability_cost,
            dataset,
            sensitivity_threshold,
            config,
        )
    }

    /// The FPSelect exploration: `explored_paths` parallel paths, with or
    /// without the pruning methods
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] when `explored_paths < 1`.
    pub fn fpselect(
        sensitivity: Box<dyn SensitivityMeasure>,
        usability_cost: Box<dyn UsabilityCostMeasure>,
        dataset: Arc<FingerprintDataset>,
        sensitivity_threshold: f64,
        config: AnalysisConfig,
        explored_paths: usize,
        pruning: bool,
    ) -> Result<Self> {
        if explored_paths < 1 {
            return Err(Error::InvalidParameter(
                "the number of explored paths is required to be a positive number".into(),
            ));
        }
        Self::with_strategy(
            Box::new(FpSelectSearch {
                explored_paths,
                pruning,
            }),
            sensitivity,
            usability_cost,
            dataset,
            sensitivity_threshold,
            config,
        )
    }

    fn with_strategy(
        strategy: Box<dyn SearchStrategy>,
        sensitivity: Box<dyn SensitivityMeasure>,
        usability_cost: Box<dyn UsabilityCostMeasure>,
        dataset: Arc<FingerprintDataset>,
        sensitivity_threshold: f64,
        config: AnalysisConfig,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&sensitivity_threshold) {
            return Err(Error::InvalidParameter(format!(
                "the sensitivity threshold must lie in [0, 1], got {sensitivity_threshold}"
            )));
        }
        let pool = WorkerPool::new(config.multiprocessing.free_cores as usize);
        info!(
            method = strategy.method_name(),
            candidates = dataset.candidate_attributes().len(),
            threshold = sensitivity_threshold,
            sensitivity_measure = %sensitivity,
            usability_cost_measure = %usability_cost,
            workers = pool.width(),
            "initialized the exploration"
        );
        Ok(Self {
            inner: Arc::new(ExplorationInner {
                sensitivity,
                usability_cost,
                dataset,
                threshold: sensitivity_threshold,
                config,
                pool,
                strategy,
                state: RunState::new(),
            }),
        })
    }

    /// Run the exploration on the calling thread
    ///
    /// # Errors
    /// [`Error::ThresholdUnreachable`] when the feasibility check fails;
    /// any kernel or measure error encountered during the search.
    pub fn run(&self) -> Result<()> {
        self.inner.begin()?;
        let outcome = self.inner.execute();
        self.inner.finish(&outcome);
        outcome
    }

    /// Run the exploration on a background thread
    ///
    /// The start time and the running status are installed before the
    /// thread is spawned, so every accessor is immediately usable. Errors
    /// of the background run surface through the terminal accessors.
    pub fn run_async(&self) -> Result<ExplorationHandle> {
        self.inner.begin()?;
        let inner = Arc::clone(&self.inner);
        let thread = std::thread::Builder::new()
            .name("fpselect-exploration".into())
            .spawn(move || {
                let outcome = inner.execute();
                if let Err(error) = &outcome {
                    warn!(%error, "the asynchronous exploration terminated with an error");
                }
                inner.finish(&outcome);
            })
            .expect("failed to spawn the exploration thread");
        Ok(ExplorationHandle {
            exploration: self.clone(),
            thread,
        })
    }

    /// Request cancellation; workers stop at the next task boundary
    pub fn cancel(&self) {
        self.inner.state.cancel.cancel();
    }

    /// The solution: the satisfying set with the lowest cost found
    ///
    /// Blocks until an asynchronous run terminates.
    pub fn get_solution(&self) -> Result<AttributeSet> {
        match self.inner.wait_terminal()? {
            RunStatus::Completed => self.inner.state.solution.lock().clone().ok_or_else(|| {
                Error::ExplorationFailed("the exploration terminated without a solution".into())
            }),
            other => Err(ExplorationInner::terminal_error(other)),
        }
    }

    /// Every attribute set that satisfied the sensitivity threshold
    ///
    /// Blocks until an asynchronous run terminates. Sets appear in
    /// discovery order, without duplicates.
    pub fn get_satisfying_attribute_sets(&self) -> Result<Vec<AttributeSet>> {
        match self.inner.wait_terminal()? {
            RunStatus::Completed => Ok(self.inner.satisfying_snapshot()),
            other => Err(ExplorationInner::terminal_error(other)),
        }
    }

    /// A half-open window `[start, end)` of the exploration trace
    ///
    /// Usable while an asynchronous run is in flight: the returned slice
    /// is a prefix-consistent snapshot and never contains a partially
    /// appended entry. `end = None` means "to the current end".
    pub fn get_explored_attribute_sets(
        &self,
        start: usize,
        end: Option<usize>,
    ) -> Result<Vec<TraceEntry>> {
        if *self.inner.state.status.lock() == RunStatus::NotStarted {
            return Err(Error::ExplorationNotRun);
        }
        let trace = self.inner.state.trace.read();
        let end = end.unwrap_or(trace.len()).min(trace.len());
        let start = start.min(end);
        Ok(trace[start..end].to_vec())
    }

    /// Execution time of the run, `None` while it is still in flight
    pub fn get_execution_time(&self) -> Result<Option<Duration>> {
        let status = self.inner.state.status.lock().clone();
        match status {
            RunStatus::NotStarted => Err(Error::ExplorationNotRun),
            RunStatus::Running => Ok(None),
            RunStatus::Completed => Ok(*self.inner.state.execution_time.lock()),
            other => Err(ExplorationInner::terminal_error(other)),
        }
    }

    /// The run parameters recorded in the trace
    pub fn parameters(&self) -> RunParameters {
        let inner = &self.inner;
        let mut parameters = RunParameters {
            method: inner.strategy.method_name().to_string(),
            sensitivity_measure: inner.sensitivity.to_string(),
            usability_cost_measure: inner.usability_cost.to_string(),
            dataset: inner.dataset.to_string(),
            sensitivity_threshold: inner.threshold,
            analysis_engine: inner.config.analysis.engine.clone(),
            multiprocessing: inner.config.multiprocessing.explorations,
            free_cores: inner.config.multiprocessing.free_cores,
            explored_paths: None,
            pruning: None,
        };
        inner.strategy.augment_parameters(&mut parameters);
        parameters
    }

    /// Save the exploration trace as a JSON file
    ///
    /// Blocks until an asynchronous run terminates; fails with the
    /// terminal error when the run did not complete.
    pub fn save_exploration_trace(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match self.inner.wait_terminal()? {
            RunStatus::Completed => {
                info!(path = %path.display(), "saving the exploration trace");
                let trace = self.build_trace()?;
                trace.save(path)?;
                Ok(())
            }
            other => Err(ExplorationInner::terminal_error(other)),
        }
    }

    fn build_trace(&self) -> Result<Trace> {
        let inner = &self.inner;
        let attributes: BTreeMap<u32, String> = inner
            .dataset
            .candidate_attributes()
            .iter()
            .map(|attribute| (attribute.id(), attribute.name().to_string()))
            .collect();
        let solution = inner
            .state
            .solution
            .lock()
            .clone()
            .ok_or_else(|| {
                Error::ExplorationFailed("the exploration terminated without a solution".into())
            })?
            .ids();
        let satisfying_attributes = inner
            .satisfying_snapshot()
            .into_iter()
            .map(|attribute_set| attribute_set.ids())
            .collect();
        let start_time = (*inner.state.start_time.lock())
            .map(format_timestamp)
            .ok_or(Error::ExplorationNotRun)?;
        Ok(Trace {
            parameters: self.parameters(),
            attributes,
            result: TraceResult {
                solution,
                satisfying_attributes,
                start_time,
            },
            exploration: inner.state.trace.read().clone(),
        })
    }
}

/// Handle over an exploration running on a background thread
pub struct ExplorationHandle {
    exploration: Exploration,
    thread: JoinHandle<()>,
}

impl ExplorationHandle {
    /// The exploration driving this handle
    pub fn exploration(&self) -> &Exploration {
        &self.exploration
    }

    /// Request cancellation; the run terminates at the next task boundary
    pub fn cancel(&self) {
        self.exploration.cancel();
    }

    /// Whether the background thread has terminated
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the background run and surface its terminal status
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| Error::ExplorationFailed("the exploration thread panicked".into()))?;
        match self.exploration.inner.wait_terminal()? {
            RunStatus::Completed => Ok(()),
            other => Err(ExplorationInner::terminal_error(other)),
        }
    }
}
