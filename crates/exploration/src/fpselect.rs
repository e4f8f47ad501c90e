//! FPSelect exploration
//!
//! Multi-path best-first search over the attribute lattice. Each stage
//! expands the frontier by one attribute, measures every expansion, and
//! keeps the `k` most efficient unsatisfying sets as the next frontier.
//! Supersets of a satisfying set are never generated (their cost can only
//! be worse under a strictly monotone cost measure); with the pruning
//! methods on, supersets of dominated sets are skipped as well.
//!
//! Both the expansion and the exploration of a stage are partitioned over
//! the worker pool. Workers return partial outcomes that the controller
//! merges single-threaded, so the shared run state has a single writer.
//! Workers read the minimum cost without synchronization; a stale value
//! can keep a few extra candidates in the next frontier but never changes
//! the final result.

use fpselect_core::{AttributeSet, Result, RunParameters, State, TraceEntry};
use std::cmp::Ordering;
use tracing::debug;

use crate::controller::{ExplorationInner, SearchStrategy};

pub(crate) struct FpSelectSearch {
    pub(crate) explored_paths: usize,
    pub(crate) pruning: bool,
}

/// What one explore partition reports back for the merge
#[derive(Default)]
struct PartitionOutcome {
    entries: Vec<TraceEntry>,
    satisfying: Vec<(AttributeSet, f64)>,
    pruned: Vec<AttributeSet>,
    frontier_candidates: Vec<(AttributeSet, f64)>,
}

impl SearchStrategy for FpSelectSearch {
    fn method_name(&self) -> &'static str {
        "FPSelect"
    }

    fn augment_parameters(&self, parameters: &mut RunParameters) {
        parameters.explored_paths = Some(self.explored_paths as u32);
        parameters.pruning = Some(self.pruning);
    }

    fn search(&self, exploration: &ExplorationInner) -> Result<()> {
        let candidate_attributes = exploration.dataset.candidate_attributes();

        // Local mirrors of the sets driving the expansion; the candidate
        // set satisfies the threshold by the feasibility check
        let mut satisfying: Vec<AttributeSet> = vec![candidate_attributes.clone()];
        let mut ignored_supersets: Vec<AttributeSet> = Vec::new();
        let mut frontier: Vec<AttributeSet> = vec![AttributeSet::new()];

        let mut stage = 1usize;
        while !frontier.is_empty() {
            exploration.cancel_token().check()?;
            debug!(
                stage,
                frontier = frontier.len(),
                ignored = ignored_supersets.len(),
                "starting an FPSelect stage"
            );

            let to_explore = self.expand(
                exploration,
                &frontier,
                &satisfying,
                &ignored_supersets,
            );
            debug!(stage, sets = to_explore.len(), "attribute sets to explore");

            let frontier_candidates = self.explore_level(
                exploration,
                &to_explore,
                &mut satisfying,
                &mut ignored_supersets,
            )?;
            frontier = select_frontier(frontier_candidates, self.explored_paths);
            stage += 1;
        }

        // Nothing ever improved on +∞: every expansion was cut off
        // immediately, which makes the candidate set itself the best
        // satisfying set seen
        if exploration.min_cost().is_infinite() {
            exploration.set_solution(candidate_attributes.clone(), exploration.max_cost());
        }
        Ok(())
    }
}

impl FpSelectSearch {
    /// Expand every frontier set by one absent attribute
    ///
    /// Drops expansions that are supersets of a satisfying set, and, with
    /// pruning on, of a set whose supersets are to be ignored. The result
    /// is deduplicated and sorted by id sequence so the exploration order
    /// is deterministic whatever the worker count.
    fn expand(
        &self,
        exploration: &ExplorationInner,
        frontier: &[AttributeSet],
        satisfying: &[AttributeSet],
        ignored_supersets: &[AttributeSet],
    ) -> Vec<AttributeSet> {
        let candidates = exploration.dataset.candidate_attributes();
        let expand_chunk = |chunk: &[AttributeSet]| -> Vec<AttributeSet> {
            let mut extensions = Vec::new();
            for base in chunk {
                for attribute in candidates {
                    if base.contains(attribute) {
                        continue;
                    }
                    let Ok(extended) = base.with_attribute(attribute.clone()) else {
                        continue;
                    };
                    if satisfying.iter().any(|set| extended.is_superset(set)) {
                        continue;
                    }
                    if self.pruning
                        && ignored_supersets
                            .iter()
                            .any(|set| extended.is_superset(set))
                    {
                        continue;
                    }
                    extensions.push(extended);
                }
            }
            extensions
        };

        let mut expansions: Vec<AttributeSet> = match exploration.exploration_pool() {
            Some(pool) => pool
                .map(frontier, |_, chunk| expand_chunk(chunk))
                .into_iter()
                .flatten()
                .collect(),
            None => expand_chunk(frontier),
        };
        expansions.sort();
        expansions.dedup();
        expansions
    }

    /// Measure and classify every attribute set of a stage
    ///
    /// Returns the candidates for the next frontier with their
    /// efficiency. The trace receives the partition outputs in partition
    /// index order, so the within-stage trace order matches a sequential
    /// run.
    fn explore_level(
        &self,
        exploration: &ExplorationInner,
        to_explore: &[AttributeSet],
        satisfying: &mut Vec<AttributeSet>,
        ignored_supersets: &mut Vec<AttributeSet>,
    ) -> Result<Vec<(AttributeSet, f64)>> {
        let outcomes: Vec<Result<PartitionOutcome>> = match exploration.exploration_pool() {
            Some(pool) if to_explore.len() > 1 => pool.map(to_explore, |_, chunk| {
                self.explore_partition(exploration, chunk)
            }),
            _ => vec![self.explore_partition(exploration, to_explore)],
        };

        let mut frontier_candidates = Vec::new();
        for outcome in outcomes {
            let outcome = outcome?;
            exploration.append_trace(outcome.entries);
            for (attribute_set, cost) in outcome.satisfying {
                exploration.improve_solution(&attribute_set, cost);
                exploration.add_satisfying(attribute_set.clone());
                satisfying.push(attribute_set.clone());
                // Supersets of a satisfying set can never improve the cost
                ignored_supersets.push(attribute_set);
            }
            ignored_supersets.extend(outcome.pruned);
            frontier_candidates.extend(outcome.frontier_candidates);
        }
        exploration.cancel_token().check()?;
        Ok(frontier_candidates)
    }

    /// Explore one partition of a stage (runs on a worker thread)
    fn explore_partition(
        &self,
        exploration: &ExplorationInner,
        chunk: &[AttributeSet],
    ) -> Result<PartitionOutcome> {
        let max_cost = exploration.max_cost();
        let threshold = exploration.threshold;
        let mut outcome = PartitionOutcome::default();
        // Improvements found inside this partition; the shared minimum is
        // re-read per set and may lag behind other partitions
        let mut local_min_cost = f64::INFINITY;

        for attribute_set in chunk {
            if exploration.cancel_token().is_cancelled() {
                break;
            }
            let sensitivity = exploration.sensitivity.evaluate(attribute_set)?;
            let (cost, cost_explanation) = exploration.usability_cost.evaluate(attribute_set)?;
            let current_min_cost = exploration.min_cost().min(local_min_cost);

            let state = if sensitivity <= threshold {
                if cost < current_min_cost {
                    local_min_cost = cost;
                }
                outcome.satisfying.push((attribute_set.clone(), cost));
                State::Satisfying
            } else if cost < current_min_cost {
                let efficiency = (max_cost - cost) / sensitivity;
                outcome
                    .frontier_candidates
                    .push((attribute_set.clone(), efficiency));
                State::Explored
            } else if self.pruning {
                outcome.pruned.push(attribute_set.clone());
                State::Pruned
            } else {
                State::Explored
            };
            outcome.entries.push(exploration.trace_entry(
                attribute_set,
                sensitivity,
                cost,
                cost_explanation,
                state,
            ));
        }
        Ok(outcome)
    }
}

/// Keep the `k` most efficient candidates as the next frontier
///
/// Efficiency descending; equal efficiencies go to the lexicographically
/// smallest id sequence.
fn select_frontier(
    mut frontier_candidates: Vec<(AttributeSet, f64)>,
    explored_paths: usize,
) -> Vec<AttributeSet> {
    frontier_candidates.sort_by(|left, right| {
        right
            .1
            .partial_cmp(&left.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| left.0.cmp(&right.0))
    });
    frontier_candidates.truncate(explored_paths);
    frontier_candidates
        .into_iter()
        .map(|(attribute_set, _)| attribute_set)
        .collect()
}
