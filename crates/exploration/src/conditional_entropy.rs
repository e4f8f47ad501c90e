//! Conditional-entropy-greedy exploration
//!
//! Grows a single selection by repeatedly appending the attribute that
//! maximizes the joint entropy of the extended selection. Compared to the
//! plain entropy ranking, this accounts for correlations between the
//! attributes already selected and the remaining candidates.

use fpselect_concurrency::WorkerPool;
use fpselect_core::{Attribute, AttributeSet, Error, Result, State};
use fpselect_data::FingerprintDataset;
use fpselect_measures::attribute_set_entropy;
use tracing::debug;

use crate::controller::{ExplorationInner, SearchStrategy};

pub(crate) struct ConditionalEntropySearch;

impl SearchStrategy for ConditionalEntropySearch {
    fn method_name(&self) -> &'static str {
        "ConditionalEntropy"
    }

    fn search(&self, exploration: &ExplorationInner) -> Result<()> {
        let candidate_attributes = exploration.dataset.candidate_attributes();
        let mut selection = AttributeSet::new();
        // An empty selection is equivalent to no fingerprinting at all
        let mut sensitivity = 1.0;

        // Feasibility guarantees the threshold is reached at the latest
        // when the selection covers every candidate attribute
        while sensitivity > exploration.threshold {
            exploration.cancel_token().check()?;
            let best = best_joint_entropy_attribute(
                &exploration.dataset,
                &selection,
                candidate_attributes,
                exploration.exploration_pool(),
            )?;
            let Some((attribute, joint_entropy)) = best else {
                break;
            };
            debug!(attribute = %attribute, joint_entropy, "appending the best attribute");
            selection.add(attribute)?;

            sensitivity = exploration.sensitivity.evaluate(&selection)?;
            let (cost, cost_explanation) = exploration.usability_cost.evaluate(&selection)?;
            let state = if sensitivity <= exploration.threshold {
                exploration.set_solution(selection.clone(), cost);
                exploration.add_satisfying(selection.clone());
                State::Satisfying
            } else {
                State::Explored
            };
            exploration.push_trace(exploration.trace_entry(
                &selection,
                sensitivity,
                cost,
                cost_explanation,
                state,
            ));
        }
        Ok(())
    }
}

/// The attribute maximizing the joint entropy of the extended selection
///
/// Equal joint entropies go to the lowest id; when no attribute increases
/// the entropy this still picks the lowest-id remaining candidate, since
/// a joint entropy never decreases when an attribute is added. Returns
/// `None` once every candidate is part of the selection.
///
/// The scan over the remaining candidates is partitioned over the worker
/// pool; each partition reports its local best and the merge keeps the
/// best entropy, then the lowest id.
pub(crate) fn best_joint_entropy_attribute(
    dataset: &FingerprintDataset,
    current: &AttributeSet,
    candidates: &AttributeSet,
    pool: Option<&WorkerPool>,
) -> Result<Option<(Attribute, f64)>> {
    let remaining: Vec<&Attribute> = candidates
        .iter()
        .filter(|attribute| !current.contains(attribute))
        .collect();
    if remaining.is_empty() {
        return Ok(None);
    }
    if dataset.frame().is_empty() {
        return Err(Error::EmptyInput(
            "cannot compute the conditional entropy on an empty dataset".into(),
        ));
    }
    let view = dataset.one_fp_per_browser(true);

    let best_of_chunk = |chunk: &[&Attribute]| -> Result<Option<(Attribute, f64)>> {
        let mut best: Option<(Attribute, f64)> = None;
        for attribute in chunk {
            let extended = current.with_attribute((*attribute).clone())?;
            let joint_entropy = attribute_set_entropy(&view, &extended)?;
            // Strict comparison keeps the lowest id on ties: candidates
            // are scanned in ascending id order
            let improves = match &best {
                None => true,
                Some((_, best_entropy)) => joint_entropy > *best_entropy,
            };
            if improves {
                best = Some(((*attribute).clone(), joint_entropy));
            }
        }
        Ok(best)
    };

    let chunk_bests: Vec<Result<Option<(Attribute, f64)>>> = match pool {
        Some(pool) => pool.map(&remaining, |_, chunk| best_of_chunk(chunk)),
        None => vec![best_of_chunk(&remaining)],
    };

    let mut best: Option<(Attribute, f64)> = None;
    for chunk_best in chunk_bests {
        if let Some((attribute, joint_entropy)) = chunk_best? {
            let improves = match &best {
                None => true,
                // Chunks are merged in ascending id order too
                Some((_, best_entropy)) => joint_entropy > *best_entropy,
            };
            if improves {
                best = Some((attribute, joint_entropy));
            }
        }
    }
    Ok(best)
}
