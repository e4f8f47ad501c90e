//! Entropy-greedy exploration
//!
//! Ranks the candidate attributes by their marginal entropy on the
//! deduplicated view, then grows a single selection in rank order until
//! it satisfies the sensitivity threshold. The feasibility check run
//! beforehand guarantees the loop terminates on a satisfying set, at
//! worst the complete candidate set.

use fpselect_concurrency::WorkerPool;
use fpselect_core::{Attribute, AttributeSet, Error, Result, State};
use fpselect_data::FingerprintDataset;
use fpselect_measures::attribute_set_entropy;
use std::cmp::Ordering;
use tracing::{debug, info};

use crate::controller::{ExplorationInner, SearchStrategy};

pub(crate) struct EntropySearch;

impl SearchStrategy for EntropySearch {
    fn method_name(&self) -> &'static str {
        "Entropy"
    }

    fn search(&self, exploration: &ExplorationInner) -> Result<()> {
        let candidate_attributes = exploration.dataset.candidate_attributes();
        info!("computing the marginal entropy of each candidate attribute");
        let mut ranked = attributes_entropy(
            &exploration.dataset,
            candidate_attributes,
            exploration.exploration_pool(),
        )?;
        // Highest entropy first; equal entropies go to the lowest id
        ranked.sort_by(|left, right| {
            right
                .1
                .partial_cmp(&left.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.0.id().cmp(&right.0.id()))
        });
        let ranking: Vec<u32> = ranked.iter().map(|(attribute, _)| attribute.id()).collect();
        debug!(?ranking, "attributes ranked by marginal entropy");

        let mut selection = AttributeSet::new();
        for (attribute, _) in ranked {
            exploration.cancel_token().check()?;
            selection.add(attribute)?;
            debug!(selection = %selection, "exploring the grown selection");

            let sensitivity = exploration.sensitivity.evaluate(&selection)?;
            let (cost, cost_explanation) = exploration.usability_cost.evaluate(&selection)?;

            if sensitivity <= exploration.threshold {
                exploration.set_solution(selection.clone(), cost);
                exploration.add_satisfying(selection.clone());
                exploration.push_trace(exploration.trace_entry(
                    &selection,
                    sensitivity,
                    cost,
                    cost_explanation,
                    State::Satisfying,
                ));
                return Ok(());
            }
            exploration.push_trace(exploration.trace_entry(
                &selection,
                sensitivity,
                cost,
                cost_explanation,
                State::Explored,
            ));
        }
        Ok(())
    }
}

/// Marginal entropy of each attribute over the deduplicated view
///
/// The scan is partitioned over the worker pool when one is given; the
/// merged result does not depend on the partitioning.
pub(crate) fn attributes_entropy(
    dataset: &FingerprintDataset,
    attributes: &AttributeSet,
    pool: Option<&WorkerPool>,
) -> Result<Vec<(Attribute, f64)>> {
    if attributes.is_empty() {
        return Ok(Vec::new());
    }
    if dataset.frame().is_empty() {
        return Err(Error::EmptyInput(
            "cannot compute the entropy on an empty dataset".into(),
        ));
    }
    let view = dataset.one_fp_per_browser(true);
    let marginal_entropy = |attribute: &Attribute| -> Result<(Attribute, f64)> {
        let entropy =
            attribute_set_entropy(&view, &AttributeSet::singleton(attribute.clone()))?;
        Ok((attribute.clone(), entropy))
    };

    let attribute_list: Vec<&Attribute> = attributes.iter().collect();
    match pool {
        Some(pool) => {
            let chunk_results = pool.map(&attribute_list, |_, chunk| {
                chunk
                    .iter()
                    .map(|&attribute| marginal_entropy(attribute))
                    .collect::<Result<Vec<_>>>()
            });
            let mut merged = Vec::new();
            for chunk in chunk_results {
                merged.extend(chunk?);
            }
            Ok(merged)
        }
        None => attribute_list
            .into_iter()
            .map(marginal_entropy)
            .collect(),
    }
}
