//! Usability cost measures
//!
//! A usability cost measure maps an attribute set to a scalar penalty
//! together with a per-dimension breakdown. Implementations must be
//! strictly increasing: a strict superset always costs strictly more.
//! This monotonicity is what makes the FPSelect pruning sound.

use fpselect_core::{AttributeSet, Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Names of the cost dimensions and of their breakdown entries
pub mod dimension {
    /// Memory footprint of the collected values
    pub const MEMORY: &str = "memory";
    /// Instability of the values across revisits
    pub const INSTABILITY: &str = "instability";
    /// Wall-clock collection time
    pub const TIME: &str = "time";

    /// Breakdown key of the weighted value of a dimension
    pub fn weighted(name: &str) -> String {
        format!("weighted_{name}")
    }
}

/// The usability cost of an attribute set
///
/// Contract: `A ⊊ B` implies `evaluate(A).0 < evaluate(B).0`.
pub trait UsabilityCostMeasure: fmt::Display + Send + Sync {
    /// Measure the cost of an attribute set
    ///
    /// Returns the total cost and a breakdown mapping each dimension (raw
    /// and weighted) to its value.
    fn evaluate(&self, attribute_set: &AttributeSet) -> Result<(f64, BTreeMap<String, f64>)>;
}

fn check_weight_dimensions(
    weights: &BTreeMap<String, f64>,
    expected: &[&str],
) -> Result<()> {
    let received: BTreeSet<&str> = weights.keys().map(String::as_str).collect();
    let wanted: BTreeSet<&str> = expected.iter().copied().collect();
    if received != wanted {
        return Err(Error::IncorrectWeightDimensions {
            expected: wanted.into_iter().map(String::from).collect(),
            received: received.into_iter().map(String::from).collect(),
        });
    }
    Ok(())
}

fn summed_dimension(
    per_attribute: &BTreeMap<u32, f64>,
    attribute_set: &AttributeSet,
    dimension_name: &str,
) -> Result<f64> {
    let mut total = 0.0;
    for attribute in attribute_set {
        total += per_attribute.get(&attribute.id()).ok_or_else(|| {
            Error::KeyNotFound(format!(
                "no {dimension_name} value for the attribute {attribute}"
            ))
        })?;
    }
    Ok(total)
}

/// Usability cost over the memory and instability dimensions
///
/// `total = w_mem · Σ size(a) + w_inst · Σ instability(a)`; the breakdown
/// exposes the raw and the weighted sum of both dimensions.
pub struct MemoryInstability {
    sizes: BTreeMap<u32, f64>,
    instabilities: BTreeMap<u32, f64>,
    weights: BTreeMap<String, f64>,
}

impl MemoryInstability {
    /// Create the measure from the per-attribute inputs and the weights
    ///
    /// # Errors
    /// Returns [`Error::IncorrectWeightDimensions`] unless the weight
    /// keys are exactly `{memory, instability}`.
    pub fn new(
        sizes: BTreeMap<u32, f64>,
        instabilities: BTreeMap<u32, f64>,
        weights: BTreeMap<String, f64>,
    ) -> Result<Self> {
        check_weight_dimensions(&weights, &[dimension::MEMORY, dimension::INSTABILITY])?;
        Ok(Self {
            sizes,
            instabilities,
            weights,
        })
    }

    fn weighted_dimensions(
        &self,
        attribute_set: &AttributeSet,
    ) -> Result<(f64, BTreeMap<String, f64>)> {
        let memory = summed_dimension(&self.sizes, attribute_set, dimension::MEMORY)?;
        let instability =
            summed_dimension(&self.instabilities, attribute_set, dimension::INSTABILITY)?;
        let weighted_memory = memory * self.weights[dimension::MEMORY];
        let weighted_instability = instability * self.weights[dimension::INSTABILITY];

        let mut explanation = BTreeMap::new();
        explanation.insert(dimension::MEMORY.to_string(), memory);
        explanation.insert(dimension::weighted(dimension::MEMORY), weighted_memory);
        explanation.insert(dimension::INSTABILITY.to_string(), instability);
        explanation.insert(
            dimension::weighted(dimension::INSTABILITY),
            weighted_instability,
        );
        Ok((weighted_memory + weighted_instability, explanation))
    }
}

impl UsabilityCostMeasure for MemoryInstability {
    fn evaluate(&self, attribute_set: &AttributeSet) -> Result<(f64, BTreeMap<String, f64>)> {
        self.weighted_dimensions(attribute_set)
    }
}

impl fmt::Display for MemoryInstability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryInstability({:?})", self.weights)
    }
}

/// Usability cost over memory, instability, and collection time
///
/// Sequential attributes collect one after another and their times add;
/// asynchronous attributes overlap with the sequential bundle and with
/// each other. The effective collection time of a set is therefore the
/// larger of the sequential sum and the longest asynchronous time.
pub struct MemoryInstabilityTime {
    base: MemoryInstability,
    collection_times: BTreeMap<u32, (f64, bool)>,
}

impl MemoryInstabilityTime {
    /// Create the measure from the per-attribute inputs and the weights
    ///
    /// # Errors
    /// Returns [`Error::IncorrectWeightDimensions`] unless the weight
    /// keys are exactly `{memory, instability, time}`.
    pub fn new(
        sizes: BTreeMap<u32, f64>,
        instabilities: BTreeMap<u32, f64>,
        collection_times: BTreeMap<u32, (f64, bool)>,
        weights: BTreeMap<String, f64>,
    ) -> Result<Self> {
        check_weight_dimensions(
            &weights,
            &[dimension::MEMORY, dimension::INSTABILITY, dimension::TIME],
        )?;
        Ok(Self {
            base: MemoryInstability {
                sizes,
                instabilities,
                weights,
            },
            collection_times,
        })
    }

    fn collection_time(&self, attribute_set: &AttributeSet) -> Result<f64> {
        let mut sequential_time = 0.0f64;
        let mut longest_asynchronous = 0.0f64;
        for attribute in attribute_set {
            let &(average_time, is_asynchronous) = self
                .collection_times
                .get(&attribute.id())
                .ok_or_else(|| {
                    Error::KeyNotFound(format!(
                        "no collection time for the attribute {attribute}"
                    ))
                })?;
            if is_asynchronous {
                longest_asynchronous = longest_asynchronous.max(average_time);
            } else {
                sequential_time += average_time;
            }
        }
        Ok(sequential_time.max(longest_asynchronous))
    }
}

impl UsabilityCostMeasure for MemoryInstabilityTime {
    fn evaluate(&self, attribute_set: &AttributeSet) -> Result<(f64, BTreeMap<String, f64>)> {
        let (base_total, mut explanation) = self.base.weighted_dimensions(attribute_set)?;
        let time = self.collection_time(attribute_set)?;
        let weighted_time = time * self.base.weights[dimension::TIME];
        explanation.insert(dimension::TIME.to_string(), time);
        explanation.insert(dimension::weighted(dimension::TIME), weighted_time);
        Ok((base_total + weighted_time, explanation))
    }
}

impl fmt::Display for MemoryInstabilityTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryInstabilityTime({:?})", self.base.weights)
    }
}
