//! Shared fixtures for the exploration tests
//!
//! The lattice measures hard-code the sensitivities and costs of the
//! three-attribute example lattice, so the algorithm tests are
//! independent of the measure kernels.

use fpselect_core::{AttributeSet, Error, Result};
use fpselect_data::FingerprintDataset;
use fpselect_measures::{SensitivityMeasure, UsabilityCostMeasure};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Five distinct browsers over three attributes, one fingerprint each
pub(crate) const CLEAN_CSV: &str = "\
browser_id,time_of_collect,user_agent,timezone,do_not_track
1,2024-03-01 10:00:00,Firefox,60,1
2,2024-03-01 10:01:00,Chrome,120,1
3,2024-03-01 10:02:00,Edge,90,1
4,2024-03-01 10:03:00,Chrome,100,1
5,2024-03-01 10:04:00,Edge,80,1
";

pub(crate) fn clean_dataset() -> Arc<FingerprintDataset> {
    Arc::new(FingerprintDataset::from_csv_reader(CLEAN_CSV.as_bytes()).unwrap())
}

fn lattice_value(table: &[(&[u32], f64)], attribute_set: &AttributeSet) -> Result<f64> {
    let ids = attribute_set.ids();
    table
        .iter()
        .find(|(entry_ids, _)| *entry_ids == ids.as_slice())
        .map(|&(_, value)| value)
        .ok_or_else(|| Error::KeyNotFound(format!("no lattice value for {ids:?}")))
}

/// Hard-coded sensitivities of the example lattice
pub(crate) struct LatticeSensitivity;

const SENSITIVITIES: &[(&[u32], f64)] = &[
    (&[], 1.0),
    (&[1], 0.3),
    (&[2], 0.3),
    (&[3], 0.25),
    (&[1, 2], 0.15),
    (&[1, 3], 0.25),
    (&[2, 3], 0.20),
    (&[1, 2, 3], 0.05),
];

impl SensitivityMeasure for LatticeSensitivity {
    fn evaluate(&self, attribute_set: &AttributeSet) -> Result<f64> {
        lattice_value(SENSITIVITIES, attribute_set)
    }
}

impl fmt::Display for LatticeSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LatticeSensitivity")
    }
}

/// Hard-coded usability costs of the example lattice
pub(crate) struct LatticeCost;

const COSTS: &[(&[u32], f64)] = &[
    (&[], 0.0),
    (&[1], 10.0),
    (&[2], 15.0),
    (&[3], 15.0),
    (&[1, 2], 20.0),
    (&[1, 3], 17.0),
    (&[2, 3], 25.0),
    (&[1, 2, 3], 30.0),
];

impl UsabilityCostMeasure for LatticeCost {
    fn evaluate(&self, attribute_set: &AttributeSet) -> Result<(f64, BTreeMap<String, f64>)> {
        let cost = lattice_value(COSTS, attribute_set)?;
        Ok((
            cost,
            BTreeMap::from([("total_cost".to_string(), cost)]),
        ))
    }
}

impl fmt::Display for LatticeCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LatticeCost")
    }
}
