//! Shared fixtures for the workspace integration tests
//!
//! The lattice measures replay the sensitivities and costs of the
//! three-attribute example lattice, keeping the algorithm scenarios
//! independent of the measure kernels. The slow wrappers stretch a run
//! long enough to observe it in flight.

// Not every test binary uses every fixture
#![allow(dead_code)]

use fpselect::{
    AttributeSet, Error, FingerprintDataset, Result, SensitivityMeasure, UsabilityCostMeasure,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Five distinct browsers over three attributes, one fingerprint each
pub const CLEAN_CSV: &str = "\
browser_id,time_of_collect,user_agent,timezone,do_not_track
1,2024-03-01 10:00:00,Firefox,60,1
2,2024-03-01 10:01:00,Chrome,120,1
3,2024-03-01 10:02:00,Edge,90,1
4,2024-03-01 10:03:00,Chrome,100,1
5,2024-03-01 10:04:00,Edge,80,1
";

/// Three browsers with three consecutive fingerprints each; `attr_a`
/// changes in one of two transitions for browser 1, both for browser 2,
/// and never for browser 3
pub const INSTABILITY_CSV: &str = "\
browser_id,time_of_collect,attr_a,attr_b
1,2024-03-01 10:00:00,a,x
1,2024-03-02 10:00:00,a,x
1,2024-03-03 10:00:00,b,x
2,2024-03-01 10:00:00,a,x
2,2024-03-02 10:00:00,b,x
2,2024-03-03 10:00:00,c,x
3,2024-03-01 10:00:00,a,x
3,2024-03-02 10:00:00,a,x
3,2024-03-03 10:00:00,a,x
";

/// Route `tracing` output through the test harness; safe to call from
/// every test
pub fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

pub fn clean_dataset() -> Arc<FingerprintDataset> {
    Arc::new(FingerprintDataset::from_csv_reader(CLEAN_CSV.as_bytes()).unwrap())
}

pub fn instability_dataset() -> Arc<FingerprintDataset> {
    Arc::new(FingerprintDataset::from_csv_reader(INSTABILITY_CSV.as_bytes()).unwrap())
}

fn lattice_value(table: &[(&[u32], f64)], attribute_set: &AttributeSet) -> Result<f64> {
    let ids = attribute_set.ids();
    table
        .iter()
        .find(|(entry_ids, _)| *entry_ids == ids.as_slice())
        .map(|&(_, value)| value)
        .ok_or_else(|| Error::KeyNotFound(format!("no lattice value for {ids:?}")))
}

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

/// Hard-coded sensitivities of the example lattice
pub struct LatticeSensitivity;

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
pub struct LatticeCost;

impl UsabilityCostMeasure for LatticeCost {
    fn evaluate(&self, attribute_set: &AttributeSet) -> Result<(f64, BTreeMap<String, f64>)> {
        let cost = lattice_value(COSTS, attribute_set)?;
        Ok((cost, BTreeMap::from([("total_cost".to_string(), cost)])))
    }
}

impl fmt::Display for LatticeCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LatticeCost")
    }
}

/// A sensitivity measure that sleeps before answering, to keep an
/// asynchronous run observable in flight
pub struct SlowSensitivity {
    inner: LatticeSensitivity,
    delay: Duration,
}

impl SlowSensitivity {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: LatticeSensitivity,
            delay,
        }
    }
}

impl SensitivityMeasure for SlowSensitivity {
    fn evaluate(&self, attribute_set: &AttributeSet) -> Result<f64> {
        std::thread::sleep(self.delay);
        self.inner.evaluate(attribute_set)
    }
}

impl fmt::Display for SlowSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlowSensitivity")
    }
}
