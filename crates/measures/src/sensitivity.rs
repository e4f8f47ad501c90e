//! Sensitivity measures
//!
//! A sensitivity measure maps an attribute set to the share of the user
//! population an attacker can impersonate when fingerprints are compared
//! on those attributes only. Implementations must be monotonically
//! non-increasing: adding an attribute never raises the sensitivity.
//!
//! The exploration holds its measure behind `dyn SensitivityMeasure` and
//! never knows the concrete type.

use fpselect_core::{AttributeSet, Error, Result};
use fpselect_data::FingerprintDataset;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::kernels::top_k_share;

/// The sensitivity of an attribute set
///
/// Contract: for all `A ⊆ B`, `evaluate(A) ≥ evaluate(B)`.
pub trait SensitivityMeasure: fmt::Display + Send + Sync {
    /// Measure the sensitivity of an attribute set
    fn evaluate(&self, attribute_set: &AttributeSet) -> Result<f64>;
}

/// Sensitivity as the share of users behind the k most common fingerprints
///
/// The impersonated users are those whose fingerprint is one of the `k`
/// most common ones; no similarity function is involved. The measure
/// works on the view keeping the last fingerprint of each browser, so
/// every user counts once.
pub struct TopKFingerprints {
    dataset: Arc<FingerprintDataset>,
    k: usize,
}

impl TopKFingerprints {
    /// Create the measure for the `k` most common fingerprints
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] when `k` is zero.
    pub fn new(dataset: Arc<FingerprintDataset>, k: usize) -> Result<Self> {
        if k < 1 {
            return Err(Error::InvalidParameter(
                "the number of most common fingerprints is required to be strictly positive"
                    .into(),
            ));
        }
        Ok(Self { dataset, k })
    }
}

impl SensitivityMeasure for TopKFingerprints {
    fn evaluate(&self, attribute_set: &AttributeSet) -> Result<f64> {
        let view = self.dataset.one_fp_per_browser(true);
        let share = top_k_share(&view, attribute_set, self.k)?;
        debug!(
            attributes = %attribute_set,
            k = self.k,
            share,
            "evaluated the top-k fingerprint sensitivity"
        );
        Ok(share)
    }
}

impl fmt::Display for TopKFingerprints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopKFingerprints({}, {})", self.dataset.label(), self.k)
    }
}
