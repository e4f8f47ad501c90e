//! Whole-dataset analyses
//!
//! An [`Analysis`] computes a result over a fingerprint dataset and can
//! export it as a CSV file. The per-attribute analyses produce exactly
//! the cost input files the usability cost measures consume
//! (`average_size`, `proportion_of_changes`), which closes the loop
//! between measuring a dataset and exploring it.

use fpselect_concurrency::WorkerPool;
use fpselect_core::{Attribute, AttributeSet, Error, Result};
use fpselect_data::FingerprintDataset;
use rand::seq::index::sample;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::kernels::{attribute_set_entropy, average_size, proportion_of_changes};

/// An analysis of a fingerprint dataset with a CSV-exportable result
pub trait Analysis {
    /// Compute the result of the analysis
    fn execute(&mut self) -> Result<()>;

    /// The result as CSV rows, the first row being the header
    fn result_rows(&self) -> Vec<Vec<String>>;

    /// Write the result rows as a CSV file
    fn save_csv(&self, path: impl AsRef<Path>) -> Result<()>
    where
        Self: Sized,
    {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for row in self.result_rows() {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn per_attribute_chunked(
    dataset: &FingerprintDataset,
    pool: Option<&WorkerPool>,
    kernel: impl Fn(&Attribute) -> Result<f64> + Sync,
) -> Result<BTreeMap<u32, f64>> {
    let attributes: Vec<&Attribute> = dataset.candidate_attributes().iter().collect();
    let chunk_results: Vec<Result<Vec<(u32, f64)>>> = match pool {
        Some(pool) => {
            debug!(
                attributes = attributes.len(),
                workers = pool.width(),
                "computing a per-attribute analysis over the worker pool"
            );
            pool.map(&attributes, |_, chunk| {
                chunk
                    .iter()
                    .map(|&attribute| kernel(attribute).map(|value| (attribute.id(), value)))
                    .collect()
            })
        }
        None => vec![attributes
            .iter()
            .map(|&attribute| kernel(attribute).map(|value| (attribute.id(), value)))
            .collect()],
    };

    let mut merged = BTreeMap::new();
    for chunk in chunk_results {
        for (id, value) in chunk? {
            merged.insert(id, value);
        }
    }
    Ok(merged)
}

fn per_attribute_rows(
    dataset: &FingerprintDataset,
    result: &BTreeMap<u32, f64>,
    value_header: &str,
) -> Vec<Vec<String>> {
    let mut rows = vec![vec!["attribute".to_string(), value_header.to_string()]];
    for (&id, &value) in result {
        // Ids come from the candidate attributes, the lookup cannot miss
        if let Ok(attribute) = dataset.candidate_attributes().get_by_id(id) {
            rows.push(vec![attribute.name().to_string(), value.to_string()]);
        }
    }
    rows
}

/// Average textual size of each candidate attribute
///
/// Runs over the full table so every recorded fingerprint contributes.
/// The per-attribute scan is partitioned over the worker pool when one is
/// attached.
pub struct AverageFingerprintSize {
    dataset: Arc<FingerprintDataset>,
    pool: Option<WorkerPool>,
    result: BTreeMap<u32, f64>,
}

impl AverageFingerprintSize {
    /// Create the analysis for a dataset
    pub fn new(dataset: Arc<FingerprintDataset>) -> Self {
        Self {
            dataset,
            pool: None,
            result: BTreeMap::new(),
        }
    }

    /// Partition the per-attribute scan over a worker pool
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// The average size of each attribute, keyed by attribute id
    pub fn result(&self) -> &BTreeMap<u32, f64> {
        &self.result
    }
}

impl Analysis for AverageFingerprintSize {
    fn execute(&mut self) -> Result<()> {
        let frame = Arc::clone(self.dataset.frame());
        self.result = per_attribute_chunked(&self.dataset, self.pool.as_ref(), |attribute| {
            average_size(&frame, attribute)
        })?;
        Ok(())
    }

    fn result_rows(&self) -> Vec<Vec<String>> {
        per_attribute_rows(&self.dataset, &self.result, "average_size")
    }
}

/// Instability of each candidate attribute
///
/// The instability of an attribute is the proportion of value changes
/// between consecutive fingerprints of the same browser.
pub struct ProportionOfChanges {
    dataset: Arc<FingerprintDataset>,
    pool: Option<WorkerPool>,
    result: BTreeMap<u32, f64>,
}

impl ProportionOfChanges {
    /// Create the analysis for a dataset
    pub fn new(dataset: Arc<FingerprintDataset>) -> Self {
        Self {
            dataset,
            pool: None,
            result: BTreeMap::new(),
        }
    }

    /// Partition the per-attribute scan over a worker pool
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// The instability of each attribute, keyed by attribute id
    pub fn result(&self) -> &BTreeMap<u32, f64> {
        &self.result
    }
}

impl Analysis for ProportionOfChanges {
    fn execute(&mut self) -> Result<()> {
        let frame = Arc::clone(self.dataset.frame());
        self.result = per_attribute_chunked(&self.dataset, self.pool.as_ref(), |attribute| {
            proportion_of_changes(&frame, attribute)
        })?;
        Ok(())
    }

    fn result_rows(&self) -> Vec<Vec<String>> {
        per_attribute_rows(&self.dataset, &self.result, "proportion_of_changes")
    }
}

/// Entropy of the fingerprints under an attribute set
///
/// Produces the entropy, the maximum reachable entropy
/// `log2(browsers)`, and their ratio.
pub struct AttributeSetEntropy {
    dataset: Arc<FingerprintDataset>,
    attributes: AttributeSet,
    result: BTreeMap<String, f64>,
}

/// Result key of the entropy value
pub const ENTROPY_RESULT: &str = "entropy";
/// Result key of the maximum reachable entropy
pub const MAXIMUM_ENTROPY_RESULT: &str = "maximum_entropy";
/// Result key of the normalized entropy
pub const NORMALIZED_ENTROPY_RESULT: &str = "normalized_entropy";

impl AttributeSetEntropy {
    /// Create the analysis for a dataset and an attribute set
    pub fn new(dataset: Arc<FingerprintDataset>, attributes: AttributeSet) -> Self {
        Self {
            dataset,
            attributes,
            result: BTreeMap::new(),
        }
    }

    /// The entropy results, keyed by result name
    pub fn result(&self) -> &BTreeMap<String, f64> {
        &self.result
    }
}

impl Analysis for AttributeSetEntropy {
    fn execute(&mut self) -> Result<()> {
        let view = self.dataset.one_fp_per_browser(true);
        let entropy = attribute_set_entropy(&view, &self.attributes)?;
        let maximum_entropy = (view.height() as f64).log2();
        let normalized_entropy = if maximum_entropy > 0.0 {
            entropy / maximum_entropy
        } else {
            0.0
        };
        self.result = BTreeMap::from([
            (ENTROPY_RESULT.to_string(), entropy),
            (MAXIMUM_ENTROPY_RESULT.to_string(), maximum_entropy),
            (NORMALIZED_ENTROPY_RESULT.to_string(), normalized_entropy),
        ]);
        Ok(())
    }

    fn result_rows(&self) -> Vec<Vec<String>> {
        self.result
            .iter()
            .map(|(name, value)| vec![name.clone(), value.to_string()])
            .collect()
    }
}

/// Unicity of the fingerprints under an attribute set
///
/// Counts the browsers whose fingerprint is shared with nobody else.
pub struct AttributeSetUnicity {
    dataset: Arc<FingerprintDataset>,
    attributes: AttributeSet,
    result: BTreeMap<String, f64>,
}

/// Result key of the number of unique fingerprints
pub const UNIQUE_FPS_RESULT: &str = "unique_fingerprints";
/// Result key of the unicity rate
pub const UNICITY_RATE_RESULT: &str = "unicity_rate";
/// Result key of the total number of browsers
pub const TOTAL_BROWSERS_RESULT: &str = "total_browsers";

impl AttributeSetUnicity {
    /// Create the analysis for a dataset and an attribute set
    pub fn new(dataset: Arc<FingerprintDataset>, attributes: AttributeSet) -> Self {
        Self {
            dataset,
            attributes,
            result: BTreeMap::new(),
        }
    }

    /// The unicity results, keyed by result name
    pub fn result(&self) -> &BTreeMap<String, f64> {
        &self.result
    }
}

impl Analysis for AttributeSetUnicity {
    fn execute(&mut self) -> Result<()> {
        if self.attributes.is_empty() || self.dataset.frame().is_empty() {
            return Err(Error::EmptyInput(
                "cannot compute the unicity of an empty dataset or an empty attribute set".into(),
            ));
        }
        let view = self.dataset.one_fp_per_browser(true);
        let columns: Vec<usize> = self
            .attributes
            .iter()
            .map(|attribute| view.column_index(attribute.name()))
            .collect::<Result<_>>()?;

        let mut counts: FxHashMap<Vec<&str>, u64> = FxHashMap::default();
        for row in 0..view.height() {
            let tuple: Vec<&str> = columns
                .iter()
                .map(|&column| view.text_value(row, column))
                .collect();
            *counts.entry(tuple).or_insert(0) += 1;
        }

        let unique_fingerprints = counts.values().filter(|&&count| count == 1).count() as f64;
        let total_browsers = view.height() as f64;
        self.result = BTreeMap::from([
            (UNIQUE_FPS_RESULT.to_string(), unique_fingerprints),
            (
                UNICITY_RATE_RESULT.to_string(),
                unique_fingerprints / total_browsers,
            ),
            (TOTAL_BROWSERS_RESULT.to_string(), total_browsers),
        ]);
        Ok(())
    }

    fn result_rows(&self) -> Vec<Vec<String>> {
        self.result
            .iter()
            .map(|(name, value)| vec![name.clone(), value.to_string()])
            .collect()
    }
}

/// A random sample of the fingerprints restricted to an attribute set
pub struct AttributeSetSample {
    dataset: Arc<FingerprintDataset>,
    attributes: AttributeSet,
    sample_size: usize,
    result: Vec<Vec<String>>,
}

impl AttributeSetSample {
    /// Create the analysis for a dataset, an attribute set, and a size
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] when `sample_size` is zero.
    pub fn new(
        dataset: Arc<FingerprintDataset>,
        attributes: AttributeSet,
        sample_size: usize,
    ) -> Result<Self> {
        if sample_size < 1 {
            return Err(Error::InvalidParameter(
                "the sample size is required to be strictly positive".into(),
            ));
        }
        Ok(Self {
            dataset,
            attributes,
            sample_size,
            result: Vec::new(),
        })
    }

    /// The sampled fingerprints, one row of textual values per sample
    pub fn result(&self) -> &[Vec<String>] {
        &self.result
    }
}

impl Analysis for AttributeSetSample {
    fn execute(&mut self) -> Result<()> {
        let frame = Arc::clone(self.dataset.frame());
        if self.attributes.is_empty() || frame.is_empty() {
            return Err(Error::EmptyInput(
                "cannot sample an empty dataset or an empty attribute set".into(),
            ));
        }
        if self.sample_size > frame.height() {
            return Err(Error::InvalidParameter(format!(
                "cannot sample {} fingerprints out of {}",
                self.sample_size,
                frame.height()
            )));
        }
        let columns: Vec<usize> = self
            .attributes
            .iter()
            .map(|attribute| frame.column_index(attribute.name()))
            .collect::<Result<_>>()?;

        let mut rng = rand::thread_rng();
        self.result = sample(&mut rng, frame.height(), self.sample_size)
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|&column| frame.text_value(row, column).to_string())
                    .collect()
            })
            .collect();
        Ok(())
    }

    fn result_rows(&self) -> Vec<Vec<String>> {
        let mut rows = vec![self.attributes.names()];
        rows.extend(self.result.iter().cloned());
        rows
    }
}
