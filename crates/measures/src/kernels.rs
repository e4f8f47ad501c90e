//! Pure measure kernels
//!
//! Every kernel reads cells through the frame's textual coercion, so rows
//! with missing values are counted under the distinct `missing` category
//! instead of silently disappearing from the frequency counts. The
//! kernels are deterministic: equal inputs give equal outputs regardless
//! of the worker count driving them.

use fpselect_core::{Attribute, AttributeSet, Error, Result};
use fpselect_data::FingerprintFrame;
use rustc_hash::FxHashMap;

/// Resolve the frame column of every attribute of the set, in id order
fn projection(frame: &FingerprintFrame, attributes: &AttributeSet) -> Result<Vec<usize>> {
    attributes
        .iter()
        .map(|attribute| frame.column_index(attribute.name()))
        .collect()
}

/// Count the occurrences of each distinct joint value tuple
///
/// Returns `(count, first occurrence row)` per tuple; the first
/// occurrence index makes the stable tie-break of [`top_k_share`]
/// explicit.
fn tuple_counts<'frame>(
    frame: &'frame FingerprintFrame,
    columns: &[usize],
) -> FxHashMap<Vec<&'frame str>, (u64, usize)> {
    let mut counts: FxHashMap<Vec<&str>, (u64, usize)> = FxHashMap::default();
    for row in 0..frame.height() {
        let tuple: Vec<&str> = columns
            .iter()
            .map(|&column| frame.text_value(row, column))
            .collect();
        let slot = counts.entry(tuple).or_insert((0, row));
        slot.0 += 1;
    }
    counts
}

/// Shannon entropy (base 2) of the joint value tuples of an attribute set
///
/// # Errors
/// - [`Error::EmptyInput`] when the attribute set or the frame is empty
/// - [`Error::KeyNotFound`] when an attribute is not a column of the frame
pub fn attribute_set_entropy(
    frame: &FingerprintFrame,
    attributes: &AttributeSet,
) -> Result<f64> {
    if attributes.is_empty() || frame.is_empty() {
        return Err(Error::EmptyInput(
            "cannot compute the entropy of an empty dataset or an empty attribute set".into(),
        ));
    }
    let columns = projection(frame, attributes)?;
    let total = frame.height() as f64;
    let entropy = tuple_counts(frame, &columns)
        .values()
        .map(|&(count, _)| {
            let frequency = count as f64 / total;
            -frequency * frequency.log2()
        })
        .sum();
    Ok(entropy)
}

/// Share of the users covered by the `k` most common joint value tuples
///
/// The tuples are ranked by occurrence count descending; ties keep the
/// first-occurrence order of the tuples. The result is the sum of the
/// relative frequencies of the first `k` tuples, a value in `[0, 1]`;
/// `k = 0` gives `0.0`.
///
/// # Errors
/// Same contract as [`attribute_set_entropy`].
pub fn top_k_share(
    frame: &FingerprintFrame,
    attributes: &AttributeSet,
    k: usize,
) -> Result<f64> {
    if attributes.is_empty() || frame.is_empty() {
        return Err(Error::EmptyInput(
            "cannot compute the top-k share of an empty dataset or an empty attribute set".into(),
        ));
    }
    let columns = projection(frame, attributes)?;
    if k == 0 {
        return Ok(0.0);
    }

    let mut ranked: Vec<(u64, usize)> = tuple_counts(frame, &columns).into_values().collect();
    ranked.sort_by(|&(count_a, first_a), &(count_b, first_b)| {
        count_b.cmp(&count_a).then(first_a.cmp(&first_b))
    });

    let total = frame.height() as f64;
    let shared: u64 = ranked.iter().take(k).map(|&(count, _)| count).sum();
    Ok(shared as f64 / total)
}

/// Proportion of value changes between consecutive fingerprints
///
/// Rows are grouped per browser and ordered by collect time; every
/// adjacent pair counts one comparison, and one change when the two
/// values differ. Missing compared to missing is equal. Returns `0.0`
/// when the frame holds no consecutive pair at all.
///
/// # Errors
/// [`Error::KeyNotFound`] when the attribute is not a column of the frame.
pub fn proportion_of_changes(frame: &FingerprintFrame, attribute: &Attribute) -> Result<f64> {
    let column = frame.column_index(attribute.name())?;
    let mut comparisons = 0u64;
    let mut changes = 0u64;
    for (_, row_indices) in frame.browser_groups() {
        for pair in row_indices.windows(2) {
            comparisons += 1;
            if frame.value(pair[0], column) != frame.value(pair[1], column) {
                changes += 1;
            }
        }
    }
    if comparisons == 0 {
        Ok(0.0)
    } else {
        Ok(changes as f64 / comparisons as f64)
    }
}

/// Mean textual length of the values of an attribute over the full table
///
/// Every recorded fingerprint contributes; missing cells contribute the
/// length of the `missing` category like in every other kernel.
///
/// # Errors
/// - [`Error::EmptyInput`] when the frame has no rows
/// - [`Error::KeyNotFound`] when the attribute is not a column of the frame
pub fn average_size(frame: &FingerprintFrame, attribute: &Attribute) -> Result<f64> {
    let column = frame.column_index(attribute.name())?;
    if frame.is_empty() {
        return Err(Error::EmptyInput(
            "cannot compute the average size on an empty dataset".into(),
        ));
    }
    let total_length: usize = (0..frame.height())
        .map(|row| frame.text_value(row, column).chars().count())
        .sum();
    Ok(total_length as f64 / frame.height() as f64)
}
