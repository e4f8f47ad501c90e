//! Per-attribute cost input files
//!
//! The usability cost measures are parameterized by per-attribute numbers
//! that are usually measured offline and stored as small CSV files: the
//! average size in memory, the proportion of value changes between
//! consecutive fingerprints, and the average collection time together
//! with the asynchronous flag. Rows map to attributes by name; a name
//! that does not belong to the candidate attributes is an error.

use fpselect_core::{AttributeSet, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct AverageSizeRecord {
    attribute: String,
    average_size: f64,
}

#[derive(Debug, Deserialize)]
struct InstabilityRecord {
    attribute: String,
    proportion_of_changes: f64,
}

#[derive(Debug, Deserialize)]
struct CollectionTimeRecord {
    attribute: String,
    average_collection_time: f64,
    is_asynchronous: bool,
}

/// Read a `attribute,average_size` CSV into an id-keyed map
///
/// # Errors
/// Returns [`Error::KeyNotFound`] for a row naming an attribute that is
/// not among the candidates.
pub fn read_average_sizes(
    reader: impl Read,
    candidates: &AttributeSet,
) -> Result<BTreeMap<u32, f64>> {
    let mut sizes = BTreeMap::new();
    for record in csv::Reader::from_reader(reader).deserialize() {
        let record: AverageSizeRecord = record?;
        let attribute = candidates.get_by_name(&record.attribute)?;
        sizes.insert(attribute.id(), record.average_size);
    }
    Ok(sizes)
}

/// Read a `attribute,proportion_of_changes` CSV into an id-keyed map
pub fn read_instabilities(
    reader: impl Read,
    candidates: &AttributeSet,
) -> Result<BTreeMap<u32, f64>> {
    let mut instabilities = BTreeMap::new();
    for record in csv::Reader::from_reader(reader).deserialize() {
        let record: InstabilityRecord = record?;
        let attribute = candidates.get_by_name(&record.attribute)?;
        instabilities.insert(attribute.id(), record.proportion_of_changes);
    }
    Ok(instabilities)
}

/// Read a `attribute,average_collection_time,is_asynchronous` CSV
///
/// The value of each entry is the average collection time paired with
/// whether the attribute is collected asynchronously.
pub fn read_collection_times(
    reader: impl Read,
    candidates: &AttributeSet,
) -> Result<BTreeMap<u32, (f64, bool)>> {
    let mut times = BTreeMap::new();
    for record in csv::Reader::from_reader(reader).deserialize() {
        let record: CollectionTimeRecord = record?;
        let attribute = candidates.get_by_name(&record.attribute)?;
        times.insert(
            attribute.id(),
            (record.average_collection_time, record.is_asynchronous),
        );
    }
    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpselect_core::{Attribute, Error};

    fn candidates() -> AttributeSet {
        AttributeSet::from_attributes(vec![
            Attribute::new(1, "user_agent"),
            Attribute::new(2, "timezone"),
        ])
        .unwrap()
    }

    #[test]
    fn test_read_average_sizes() {
        let csv = "attribute,average_size\nuser_agent,42.5\ntimezone,3.0\n";
        let sizes = read_average_sizes(csv.as_bytes(), &candidates()).unwrap();
        assert_eq!(sizes, BTreeMap::from([(1, 42.5), (2, 3.0)]));
    }

    #[test]
    fn test_read_instabilities() {
        let csv = "attribute,proportion_of_changes\ntimezone,0.25\n";
        let instabilities = read_instabilities(csv.as_bytes(), &candidates()).unwrap();
        assert_eq!(instabilities, BTreeMap::from([(2, 0.25)]));
    }

    #[test]
    fn test_read_collection_times() {
        let csv = "\
attribute,average_collection_time,is_asynchronous
user_agent,1.5,false
timezone,20.0,true
";
        let times = read_collection_times(csv.as_bytes(), &candidates()).unwrap();
        assert_eq!(times, BTreeMap::from([(1, (1.5, false)), (2, (20.0, true))]));
    }

    #[test]
    fn test_unknown_attribute_name_is_rejected() {
        let csv = "attribute,average_size\nscreen_width,12.0\n";
        let result = read_average_sizes(csv.as_bytes(), &candidates());
        assert!(matches!(result, Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn test_malformed_number_is_a_csv_error() {
        let csv = "attribute,average_size\nuser_agent,not-a-number\n";
        let result = read_average_sizes(csv.as_bytes(), &candidates());
        assert!(matches!(result, Err(Error::Csv(_))));
    }
}
