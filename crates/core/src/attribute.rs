//! Attributes and attribute sets
//!
//! An [`Attribute`] is a candidate fingerprinting attribute: a stable
//! integer id paired with the column name it carries in the dataset.
//! Identity (equality, hashing, ordering) is defined by the id alone.
//!
//! An [`AttributeSet`] is an id-ordered collection with set semantics.
//! Hash and equality depend only on the set of ids, never on insertion
//! order, so two sets built in different orders compare equal and land in
//! the same hash bucket.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A candidate fingerprinting attribute
///
/// Attributes are created when the dataset is parsed and are immutable
/// afterwards. The id is unique within a dataset.
#[derive(Debug, Clone, Eq)]
pub struct Attribute {
    id: u32,
    name: String,
}

impl Attribute {
    /// Create a new attribute from its id and name
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The unique id of the attribute
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The name of the attribute (the dataset column it maps to)
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Ord for Attribute {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl PartialOrd for Attribute {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// An id-ordered set of attributes
///
/// Iteration always yields attributes in ascending id order. Adding an id
/// that is already present is an error, as is removing or looking up an
/// absent one.
#[derive(Debug, Clone, Default, Eq)]
pub struct AttributeSet {
    by_id: BTreeMap<u32, Attribute>,
}

impl AttributeSet {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding a single attribute
    pub fn singleton(attribute: Attribute) -> Self {
        let mut by_id = BTreeMap::new();
        by_id.insert(attribute.id(), attribute);
        Self { by_id }
    }

    /// Build a set from a sequence of attributes
    ///
    /// # Errors
    /// Returns [`Error::DuplicateAttributeId`] when two attributes share
    /// an id.
    pub fn from_attributes(attributes: impl IntoIterator<Item = Attribute>) -> Result<Self> {
        let mut set = Self::new();
        for attribute in attributes {
            set.add(attribute)?;
        }
        Ok(set)
    }

    /// Add an attribute to the set
    ///
    /// # Errors
    /// Returns [`Error::DuplicateAttributeId`] when the id is already
    /// present.
    pub fn add(&mut self, attribute: Attribute) -> Result<()> {
        let id = attribute.id();
        if self.by_id.contains_key(&id) {
            return Err(Error::DuplicateAttributeId { id });
        }
        self.by_id.insert(id, attribute);
        Ok(())
    }

    /// Remove the attribute with the given id and return it
    ///
    /// # Errors
    /// Returns [`Error::KeyNotFound`] when no attribute has this id.
    pub fn remove(&mut self, id: u32) -> Result<Attribute> {
        self.by_id
            .remove(&id)
            .ok_or_else(|| Error::KeyNotFound(format!("no attribute with the id {id}")))
    }

    /// Whether an attribute with this id is in the set
    pub fn contains_id(&self, id: u32) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Whether this attribute is in the set (identity is the id)
    pub fn contains(&self, attribute: &Attribute) -> bool {
        self.contains_id(attribute.id())
    }

    /// Number of attributes in the set
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterate over the attributes in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.by_id.values()
    }

    /// The ids of the attributes, sorted ascending
    pub fn ids(&self) -> Vec<u32> {
        self.by_id.keys().copied().collect()
    }

    /// The names of the attributes, ordered by id
    pub fn names(&self) -> Vec<String> {
        self.by_id.values().map(|a| a.name().to_string()).collect()
    }

    /// Whether every attribute of `other` is in this set
    pub fn is_superset(&self, other: &AttributeSet) -> bool {
        other.by_id.keys().all(|id| self.by_id.contains_key(id))
    }

    /// Whether every attribute of this set is in `other`
    pub fn is_subset(&self, other: &AttributeSet) -> bool {
        other.is_superset(self)
    }

    /// Look up an attribute by id
    ///
    /// # Errors
    /// Returns [`Error::KeyNotFound`] when no attribute has this id.
    pub fn get_by_id(&self, id: u32) -> Result<&Attribute> {
        self.by_id
            .get(&id)
            .ok_or_else(|| Error::KeyNotFound(format!("no attribute with the id {id}")))
    }

    /// Look up an attribute by name
    ///
    /// # Errors
    /// Returns [`Error::KeyNotFound`] when no attribute has this name.
    pub fn get_by_name(&self, name: &str) -> Result<&Attribute> {
        self.by_id
            .values()
            .find(|a| a.name() == name)
            .ok_or_else(|| Error::KeyNotFound(format!("no attribute is named {name}")))
    }

    /// A copy of this set with one more attribute
    ///
    /// # Errors
    /// Returns [`Error::DuplicateAttributeId`] when the id is already
    /// present.
    pub fn with_attribute(&self, attribute: Attribute) -> Result<Self> {
        let mut extended = self.clone();
        extended.add(attribute)?;
        Ok(extended)
    }
}

impl PartialEq for AttributeSet {
    fn eq(&self, other: &Self) -> bool {
        // Identity is the id set only; names ride along with the ids
        self.by_id.keys().eq(other.by_id.keys())
    }
}

impl Hash for AttributeSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // BTreeMap keys iterate sorted, so the hash is order-independent
        for id in self.by_id.keys() {
            id.hash(state);
        }
    }
}

impl Ord for AttributeSet {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.by_id.keys().cmp(other.by_id.keys())
    }
}

impl PartialOrd for AttributeSet {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a Attribute;
    type IntoIter = std::collections::btree_map::Values<'a, u32, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_id.values()
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (position, attribute) in self.by_id.values().enumerate() {
            if position > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{attribute}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;

    fn sample_attributes() -> Vec<Attribute> {
        vec![
            Attribute::new(1, "user_agent"),
            Attribute::new(2, "timezone"),
            Attribute::new(3, "do_not_track"),
        ]
    }

    fn hash_of(set: &AttributeSet) -> u64 {
        let mut hasher = DefaultHasher::new();
        set.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_attribute_identity_is_the_id() {
        let first = Attribute::new(1, "user_agent");
        let renamed = Attribute::new(1, "renamed");
        let other = Attribute::new(2, "user_agent");
        assert_eq!(first, renamed, "attributes with the same id are equal");
        assert_ne!(first, other, "attributes with different ids differ");
    }

    #[test]
    fn test_add_duplicate_id_is_rejected() {
        let mut set = AttributeSet::new();
        set.add(Attribute::new(1, "user_agent")).unwrap();
        let error = set.add(Attribute::new(1, "user_agent")).unwrap_err();
        assert!(matches!(error, Error::DuplicateAttributeId { id: 1 }));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_absent_attribute_is_rejected() {
        let mut set = AttributeSet::from_attributes(sample_attributes()).unwrap();
        assert!(matches!(set.remove(42), Err(Error::KeyNotFound(_))));
        let removed = set.remove(2).unwrap();
        assert_eq!(removed.name(), "timezone");
        assert_eq!(set.ids(), vec![1, 3]);
    }

    #[test]
    fn test_iteration_is_ordered_by_id() {
        let set = AttributeSet::from_attributes(vec![
            Attribute::new(3, "do_not_track"),
            Attribute::new(1, "user_agent"),
            Attribute::new(2, "timezone"),
        ])
        .unwrap();
        assert_eq!(set.ids(), vec![1, 2, 3]);
        assert_eq!(set.names(), vec!["user_agent", "timezone", "do_not_track"]);
    }

    #[test]
    fn test_equality_and_hash_ignore_insertion_order() {
        let forward = AttributeSet::from_attributes(sample_attributes()).unwrap();
        let backward =
            AttributeSet::from_attributes(sample_attributes().into_iter().rev()).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(hash_of(&forward), hash_of(&backward));
    }

    #[test]
    fn test_subset_and_superset() {
        let full = AttributeSet::from_attributes(sample_attributes()).unwrap();
        let pair = AttributeSet::from_attributes(vec![
            Attribute::new(1, "user_agent"),
            Attribute::new(2, "timezone"),
        ])
        .unwrap();
        assert!(full.is_superset(&pair));
        assert!(pair.is_subset(&full));
        assert!(!pair.is_superset(&full));
        assert!(full.is_superset(&full), "a set is a superset of itself");
        assert!(AttributeSet::new().is_subset(&pair));
    }

    #[test]
    fn test_lookups() {
        let set = AttributeSet::from_attributes(sample_attributes()).unwrap();
        assert_eq!(set.get_by_id(2).unwrap().name(), "timezone");
        assert_eq!(set.get_by_name("do_not_track").unwrap().id(), 3);
        assert!(matches!(set.get_by_id(42), Err(Error::KeyNotFound(_))));
        assert!(matches!(
            set.get_by_name("missing_from_dataset"),
            Err(Error::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_with_attribute_leaves_original_untouched() {
        let pair = AttributeSet::from_attributes(vec![
            Attribute::new(1, "user_agent"),
            Attribute::new(2, "timezone"),
        ])
        .unwrap();
        let extended = pair.with_attribute(Attribute::new(3, "do_not_track")).unwrap();
        assert_eq!(pair.len(), 2);
        assert_eq!(extended.ids(), vec![1, 2, 3]);
        assert!(pair.with_attribute(Attribute::new(1, "dup")).is_err());
    }

    #[test]
    fn test_lexicographic_ordering_of_sets() {
        let one = AttributeSet::singleton(Attribute::new(1, "a"));
        let one_two = one.with_attribute(Attribute::new(2, "b")).unwrap();
        let two = AttributeSet::singleton(Attribute::new(2, "b"));
        assert!(one < one_two, "prefix orders before its extension");
        assert!(one_two < two, "comparison is by the id sequence");
    }

    proptest! {
        #[test]
        fn prop_id_roundtrip_is_identity(mut ids in proptest::collection::vec(0u32..500, 0..32)) {
            ids.sort_unstable();
            ids.dedup();
            let set = AttributeSet::from_attributes(
                ids.iter().map(|&id| Attribute::new(id, format!("attribute_{id}"))),
            )
            .unwrap();
            prop_assert_eq!(set.ids(), ids);

            let rebuilt = AttributeSet::from_attributes(
                set.iter().cloned().collect::<Vec<_>>(),
            )
            .unwrap();
            prop_assert_eq!(rebuilt, set);
        }
    }
}
