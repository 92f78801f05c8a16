//! Search criteria and results.

use super::{DocId, Document};
use std::collections::BTreeMap;

/// Conjunctive exact-match criteria for a narrowing search.
///
/// An empty set of criteria matches every document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    fields: BTreeMap<String, String>,
}

impl SearchCriteria {
    /// Creates empty criteria (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Requires field `name` to hold `value`. A later call for the same name wins.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns true if no criteria are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of criteria.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses a `name=value` pair, as accepted on the command line.
    ///
    /// Returns `None` if there is no `=` or the name is empty.
    #[must_use]
    pub fn parse_pair(pair: &str) -> Option<(String, String)> {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), value.to_string()))
    }
}

impl<K, V> FromIterator<(K, V)> for SearchCriteria
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A matched document paired with the requested stored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The full document as fetched from the store.
    pub document: Document,
    /// Stored index values for each requested field (criteria names plus extra fields).
    pub fields: BTreeMap<String, Vec<String>>,
}

impl SearchHit {
    /// Returns the ID of the matched document.
    #[must_use]
    pub const fn id(&self) -> &DocId {
        self.document.id()
    }
}
