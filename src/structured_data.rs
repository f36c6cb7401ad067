//! STRUCTURED-DATA: ordered elements, each holding an ordered multimap of
//! parameters.

use std::collections::HashMap;
use std::fmt;

use crate::error::Error;
use crate::escape::{escape, NIL};
use crate::message::check_field;

/// Maximum length of an SD-ID and of a PARAM-NAME.
pub const MAX_SD_NAME_LEN: usize = 32;

/// Ordered parameters of one element. Duplicate names are kept in insertion
/// order; single value lookups see the most recently inserted value.
#[derive(Clone, Debug, Default)]
pub struct Params {
    items: Vec<(String, String)>,
    // name -> index of the latest pair with that name
    latest: HashMap<String, usize>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_pairs(items: Vec<(String, String)>) -> Self {
        let mut params = Self {
            items,
            latest: HashMap::new(),
        };
        params.reindex();
        params
    }

    fn reindex(&mut self) {
        self.latest.clear();
        for (index, (name, _)) in self.items.iter().enumerate() {
            self.latest.insert(name.clone(), index);
        }
    }

    /// Append a pair. The name must be a valid PARAM-NAME.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), Error> {
        let name = name.into();
        check_field("param name", &name, MAX_SD_NAME_LEN)?;

        self.latest.insert(name.clone(), self.items.len());
        self.items.push((name, value.into()));
        Ok(())
    }

    /// The most recently inserted value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.latest
            .get(name)
            .map(|&index| self.items[index].1.as_str())
    }

    /// Every value for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.items
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Drop every pair named `name`, returning the removed values.
    pub fn remove(&mut self, name: &str) -> Vec<String> {
        if !self.latest.contains_key(name) {
            return Vec::new();
        }

        let mut removed = Vec::new();
        self.items.retain_mut(|(n, v)| {
            if n == name {
                removed.push(std::mem::take(v));
                false
            } else {
                true
            }
        });
        self.reindex();

        removed
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.latest.contains_key(name)
    }

    /// Number of pairs, duplicates included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct names.
    pub fn key_count(&self) -> usize {
        self.latest.len()
    }

    /// All pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Distinct names, in order of first appearance.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let mut seen = std::collections::HashSet::new();
        self.items
            .iter()
            .map(|(n, _)| n.as_str())
            .filter(move |n| seen.insert(*n))
    }
}

impl PartialEq for Params {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for Params {}

/// One `[SD-ID PARAM-NAME="PARAM-VALUE" ...]` group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuredElement {
    id: String,
    params: Params,
}

impl StructuredElement {
    pub fn new(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        check_field("SD-ID", &id, MAX_SD_NAME_LEN)?;

        Ok(Self {
            id,
            params: Params::new(),
        })
    }

    /// Build an element from pairs, validating the id and every name.
    pub fn with_params<I, K, V>(id: impl Into<String>, params: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut element = Self::new(id)?;
        for (name, value) in params {
            element.params.insert(name, value)?;
        }
        Ok(element)
    }

    // fields are already validated by the grammar
    pub(crate) fn from_parts(id: String, pairs: Vec<(String, String)>) -> Self {
        Self {
            id,
            params: Params::from_pairs(pairs),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), Error> {
        self.params.insert(name, value)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}

impl fmt::Display for StructuredElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.id)?;
        for (name, value) in self.params.iter() {
            write!(f, " {}=\"{}\"", name, escape(value))?;
        }
        f.write_str("]")
    }
}

/// The STRUCTURED-DATA field. Empty means NIL on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructuredData(Vec<StructuredElement>);

impl StructuredData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: StructuredElement) {
        self.0.push(element);
    }

    /// First element with the given id. Duplicate ids are allowed, use
    /// [`StructuredData::iter`] to see all of them.
    pub fn get(&self, id: &str) -> Option<&StructuredElement> {
        self.0.iter().find(|element| element.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StructuredElement> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<StructuredElement>> for StructuredData {
    fn from(elements: Vec<StructuredElement>) -> Self {
        Self(elements)
    }
}

impl FromIterator<StructuredElement> for StructuredData {
    fn from_iter<T: IntoIterator<Item = StructuredElement>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a StructuredData {
    type Item = &'a StructuredElement;
    type IntoIter = std::slice::Iter<'a, StructuredElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for StructuredData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(NIL);
        }

        for element in &self.0 {
            write!(f, "{element}")?;
        }
        Ok(())
    }
}
