//! In-memory id index over a loaded store directory.

use std::collections::BTreeMap;

use super::{Store, StoreError};
use crate::models::Publication;

/// Publications of one store directory keyed by id
#[derive(Debug, Clone, Default)]
pub struct Library {
    records: BTreeMap<String, Publication>,
}

impl Library {
    /// Load `root/subselector`; a directory without records is an error
    pub fn load(store: &Store, subselector: &str) -> Result<Self, StoreError> {
        let report = store.load(subselector)?;
        if report.publications.is_empty() {
            return Err(StoreError::Empty(store.dir(subselector)));
        }
        Ok(report.publications.into_iter().collect())
    }

    pub fn get(&self, id: &str) -> Option<&Publication> {
        self.records.get(id)
    }

    /// Ids in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Publication> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_publications(self) -> Vec<Publication> {
        self.records.into_values().collect()
    }
}

impl FromIterator<Publication> for Library {
    fn from_iter<I: IntoIterator<Item = Publication>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().map(|p| (p.id(), p)).collect(),
        }
    }
}
