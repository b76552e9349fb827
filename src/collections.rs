use std::collections::{BTreeMap, HashSet};

use crate::{
    error::{Error, Result},
    index::ReferenceIndex,
    reference::Reference,
};

/// Per-document restriction of the search space to named collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionFilters {
    documents: BTreeMap<String, Vec<String>>,
}

impl CollectionFilters {
    pub fn from_assignments(
        assignments: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Self {
        Self {
            documents: assignments.into_iter().collect(),
        }
    }

    /// Restrict `doc` to `names`, each of which must exist in `index`.
    ///
    /// Blank names are ignored; an empty list clears the restriction. On
    /// an unknown name the previous assignment is left untouched.
    pub fn assign(
        &mut self,
        doc: &str,
        names: &[String],
        index: &ReferenceIndex,
    ) -> Result<Vec<String>> {
        let names: Vec<String> = names
            .iter()
            .filter(|name| !name.is_empty())
            .cloned()
            .collect();

        if let Some(missing) = names.iter().find(|n| !index.has_collection(n)) {
            return Err(Error::NotFound {
                kind: "collection",
                name: missing.clone(),
            });
        }

        if names.is_empty() {
            self.documents.remove(doc);
        } else {
            self.documents.insert(doc.to_string(), names.clone());
        }
        Ok(names)
    }

    /// Collections assigned to `doc`; empty means the whole index.
    pub fn get(&self, doc: &str) -> &[String] {
        self.documents.get(doc).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn assignments(&self) -> &BTreeMap<String, Vec<String>> {
        &self.documents
    }

    /// References a search from `doc` should consider.
    ///
    /// The union of the assigned collections, in assignment order, or the
    /// whole index when nothing is assigned or the union is empty.
    pub fn candidates<'a>(
        &self,
        doc: &str,
        index: &'a ReferenceIndex,
    ) -> Vec<&'a Reference> {
        let mut seen = HashSet::new();
        let restricted: Vec<&Reference> = self
            .get(doc)
            .iter()
            .filter_map(|name| index.collection(name))
            .flatten()
            .filter(|item| seen.insert(**item))
            .filter_map(|item| index.get(*item))
            .collect();

        if restricted.is_empty() {
            index.references().collect()
        } else {
            restricted
        }
    }
}
