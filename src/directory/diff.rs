//! Minimal index mutations between two catalogs
//!
//! Ingesting a replacement catalog must not rewrite the whole index slice
//! of a host: only the keys that actually changed are touched. The diff is
//! the symmetric difference of the old and new key sets, computed once for
//! references and once for types.

use std::collections::BTreeSet;

use crate::catalog::CatalogDocument;

/// Keys to add and keys to remove for one key namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl KeyDiff {
    /// Difference between the old and the new key set.
    pub fn between(old: &BTreeSet<String>, new: &BTreeSet<String>) -> Self {
        Self {
            added: new.difference(old).cloned().collect(),
            removed: old.difference(new).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Index mutations implied by replacing a host's catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    pub references: KeyDiff,
    pub types: KeyDiff,
}

impl CatalogDiff {
    /// Diff `old` (or an empty baseline) against `new`.
    pub fn between(old: Option<&CatalogDocument>, new: &CatalogDocument) -> Self {
        let (old_refs, old_types) = match old {
            Some(doc) => (doc.references(), doc.types()),
            None => (BTreeSet::new(), BTreeSet::new()),
        };
        Self {
            references: KeyDiff::between(&old_refs, &new.references()),
            types: KeyDiff::between(&old_types, &new.types()),
        }
    }

    /// Keys to add to the index, references before types.
    pub fn additions(&self) -> impl Iterator<Item = &str> + '_ {
        self.references
            .added
            .iter()
            .chain(self.types.added.iter())
            .map(String::as_str)
    }

    /// Keys to remove from the index, references before types.
    pub fn removals(&self) -> impl Iterator<Item = &str> + '_ {
        self.references
            .removed
            .iter()
            .chain(self.types.removed.iter())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty() && self.types.is_empty()
    }
}
