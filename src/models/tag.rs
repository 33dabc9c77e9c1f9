//! Repository tag and mapping models.

use super::ScannedProjectRecord;
use serde::{Deserialize, Serialize};

/// A tag in the product's repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryTag {
    /// Tag name
    pub name: String,

    /// SHA of the tagged commit
    pub commit_hash: String,
}

impl RepositoryTag {
    pub fn new(name: impl Into<String>, commit_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit_hash: commit_hash.into(),
        }
    }
}

/// One project paired with the tag it was reconciled to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub project: ScannedProjectRecord,
    pub tag: RepositoryTag,
}

/// Project-to-tag pairs ordered by project name.
///
/// The ordering is what the operator reviews and what the orchestrator
/// walks, so it must not depend on the order projects were fetched in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMapping {
    entries: Vec<MappingEntry>,
}

impl TagMapping {
    /// Build a mapping, sorting by project name and dropping repeated names.
    pub fn new(pairs: Vec<(ScannedProjectRecord, RepositoryTag)>) -> Self {
        let mut entries: Vec<MappingEntry> = Vec::with_capacity(pairs.len());
        for (project, tag) in pairs {
            if entries.iter().any(|e| e.project.name == project.name) {
                continue;
            }
            entries.push(MappingEntry { project, tag });
        }
        // Stable sort keeps first-seen order among equal names.
        entries.sort_by(|a, b| a.project.name.cmp(&b.project.name));
        Self { entries }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove the entry at a displayed index.
    pub fn remove(&mut self, index: usize) -> Option<MappingEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MappingEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a TagMapping {
    type Item = &'a MappingEntry;
    type IntoIter = std::slice::Iter<'a, MappingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
