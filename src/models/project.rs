//! Snyk project data models.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A project previously registered with Snyk.
///
/// Names written by the per-release scans take the form
/// `<product>@<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScannedProjectRecord {
    /// Project name as shown in Snyk
    pub name: String,

    /// Opaque Snyk project id
    pub id: String,
}

impl ScannedProjectRecord {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    /// The part of the name after `<product>@`, if the name carries one.
    pub fn version_suffix(&self, product_name: &str) -> Option<&str> {
        self.name
            .strip_prefix(product_name)
            .and_then(|rest| rest.strip_prefix('@'))
            .filter(|suffix| !suffix.is_empty())
    }
}

/// Collapse records sharing a name, keeping the first one seen.
///
/// Snyk returns one record per scanned manifest, so a single release can
/// show up several times under different ids.
pub fn dedupe_projects(projects: Vec<ScannedProjectRecord>) -> Vec<ScannedProjectRecord> {
    let mut seen = HashSet::new();
    projects
        .into_iter()
        .filter(|p| seen.insert(p.name.clone()))
        .collect()
}
