//! Reconciliation of Snyk project names with repository tags.
//!
//! Each historical scan registered a Snyk project named
//! `<product>@<version>`, while the repository names its releases however
//! its maintainers chose to. Matching works in two passes:
//!
//! 1. **Substring**: tags containing the version suffix literally. The
//!    shortest one wins, since longer names tend to carry extra qualifiers
//!    (`release/v1.2.3-hotfix` vs `v1.2.3`). Ties keep input order.
//! 2. **Structured suffix**: only when pass 1 finds nothing. Tags ending in
//!    a path segment of digit groups, optionally followed by one more word
//!    segment (`team/release/2.3.4/fix`), match when that segment is
//!    contained in the suffix. The first such tag wins.
//!
//! The two passes break ties differently (shortest vs first). Keep it that
//! way; reviewed mappings depend on it.

use crate::error::Result;
use crate::models::{dedupe_projects, RepositoryTag, ScannedProjectRecord, TagMapping};
use regex::Regex;
use tracing::debug;

/// Tag names ending in `/<digit groups>` with an optional `/<word>` tail.
///
/// Digits and word characters are ASCII only.
const VERSION_SEGMENT_PATTERN: &str = r"^.*/((?:[0-9].?)+)(?:/[0-9A-Za-z_]+)?$";

/// Matches Snyk projects to repository tags.
pub struct TagReconciler {
    product_name: String,
    version_segment: Regex,
}

/// Result of reconciling every project of a product.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Matched pairs, ordered by project name
    pub mapping: TagMapping,

    /// Names of projects with no plausible tag, sorted
    pub unmatched: Vec<String>,
}

impl TagReconciler {
    /// Create a reconciler for the given product.
    pub fn new(product_name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            product_name: product_name.into(),
            version_segment: Regex::new(VERSION_SEGMENT_PATTERN)?,
        })
    }

    /// Find the most plausible tag for one project.
    pub fn find_match<'t>(
        &self,
        tags: &'t [RepositoryTag],
        project: &ScannedProjectRecord,
    ) -> Option<&'t RepositoryTag> {
        let suffix = project.version_suffix(&self.product_name)?;

        self.substring_match(tags, suffix)
            .or_else(|| self.version_segment_match(tags, suffix))
    }

    fn substring_match<'t>(&self, tags: &'t [RepositoryTag], suffix: &str) -> Option<&'t RepositoryTag> {
        let mut best: Option<&RepositoryTag> = None;
        for tag in tags.iter().filter(|t| t.name.contains(suffix)) {
            // Strictly shorter only, so the earliest of equal lengths stays.
            if best.map_or(true, |b| tag.name.len() < b.name.len()) {
                best = Some(tag);
            }
        }
        best
    }

    fn version_segment_match<'t>(
        &self,
        tags: &'t [RepositoryTag],
        suffix: &str,
    ) -> Option<&'t RepositoryTag> {
        tags.iter().find(|tag| {
            self.version_segment
                .captures(&tag.name)
                .and_then(|caps| caps.get(1))
                .map_or(false, |candidate| {
                    debug!(
                        tag = %tag.name,
                        candidate = candidate.as_str(),
                        "checking version segment against {}",
                        suffix
                    );
                    suffix.contains(candidate.as_str())
                })
        })
    }

    /// Reconcile every project against the tag list.
    ///
    /// Duplicate project names are collapsed first-seen. Projects without a
    /// match are listed in [`Reconciliation::unmatched`], never dropped.
    pub fn reconcile(
        &self,
        projects: Vec<ScannedProjectRecord>,
        tags: &[RepositoryTag],
    ) -> Reconciliation {
        let mut pairs = Vec::new();
        let mut unmatched = Vec::new();

        for project in dedupe_projects(projects) {
            match self.find_match(tags, &project) {
                Some(tag) => {
                    debug!(project = %project.name, tag = %tag.name, "matched project to tag");
                    pairs.push((project, tag.clone()));
                }
                None => {
                    debug!(project = %project.name, "no matching tag");
                    unmatched.push(project.name);
                }
            }
        }

        unmatched.sort();

        Reconciliation {
            mapping: TagMapping::new(pairs),
            unmatched,
        }
    }
}
