//! Manifest discovery for scanning the current working tree.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Entries never descended into or reported.
const ALWAYS_EXCLUDED: &[&str] = &["node_modules", ".git"];

/// A package ecosystem with the manifest files Snyk understands for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Dotnet,
    Golang,
    Java,
    Npm,
}

impl Ecosystem {
    /// Manifest file names, lower-cased.
    pub fn manifests(&self) -> &'static [&'static str] {
        match self {
            Ecosystem::Dotnet => &["packages.config", "project.assets.json", "project.json"],
            Ecosystem::Golang => &["go.mod", "gopkg.lock", "vendor.json"],
            Ecosystem::Java => &["pom.xml", "build.gradle", "build.gradle.kts", "build.sbt"],
            Ecosystem::Npm => &["package-lock.json", "yarn.lock"],
        }
    }

    /// Whether `file_name` is a manifest of this ecosystem.
    pub fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.manifests().contains(&lower.as_str())
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Ecosystem::Dotnet => "dotnet",
            Ecosystem::Golang => "golang",
            Ecosystem::Java => "java",
            Ecosystem::Npm => "npm",
        };
        f.write_str(name)
    }
}

/// A manifest found under the scanned root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    /// Path relative to the scanned root, `/`-separated
    pub relative: String,
    pub ecosystem: Ecosystem,
}

/// Walks a tree looking for manifests of the enabled ecosystems.
#[derive(Debug, Clone)]
pub struct ManifestFinder {
    ecosystems: Vec<Ecosystem>,
    excluded: Vec<String>,
}

impl ManifestFinder {
    pub fn new(ecosystems: Vec<Ecosystem>) -> Self {
        Self {
            ecosystems,
            excluded: Vec::new(),
        }
    }

    /// File or directory names to skip, in addition to `node_modules` and `.git`.
    pub fn with_excluded(mut self, names: Vec<String>) -> Self {
        self.excluded = names;
        self
    }

    fn is_excluded(&self, name: &str) -> bool {
        ALWAYS_EXCLUDED.contains(&name) || self.excluded.iter().any(|e| e == name)
    }

    fn ecosystem_of(&self, name: &str) -> Option<Ecosystem> {
        self.ecosystems.iter().copied().find(|e| e.matches(name))
    }

    /// Every matching manifest under `root`, sorted by relative path.
    ///
    /// An excluded name prunes only the entry that carries it: excluding a
    /// file never hides its siblings.
    pub fn find(&self, root: &Path) -> Result<Vec<ManifestFile>> {
        let mut found = Vec::new();

        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| self.is_excluded(name))
        });

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ecosystem) = entry.file_name().to_str().and_then(|n| self.ecosystem_of(n)) else {
                continue;
            };

            found.push(ManifestFile {
                relative: relative_path(root, entry.path()),
                ecosystem,
            });
        }

        found.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(found)
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel: PathBuf = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    fn names(found: &[ManifestFile]) -> Vec<&str> {
        found.iter().map(|m| m.relative.as_str()).collect()
    }

    #[test]
    fn test_matches_case_insensitively() {
        assert!(Ecosystem::Java.matches("POM.xml"));
        assert!(Ecosystem::Golang.matches("Gopkg.lock"));
        assert!(Ecosystem::Npm.matches("yarn.lock"));
        assert!(!Ecosystem::Npm.matches("package.json"));
        assert!(!Ecosystem::Dotnet.matches("pom.xml"));
    }

    #[test]
    fn test_finds_only_enabled_ecosystems() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pom.xml");
        touch(dir.path(), "web/package-lock.json");
        touch(dir.path(), "svc/go.mod");

        let found = ManifestFinder::new(vec![Ecosystem::Npm, Ecosystem::Golang])
            .find(dir.path())
            .unwrap();

        assert_eq!(names(&found), vec!["svc/go.mod", "web/package-lock.json"]);
        assert_eq!(found[0].ecosystem, Ecosystem::Golang);
    }

    #[test]
    fn test_skips_node_modules_and_git() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "yarn.lock");
        touch(dir.path(), "node_modules/dep/yarn.lock");
        touch(dir.path(), ".git/yarn.lock");

        let found = ManifestFinder::new(vec![Ecosystem::Npm]).find(dir.path()).unwrap();
        assert_eq!(names(&found), vec!["yarn.lock"]);
    }

    #[test]
    fn test_excluded_file_does_not_hide_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "web/package-lock.json");
        touch(dir.path(), "web/yarn.lock");
        touch(dir.path(), "legacy/yarn.lock");

        let found = ManifestFinder::new(vec![Ecosystem::Npm])
            .with_excluded(vec!["package-lock.json".into(), "legacy".into()])
            .find(dir.path())
            .unwrap();

        assert_eq!(names(&found), vec!["web/yarn.lock"]);
    }
}
