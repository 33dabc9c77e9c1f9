//! Dependency restore steps run before each scan.
//!
//! Snyk resolves some ecosystems from restored dependencies rather than the
//! manifest alone (Maven modules, NuGet assets, node_modules), so each
//! checked-out tag gets a best-effort restore first. A failed restore never
//! blocks the scan.

use crate::error::{Result, ScannerError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directories never searched for marker files.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules"];

/// An ecosystem-specific restore action.
#[async_trait]
pub trait PrebuildStep: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Tools the step runs, all of which must be installed.
    fn tools(&self) -> &'static [&'static str];

    /// Whether the required tools are installed.
    fn is_available(&self) -> bool;

    /// Marker files under `root` this step restores next to, in a stable
    /// order. Empty when the step does not apply.
    fn find_markers(&self, root: &Path) -> Vec<PathBuf>;

    /// Restore dependencies next to each marker.
    async fn run(&self, markers: &[PathBuf]) -> Result<()>;
}

/// A command run in the directory of every marker file found.
#[derive(Debug, Clone)]
struct RestoreCommand {
    program: &'static str,
    args: &'static [&'static str],
}

/// Restores dependencies next to every file matching a marker predicate.
pub struct MarkerRestore {
    name: &'static str,
    tools: &'static [&'static str],
    is_marker: fn(&str) -> bool,
    commands: Vec<RestoreCommand>,
}

impl MarkerRestore {
    /// `mvn install` next to every `pom.xml`.
    pub fn maven() -> Self {
        Self {
            name: "maven",
            tools: &["mvn"],
            is_marker: |name| name.ends_with("pom.xml"),
            commands: vec![RestoreCommand {
                program: "mvn",
                args: &["install"],
            }],
        }
    }

    /// `dotnet restore` next to every solution or C# project.
    pub fn dotnet() -> Self {
        Self {
            name: "dotnet",
            tools: &["dotnet"],
            is_marker: |name| name.ends_with(".sln") || name.ends_with(".csproj"),
            commands: vec![RestoreCommand {
                program: "dotnet",
                args: &["restore", "--interactive", "--ignore-failed-sources"],
            }],
        }
    }

    /// `npm install` then `yarn` next to every `package.json`.
    pub fn npm_yarn() -> Self {
        Self {
            name: "npm",
            tools: &["npm", "yarn"],
            is_marker: |name| name.eq_ignore_ascii_case("package.json"),
            commands: vec![
                RestoreCommand {
                    program: "npm",
                    args: &["install"],
                },
                RestoreCommand {
                    program: "yarn",
                    args: &[],
                },
            ],
        }
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| SKIPPED_DIRS.contains(&name))
}

#[async_trait]
impl PrebuildStep for MarkerRestore {
    fn name(&self) -> &'static str {
        self.name
    }

    fn tools(&self) -> &'static [&'static str] {
        self.tools
    }

    fn is_available(&self) -> bool {
        self.tools.iter().all(|tool| which::which(tool).is_ok())
    }

    fn find_markers(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_str().map_or(false, self.is_marker))
            .map(|e| e.into_path())
            .collect()
    }

    async fn run(&self, markers: &[PathBuf]) -> Result<()> {
        info!("restoring {} {} manifests", markers.len(), self.name);

        let mut failures = Vec::new();
        for marker in markers {
            let Some(dir) = marker.parent() else {
                continue;
            };

            for command in &self.commands {
                debug!("running {} {:?} for {}", command.program, command.args, marker.display());
                let status = Command::new(command.program)
                    .args(command.args)
                    .current_dir(dir)
                    .status()
                    .await;

                match status {
                    Ok(status) if status.success() => {}
                    Ok(status) => {
                        warn!("{} failed for {}: {}", command.program, marker.display(), status);
                        failures.push(format!("{} failed for {} ({})", command.program, marker.display(), status));
                    }
                    Err(e) => {
                        warn!("could not run {} for {}: {}", command.program, marker.display(), e);
                        failures.push(format!("could not run {} for {}: {}", command.program, marker.display(), e));
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ScannerError::Prebuild(failures.join("; ")))
        }
    }
}

/// The restore steps applied to every historical checkout.
pub fn default_steps() -> Vec<Box<dyn PrebuildStep>> {
    vec![
        Box::new(MarkerRestore::maven()),
        Box::new(MarkerRestore::dotnet()),
        Box::new(MarkerRestore::npm_yarn()),
    ]
}
