//! Sequential historical-scan orchestrator.
//!
//! One working copy is cloned into a temporary workspace and then walked
//! through every mapped tag in order:
//!
//! ```text
//! INIT -> CLONED -> { CHECKED_OUT -> PREBUILT -> SCANNED -> CLEANED } * -> DONE
//! ```
//!
//! Failing to allocate the workspace or to clone is fatal to the run. Every
//! later failure is recorded against its tag and the loop moves on. The
//! workspace is removed when the run ends, whichever way it ends.

use crate::error::{Phase, PhaseError, Result, ScannerError};
use crate::models::{MappingEntry, PipelineOutcome, RepositoryTag, RunReport, TagMapping, TagReport};
use crate::prebuild::PrebuildStep;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Prefix of the temporary workspace directory.
const WORKSPACE_PREFIX: &str = "snyk-history-scanner";

/// A checked-out tree that can be moved between commits.
pub trait WorkingCopy {
    /// Root of the working tree.
    fn path(&self) -> &Path;

    /// Fetch refs that the initial clone may not contain.
    fn fetch_refs(&mut self, refspecs: &[String]) -> Result<()>;

    /// Resolve a revision to a full commit hash.
    fn resolve_revision(&self, revision: &str) -> Result<String>;

    /// Force the working tree to a commit.
    fn checkout(&mut self, commit: &str) -> Result<()>;

    /// Remove untracked files and directories.
    fn clean(&mut self) -> Result<()>;
}

/// Produces working copies of a remote repository.
pub trait VersionControl {
    type Copy: WorkingCopy;

    /// Clone `url` into `dest`, which must not exist yet.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<Self::Copy>;
}

/// Parameters of one scan invocation.
#[derive(Debug, Clone)]
pub struct ScanRequest<'a> {
    pub org: &'a str,
    pub target_reference: &'a str,
    pub product_name: &'a str,
}

/// Runs a dependency scan over whatever is checked out in a directory.
#[async_trait]
pub trait ScanService: Send + Sync {
    async fn scan(&self, dir: &Path, request: &ScanRequest<'_>) -> Result<()>;
}

/// Parameters of a historical scan run.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    pub product_name: &'a str,
    pub org: &'a str,
    pub repo_url: &'a str,
}

/// Stops a run at the next tag boundary.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The product name as a directory inside the workspace.
///
/// Must be one plain path component so the clone stays under the temporary
/// directory and is removed with it.
fn checkout_dir_name(product_name: &str) -> Result<&Path> {
    let path = Path::new(product_name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(ScannerError::Workspace(format!(
            "product name '{}' cannot be used as a directory name",
            product_name
        ))),
    }
}

/// The temporary directory and the single working copy inside it.
///
/// Dropping the workspace removes the directory, so cleanup also happens
/// on early returns and while unwinding from a panic.
pub struct Workspace<C> {
    // Declared before `dir` so the repository handle closes first.
    copy: C,
    dir: TempDir,
}

impl<C: WorkingCopy> Workspace<C> {
    /// Allocate a temporary directory and clone the product into it.
    pub fn create<V>(vcs: &V, request: &RunRequest<'_>, parent: Option<&Path>) -> Result<Self>
    where
        V: VersionControl<Copy = C>,
    {
        let product_dir_name = checkout_dir_name(request.product_name)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| ScannerError::Workspace(format!("failed to create temporary directory: {}", e)))?;

        // Snyk derives project names from the directory it runs in.
        let product_dir = dir.path().join(product_dir_name);
        info!("cloning {} to {}, please wait...", request.product_name, product_dir.display());

        let copy = vcs.clone_repo(request.repo_url, &product_dir).map_err(|e| match e {
            ScannerError::Clone(msg) => ScannerError::Clone(msg),
            other => ScannerError::Clone(format!("failed to clone {}: {}", request.repo_url, other)),
        })?;

        Ok(Self { copy, dir })
    }

    /// Root of the temporary directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The product checkout inside the workspace.
    pub fn tree(&self) -> &Path {
        self.copy.path()
    }

    /// Move the tree to the tag's commit.
    ///
    /// Leftovers from the previous tag are removed first, so a failed clean
    /// can never leak build output into this tag's scan.
    pub fn checkout(&mut self, tag: &RepositoryTag, refspecs: &[String]) -> std::result::Result<(), PhaseError> {
        let checkout = |copy: &mut C| -> Result<String> {
            copy.clean()?;
            copy.fetch_refs(refspecs)?;
            let commit = copy.resolve_revision(&tag.commit_hash)?;
            copy.checkout(&commit)?;
            Ok(commit)
        };

        match checkout(&mut self.copy) {
            Ok(commit) => {
                debug!(tag = %tag.name, commit = %commit, "tree checked out");
                Ok(())
            }
            Err(e) => Err(PhaseError::new(
                Phase::Checkout,
                format!("tag {} ({}): {}", tag.name, tag.commit_hash, e),
            )),
        }
    }

    /// Run every applicable prebuild step, returning their failures.
    pub async fn prebuild(&self, steps: &[Box<dyn PrebuildStep>]) -> Vec<PhaseError> {
        let mut failures = Vec::new();
        let tree = self.tree();

        for step in steps {
            let markers = step.find_markers(tree);
            if markers.is_empty() {
                debug!("prebuild step {} does not apply", step.name());
                continue;
            }
            if !step.is_available() {
                info!(
                    "{} not found on PATH, skipping {} restore",
                    step.tools().join(" or "),
                    step.name()
                );
                continue;
            }

            info!("running {} prebuild", step.name());
            if let Err(e) = step.run(&markers).await {
                warn!("{} prebuild failed: {}", step.name(), e);
                failures.push(PhaseError::new(Phase::Prebuild, format!("{}: {}", step.name(), e)));
            }
        }

        failures
    }

    /// Scan the current tree.
    pub async fn scan<S>(&self, scanner: &S, request: &ScanRequest<'_>) -> std::result::Result<(), PhaseError>
    where
        S: ScanService + ?Sized,
    {
        scanner
            .scan(self.tree(), request)
            .await
            .map_err(|e| PhaseError::new(Phase::Scan, format!("tag {}: {}", request.target_reference, e)))
    }

    /// Remove everything the checkout, prebuild and scan left behind.
    pub fn clean(&mut self) -> std::result::Result<(), PhaseError> {
        self.copy
            .clean()
            .map_err(|e| PhaseError::new(Phase::Clean, format!("failed to clean local worktree: {}", e)))
    }

    /// Remove the workspace, reporting removal errors that `Drop` would hide.
    pub fn close(self) -> Result<()> {
        let Self { copy, dir } = self;
        drop(copy);
        let path = dir.path().to_path_buf();
        dir.close()
            .map_err(|e| ScannerError::Workspace(format!("failed to remove {}: {}", path.display(), e)))
    }
}

/// Drives one working copy through every mapped tag.
pub struct HistoryScanOrchestrator<V, S> {
    vcs: V,
    scanner: S,
    prebuild: Vec<Box<dyn PrebuildStep>>,
    fetch_refspecs: Vec<String>,
    temp_dir: Option<PathBuf>,
    abort: AbortHandle,
}

impl<V, S> HistoryScanOrchestrator<V, S>
where
    V: VersionControl,
    S: ScanService,
{
    pub fn new(vcs: V, scanner: S) -> Self {
        Self {
            vcs,
            scanner,
            prebuild: Vec::new(),
            fetch_refspecs: Vec::new(),
            temp_dir: None,
            abort: AbortHandle::default(),
        }
    }

    pub fn with_prebuild_steps(mut self, steps: Vec<Box<dyn PrebuildStep>>) -> Self {
        self.prebuild = steps;
        self
    }

    pub fn with_fetch_refspecs(mut self, refspecs: Vec<String>) -> Self {
        self.fetch_refspecs = refspecs;
        self
    }

    /// Parent directory for the workspace (system temp if unset).
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Handle that stops the run before the next tag starts.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Scan every tag of the mapping, in mapping order.
    ///
    /// Returns `Err` only for fatal failures (workspace allocation, clone);
    /// per-tag failures are in the report.
    pub async fn run(&self, request: &RunRequest<'_>, mapping: &TagMapping) -> Result<RunReport> {
        let mut report = RunReport::new(request.product_name, request.org);

        let mut workspace = Workspace::create(&self.vcs, request, self.temp_dir.as_deref())?;
        debug!("workspace at {}", workspace.root().display());

        for (index, entry) in mapping.iter().enumerate() {
            if self.abort.is_aborted() {
                warn!(
                    "run aborted, {} of {} tags not scanned",
                    mapping.len() - index,
                    mapping.len()
                );
                report.aborted = true;
                break;
            }

            info!("[{}/{}] scanning tag {}", index + 1, mapping.len(), entry.tag.name);
            let tag_report = self.process_tag(&mut workspace, request, entry).await;
            if tag_report.is_success() {
                info!("tag {} scanned", entry.tag.name);
            } else {
                warn!("tag {} failed", entry.tag.name);
            }
            report.push(tag_report);
        }

        if let Err(e) = workspace.close() {
            warn!("{}", e);
        }

        report.completed_at = chrono::Utc::now();
        Ok(report)
    }

    async fn process_tag(
        &self,
        workspace: &mut Workspace<V::Copy>,
        request: &RunRequest<'_>,
        entry: &MappingEntry,
    ) -> TagReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        match workspace.checkout(&entry.tag, &self.fetch_refspecs) {
            Ok(()) => {
                warnings.extend(workspace.prebuild(&self.prebuild).await);

                let scan = ScanRequest {
                    org: request.org,
                    target_reference: &entry.tag.name,
                    product_name: request.product_name,
                };
                if let Err(e) = workspace.scan(&self.scanner, &scan).await {
                    warn!("{}", e);
                    errors.push(e);
                }
            }
            Err(e) => {
                warn!("{}", e);
                errors.push(e);
            }
        }

        // Always runs, so the next tag starts from a pristine tree.
        if let Err(e) = workspace.clean() {
            warn!("{}", e);
            errors.push(e);
        }

        TagReport {
            project: entry.project.name.clone(),
            tag: entry.tag.name.clone(),
            outcome: if errors.is_empty() {
                PipelineOutcome::Success
            } else {
                PipelineOutcome::Failed(errors)
            },
            warnings,
        }
    }
}
