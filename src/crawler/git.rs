//! Git operations using git2.

use crate::error::{Result, ScannerError};
use crate::orchestrator::{VersionControl, WorkingCopy};
use git2::{build::CheckoutBuilder, build::RepoBuilder, Cred, FetchOptions, RemoteCallbacks};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// HTTPS credentials for the product repository.
///
/// Only ever handed to libgit2's credential callback; never written into
/// the remote URL or the clone's config.
#[derive(Clone)]
pub struct GitCredentials {
    username: String,
    token: String,
}

impl GitCredentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

fn remote_callbacks(credentials: Option<&GitCredentials>) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();

    if let Some(creds) = credentials {
        callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
            Cred::userpass_plaintext(&creds.username, &creds.token)
        });
    }

    callbacks.transfer_progress(|progress| {
        debug!(
            "Transfer progress: {}/{} objects",
            progress.received_objects(),
            progress.total_objects()
        );
        true
    });

    callbacks
}

/// Git operations handler.
#[derive(Debug, Clone)]
pub struct GitOperations {
    /// Credentials for HTTPS remotes
    credentials: Option<GitCredentials>,

    /// Shallow clone depth (0 = full clone)
    depth: u32,
}

impl GitOperations {
    /// Create a new Git operations handler.
    pub fn new() -> Self {
        Self {
            credentials: None,
            depth: 1, // Shallow clone by default
        }
    }

    /// Set the authentication credentials.
    pub fn with_credentials(mut self, credentials: GitCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the clone depth (0 = full clone).
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }
}

impl Default for GitOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionControl for GitOperations {
    type Copy = GitWorkingCopy;

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<GitWorkingCopy> {
        info!("Cloning repository: {} -> {}", url, dest.display());

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(self.credentials.as_ref()));
        if self.depth > 0 {
            fetch_options.depth(self.depth as i32);
        }

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);

        let repo = builder
            .clone(url, dest)
            .map_err(|e| ScannerError::Clone(format!("failed to clone {}: {}", url, e)))?;

        info!("Successfully cloned: {}", url);

        Ok(GitWorkingCopy {
            repo,
            path: dest.to_path_buf(),
            credentials: self.credentials.clone(),
        })
    }
}

/// A clone whose tree is moved between historical commits.
pub struct GitWorkingCopy {
    repo: git2::Repository,
    path: PathBuf,
    credentials: Option<GitCredentials>,
}

impl GitWorkingCopy {
    /// Get the current HEAD commit SHA.
    pub fn head_sha(&self) -> Result<String> {
        let head = self.repo.head()?;
        let oid = head
            .target()
            .ok_or_else(|| ScannerError::Git(git2::Error::from_str("HEAD has no target")))?;
        Ok(oid.to_string())
    }
}

impl WorkingCopy for GitWorkingCopy {
    fn path(&self) -> &Path {
        &self.path
    }

    fn fetch_refs(&mut self, refspecs: &[String]) -> Result<()> {
        if refspecs.is_empty() {
            return Ok(());
        }
        debug!("Fetching refspecs: {:?}", refspecs);

        let mut remote = self.repo.find_remote("origin")?;
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(self.credentials.as_ref()));

        remote.fetch(refspecs, Some(&mut fetch_options), None)?;
        Ok(())
    }

    fn resolve_revision(&self, revision: &str) -> Result<String> {
        let commit = self.repo.revparse_single(revision)?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    fn checkout(&mut self, commit: &str) -> Result<()> {
        let oid = git2::Oid::from_str(commit)?;
        let commit = self.repo.find_commit(oid)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
        self.repo.set_head_detached(oid)?;

        debug!("Checked out {} in {}", oid, self.path.display());
        Ok(())
    }

    /// Remove untracked and ignored files and directories.
    ///
    /// Restore tools write into ignored locations (`node_modules`, `target`,
    /// `obj`), so those go too.
    fn clean(&mut self) -> Result<()> {
        let mut options = git2::StatusOptions::new();
        options
            .include_untracked(true)
            .include_ignored(true)
            .recurse_untracked_dirs(false)
            .recurse_ignored_dirs(false);

        let leftovers: Vec<PathBuf> = self
            .repo
            .statuses(Some(&mut options))?
            .iter()
            .filter(|entry| entry.status().is_wt_new() || entry.status().is_ignored())
            .filter_map(|entry| entry.path().map(|p| self.path.join(p.trim_end_matches('/'))))
            .collect();

        for path in &leftovers {
            debug!("Removing {}", path.display());
            if path.is_dir() {
                std::fs::remove_dir_all(path)?;
            } else {
                std::fs::remove_file(path)?;
            }
        }

        if !leftovers.is_empty() {
            info!("Cleaned {} untracked entries from {}", leftovers.len(), self.path.display());
        }
        Ok(())
    }
}
