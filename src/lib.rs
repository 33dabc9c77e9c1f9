//! snyk-history-scanner - backfill Snyk monitoring for past releases
//!
//! Products that were monitored with Snyk per release (`<product>@<version>`
//! projects) can be rescanned at the exact commit of every release, so the
//! historical projects are re-created with a proper target reference.
//!
//! # Flow
//!
//! 1. List the product's existing Snyk projects and the repository's tags.
//! 2. Reconcile each project with the most plausible tag
//!    ([`reconcile::TagReconciler`]).
//! 3. Let the operator review or edit the mapping ([`console::MappingConsole`]).
//! 4. Clone once, then check out, restore, scan and clean every tag in turn
//!    ([`orchestrator::HistoryScanOrchestrator`]).
//!
//! # Example Usage
//!
//! ```no_run
//! use snyk_history_scanner::{Config, HistoryScanner, RunRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scanner = HistoryScanner::new(Config::default());
//!     let plan = scanner.plan("widget", "acme", "acme", "widget").await?;
//!
//!     let request = RunRequest {
//!         product_name: "widget",
//!         org: "acme",
//!         repo_url: &plan.repo_url,
//!     };
//!     let report = scanner
//!         .orchestrator()?
//!         .run(&request, &plan.reconciliation.mapping)
//!         .await?;
//!     println!("{} tags scanned", report.succeeded());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod crawler;
pub mod error;
pub mod manifest;
pub mod models;
pub mod orchestrator;
pub mod prebuild;
pub mod reconcile;
pub mod reporter;
pub mod snyk;

// Re-export commonly used types
pub use config::{Config, OutputFormat};
pub use error::{Phase, PhaseError, Result, ScannerError};
pub use models::{RepositoryTag, RunReport, ScannedProjectRecord, TagMapping};
pub use orchestrator::{AbortHandle, HistoryScanOrchestrator, RunRequest};
pub use reconcile::{Reconciliation, TagReconciler};

use crawler::{GitCredentials, GitHubClient, GitOperations};
use manifest::{Ecosystem, ManifestFile, ManifestFinder};
use snyk::{ManifestMonitor, SnykApiClient, SnykCli};
use std::path::Path;
use tracing::{debug, info};

/// What a historical run will do, before the operator confirms it.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// URL the product is cloned from
    pub repo_url: String,

    pub reconciliation: Reconciliation,
}

/// Parameters for monitoring the manifests of the current tree.
#[derive(Debug, Clone)]
pub struct CurrentTreeRequest<'a> {
    pub product_name: &'a str,
    pub version: &'a str,
    pub org: &'a str,
    pub ecosystems: Vec<Ecosystem>,
    /// File or directory names to skip
    pub excluded: Vec<String>,
}

/// Entry point wiring the Snyk, GitHub and git collaborators together.
pub struct HistoryScanner {
    config: Config,
}

impl HistoryScanner {
    /// Create a new scanner with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch projects and tags and reconcile them.
    pub async fn plan(&self, product_name: &str, org: &str, owner: &str, repo: &str) -> Result<MigrationPlan> {
        let snyk = SnykApiClient::new(&self.config.snyk.api_url, self.config.snyk_token()?)?;
        let github = GitHubClient::new(self.config.github.clone())?;

        let projects = snyk.list_projects(org).await?;
        let tags = github.list_tags(owner, repo).await?;
        let repo_url = github.clone_url(owner, repo).await?;
        debug!("{} projects, {} tags, cloning from {}", projects.len(), tags.len(), repo_url);

        let reconciliation = TagReconciler::new(product_name)?.reconcile(projects, &tags);
        info!(
            "mapped {} projects to tags, {} unmatched",
            reconciliation.mapping.len(),
            reconciliation.unmatched.len()
        );

        Ok(MigrationPlan {
            repo_url,
            reconciliation,
        })
    }

    /// The Snyk CLI wrapper described by the configuration.
    pub fn snyk_cli(&self) -> Result<SnykCli> {
        let mut cli = SnykCli::new(&self.config.snyk.command)?
            .with_excluded_manifests(self.config.snyk.excluded_manifests.clone())
            .with_extra_args(self.config.snyk.extra_args.clone());
        if let Some(token) = self.config.snyk.token.as_deref().filter(|t| !t.is_empty()) {
            cli = cli.with_token(token);
        }
        Ok(cli)
    }

    /// An orchestrator cloning over authenticated HTTPS and scanning with the Snyk CLI.
    pub fn orchestrator(&self) -> Result<HistoryScanOrchestrator<GitOperations, SnykCli>> {
        let (username, token) = self.config.github_credentials()?;
        let git = GitOperations::new()
            .with_credentials(GitCredentials::new(username, token))
            .with_depth(self.config.scan.clone_depth);

        let scanner = self.snyk_cli()?;
        scanner.ensure_available()?;

        let steps = if self.config.scan.prebuild {
            prebuild::default_steps()
        } else {
            Vec::new()
        };

        Ok(HistoryScanOrchestrator::new(git, scanner)
            .with_prebuild_steps(steps)
            .with_fetch_refspecs(self.config.scan.fetch_refspecs.clone())
            .with_temp_dir(self.config.scan.temp_dir.clone()))
    }

    /// Monitor every manifest of the enabled ecosystems under `root`.
    ///
    /// Stops at the first failed invocation.
    pub async fn scan_current_tree(&self, root: &Path, request: &CurrentTreeRequest<'_>) -> Result<Vec<ManifestFile>> {
        let cli = self.snyk_cli()?;
        cli.ensure_available()?;

        let manifests = ManifestFinder::new(request.ecosystems.clone())
            .with_excluded(request.excluded.clone())
            .find(root)?;
        info!("found {} manifests under {}", manifests.len(), root.display());

        for manifest in &manifests {
            info!("scanning '{}' with snyk...", manifest.relative);
            cli.monitor_manifest(
                root,
                &ManifestMonitor {
                    manifest: &manifest.relative,
                    product_name: request.product_name,
                    version: request.version,
                    org: request.org,
                },
            )
            .await?;
        }

        Ok(manifests)
    }
}
