//! Wrapper around the `snyk` command line tool.

use crate::error::{Result, ScannerError};
use crate::orchestrator::{ScanRequest, ScanService};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs `snyk monitor` as a subprocess.
///
/// The subprocess inherits stdio so Snyk's own progress and any
/// authentication prompts reach the operator.
#[derive(Clone)]
pub struct SnykCli {
    program: String,
    base_args: Vec<String>,
    token: Option<String>,
    excluded_manifests: Vec<String>,
    extra_args: Vec<String>,
}

/// Parameters for monitoring a single manifest of the current tree.
#[derive(Debug, Clone)]
pub struct ManifestMonitor<'a> {
    /// Manifest path relative to the scanned directory
    pub manifest: &'a str,
    pub product_name: &'a str,
    pub version: &'a str,
    pub org: &'a str,
}

impl SnykCli {
    /// Create a wrapper for a command such as `snyk` or `npx snyk`.
    pub fn new(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ScannerError::Config("the Snyk command must not be empty".into()))?;

        Ok(Self {
            program,
            base_args: parts.collect(),
            token: None,
            excluded_manifests: Vec::new(),
            extra_args: Vec::new(),
        })
    }

    /// Token passed to the subprocess as `SNYK_TOKEN`.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Manifest files excluded from `--all-projects` scans.
    pub fn with_excluded_manifests(mut self, manifests: Vec<String>) -> Self {
        self.excluded_manifests = manifests;
        self
    }

    /// Arguments appended to every invocation.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Fail early when the stock `snyk` binary is not on `PATH`.
    ///
    /// Custom commands (`npx snyk`) are trusted as given.
    pub fn ensure_available(&self) -> Result<()> {
        if self.program == "snyk" && self.base_args.is_empty() {
            let path = which::which("snyk")
                .map_err(|e| ScannerError::SnykCli(format!("snyk CLI not found on PATH: {}", e)))?;
            debug!("found snyk cli at {}", path.display());
        } else {
            debug!("using snyk command '{}'", self.command_line(&[]));
        }
        Ok(())
    }

    /// Arguments for monitoring every project in a historical checkout.
    pub fn all_projects_args(&self, request: &ScanRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "monitor".to_string(),
            format!("--org={}", request.org),
            format!("--target-reference={}", request.target_reference),
            "--all-projects".to_string(),
        ];
        if !self.excluded_manifests.is_empty() {
            args.push(format!("--exclude={}", self.excluded_manifests.join(",")));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Arguments for monitoring one manifest of the current tree.
    pub fn manifest_args(&self, monitor: &ManifestMonitor<'_>) -> Vec<String> {
        let mut args = vec![
            "monitor".to_string(),
            format!("--file={}", monitor.manifest),
            format!("--project-name={}@{}", monitor.manifest, monitor.version),
            format!("--remote-repo-url={}@{}", monitor.product_name, monitor.version),
            format!("--org={}", monitor.org),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Monitor a single manifest, running from `dir`.
    pub async fn monitor_manifest(&self, dir: &Path, monitor: &ManifestMonitor<'_>) -> Result<()> {
        let args = self.manifest_args(monitor);
        self.run(dir, &args).await
    }

    /// The full command line, for logs. Never includes the token.
    pub fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.base_args.iter().map(String::as_str))
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn run(&self, dir: &Path, args: &[String]) -> Result<()> {
        info!("running '{}' in {}", self.command_line(args), dir.display());

        let mut command = Command::new(&self.program);
        command.args(&self.base_args).args(args).current_dir(dir);
        if let Some(ref token) = self.token {
            command.env("SNYK_TOKEN", token);
        }

        let status = command
            .status()
            .await
            .map_err(|e| ScannerError::SnykCli(format!("failed to run {}: {}", self.program, e)))?;

        if !status.success() {
            return Err(ScannerError::SnykCli(format!(
                "failed to run snyk monitor: {}",
                status
            )));
        }

        debug!("finished running snyk");
        Ok(())
    }
}

#[async_trait]
impl ScanService for SnykCli {
    async fn scan(&self, dir: &Path, request: &ScanRequest<'_>) -> Result<()> {
        info!(
            product = request.product_name,
            tag = request.target_reference,
            "monitoring checkout with snyk"
        );
        let args = self.all_projects_args(request);
        self.run(dir, &args).await
    }
}

impl std::fmt::Debug for SnykCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnykCli")
            .field("command", &self.command_line(&[]))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_request() -> ScanRequest<'static> {
        ScanRequest {
            org: "acme",
            target_reference: "v1.2.3",
            product_name: "widget",
        }
    }

    #[test]
    fn test_command_split() {
        let cli = SnykCli::new("npx snyk").unwrap();
        assert_eq!(cli.program, "npx");
        assert_eq!(cli.base_args, vec!["snyk"]);
        assert!(matches!(SnykCli::new("   "), Err(ScannerError::Config(_))));
    }

    #[test]
    fn test_all_projects_args() {
        let cli = SnykCli::new("snyk")
            .unwrap()
            .with_excluded_manifests(vec!["paket.lock".into(), "requirements.txt".into()])
            .with_extra_args(vec!["--debug".into()]);

        assert_eq!(
            cli.all_projects_args(&scan_request()),
            vec![
                "monitor",
                "--org=acme",
                "--target-reference=v1.2.3",
                "--all-projects",
                "--exclude=paket.lock,requirements.txt",
                "--debug",
            ]
        );
    }

    #[test]
    fn test_manifest_args() {
        let cli = SnykCli::new("snyk").unwrap();
        let args = cli.manifest_args(&ManifestMonitor {
            manifest: "web/yarn.lock",
            product_name: "widget",
            version: "3.1",
            org: "acme",
        });

        assert_eq!(
            args,
            vec![
                "monitor",
                "--file=web/yarn.lock",
                "--project-name=web/yarn.lock@3.1",
                "--remote-repo-url=widget@3.1",
                "--org=acme",
            ]
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let cli = SnykCli::new("snyk").unwrap().with_token("secret-token");
        let debug = format!("{:?}", cli);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        let ok = SnykCli::new("true").unwrap();
        assert!(ok.scan(dir.path(), &scan_request()).await.is_ok());

        let failing = SnykCli::new("false").unwrap();
        let err = failing.scan(dir.path(), &scan_request()).await.unwrap_err();
        assert!(matches!(err, ScannerError::SnykCli(_)));
    }
}
