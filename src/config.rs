//! Configuration management for the history scanner.

use crate::error::{Result, ScannerError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the history scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Snyk configuration
    #[serde(default)]
    pub snyk: SnykConfig,

    /// GitHub configuration
    #[serde(default)]
    pub github: GitHubConfig,

    /// Historical scan pipeline configuration
    #[serde(default)]
    pub scan: ScanConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Snyk API and CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnykConfig {
    /// Snyk API token
    pub token: Option<String>,

    /// Snyk v1 API base URL
    #[serde(default = "default_snyk_api_url")]
    pub api_url: String,

    /// Command used to run the Snyk CLI, e.g. `npx snyk`
    #[serde(default = "default_snyk_command")]
    pub command: String,

    /// Manifest files excluded from `--all-projects` monitoring
    #[serde(default = "default_excluded_manifests")]
    pub excluded_manifests: Vec<String>,

    /// Extra arguments appended to every `snyk monitor` invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// GitHub API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// Username the token belongs to, used for HTTPS clones
    pub username: Option<String>,

    /// GitHub API base URL (for GitHub Enterprise)
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Page size when listing tags
    #[serde(default = "default_tags_per_page")]
    pub tags_per_page: u8,
}

/// Historical scan pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Parent directory for the temporary workspace (system temp if unset)
    pub temp_dir: Option<PathBuf>,

    /// Initial clone depth (0 = full clone)
    #[serde(default = "default_clone_depth")]
    pub clone_depth: u32,

    /// Refspecs fetched before each checkout so tagged commits resolve
    #[serde(default = "default_fetch_refspecs")]
    pub fetch_refspecs: Vec<String>,

    /// Restore dependencies (mvn, dotnet, npm/yarn) before each scan
    #[serde(default = "default_true")]
    pub prebuild: bool,
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Summary format
    #[serde(default)]
    pub format: OutputFormat,

    /// Write the summary to this file instead of stdout
    pub output_path: Option<PathBuf>,
}

/// Output format enumeration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

// Default value functions
fn default_snyk_api_url() -> String {
    "https://snyk.io/api/v1".to_string()
}

fn default_snyk_command() -> String {
    "snyk".to_string()
}

fn default_excluded_manifests() -> Vec<String> {
    // paket and python manifests are not part of the products we monitor
    vec![
        "paket.dependencies".to_string(),
        "paket.lock".to_string(),
        "requirements.txt".to_string(),
    ]
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_tags_per_page() -> u8 {
    100
}

fn default_clone_depth() -> u32 {
    1
}

fn default_fetch_refspecs() -> Vec<String> {
    vec![
        "+refs/tags/*:refs/tags/*".to_string(),
        "+refs/pull/*:refs/remotes/origin/pull/*".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

impl Default for SnykConfig {
    fn default() -> Self {
        Self {
            token: std::env::var("SNYK_TOKEN").ok(),
            api_url: default_snyk_api_url(),
            command: default_snyk_command(),
            excluded_manifests: default_excluded_manifests(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: std::env::var("GITHUB_TOKEN").ok(),
            username: None,
            api_url: default_github_api_url(),
            tags_per_page: default_tags_per_page(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            clone_depth: default_clone_depth(),
            fetch_refspecs: default_fetch_refspecs(),
            prebuild: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Create a configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Snyk token, or a configuration error naming the missing input.
    pub fn snyk_token(&self) -> Result<&str> {
        self.snyk
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ScannerError::Config("a Snyk token is required (--snyk-token or SNYK_TOKEN)".into()))
    }

    /// GitHub username and token used for authenticated clones.
    pub fn github_credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .github
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ScannerError::Config("a GitHub token is required (--github-token or GITHUB_TOKEN)".into())
            })?;
        let username = self
            .github
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ScannerError::Config("a GitHub username is required (--github-username)".into()))?;
        Ok((username, token))
    }
}

/// Builder for creating configurations programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn snyk_token(mut self, token: impl Into<String>) -> Self {
        self.config.snyk.token = Some(token.into());
        self
    }

    pub fn snyk_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.snyk.api_url = url.into();
        self
    }

    pub fn snyk_command(mut self, command: impl Into<String>) -> Self {
        self.config.snyk.command = command.into();
        self
    }

    pub fn github_token(mut self, token: impl Into<String>) -> Self {
        self.config.github.token = Some(token.into());
        self
    }

    pub fn github_username(mut self, username: impl Into<String>) -> Self {
        self.config.github.username = Some(username.into());
        self
    }

    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.config.scan.temp_dir = Some(path);
        self
    }

    pub fn clone_depth(mut self, depth: u32) -> Self {
        self.config.scan.clone_depth = depth;
        self
    }

    pub fn prebuild(mut self, enable: bool) -> Self {
        self.config.scan.prebuild = enable;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output.format = format;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
