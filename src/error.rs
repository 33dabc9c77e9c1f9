//! Error types for the history scanner.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the history scanner.
///
/// Every variant here is fatal to the operation that raised it. Failures
/// scoped to a single tag are carried as [`PhaseError`] values instead.
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error("Snyk API error: {0}")]
    SnykApi(String),

    #[error("Snyk CLI error: {0}")]
    SnykCli(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("workspace phase failed: {0}")]
    Workspace(String),

    #[error("clone phase failed: {0}")]
    Clone(String),

    #[error("Prebuild failed: {0}")]
    Prebuild(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Console error: {0}")]
    Console(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, ScannerError>;

impl From<octocrab::Error> for ScannerError {
    fn from(err: octocrab::Error) -> Self {
        ScannerError::GitHub(err.to_string())
    }
}

/// Pipeline phase a per-tag error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Checkout,
    Prebuild,
    Scan,
    Clean,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Checkout => write!(f, "checkout"),
            Phase::Prebuild => write!(f, "prebuild"),
            Phase::Scan => write!(f, "scan"),
            Phase::Clean => write!(f, "clean"),
        }
    }
}

/// A recoverable failure recorded against one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseError {
    pub phase: Phase,
    pub message: String,
}

impl PhaseError {
    pub fn new(phase: Phase, err: impl std::fmt::Display) -> Self {
        Self {
            phase,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for PhaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.phase, self.message)
    }
}
