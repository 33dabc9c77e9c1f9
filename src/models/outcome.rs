//! Per-tag outcomes and the run report.

use crate::error::PhaseError;
use serde::{Deserialize, Serialize};

/// Result of driving one tag through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "errors", rename_all = "lowercase")]
pub enum PipelineOutcome {
    Success,
    Failed(Vec<PhaseError>),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success)
    }
}

/// Outcome for one tag, keyed by the project it was mapped from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagReport {
    /// Snyk project name
    pub project: String,

    /// Tag that was scanned
    pub tag: String,

    /// Outcome of the pipeline for this tag
    pub outcome: PipelineOutcome,

    /// Non-fatal problems that did not fail the tag (prebuild steps)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PhaseError>,
}

impl TagReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Aggregated result of a historical scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Product being scanned
    pub product: String,

    /// Snyk organization the scans were sent to
    pub org: String,

    /// Per-tag outcomes in processing order
    pub tags: Vec<TagReport>,

    /// Whether the run was stopped before every tag was processed
    pub aborted: bool,

    /// Run start time
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Run end time
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

impl RunReport {
    /// Create an empty report.
    pub fn new(product: impl Into<String>, org: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            product: product.into(),
            org: org.into(),
            tags: Vec::new(),
            aborted: false,
            started_at: now,
            completed_at: now,
        }
    }

    pub fn push(&mut self, report: TagReport) {
        self.tags.push(report);
    }

    pub fn succeeded(&self) -> usize {
        self.tags.iter().filter(|t| t.is_success()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TagReport> {
        self.tags.iter().filter(|t| !t.is_success())
    }

    /// True when every tag was processed and none failed.
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.tags.iter().all(TagReport::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Phase;

    fn tag_report(tag: &str, outcome: PipelineOutcome) -> TagReport {
        TagReport {
            project: format!("widget@{}", tag),
            tag: tag.to_string(),
            outcome,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_run_report_counts() {
        let mut report = RunReport::new("widget", "acme");
        report.push(tag_report("1.0", PipelineOutcome::Success));
        report.push(tag_report(
            "1.1",
            PipelineOutcome::Failed(vec![PhaseError::new(Phase::Scan, "exit status: 2")]),
        ));

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed().count(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(PipelineOutcome::Success).unwrap();
        assert_eq!(json["status"], "success");

        let failed = PipelineOutcome::Failed(vec![PhaseError::new(Phase::Clean, "busy")]);
        let json = serde_json::to_value(failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["errors"][0]["phase"], "clean");
    }
}
