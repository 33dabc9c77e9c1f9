//! Human-readable text reporter.

use super::Reporter;
use crate::models::{PipelineOutcome, RunReport};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";

/// Text format reporter for terminal output.
pub struct TextReporter {
    /// Use colors in output
    use_colors: bool,
}

impl TextReporter {
    /// Create a new text reporter.
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    /// Disable colors.
    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    fn color(&self, code: &'static str) -> &'static str {
        if self.use_colors {
            code
        } else {
            ""
        }
    }

    fn reset(&self) -> &'static str {
        self.color("\x1b[0m")
    }

    fn bold(&self) -> &'static str {
        self.color("\x1b[1m")
    }

    fn dim(&self) -> &'static str {
        self.color("\x1b[2m")
    }
}

impl Default for TextReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TextReporter {
    fn generate(&self, report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{}=== Historical Scan Report ==={}\n\n",
            self.bold(),
            self.reset()
        ));
        output.push_str(&format!("{}Product:{} {}\n", self.bold(), self.reset(), report.product));
        output.push_str(&format!("{}Snyk Org:{} {}\n", self.bold(), self.reset(), report.org));
        output.push_str(&format!(
            "{}Run Time:{} {} - {}\n\n",
            self.bold(),
            self.reset(),
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            report.completed_at.format("%H:%M:%S UTC")
        ));

        if report.tags.is_empty() {
            output.push_str(&format!("{}No tags were scanned.{}\n", self.dim(), self.reset()));
        }

        for tag in &report.tags {
            match &tag.outcome {
                PipelineOutcome::Success => output.push_str(&format!(
                    "{}OK{}     {} ({})\n",
                    self.color(GREEN),
                    self.reset(),
                    tag.tag,
                    tag.project
                )),
                PipelineOutcome::Failed(errors) => {
                    output.push_str(&format!(
                        "{}FAILED{} {} ({})\n",
                        self.color(RED),
                        self.reset(),
                        tag.tag,
                        tag.project
                    ));
                    for error in errors {
                        output.push_str(&format!("  {}{}{}\n", self.dim(), error, self.reset()));
                    }
                }
            }
            for warning in &tag.warnings {
                output.push_str(&format!(
                    "  {}warning:{} {}\n",
                    self.color(YELLOW),
                    self.reset(),
                    warning
                ));
            }
        }

        let failed: Vec<&str> = report.failed().map(|t| t.tag.as_str()).collect();

        output.push_str(&format!("\n{}--- Summary ---{}\n", self.bold(), self.reset()));
        output.push_str(&format!("Tags scanned: {}\n", report.tags.len()));
        output.push_str(&format!("Succeeded: {}\n", report.succeeded()));
        output.push_str(&format!("Failed: {}\n", failed.len()));

        if report.aborted {
            output.push_str(&format!(
                "\n{}Run aborted before every tag was processed.{}\n",
                self.color(YELLOW),
                self.reset()
            ));
        }

        if !failed.is_empty() {
            output.push_str(&format!(
                "\n{}Re-run or add these tags manually:{} {}\n",
                self.color(RED),
                self.reset(),
                failed.join(", ")
            ));
        } else if !report.aborted {
            output.push_str(&format!(
                "\n{}All tags scanned successfully.{}\n",
                self.color(GREEN),
                self.reset()
            ));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Phase, PhaseError};
    use crate::models::TagReport;

    fn tag(tag: &str, outcome: PipelineOutcome) -> TagReport {
        TagReport {
            project: format!("widget@{}", tag),
            tag: tag.to_string(),
            outcome,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_text_report_lists_failures() {
        let mut report = RunReport::new("widget", "acme");
        report.push(tag("1.0", PipelineOutcome::Success));
        let mut failing = tag(
            "1.1",
            PipelineOutcome::Failed(vec![PhaseError::new(Phase::Scan, "exit status: 2")]),
        );
        failing.warnings.push(PhaseError::new(Phase::Prebuild, "npm: install failed"));
        report.push(failing);

        let text = TextReporter::new().without_colors().generate(&report);

        assert!(text.contains("OK     1.0 (widget@1.0)"));
        assert!(text.contains("FAILED 1.1 (widget@1.1)"));
        assert!(text.contains("  scan failed: exit status: 2"));
        assert!(text.contains("warning: prebuild failed: npm: install failed"));
        assert!(text.contains("Succeeded: 1"));
        assert!(text.contains("Re-run or add these tags manually: 1.1"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_text_report_all_succeeded() {
        let mut report = RunReport::new("widget", "acme");
        report.push(tag("1.0", PipelineOutcome::Success));

        let text = TextReporter::new().without_colors().generate(&report);
        assert!(text.contains("All tags scanned successfully."));
    }

    #[test]
    fn test_text_report_aborted() {
        let mut report = RunReport::new("widget", "acme");
        report.aborted = true;

        let text = TextReporter::new().without_colors().generate(&report);
        assert!(text.contains("No tags were scanned."));
        assert!(text.contains("Run aborted"));
        assert!(!text.contains("All tags scanned successfully."));
    }
}
