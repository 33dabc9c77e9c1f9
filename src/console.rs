//! Interactive review of the project-to-tag mapping.
//!
//! ```text
//! Review --y--> Confirmed
//!        --e--> Edit --<index>--> Edit
//!                    --exit-----> Review
//!        --*--> Aborted
//! ```

use crate::error::{Result, ScannerError};
use crate::models::TagMapping;
use std::io::{BufRead, Write};
use tracing::debug;

/// What the operator decided about a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run with this (possibly edited) mapping
    Confirmed(TagMapping),
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Review,
    Edit,
}

/// Prompts the operator over any line-oriented input and output.
pub struct MappingConsole<R, W> {
    input: R,
    output: W,
    command_preview: String,
}

impl<R: BufRead, W: Write> MappingConsole<R, W> {
    /// `command_preview` is shown as the command that will run for each tag.
    pub fn new(input: R, output: W, command_preview: impl Into<String>) -> Self {
        Self {
            input,
            output,
            command_preview: command_preview.into(),
        }
    }

    /// Drive the review/edit loop until the operator confirms or aborts.
    ///
    /// End of input aborts.
    pub fn confirm(&mut self, mut mapping: TagMapping) -> Result<Decision> {
        let mut state = State::Review;

        loop {
            state = match state {
                State::Review => {
                    self.show_mapping(&mapping)?;
                    let Some(answer) = self.read_answer()? else {
                        return Ok(Decision::Aborted);
                    };
                    match answer.as_str() {
                        "y" => return Ok(Decision::Confirmed(mapping)),
                        "e" => State::Edit,
                        _ => return Ok(Decision::Aborted),
                    }
                }
                State::Edit => {
                    self.show_edit_list(&mapping)?;
                    let Some(answer) = self.read_answer()? else {
                        return Ok(Decision::Aborted);
                    };
                    if answer == "exit" {
                        State::Review
                    } else {
                        self.skip_entry(&mut mapping, &answer)?;
                        State::Edit
                    }
                }
            };
        }
    }

    fn show_mapping(&mut self, mapping: &TagMapping) -> Result<()> {
        let out = &mut self.output;
        writeln!(out)?;
        writeln!(out, "mapping generated:")?;
        for entry in mapping {
            writeln!(out, "[{}] -> {}", entry.project.name, entry.tag.name)?;
        }
        writeln!(out)?;
        writeln!(
            out,
            "We'll now automatically checkout each of the specified tags, and run the command `{}`",
            self.command_preview
        )?;
        writeln!(out)?;
        write!(
            out,
            "Are you happy with the mapping of Snyk projects to github tags and want to run the above command for each tag [y/n/e]? "
        )?;
        out.flush()?;
        Ok(())
    }

    fn show_edit_list(&mut self, mapping: &TagMapping) -> Result<()> {
        let out = &mut self.output;
        writeln!(out)?;
        for (i, entry) in mapping.iter().enumerate() {
            writeln!(out, "{}) scanning mapping [{}] -> {}", i, entry.project.name, entry.tag.name)?;
        }
        writeln!(out)?;
        write!(out, "enter the mapping id to skip, or type 'exit' if complete: ")?;
        out.flush()?;
        Ok(())
    }

    fn skip_entry(&mut self, mapping: &mut TagMapping, answer: &str) -> Result<()> {
        let removed = answer.parse::<usize>().ok().and_then(|i| mapping.remove(i));
        match removed {
            Some(entry) => debug!("skipping {} -> {}", entry.project.name, entry.tag.name),
            None => writeln!(
                self.output,
                "invalid mapping id '{}', expected a number between 0 and {}",
                answer,
                mapping.len().saturating_sub(1)
            )?,
        }
        Ok(())
    }

    /// Next trimmed line, or `None` at end of input.
    fn read_answer(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|e| ScannerError::Console(format!("failed to read answer: {}", e)))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RepositoryTag, ScannedProjectRecord};
    use std::io::Cursor;

    fn mapping() -> TagMapping {
        TagMapping::new(
            ["1.0", "1.1", "2.0"]
                .iter()
                .map(|v| {
                    (
                        ScannedProjectRecord::new(format!("widget@{}", v), format!("id-{}", v)),
                        RepositoryTag::new(format!("v{}", v), format!("sha-{}", v)),
                    )
                })
                .collect(),
        )
    }

    fn run(input: &str) -> (Decision, String) {
        let mut output = Vec::new();
        let decision = {
            let mut console = MappingConsole::new(
                Cursor::new(input.as_bytes().to_vec()),
                &mut output,
                "snyk monitor --org=acme --target-reference=<TAG_VERSION> --all-projects",
            );
            console.confirm(mapping()).unwrap()
        };
        (decision, String::from_utf8(output).unwrap())
    }

    fn tags(decision: &Decision) -> Vec<String> {
        match decision {
            Decision::Confirmed(m) => m.iter().map(|e| e.tag.name.clone()).collect(),
            Decision::Aborted => panic!("expected confirmation"),
        }
    }

    #[test]
    fn test_confirm_as_is() {
        let (decision, output) = run("y\n");
        assert_eq!(tags(&decision), vec!["v1.0", "v1.1", "v2.0"]);
        assert!(output.contains("mapping generated:"));
        assert!(output.contains("[widget@1.1] -> v1.1"));
        assert!(output.contains("--target-reference=<TAG_VERSION>"));
        assert!(output.contains("[y/n/e]? "));
    }

    #[test]
    fn test_anything_else_aborts() {
        assert_eq!(run("n\n").0, Decision::Aborted);
        assert_eq!(run("yes\n").0, Decision::Aborted);
        assert_eq!(run("").0, Decision::Aborted);
    }

    #[test]
    fn test_edit_skips_entry_then_confirms() {
        let (decision, output) = run("e\n1\nexit\ny\n");
        assert_eq!(tags(&decision), vec!["v1.0", "v2.0"]);
        assert!(output.contains("1) scanning mapping [widget@1.1] -> v1.1"));
        // The edit list is redisplayed with the shifted indices.
        assert!(output.contains("1) scanning mapping [widget@2.0] -> v2.0"));
    }

    #[test]
    fn test_invalid_index_reprompts() {
        let (decision, output) = run("e\n7\nabc\n0\nexit\ny\n");
        assert_eq!(tags(&decision), vec!["v1.1", "v2.0"]);
        assert!(output.contains("invalid mapping id '7'"));
        assert!(output.contains("invalid mapping id 'abc'"));
    }

    #[test]
    fn test_end_of_input_while_editing_aborts() {
        assert_eq!(run("e\n0\n").0, Decision::Aborted);
    }
}
