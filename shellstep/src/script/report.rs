//! Transcript of an executed script.

use std::time::Duration;

use crate::channel::Response;

/// What happened during one step.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Position of the step in its script, starting at 0.
    pub index: usize,

    /// Human-readable step description (hidden input masked).
    pub description: String,

    /// Responses captured while running the step, in order.
    pub responses: Vec<Response>,

    /// Time taken for this step.
    pub elapsed: Duration,
}

impl StepRecord {
    /// Output of the step's last command, if it produced a response.
    pub fn output(&self) -> Option<&str> {
        self.responses.last().map(|r| r.output())
    }
}

/// Result of running a script to completion.
#[derive(Debug, Clone, Default)]
pub struct ScriptReport {
    /// One record per executed step.
    pub steps: Vec<StepRecord>,

    /// Total time for the whole script.
    pub elapsed: Duration,

    /// Whether an `Exit` step ended the remote session.
    pub session_closed: bool,
}

impl ScriptReport {
    /// Get the final output (from the last step that produced one).
    pub fn final_output(&self) -> Option<&str> {
        self.steps.iter().rev().find_map(|s| s.output())
    }

    /// Get all outputs concatenated, one per line.
    pub fn full_output(&self) -> String {
        self.steps
            .iter()
            .flat_map(|s| s.responses.iter())
            .map(|r| r.output())
            .filter(|o| !o.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, raws: &[&str]) -> StepRecord {
        StepRecord {
            index,
            description: format!("step {}", index),
            responses: raws
                .iter()
                .map(|raw| Response::new("cmd", *raw, Duration::from_millis(10)))
                .collect(),
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_final_output_skips_silent_steps() {
        let report = ScriptReport {
            steps: vec![record(0, &["one\r\n$ "]), record(1, &["two\r\n$ "]), record(2, &[])],
            elapsed: Duration::from_millis(30),
            session_closed: true,
        };
        assert_eq!(report.final_output(), Some("two"));
        assert_eq!(report.full_output(), "one\ntwo");
    }

    #[test]
    fn test_empty_report() {
        let report = ScriptReport::default();
        assert_eq!(report.final_output(), None);
        assert_eq!(report.full_output(), "");
        assert!(!report.session_closed);
    }
}
