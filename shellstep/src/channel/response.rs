//! Response type for a single command round-trip.

use std::time::Duration;

use super::sanitize::strip_ansi;

/// Everything the shell printed in answer to one command.
#[derive(Debug, Clone)]
pub struct Response {
    /// The command that was executed (masked if it was hidden).
    pub command: String,

    /// The raw captured text, trailing prompt included.
    pub raw: String,

    /// Time between sending the command and detecting its boundary.
    pub elapsed: Duration,
}

impl Response {
    /// Create a new response.
    pub fn new(command: impl Into<String>, raw: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            command: command.into(),
            raw: raw.into(),
            elapsed,
        }
    }

    /// The raw captured text.
    pub fn text(&self) -> &str {
        &self.raw
    }

    /// The output with the trailing prompt line removed.
    ///
    /// A response that is nothing but a prompt (a password prompt, say)
    /// has empty output.
    pub fn output(&self) -> &str {
        match memchr::memrchr(b'\n', self.raw.as_bytes()) {
            Some(pos) => self.raw[..pos].trim_end_matches('\r'),
            None => "",
        }
    }

    /// The prompt line that terminated this response.
    pub fn prompt(&self) -> &str {
        match memchr::memrchr(b'\n', self.raw.as_bytes()) {
            Some(pos) => &self.raw[pos + 1..],
            None => &self.raw,
        }
    }

    /// The output with ANSI escape sequences stripped.
    pub fn clean(&self) -> String {
        strip_ansi(self.output().as_bytes())
    }

    /// Get the output lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output().lines()
    }

    /// Check if the output contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.output().contains(pattern)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.output())
    }
}
