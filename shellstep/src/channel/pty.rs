//! Pseudo-terminal settings requested from the remote side.

use serde::Deserialize;

/// Configuration for the remote pseudo-terminal.
///
/// Echo is off by default so a command's response does not start with the
/// command text itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PtyConfig {
    /// Terminal type (`TERM`).
    pub term: String,

    /// Terminal width in characters.
    pub columns: u32,

    /// Terminal height in rows.
    pub rows: u32,

    /// Whether the remote terminal echoes input back.
    pub echo: bool,

    /// Input line speed, in baud.
    pub input_speed: u32,

    /// Output line speed, in baud.
    pub output_speed: u32,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            term: "xterm".to_string(),
            columns: 80,
            rows: 40,
            echo: false,
            input_speed: 14_400,
            output_speed: 14_400,
        }
    }
}

impl PtyConfig {
    /// Set terminal dimensions.
    pub fn with_size(mut self, columns: u32, rows: u32) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }

    /// Turn remote echo on or off.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}
