//! Commands and the lockstep command channel.

use std::fmt;
use std::time::Instant;

use log::debug;

use super::multiplexer::PtyMultiplexer;
use super::response::Response;
use crate::error::{Result, ScriptError};

/// Command used to read the previous command's exit status.
pub const EXIT_STATUS_COMMAND: &str = "echo $?";

const MASK: &str = "********";

/// One line of shell text to execute.
///
/// Hidden commands (passwords typed at a prompt) are executed verbatim but
/// never shown in logs or transcripts.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    hidden: bool,
}

impl Command {
    /// Create a visible command.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hidden: false,
        }
    }

    /// Create a command whose text must not be logged.
    pub fn hidden(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hidden: true,
        }
    }

    /// The text sent to the shell.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// The text as it may appear in logs.
    pub fn display_text(&self) -> &str {
        if self.hidden { MASK } else { &self.text }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Command").field(&self.display_text()).finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_text())
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Parse the first character of an `echo $?` response as an exit status.
///
/// Only a single decimal digit is recognized; anything else is `None`.
pub fn parse_exit_status(response: &str) -> Option<u32> {
    response.chars().next().and_then(|c| c.to_digit(10))
}

/// Execute / check / validate over one multiplexed remote shell.
pub struct CommandChannel {
    mux: PtyMultiplexer,
}

impl CommandChannel {
    /// Wrap a multiplexer whose startup banner has already been consumed.
    pub fn new(mux: PtyMultiplexer) -> Self {
        Self { mux }
    }

    /// Send a command and wait for its response.
    pub async fn execute(&mut self, command: &Command) -> Result<Response> {
        let start = Instant::now();
        self.mux.send(command.text()).await?;
        debug!("executed: {}", command);

        let raw = self.mux.receive().await?;
        Ok(Response::new(command.display_text(), raw, start.elapsed()))
    }

    /// Exit status of the previous command, if it could be parsed.
    pub async fn exit_status(&mut self) -> Result<Option<u32>> {
        let response = self.execute(&Command::new(EXIT_STATUS_COMMAND)).await?;
        Ok(parse_exit_status(response.text()))
    }

    /// Whether the previous command exited with status 0.
    pub async fn is_success(&mut self) -> Result<bool> {
        Ok(self.exit_status().await? == Some(0))
    }

    /// Fail unless the previous command exited with status 0.
    pub async fn valid(&mut self) -> Result<()> {
        let response = self.execute(&Command::new(EXIT_STATUS_COMMAND)).await?;
        match parse_exit_status(response.text()) {
            Some(0) => Ok(()),
            _ => Err(ScriptError::ValidationFailed {
                status: response.output().to_string(),
            }
            .into()),
        }
    }

    /// Wait for the remote program to close the terminal.
    pub async fn wait(&mut self) {
        self.mux.wait().await;
    }
}
