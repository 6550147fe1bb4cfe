//! Error types for shellstep.

use std::io;
use thiserror::Error;

/// Main error type for shellstep operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Multiplexer and command channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Script execution errors
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// No connection established - call connect() first
    #[error("Not connected - call connect() first")]
    NotConnected,

    /// connect() called on an open connection
    #[error("Already connected")]
    AlreadyConnected,

    /// Connect did not finish in time
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Channel layer errors (PTY setup, multiplexer, boundary detection).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The remote side refused the pseudo-terminal
    #[error("Failed to allocate pseudo-terminal")]
    PtyRequestFailed,

    /// The remote program could not be started
    #[error("Failed to start remote program '{program}'")]
    ProgramStartFailed { program: String },

    /// The inbound stream ended; no further commands can be exchanged
    #[error("Channel closed")]
    Closed,

    /// A response outgrew the buffer without a prompt boundary
    #[error("No prompt boundary within {capacity} bytes of output")]
    BufferExhausted { capacity: usize },

    /// Writing a command to the remote terminal failed
    #[error("Failed to write command: {0}")]
    WriteFailed(#[source] io::Error),
}

/// Script execution errors.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// A validation checkpoint observed a failing exit status
    #[error("Validation failed: exit status {status:?}")]
    ValidationFailed { status: String },

    /// The remote shell went away before a non-exit step completed
    #[error("Session ended during step {step}")]
    SessionEnded { step: usize },
}

/// Configuration errors, raised once when a builder is finalized.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required field was never set
    #[error("Missing required field '{field}'")]
    Missing { field: &'static str },

    /// A field was set to an unusable value
    #[error("Invalid value for '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Result type alias using shellstep's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error means the remote stream has ended.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::Closed))
    }
}
