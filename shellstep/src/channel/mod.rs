//! Channel layer: turning a remote terminal into a command/response channel.
//!
//! Bytes from the terminal are split into responses by the prompt-boundary
//! heuristic in [`BoundaryBuffer`], multiplexed by [`PtyMultiplexer`], and
//! exposed as execute/validate operations by [`CommandChannel`].

mod buffer;
mod command;
mod multiplexer;
mod pty;
mod response;
mod sanitize;

pub use buffer::{BoundaryBuffer, DEFAULT_CAPACITY, OverflowPolicy};
pub use command::{Command, CommandChannel, EXIT_STATUS_COMMAND, parse_exit_status};
pub use multiplexer::{MultiplexerConfig, PtyMultiplexer};
pub use pty::PtyConfig;
pub use response::Response;
pub use sanitize::strip_ansi;
