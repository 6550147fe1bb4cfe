//! # Shellstep
//!
//! Drive a remote interactive shell over SSH as a lockstep
//! command/response channel, and run ordered scripts on it.
//!
//! Shellstep allocates a pseudo-terminal on the remote host, starts a shell
//! on it and pairs every command written with the output the shell prints
//! before its next prompt. Scripts chain such commands with exit status
//! checkpoints and stop at the first failure.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Prompt-boundary framing of terminal output (`"$ "` and `": "`)
//! - At most one command in flight, enforced by the multiplexer
//! - `su` with password prompts, exit status validation, masked secrets
//! - Ready-made recipes for recurring deployment chores
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shellstep::ClientBuilder;
//! use shellstep::script::Script;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), shellstep::Error> {
//!     let mut client = ClientBuilder::new("192.168.1.1")
//!         .username("deploy")
//!         .password("secret")
//!         .build()?;
//!
//!     client.connect().await?;
//!
//!     let report = client
//!         .run_script(
//!             &|dir: &str| Script::new().run(format!("ls {}", dir)).validate().exit(),
//!             "/var/log",
//!         )
//!         .await?;
//!     println!("{}", report.full_output());
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Prompt heuristic
//!
//! A response is complete when the second-to-last byte received is `$` or
//! `:`. Shells whose prompts end differently (`# `, `> `) never produce a
//! boundary, and output that happens to contain `"$ "` or `": "` at a read
//! boundary is split early.

pub mod channel;
pub mod client;
pub mod error;
pub mod recipes;
pub mod script;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use channel::{Command, CommandChannel, PtyMultiplexer, Response};
pub use client::{Client, ClientBuilder};
pub use error::Error;
pub use script::{Script, ScriptBuilder, ScriptReport, ScriptRunner, Step};
pub use transport::{AuthMethod, RemoteShell, SshConfig};
