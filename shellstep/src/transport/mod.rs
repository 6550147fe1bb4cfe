//! SSH transport layer wrapping russh.
//!
//! Connection setup, authentication and the [`RemoteShell`] session
//! contract consumed by the script runner.

pub mod config;
mod shell;
mod ssh;

pub use config::{AuthMethod, SshConfig};
pub use shell::RemoteShell;
pub use ssh::{SshShell, SshTransport};
