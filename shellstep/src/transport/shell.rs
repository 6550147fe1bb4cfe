//! The session contract the script runner drives.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::channel::PtyConfig;
use crate::error::Result;

/// One remote session able to host an interactive program on a PTY.
///
/// Implemented by [`SshShell`](super::SshShell) for real connections and by
/// in-memory fakes in tests. Calls happen in this order: `request_pty`,
/// `start`, `into_pipes`.
pub trait RemoteShell: Send + Sized {
    /// Bytes the remote terminal prints.
    type Reader: AsyncRead + Unpin + Send + 'static;

    /// Bytes typed into the remote terminal.
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Allocate a pseudo-terminal for the session.
    fn request_pty(&mut self, pty: &PtyConfig) -> impl Future<Output = Result<()>> + Send;

    /// Start `program` on the pseudo-terminal.
    fn start(&mut self, program: &str) -> impl Future<Output = Result<()>> + Send;

    /// Hand over the terminal's byte pipes.
    fn into_pipes(self) -> Result<(Self::Reader, Self::Writer)>;
}
