//! Pseudo-terminal multiplexer.
//!
//! Turns the byte pipes of an interactive remote shell into a lockstep
//! command/response facility. Two tasks live for as long as the multiplexer:
//!
//! - the **writer** drains the command queue and writes each command to the
//!   outbound pipe, but only once the shell has answered the previous one;
//! - the **reader** accumulates inbound bytes in a [`BoundaryBuffer`] and
//!   pushes every complete response onto the response queue.
//!
//! The two are tied together by a semaphore that the reader credits once per
//! detected boundary and the writer debits once per command. The shell's own
//! startup prompt is the first boundary owed, so no command is written before
//! the banner has been seen. At most one command is ever in flight.

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, trace, warn};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::buffer::{BoundaryBuffer, DEFAULT_CAPACITY, OverflowPolicy};
use crate::error::{ChannelError, Result};

/// Upper bound for a single read from the inbound pipe.
const READ_CHUNK: usize = 4096;

/// Configuration for the multiplexer's response buffer.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MultiplexerConfig {
    /// Largest response, prompt included, that can be captured.
    pub capacity: usize,

    /// Behavior when a response outgrows `capacity`.
    pub overflow: OverflowPolicy,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            overflow: OverflowPolicy::default(),
        }
    }
}

/// A command line waiting for the writer, with the sender's acknowledgement.
struct Outbound {
    line: Vec<u8>,
    written: oneshot::Sender<std::result::Result<(), ChannelError>>,
}

type Inbound = std::result::Result<Bytes, ChannelError>;

/// Lockstep command/response view over a remote terminal.
///
/// Created once per session; dropping it stops both worker tasks.
pub struct PtyMultiplexer {
    commands: Option<mpsc::Sender<Outbound>>,
    responses: mpsc::Receiver<Inbound>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl PtyMultiplexer {
    /// Wire up the terminal's inbound `source` and outbound `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R, W>(source: R, sink: W, config: MultiplexerConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(1);
        let (response_tx, response_rx) = mpsc::channel(1);
        let idle = Arc::new(Semaphore::new(0));

        let buffer = BoundaryBuffer::new(config.capacity, config.overflow);
        let writer = tokio::spawn(write_loop(sink, command_rx, idle.clone()));
        let reader = tokio::spawn(read_loop(source, response_tx, idle, buffer));

        Self {
            commands: Some(command_tx),
            responses: response_rx,
            writer: Some(writer),
            reader: Some(reader),
        }
    }

    /// Send one line of shell text; a newline is appended.
    ///
    /// Returns once the line has been written to the terminal, which only
    /// happens after the previous command's boundary was detected.
    pub async fn send(&self, text: &str) -> Result<()> {
        let commands = self.commands.as_ref().ok_or(ChannelError::Closed)?;

        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');

        let (written, ack) = oneshot::channel();
        commands
            .send(Outbound { line, written })
            .await
            .map_err(|_| ChannelError::Closed)?;

        ack.await.map_err(|_| ChannelError::Closed)??;
        Ok(())
    }

    /// Wait for the next complete response.
    ///
    /// The returned text is everything read since the previous boundary,
    /// including the prompt that terminated it.
    ///
    /// Each response is decoded on its own. A multibyte character split
    /// across a boundary, or across a discarded overflow, comes out as
    /// U+FFFD on both sides.
    pub async fn receive(&mut self) -> Result<String> {
        match self.responses.recv().await {
            Some(Ok(data)) => Ok(String::from_utf8_lossy(&data).into_owned()),
            Some(Err(e)) => Err(e.into()),
            None => Err(ChannelError::Closed.into()),
        }
    }

    /// Stop accepting commands and wait for the remote program to end its
    /// output stream.
    ///
    /// Blocks for as long as the remote program keeps the terminal open.
    pub async fn wait(&mut self) {
        self.commands.take();

        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!("reader task ended abnormally: {}", e);
            }
        }
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                warn!("writer task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PtyMultiplexer {
    fn drop(&mut self) {
        for task in [self.writer.take(), self.reader.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

async fn write_loop<W>(mut sink: W, mut commands: mpsc::Receiver<Outbound>, idle: Arc<Semaphore>)
where
    W: AsyncWrite + Unpin,
{
    loop {
        // The first permit is the shell's startup prompt, every later one
        // the answer to the command written in the previous iteration.
        match idle.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => {
                debug!("writer: stream closed");
                break;
            }
        }

        let Some(Outbound { line, written }) = commands.recv().await else {
            debug!("writer: command queue closed");
            break;
        };

        if idle.is_closed() {
            let _ = written.send(Err(ChannelError::Closed));
            break;
        }

        trace!("writer: {} bytes", line.len());
        let result = match sink.write_all(&line).await {
            Ok(()) => sink.flush().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                let _ = written.send(Ok(()));
            }
            Err(e) => {
                warn!("writer: write failed: {}", e);
                let _ = written.send(Err(ChannelError::WriteFailed(e)));
                break;
            }
        }
    }
}

async fn read_loop<R>(
    mut source: R,
    responses: mpsc::Sender<Inbound>,
    idle: Arc<Semaphore>,
    mut buffer: BoundaryBuffer,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        if buffer.is_full() {
            match buffer.policy() {
                OverflowPolicy::Discard => {
                    warn!(
                        "reader: {} bytes without a prompt boundary, discarding",
                        buffer.len()
                    );
                    buffer.clear();
                }
                OverflowPolicy::Fail => {
                    warn!("reader: {} bytes without a prompt boundary", buffer.len());
                    let _ = responses
                        .send(Err(ChannelError::BufferExhausted {
                            capacity: buffer.capacity(),
                        }))
                        .await;
                    break;
                }
            }
        }

        let room = buffer.remaining().min(chunk.len());
        let n = match source.read(&mut chunk[..room]).await {
            Ok(0) => {
                debug!("reader: EOF");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("reader: {}", e);
                break;
            }
        };

        buffer.extend(&chunk[..n]);
        trace!("reader: {} bytes, buffered {}", n, buffer.len());

        if buffer.at_boundary() {
            let response = buffer.take();
            debug!("reader: boundary after {} bytes", response.len());
            if responses.send(Ok(response)).await.is_err() {
                debug!("reader: response queue closed");
                break;
            }
            idle.add_permits(1);
        }
    }

    idle.close();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, ReadHalf, WriteHalf, duplex, split};
    use tokio::time::timeout;

    use super::*;

    const SHORT: Duration = Duration::from_millis(50);

    struct Remote {
        input: BufReader<ReadHalf<DuplexStream>>,
        output: WriteHalf<DuplexStream>,
    }

    impl Remote {
        async fn write(&mut self, data: &str) {
            self.output.write_all(data.as_bytes()).await.unwrap();
        }

        async fn read_line(&mut self) -> String {
            let mut line = String::new();
            self.input.read_line(&mut line).await.unwrap();
            line
        }
    }

    fn pair(config: MultiplexerConfig) -> (PtyMultiplexer, Remote) {
        let (local, remote) = duplex(4096);
        let (source, sink) = split(local);
        let (input, output) = split(remote);
        let mux = PtyMultiplexer::new(source, sink, config);
        (
            mux,
            Remote {
                input: BufReader::new(input),
                output,
            },
        )
    }

    fn small(capacity: usize, overflow: OverflowPolicy) -> MultiplexerConfig {
        MultiplexerConfig { capacity, overflow }
    }

    #[tokio::test]
    async fn test_responses_follow_command_order() {
        let (mut mux, mut remote) = pair(MultiplexerConfig::default());
        remote.write("Welcome\r\nuser@host:~$ ").await;
        assert_eq!(mux.receive().await.unwrap(), "Welcome\r\nuser@host:~$ ");

        let commands = ["first", "second", "third", "fourth"];
        let shell = tokio::spawn(async move {
            for _ in 0..4 {
                let line = remote.read_line().await;
                let reply = format!("out:{}\r\nuser@host:~$ ", line.trim_end());
                remote.write(&reply).await;
            }
            remote
        });

        let mut responses = Vec::new();
        for cmd in commands {
            mux.send(cmd).await.unwrap();
            responses.push(mux.receive().await.unwrap());
        }
        shell.await.unwrap();

        assert_eq!(responses.len(), commands.len());
        for (cmd, response) in commands.iter().zip(&responses) {
            assert_eq!(*response, format!("out:{}\r\nuser@host:~$ ", cmd));
        }
    }

    #[tokio::test]
    async fn test_receive_waits_for_boundary() {
        let (mut mux, mut remote) = pair(MultiplexerConfig::default());
        remote.write("partial output\r\n").await;

        {
            let pending = mux.receive();
            tokio::pin!(pending);
            assert!(timeout(SHORT, &mut pending).await.is_err());

            remote.write("more\r\nhost$ ").await;
            let response = pending.await.unwrap();
            assert_eq!(response, "partial output\r\nmore\r\nhost$ ");
        }

        // exactly one response for exactly one boundary
        assert!(timeout(SHORT, mux.receive()).await.is_err());
    }

    #[tokio::test]
    async fn test_password_prompt_is_a_boundary() {
        let (mut mux, mut remote) = pair(MultiplexerConfig::default());
        remote.write("Password: ").await;
        assert_eq!(mux.receive().await.unwrap(), "Password: ");
    }

    #[tokio::test]
    async fn test_nothing_written_before_banner() {
        let (mux, mut remote) = pair(MultiplexerConfig::default());

        let send = mux.send("ls");
        tokio::pin!(send);
        assert!(timeout(SHORT, &mut send).await.is_err());

        remote.write("banner$ ").await;
        send.await.unwrap();
        assert_eq!(remote.read_line().await, "ls\n");
    }

    #[tokio::test]
    async fn test_second_send_blocks_until_boundary() {
        let (mut mux, mut remote) = pair(MultiplexerConfig::default());
        remote.write("banner$ ").await;
        mux.receive().await.unwrap();

        mux.send("one").await.unwrap();
        assert_eq!(remote.read_line().await, "one\n");

        {
            let second = mux.send("two");
            tokio::pin!(second);
            assert!(timeout(SHORT, &mut second).await.is_err());

            // the second command has not reached the terminal either
            let mut line = String::new();
            assert!(timeout(SHORT, remote.input.read_line(&mut line)).await.is_err());

            remote.write("r1\r\n$ ").await;
            second.await.unwrap();
        }

        assert_eq!(remote.read_line().await, "two\n");
        assert_eq!(mux.receive().await.unwrap(), "r1\r\n$ ");
    }

    #[tokio::test]
    async fn test_eof_unblocks_receive() {
        let (mut mux, remote) = pair(MultiplexerConfig::default());

        let result = {
            let pending = mux.receive();
            tokio::pin!(pending);
            assert!(timeout(SHORT, &mut pending).await.is_err());
            drop(remote);
            pending.await
        };
        assert!(result.unwrap_err().is_closed());

        assert!(mux.receive().await.unwrap_err().is_closed());
        assert!(mux.send("ls").await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_send_after_eof_fails() {
        let (mut mux, mut remote) = pair(MultiplexerConfig::default());
        remote.write("banner$ ").await;
        mux.receive().await.unwrap();

        drop(remote);
        assert!(mux.receive().await.unwrap_err().is_closed());
        assert!(mux.send("exit").await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_response_just_under_capacity() {
        let (mut mux, mut remote) = pair(small(16, OverflowPolicy::Fail));

        // capacity - 1 bytes, ending in the prompt
        remote.write("0123456789abc$ ").await;
        assert_eq!(mux.receive().await.unwrap(), "0123456789abc$ ");

        remote.write("ok$ ").await;
        assert_eq!(mux.receive().await.unwrap(), "ok$ ");
    }

    #[tokio::test]
    async fn test_exact_fit_resets_buffer() {
        let (mut mux, mut remote) = pair(small(16, OverflowPolicy::Fail));

        remote.write("0123456789abcd$ ").await;
        assert_eq!(mux.receive().await.unwrap(), "0123456789abcd$ ");

        remote.write("ok$ ").await;
        assert_eq!(mux.receive().await.unwrap(), "ok$ ");
    }

    #[tokio::test]
    async fn test_overflow_discard_wraps_to_empty() {
        let (mut mux, mut remote) = pair(small(16, OverflowPolicy::Discard));

        remote.write(&"a".repeat(16)).await;
        remote.write("x\r\n$ ").await;
        assert_eq!(mux.receive().await.unwrap(), "x\r\n$ ");
    }

    #[tokio::test]
    async fn test_character_split_by_discard_is_replaced() {
        let (mut mux, mut remote) = pair(small(16, OverflowPolicy::Discard));

        // "é" is 0xC3 0xA9; the wrap falls between its two bytes
        let mut head = "a".repeat(15).into_bytes();
        head.push(0xC3);
        remote.output.write_all(&head).await.unwrap();
        remote.output.write_all(b"\xA9\r\n$ ").await.unwrap();

        assert_eq!(mux.receive().await.unwrap(), "\u{FFFD}\r\n$ ");
    }

    #[tokio::test]
    async fn test_overflow_fail_reports_exhaustion() {
        let (mut mux, mut remote) = pair(small(16, OverflowPolicy::Fail));

        remote.write(&"a".repeat(16)).await;
        let err = mux.receive().await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Channel(ChannelError::BufferExhausted { capacity: 16 })
        ));
        assert!(mux.receive().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_wait_returns_when_remote_exits() {
        let (mut mux, mut remote) = pair(MultiplexerConfig::default());
        remote.write("banner$ ").await;
        mux.receive().await.unwrap();

        drop(remote);
        timeout(Duration::from_secs(5), mux.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_against_mock_terminal() {
        let terminal = tokio_test::io::Builder::new()
            .read(b"Last login: today\r\n$ ")
            .write(b"echo hi\n")
            .read(b"hi\r\n$ ")
            .build();
        let (source, sink) = split(terminal);
        let mut mux = PtyMultiplexer::new(source, sink, MultiplexerConfig::default());

        assert_eq!(mux.receive().await.unwrap(), "Last login: today\r\n$ ");
        mux.send("echo hi").await.unwrap();
        assert_eq!(mux.receive().await.unwrap(), "hi\r\n$ ");

        mux.wait().await;
    }
}
