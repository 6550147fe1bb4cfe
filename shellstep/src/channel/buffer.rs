//! Boundary buffer for splitting terminal output into responses.
//!
//! The remote shell is assumed to end its primary prompt with `"$ "` and
//! any password prompt with `": "`. After every read the byte two positions
//! before the end of the buffered data is inspected; if it is one of the two
//! terminators, everything buffered so far is one complete response.
//!
//! This is a structural match on prompt shape, not a terminal parser. Output
//! that happens to end in `"$ "` or `": "` mid-command is indistinguishable
//! from a prompt.

use bytes::{Bytes, BytesMut};
use serde::Deserialize;

/// Nominal buffer capacity, in bytes.
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Second-to-last byte of the shell's primary prompt (`"$ "`).
pub const PROMPT_TERMINATOR: u8 = b'$';

/// Second-to-last byte of an interactive password prompt (`": "`).
pub const PASSWORD_TERMINATOR: u8 = b':';

/// What to do when the buffer fills up without a boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Report the overflow to the waiting caller and end the session.
    #[default]
    Fail,

    /// Drop the unmatched bytes and keep reading from an empty buffer.
    Discard,
}

/// Accumulates inbound bytes until a prompt boundary is seen.
///
/// Growable, but never beyond `capacity` bytes. The reader is expected to
/// size each read with [`remaining`](Self::remaining).
#[derive(Debug)]
pub struct BoundaryBuffer {
    buffer: BytesMut,
    capacity: usize,
    policy: OverflowPolicy,
}

impl BoundaryBuffer {
    /// Create a buffer holding at most `capacity` bytes.
    ///
    /// A boundary needs two bytes, so smaller capacities are raised to two.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(2);
        Self {
            buffer: BytesMut::with_capacity(capacity.min(4096)),
            capacity,
            policy,
        }
    }

    /// Append freshly read bytes.
    ///
    /// Anything beyond the remaining room is ignored; reads sized with
    /// [`remaining`](Self::remaining) never hit that case.
    pub fn extend(&mut self, data: &[u8]) {
        let take = data.len().min(self.remaining());
        self.buffer.extend_from_slice(&data[..take]);
    }

    /// Whether the buffered data currently ends on a prompt boundary.
    pub fn at_boundary(&self) -> bool {
        let len = self.buffer.len();
        if len < 2 {
            return false;
        }
        matches!(self.buffer[len - 2], PROMPT_TERMINATOR | PASSWORD_TERMINATOR)
    }

    /// Take the buffered response and reset to empty.
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Bytes that can still be appended before the buffer is full.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    /// Whether the buffer has reached capacity.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for BoundaryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, OverflowPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_prompt_boundary() {
        let mut buffer = BoundaryBuffer::new(64, OverflowPolicy::Fail);
        buffer.extend(b"total 0\r\nuser@host:~$ ");
        assert!(buffer.at_boundary());
    }

    #[test]
    fn test_password_prompt_boundary() {
        let mut buffer = BoundaryBuffer::new(64, OverflowPolicy::Fail);
        buffer.extend(b"Password: ");
        assert!(buffer.at_boundary());
    }

    #[test]
    fn test_no_boundary_mid_output() {
        let mut buffer = BoundaryBuffer::new(64, OverflowPolicy::Fail);
        buffer.extend(b"price is $5\r\n");
        assert!(!buffer.at_boundary());

        // terminator without the trailing space is not a prompt yet
        buffer.clear();
        buffer.extend(b"user@host:~$");
        assert!(!buffer.at_boundary());
    }

    #[test]
    fn test_boundary_split_across_reads() {
        let mut buffer = BoundaryBuffer::new(64, OverflowPolicy::Fail);
        buffer.extend(b"done\r\nhost$");
        assert!(!buffer.at_boundary());
        buffer.extend(b" ");
        assert!(buffer.at_boundary());
    }

    #[test]
    fn test_too_short_for_boundary() {
        let mut buffer = BoundaryBuffer::new(64, OverflowPolicy::Fail);
        assert!(!buffer.at_boundary());
        buffer.extend(b"$");
        assert!(!buffer.at_boundary());
    }

    #[test]
    fn test_take_resets() {
        let mut buffer = BoundaryBuffer::new(64, OverflowPolicy::Fail);
        buffer.extend(b"ok\r\n$ ");
        assert_eq!(&buffer.take()[..], b"ok\r\n$ ");
        assert!(buffer.is_empty());
        assert_eq!(buffer.remaining(), 64);
    }

    #[test]
    fn test_extend_respects_capacity() {
        let mut buffer = BoundaryBuffer::new(8, OverflowPolicy::Discard);
        buffer.extend(b"0123456789");
        assert_eq!(buffer.as_slice(), b"01234567");
        assert!(buffer.is_full());
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let policy: OverflowPolicy = serde_json::from_str("\"discard\"").unwrap();
        assert_eq!(policy, OverflowPolicy::Discard);
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::Fail);
    }
}
