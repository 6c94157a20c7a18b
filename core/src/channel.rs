//! Duplex byte channel with partial read/write accounting and peek/unread
//! (spec §4.1), grounded on the teacher's ring-buffer send path in
//! `server/src/game_loop.rs` (`obuf`/`iptr`/`optr`) and
//! `server/src/network_manager.rs`'s `csend`.

use std::io::{self, Read, Write};

use crate::constants::CHANNEL_RING_SIZE;
use crate::error::PokError;

/// A duplex byte-oriented endpoint: anonymous pipe, named local endpoint,
/// network socket, file, or the standard pair (spec §4.1).
pub trait ByteChannel {
    /// Returns up to `max` bytes. An empty slice is a sticky end-of-stream
    /// signal. On transient unavailability returns `Err` with a retryable
    /// `PokError` (`would_block`/interrupted).
    fn read(&mut self, max: usize) -> Result<Vec<u8>, PokError>;

    /// Whatever is already buffered; only issues a syscall if the read
    /// buffer is empty.
    fn read_any(&mut self, max: usize) -> Result<Vec<u8>, PokError>;

    /// Rewinds the read cursor by `n` bytes (n <= bytes returned since the
    /// last compaction). Fails with `no_room` if the read buffer cannot
    /// hold that much.
    fn unread(&mut self, n: usize) -> Result<(), PokError>;

    /// Writes `buf`, buffering through the output ring when enabled.
    /// Returns the number of bytes actually accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, PokError>;

    /// Stashes leftover write bytes into the output buffer without a
    /// syscall. Fails with `no_room` if the ring is full.
    fn save(&mut self, buf: &[u8]) -> Result<(), PokError>;

    fn flush(&mut self) -> Result<(), PokError>;

    fn set_buffering(&mut self, on: bool);

    fn end_of_comms(&self) -> bool;

    fn read_buffer_full(&self) -> bool;

    /// Looks at up to `max` buffered bytes without consuming them: a
    /// `read` immediately followed by an `unread` of whatever came back.
    /// Callers that need to scan for a delimiter (e.g. a line terminator)
    /// use this instead of `read`-ing one byte at a time.
    fn peek(&mut self, max: usize) -> Result<Vec<u8>, PokError> {
        let data = self.read(max)?;
        self.unread(data.len())?;
        Ok(data)
    }

    /// Discards `n` bytes previously returned by `peek`, advancing the
    /// read cursor past them.
    fn pop(&mut self, n: usize) -> Result<(), PokError> {
        self.read(n)?;
        Ok(())
    }
}

/// A single 4 KiB ring with a read cursor and a write cursor, matching the
/// teacher's `tptr`/`tbuf`/`iptr`/`optr`/`obuf` discipline.
struct Ring {
    buf: Vec<u8>,
    start: usize,
    len: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            start: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn free(&self) -> usize {
        self.capacity() - self.len
    }

    fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Slides buffered bytes down to index 0.
    fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.buf.copy_within(self.start..self.start + self.len, 0);
        self.start = 0;
    }

    fn push(&mut self, data: &[u8]) -> Result<(), PokError> {
        if data.len() > self.free() {
            return Err(PokError::no_room());
        }
        let tail_space = self.capacity() - (self.start + self.len);
        if data.len() > tail_space {
            self.compact();
        }
        let dst_start = self.start + self.len;
        self.buf[dst_start..dst_start + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    /// Does not reset `start` to 0 on fully draining the ring: `unread`
    /// needs `start` to still reflect how much was just taken, even when
    /// nothing logically remains buffered.
    fn take(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.len);
        let out = self.buf[self.start..self.start + n].to_vec();
        self.start += n;
        self.len -= n;
        out
    }

    /// Rewinds the logical read cursor, restoring `n` bytes that were
    /// already taken but are still physically present before `start`.
    fn unread(&mut self, n: usize) -> Result<(), PokError> {
        if n > self.start {
            return Err(PokError::no_room());
        }
        self.start -= n;
        self.len += n;
        Ok(())
    }
}

/// An in-process `ByteChannel` backed by a pair of rings: useful for tests
/// and for the default (offline) scenario's loopback exchange.
pub struct MemoryChannel {
    input: Ring,
    output: Ring,
    buffering: bool,
    eof: bool,
    eof_sticky: bool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self {
            input: Ring::new(CHANNEL_RING_SIZE),
            output: Ring::new(CHANNEL_RING_SIZE),
            buffering: true,
            eof: false,
            eof_sticky: false,
        }
    }

    /// Feeds bytes as if they had just arrived from the peer.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), PokError> {
        self.input.push(data)
    }

    pub fn mark_eof(&mut self) {
        self.eof = true;
    }

    /// Drains whatever the peer has written so far (test/loopback use).
    pub fn drain_output(&mut self) -> Vec<u8> {
        self.output.take(self.output.len)
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteChannel for MemoryChannel {
    fn read(&mut self, max: usize) -> Result<Vec<u8>, PokError> {
        if self.input.len == 0 {
            if self.eof_sticky || self.eof {
                self.eof_sticky = true;
                return Ok(Vec::new());
            }
            return Err(PokError::would_block());
        }
        Ok(self.input.take(max))
    }

    fn read_any(&mut self, max: usize) -> Result<Vec<u8>, PokError> {
        Ok(self.input.take(max))
    }

    fn unread(&mut self, n: usize) -> Result<(), PokError> {
        self.input.unread(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, PokError> {
        if self.buffering {
            self.output.push(buf)?;
            Ok(buf.len())
        } else {
            self.output.push(buf)?;
            self.flush()?;
            Ok(buf.len())
        }
    }

    fn save(&mut self, buf: &[u8]) -> Result<(), PokError> {
        self.output.push(buf)
    }

    fn flush(&mut self) -> Result<(), PokError> {
        Ok(())
    }

    fn set_buffering(&mut self, on: bool) {
        self.buffering = on;
    }

    fn end_of_comms(&self) -> bool {
        self.eof_sticky
    }

    fn read_buffer_full(&self) -> bool {
        self.input.is_full()
    }
}

/// Adapts any `Read + Write` stream (TCP socket, pipe, file) into a
/// `ByteChannel`, translating `WouldBlock`/`Interrupted` OS errors into
/// the matching `PokError`.
pub struct StreamChannel<S: Read + Write> {
    stream: S,
    input: Ring,
    output: Ring,
    buffering: bool,
    eof_sticky: bool,
}

impl<S: Read + Write> StreamChannel<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            input: Ring::new(CHANNEL_RING_SIZE),
            output: Ring::new(CHANNEL_RING_SIZE),
            buffering: true,
            eof_sticky: false,
        }
    }

    fn fill_input(&mut self) -> Result<(), PokError> {
        let mut scratch = [0u8; CHANNEL_RING_SIZE];
        match self.stream.read(&mut scratch) {
            Ok(0) => {
                self.eof_sticky = true;
                Ok(())
            }
            Ok(n) => self.input.push(&scratch[..n]),
            Err(e) => Err(os_error_to_pok(e)),
        }
    }
}

fn os_error_to_pok(e: io::Error) -> PokError {
    match e.kind() {
        io::ErrorKind::WouldBlock => PokError::would_block(),
        io::ErrorKind::Interrupted => PokError::new(
            crate::error::ErrorKind::Net(crate::error::NetError::Interrupted),
            "interrupted",
        ),
        io::ErrorKind::BrokenPipe => PokError::new(
            crate::error::ErrorKind::Net(crate::error::NetError::BrokenPipe),
            "broken pipe",
        ),
        _ => PokError::new(
            crate::error::ErrorKind::Net(crate::error::NetError::Unspecified),
            e.to_string(),
        ),
    }
}

impl<S: Read + Write> ByteChannel for StreamChannel<S> {
    fn read(&mut self, max: usize) -> Result<Vec<u8>, PokError> {
        if self.input.len == 0 {
            if self.eof_sticky {
                return Ok(Vec::new());
            }
            self.fill_input()?;
            if self.input.len == 0 {
                if self.eof_sticky {
                    return Ok(Vec::new());
                }
                return Err(PokError::would_block());
            }
        }
        Ok(self.input.take(max))
    }

    fn read_any(&mut self, max: usize) -> Result<Vec<u8>, PokError> {
        Ok(self.input.take(max))
    }

    fn unread(&mut self, n: usize) -> Result<(), PokError> {
        self.input.unread(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, PokError> {
        if self.buffering {
            self.output.push(buf)?;
            Ok(buf.len())
        } else {
            self.stream.write_all(buf).map_err(os_error_to_pok)?;
            Ok(buf.len())
        }
    }

    fn save(&mut self, buf: &[u8]) -> Result<(), PokError> {
        self.output.push(buf)
    }

    fn flush(&mut self) -> Result<(), PokError> {
        let pending = self.output.take(self.output.len);
        if !pending.is_empty() {
            self.stream.write_all(&pending).map_err(os_error_to_pok)?;
        }
        self.stream.flush().map_err(os_error_to_pok)
    }

    fn set_buffering(&mut self, on: bool) {
        self.buffering = on;
    }

    fn end_of_comms(&self) -> bool {
        self.eof_sticky
    }

    fn read_buffer_full(&self) -> bool {
        self.input.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_then_read_round_trips() {
        let mut ch = MemoryChannel::new();
        ch.feed(b"hello").unwrap();
        assert_eq!(ch.read(5).unwrap(), b"hello");
    }

    #[test]
    fn read_on_empty_is_would_block() {
        let mut ch = MemoryChannel::new();
        assert!(ch.read(4).unwrap_err().is_retryable());
    }

    #[test]
    fn eof_is_sticky() {
        let mut ch = MemoryChannel::new();
        ch.mark_eof();
        assert_eq!(ch.read(4).unwrap(), Vec::<u8>::new());
        assert!(ch.end_of_comms());
        assert_eq!(ch.read(4).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn unread_restores_bytes() {
        let mut ch = MemoryChannel::new();
        ch.feed(b"abcdef").unwrap();
        let first = ch.read(3).unwrap();
        assert_eq!(first, b"abc");
        ch.unread(3).unwrap();
        assert_eq!(ch.read(6).unwrap(), b"abcdef");
    }

    #[test]
    fn write_then_drain_output() {
        let mut ch = MemoryChannel::new();
        ch.write(b"world").unwrap();
        assert_eq!(ch.drain_output(), b"world");
    }

    #[test]
    fn peek_does_not_consume() {
        let mut ch = MemoryChannel::new();
        ch.feed(b"abc").unwrap();
        assert_eq!(ch.peek(3).unwrap(), b"abc");
        assert_eq!(ch.read(3).unwrap(), b"abc");
    }

    #[test]
    fn pop_discards_without_returning() {
        let mut ch = MemoryChannel::new();
        ch.feed(b"abcdef").unwrap();
        ch.pop(3).unwrap();
        assert_eq!(ch.read(3).unwrap(), b"def");
    }
}
