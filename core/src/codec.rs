//! Typed little-endian read/write of integers and length-prefixed strings
//! over a `ByteChannel` (spec §4.2), grounded on the teacher's
//! `core/src/byte_operations.rs` LE-assembly macros — reimplemented as
//! non-panicking methods returning `Result`/`PokError` since the channel
//! underneath is non-blocking.

use crate::channel::ByteChannel;
use crate::constants::MAX_STRING_LENGTH;
use crate::error::PokError;

macro_rules! read_uint {
    ($name:ident, $ty:ty, $bytes:expr) => {
        /// Reads one little-endian
        #[doc = stringify!($ty)]
        /// from `ch`. Returns `would_block`/`pending` when fewer than
        #[doc = stringify!($bytes)]
        /// bytes are currently available; the caller retries later with
        /// the same logical position (nothing is consumed on failure).
        pub fn $name(ch: &mut dyn ByteChannel) -> Result<$ty, PokError> {
            let raw = ch.read($bytes)?;
            if raw.len() < $bytes {
                if !raw.is_empty() {
                    ch.unread(raw.len())?;
                }
                return Err(PokError::pending());
            }
            let mut arr = [0u8; $bytes];
            arr.copy_from_slice(&raw);
            Ok(<$ty>::from_le_bytes(arr))
        }
    };
}

read_uint!(read_u8, u8, 1);
read_uint!(read_u16, u16, 2);
read_uint!(read_u32, u32, 4);
read_uint!(read_u64, u64, 8);

macro_rules! write_uint {
    ($name:ident, $ty:ty) => {
        pub fn $name(ch: &mut dyn ByteChannel, value: $ty) -> Result<(), PokError> {
            let bytes = value.to_le_bytes();
            let written = ch.write(&bytes)?;
            if written < bytes.len() {
                ch.save(&bytes[written..])?;
            }
            Ok(())
        }
    };
}

write_uint!(write_u8, u8);
write_uint!(write_u16, u16);
write_uint!(write_u32, u32);
write_uint!(write_u64, u64);

/// Reads up to `max` bytes or until a NUL terminator, whichever comes
/// first. The NUL (if present) is consumed but not included in the
/// result.
pub fn read_string(ch: &mut dyn ByteChannel, max: usize) -> Result<String, PokError> {
    let cap = max.min(MAX_STRING_LENGTH);
    let mut out = Vec::with_capacity(cap);
    loop {
        if out.len() >= cap {
            break;
        }
        let chunk = ch.read(1)?;
        if chunk.is_empty() {
            break;
        }
        if chunk[0] == 0 {
            break;
        }
        out.push(chunk[0]);
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Concatenates into `buf` until NUL is seen or end-of-stream. On partial
/// receipt (stream not yet at NUL, no more bytes available) fails with
/// `Pending` without discarding the bytes already appended to `buf` — a
/// retry continues exactly where it left off.
pub fn read_string_zero_terminated(
    ch: &mut dyn ByteChannel,
    buf: &mut Vec<u8>,
) -> Result<String, PokError> {
    loop {
        let chunk = ch.read(1)?;
        if chunk.is_empty() {
            return Err(PokError::pending());
        }
        if chunk[0] == 0 {
            return Ok(String::from_utf8_lossy(buf).into_owned());
        }
        buf.push(chunk[0]);
    }
}

pub fn write_string_zero_terminated(ch: &mut dyn ByteChannel, s: &str) -> Result<(), PokError> {
    let written = ch.write(s.as_bytes())?;
    if written < s.len() {
        ch.save(&s.as_bytes()[written..])?;
    }
    write_u8(ch, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    #[test]
    fn round_trip_u32() {
        let mut ch = MemoryChannel::new();
        write_u32(&mut ch, 0xDEADBEEF).unwrap();
        let bytes = ch.drain_output();
        ch.feed(&bytes).unwrap();
        assert_eq!(read_u32(&mut ch).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn round_trip_u64() {
        let mut ch = MemoryChannel::new();
        write_u64(&mut ch, 0x0123_4567_89AB_CDEF).unwrap();
        let bytes = ch.drain_output();
        ch.feed(&bytes).unwrap();
        assert_eq!(read_u64(&mut ch).unwrap(), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn short_read_is_pending_and_does_not_consume() {
        let mut ch = MemoryChannel::new();
        ch.feed(&[1, 2, 3]).unwrap();
        assert!(read_u32(&mut ch).unwrap_err().is_retryable());
        ch.feed(&[4]).unwrap();
        assert_eq!(read_u32(&mut ch).unwrap(), u32::from_le_bytes([1, 2, 3, 4]));
    }

    #[test]
    fn zero_terminated_resumes_after_pending() {
        let mut ch = MemoryChannel::new();
        ch.feed(b"hel").unwrap();
        let mut buf = Vec::new();
        assert!(read_string_zero_terminated(&mut ch, &mut buf)
            .unwrap_err()
            .is_retryable());
        assert_eq!(buf, b"hel");
        ch.feed(b"lo\0").unwrap();
        let s = read_string_zero_terminated(&mut ch, &mut buf).unwrap();
        assert_eq!(s, "hello");
    }
}
