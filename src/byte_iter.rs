/*!

A cursor over an in-memory byte slice, used by every decoder in this crate.

Every decoder here receives a fully-buffered `&[u8]` (see the crate's
concurrency/resource notes: input is never streamed), so the cursor walks a
slice rather than a `Read` implementation. It collapses the many hand-rolled
bounds checks a byte-at-a-time C++ parser needs into one generic set of
checked peek/take operations, plus a stack of size limits so a decoder can
temporarily bound itself to a sub-region (a SysEx payload, a Meta event
body, an XMF node) without allocating a sub-slice.

!*/

use crate::vlq::{decode_u32, VlqError};
use log::trace;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::str::{from_utf8, Utf8Error};

pub(crate) struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
    limits: Vec<usize>,
}

#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub(crate) enum ByteError {
    #[snafu(display("unexpected end reached around byte {}", position))]
    End { position: usize },

    #[snafu(display(
        "expected string but found non-utf8 encoded bytes around {}: {}",
        position,
        source
    ))]
    Str { position: usize, source: Utf8Error },

    #[snafu(display(
        "expected tag '{}' but found '{}' near position {}",
        expected,
        found,
        position
    ))]
    Tag {
        expected: String,
        found: String,
        position: usize,
    },

    #[snafu(display("too many bytes while reading vlq around {}", position))]
    VlqTooBig { position: usize },

    #[snafu(display("problem decoding vlq around {}: {}", position, source))]
    VlqDecode { position: usize, source: VlqError },

    #[snafu(display(
        "incorrect byte value around {}: expected '{:#X}', found '{:#X}'",
        position,
        expected,
        found,
    ))]
    ReadExpect {
        expected: u8,
        found: u8,
        position: usize,
    },
}

pub(crate) type ByteResult<T> = std::result::Result<T, ByteError>;

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            limits: Vec::new(),
        }
    }

    /// The effective end of the readable region: the innermost active size
    /// limit, or the end of the whole slice.
    fn end(&self) -> usize {
        self.limits.last().copied().unwrap_or(self.data.len())
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn remaining(&self) -> usize {
        self.end().saturating_sub(self.position)
    }

    pub(crate) fn is_end(&self) -> bool {
        self.position >= self.end()
    }

    pub(crate) fn read(&mut self) -> Option<u8> {
        if self.is_end() {
            return None;
        }
        let b = self.data[self.position];
        self.position += 1;
        trace!("read {:#x} at position {}", b, self.position - 1);
        Some(b)
    }

    pub(crate) fn read_or_die(&mut self) -> ByteResult<u8> {
        self.read().context(End {
            position: self.position,
        })
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    pub(crate) fn peek2(&self) -> Option<u8> {
        self.peek_at(1)
    }

    pub(crate) fn peek3(&self) -> Option<u8> {
        self.peek_at(2)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        let idx = self.position + offset;
        if idx >= self.end() {
            None
        } else {
            self.data.get(idx).copied()
        }
    }

    pub(crate) fn peek_or_die(&self) -> ByteResult<u8> {
        self.peek().context(End {
            position: self.position,
        })
    }

    pub(crate) fn read_n(&mut self, n: usize) -> ByteResult<&'a [u8]> {
        ensure!(self.remaining() >= n, End { position: self.position });
        let slice = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    /// Looks at the next `n` bytes without advancing the cursor, for
    /// variable-length magic detection. Returns `None` if fewer than `n`
    /// bytes remain.
    pub(crate) fn peek_n(&self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            None
        } else {
            Some(&self.data[self.position..self.position + n])
        }
    }

    pub(crate) fn read2(&mut self) -> ByteResult<[u8; 2]> {
        let s = self.read_n(2)?;
        Ok([s[0], s[1]])
    }

    pub(crate) fn read4(&mut self) -> ByteResult<[u8; 4]> {
        let s = self.read_n(4)?;
        Ok([s[0], s[1], s[2], s[3]])
    }

    pub(crate) fn read_u16_be(&mut self) -> ByteResult<u16> {
        Ok(u16::from_be_bytes(self.read2()?))
    }

    pub(crate) fn read_u32_be(&mut self) -> ByteResult<u32> {
        Ok(u32::from_be_bytes(self.read4()?))
    }

    pub(crate) fn read_u16_le(&mut self) -> ByteResult<u16> {
        Ok(u16::from_le_bytes(self.read2()?))
    }

    pub(crate) fn read_u32_le(&mut self) -> ByteResult<u32> {
        Ok(u32::from_le_bytes(self.read4()?))
    }

    /// Reads a VLQ, tolerantly: running off the end of input returns the
    /// value accumulated so far rather than failing. Strict call sites
    /// should check `is_end()` themselves before calling if truncation must
    /// be an error.
    pub(crate) fn read_vlq_u32(&mut self) -> ByteResult<u32> {
        let start = self.position;
        let mut bytes = Vec::with_capacity(4);
        loop {
            ensure!(bytes.len() <= 4, VlqTooBig { position: start });
            match self.read() {
                Some(b) => {
                    bytes.push(b);
                    if b & 0x80 == 0 {
                        break;
                    }
                }
                None => break,
            }
        }
        let decoded = decode_u32(&bytes).context(VlqDecode { position: start })?;
        trace!("decoded vlq value {} from {} bytes", decoded, bytes.len());
        Ok(decoded)
    }

    pub(crate) fn expect_tag(&mut self, expected_tag: &str) -> ByteResult<()> {
        let position = self.position;
        let tag_bytes = self.read4()?;
        let actual_tag = from_utf8(&tag_bytes).context(Str { position })?;
        ensure!(
            expected_tag == actual_tag,
            Tag {
                expected: expected_tag,
                found: actual_tag,
                position,
            }
        );
        Ok(())
    }

    pub(crate) fn is_tag(&self, expected_tag: &str) -> bool {
        let end = self.end();
        if self.position + 4 > end {
            return false;
        }
        let tag_bytes = &self.data[self.position..self.position + 4];
        match from_utf8(tag_bytes) {
            Ok(found) => found == expected_tag,
            Err(_) => false,
        }
    }

    pub(crate) fn read_expect(&mut self, expected: u8) -> ByteResult<()> {
        let position = self.position;
        let found = self.read_or_die()?;
        ensure!(expected == found, ReadExpect { expected, found, position });
        Ok(())
    }

    /// Pushes a new size limit relative to the current position. Reads
    /// beyond it report `is_end() == true` even if the underlying slice has
    /// more data. Used to bound a decoder to a sub-region (a chunk body, a
    /// SysEx payload) without slicing.
    pub(crate) fn push_limit(&mut self, size: usize) {
        let limit = (self.position + size).min(self.data.len());
        self.limits.push(limit);
    }

    pub(crate) fn pop_limit(&mut self) {
        self.limits.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_peek() {
        let bytes = [0x00u8, 0x01, 0x02, 0x03, 0x04];
        let mut c = ByteCursor::new(&bytes);
        assert_eq!(0x00, c.read().unwrap());
        assert_eq!(0x01, c.peek().unwrap());
        assert_eq!(0x02, c.peek2().unwrap());
        assert_eq!(0x03, c.peek3().unwrap());
        assert_eq!([0x01, 0x02], c.read2().unwrap());
        assert_eq!(2, c.position());
    }

    #[test]
    fn size_limit_hides_remaining_bytes() {
        let bytes = [0x03u8, 0x04, 0x10, 0x20, 0x30, 0x40];
        let mut c = ByteCursor::new(&bytes);
        c.push_limit(2);
        assert!(!c.is_end());
        assert_eq!(0x03, c.read().unwrap());
        assert_eq!(0x04, c.read().unwrap());
        assert!(c.is_end());
        assert!(c.read().is_none());
        c.pop_limit();
        assert_eq!(0x10, c.read().unwrap());
    }

    #[test]
    fn expect_tag_ok_and_err() {
        let bytes = b"MThdXXXX";
        let mut c = ByteCursor::new(bytes);
        assert!(c.expect_tag("MThd").is_ok());
        let mut c2 = ByteCursor::new(bytes);
        assert!(c2.expect_tag("MTrk").is_err());
    }

    #[test]
    fn vlq_read_tolerant_on_truncation() {
        let bytes = [0x81u8, 0x80]; // continues but runs out
        let mut c = ByteCursor::new(&bytes);
        // decode_u32 will fail on an incomplete vlq; ensure it surfaces as an error, not a panic
        assert!(c.read_vlq_u32().is_err());
    }
}
