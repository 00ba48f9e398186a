// Positional typed reads over an immutable byte buffer.

use byteorder::{ByteOrder, LittleEndian};

use crate::{DrsError, Result};

/// An exclusively-owned position into an immutable byte buffer.
///
/// Every read either consumes exactly the requested width (little-endian,
/// matching the digitizer) or reports [`DrsError::UnexpectedEof`]. Structural
/// lookahead is supported either with [`ByteCursor::eat_tag`] or by reading
/// and then un-reading the examined bytes with [`ByteCursor::rewind`].
#[derive(Debug)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteCursor { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Un-read exactly `n` bytes. `n` must not exceed the bytes already read.
    pub fn rewind(&mut self, n: usize) {
        debug_assert!(n <= self.pos);
        self.pos = self.pos.saturating_sub(n);
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DrsError::UnexpectedEof {
                offset: self.pos,
                needed: n,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Read a fixed-width string as raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n)?;
        Ok(())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u16_array(&mut self, n: usize) -> Result<Vec<u16>> {
        let src = self.take(n * 2)?;
        let mut out = vec![0u16; n];
        LittleEndian::read_u16_into(src, &mut out);
        Ok(out)
    }

    pub fn read_f32_array(&mut self, n: usize) -> Result<Vec<f32>> {
        let src = self.take(n * 4)?;
        let mut out = vec![0f32; n];
        LittleEndian::read_f32_into(src, &mut out);
        Ok(out)
    }

    /// Consume `tag` if the next bytes match it exactly; otherwise leave the
    /// position unchanged. Returns whether the tag was consumed. Fewer than
    /// `tag.len()` remaining bytes count as a mismatch, not an error.
    pub fn eat_tag(&mut self, tag: &[u8]) -> bool {
        if self.remaining() < tag.len() {
            return false;
        }
        if &self.buf[self.pos..self.pos + tag.len()] == tag {
            self.pos += tag.len();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_reads() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"DRS2");
        buf.extend_from_slice(&0x1234u16.to_le_bytes());
        buf.extend_from_slice(&0xdeadbeefu32.to_le_bytes());
        buf.extend_from_slice(&1.5f32.to_le_bytes());
        buf.extend_from_slice(&(-2.5f32).to_le_bytes());

        let mut cur = ByteCursor::new(&buf);
        assert_eq!(cur.read_bytes(4).unwrap(), b"DRS2");
        assert_eq!(cur.read_u16().unwrap(), 0x1234);
        assert_eq!(cur.read_u32().unwrap(), 0xdeadbeef);
        assert_eq!(cur.read_f32_array(2).unwrap(), vec![1.5, -2.5]);
        assert!(cur.is_empty());
    }

    #[test]
    fn test_short_read_is_eof() {
        let buf = [0u8; 3];
        let mut cur = ByteCursor::new(&buf);
        let result = cur.read_u32();
        assert!(matches!(
            result,
            Err(DrsError::UnexpectedEof {
                offset: 0,
                needed: 4
            })
        ));
        // A failed read consumes nothing.
        assert_eq!(cur.remaining(), 3);
    }

    #[test]
    fn test_eat_tag_and_rewind() {
        let buf = b"B#C001";
        let mut cur = ByteCursor::new(buf);
        assert!(!cur.eat_tag(b"C0"));
        assert_eq!(cur.position(), 0);
        assert!(cur.eat_tag(b"B#"));
        assert!(cur.eat_tag(b"C00"));
        assert_eq!(cur.read_bytes(1).unwrap(), b"1");

        cur.rewind(4);
        assert_eq!(cur.read_bytes(4).unwrap(), b"C001");
        // At end of stream a tag probe is a plain mismatch.
        assert!(!cur.eat_tag(b"B#"));
    }

    #[test]
    fn test_u16_array() {
        let mut buf = Vec::new();
        for v in [7u16, 65535, 0] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let mut cur = ByteCursor::new(&buf);
        assert_eq!(cur.read_u16_array(3).unwrap(), vec![7, 65535, 0]);
    }
}
