//! Little-endian payload reading.

use crate::error::{ProtoError, Result};

/// Cursor over one inbound payload, positioned after the opcode byte.
///
/// Every read is bounds-checked; a short or malformed payload surfaces as a
/// [`ProtoError`] and the session that sent it is closed (protocol errors
/// are terminal, nothing is retried).
#[derive(Debug)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Wrap a payload body (opcode already consumed by dispatch).
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtoError::Truncated {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    /// Read one byte.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read one signed byte.
    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    /// Read a little-endian u16.
    pub fn u16(&mut self) -> Result<u16> {
        let s = self.take(2)?;
        Ok(u16::from_le_bytes([s[0], s[1]]))
    }

    /// Read a little-endian i16.
    pub fn i16(&mut self) -> Result<i16> {
        Ok(self.u16()? as i16)
    }

    /// Read a little-endian u32.
    pub fn u32(&mut self) -> Result<u32> {
        let s = self.take(4)?;
        Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    /// Read a little-endian i32.
    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    /// Read a little-endian u64.
    pub fn u64(&mut self) -> Result<u64> {
        let s = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(s);
        Ok(u64::from_le_bytes(a))
    }

    /// Read a NUL-terminated UTF-8 string.
    pub fn cstr(&mut self) -> Result<String> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtoError::UnterminatedString)?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| ProtoError::InvalidString)?;
        self.pos += nul + 1;
        Ok(s.to_string())
    }

    /// Read exactly `n` raw bytes (emblem upload bodies).
    pub fn raw(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Remaining bytes without consuming (trailing variable blobs).
    pub fn rest(&mut self) -> &'a [u8] {
        let s = &self.buf[self.pos..];
        self.pos = self.buf.len();
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_order_and_rejects_overrun() {
        let payload = [0x34, 0x12, 0x07, b'h', b'i', 0x00];
        let mut r = PacketReader::new(&payload);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.u8().unwrap(), 7);
        assert_eq!(r.cstr().unwrap(), "hi");
        assert!(matches!(r.u32(), Err(ProtoError::Truncated { .. })));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut r = PacketReader::new(b"abc");
        assert!(matches!(r.cstr(), Err(ProtoError::UnterminatedString)));
    }
}
