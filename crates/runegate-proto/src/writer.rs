//! Little-endian payload building.

use crate::opcode::ServerOpcode;
use bytes::{BufMut, Bytes, BytesMut};

/// Builds one outbound payload, opcode first, fields little-endian.
///
/// Strings are UTF-8 with a NUL terminator. Finished payloads are frozen
/// to [`Bytes`] so broadcast fan-out is a reference-count bump per viewer.
#[derive(Debug)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    /// Start a payload with the given opcode byte.
    pub fn new(op: ServerOpcode) -> Self {
        let mut buf = BytesMut::with_capacity(32);
        buf.put_u8(op as u8);
        Self { buf }
    }

    /// Append a single byte.
    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    /// Append a signed byte.
    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.buf.put_i8(v);
        self
    }

    /// Append a little-endian u16.
    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.put_u16_le(v);
        self
    }

    /// Append a little-endian i16.
    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.buf.put_i16_le(v);
        self
    }

    /// Append a little-endian u32.
    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32_le(v);
        self
    }

    /// Append a little-endian i32.
    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.put_i32_le(v);
        self
    }

    /// Append a little-endian u64.
    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.put_u64_le(v);
        self
    }

    /// Append a NUL-terminated UTF-8 string. Embedded NULs are dropped.
    pub fn cstr(&mut self, s: &str) -> &mut Self {
        for &b in s.as_bytes() {
            if b != 0 {
                self.buf.put_u8(b);
            }
        }
        self.buf.put_u8(0);
        self
    }

    /// Append raw bytes (emblem blobs, pre-built sub-payloads).
    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.put_slice(b);
        self
    }

    /// Freeze into the finished payload.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_little_endian_after_opcode() {
        let mut w = PacketWriter::new(ServerOpcode::Hp);
        w.u16(0x1234).i32(-2);
        let b = w.finish();
        assert_eq!(&b[..], &[0x05, 0x34, 0x12, 0xfe, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn cstr_terminates_and_strips_nul() {
        let mut w = PacketWriter::new(ServerOpcode::ServerMessage);
        w.cstr("ab\0c");
        let b = w.finish();
        assert_eq!(&b[1..], b"abc\0");
    }
}
