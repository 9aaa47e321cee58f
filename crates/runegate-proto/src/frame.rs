//! The frame boundary.
//!
//! On the wire a payload travels as `u16le length` followed by that many
//! bytes. The production framer and stream cipher replace this module
//! wholesale; the server's reader/writer tasks only ever call
//! [`split_frame`] and [`join_frame`], so the seam is exactly two
//! functions wide.

use crate::error::{ProtoError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Hard ceiling on a single frame. Anything larger is a protocol error
/// (§7: oversized packet closes the session).
pub const MAX_FRAME: usize = 8 * 1024;

/// Try to split one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed. On success the header
/// and payload are consumed from `buf`.
pub fn split_frame(buf: &mut BytesMut) -> Result<Option<Bytes>> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    if len > MAX_FRAME {
        return Err(ProtoError::OversizedFrame(len));
    }
    if buf.len() < 2 + len {
        return Ok(None);
    }
    let _ = buf.split_to(2);
    Ok(Some(buf.split_to(len).freeze()))
}

/// Prefix a payload with its frame header.
pub fn join_frame(payload: &[u8], out: &mut BytesMut) {
    debug_assert!(payload.len() <= MAX_FRAME);
    out.put_u16_le(payload.len() as u16);
    out.put_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_waits_for_full_frame() {
        let mut buf = BytesMut::new();
        join_frame(&[1, 2, 3], &mut buf);
        let mut partial = BytesMut::from(&buf[..3]);
        assert!(split_frame(&mut partial).unwrap().is_none());

        let frame = split_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], &[1, 2, 3]);
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u16_le(u16::MAX);
        assert!(matches!(
            split_frame(&mut buf),
            Err(ProtoError::OversizedFrame(_))
        ));
    }

    #[test]
    fn back_to_back_frames_split_cleanly() {
        let mut buf = BytesMut::new();
        join_frame(b"aa", &mut buf);
        join_frame(b"bbb", &mut buf);
        assert_eq!(&split_frame(&mut buf).unwrap().unwrap()[..], b"aa");
        assert_eq!(&split_frame(&mut buf).unwrap().unwrap()[..], b"bbb");
    }
}
