//! Error types for packet decoding.
//!
//! A decode failure is terminal for the session that produced it (the
//! server closes the connection), so these errors carry enough context to
//! log the reason and nothing more.

use thiserror::Error;

/// Convenience alias for Results using [`ProtoError`].
pub type Result<T, E = ProtoError> = std::result::Result<T, E>;

/// Packet decoding errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtoError {
    /// The payload ended before the requested field.
    #[error("payload truncated: wanted {wanted} more bytes, {remaining} left")]
    Truncated {
        /// Bytes the read needed.
        wanted: usize,
        /// Bytes left in the payload.
        remaining: usize,
    },

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidString,

    /// A string field ran past the end of the payload without a terminator.
    #[error("unterminated string field")]
    UnterminatedString,

    /// The first byte did not map to a known client opcode.
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// A frame header announced a length outside the allowed range.
    #[error("oversized frame: {0} bytes")]
    OversizedFrame(usize),
}

impl ProtoError {
    /// Static code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Truncated { .. } => "truncated",
            Self::InvalidString => "invalid_string",
            Self::UnterminatedString => "unterminated_string",
            Self::UnknownOpcode(_) => "unknown_opcode",
            Self::OversizedFrame(_) => "oversized_frame",
        }
    }
}
