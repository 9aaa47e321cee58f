//! # runegate-proto
//!
//! Wire protocol support for the Runegate world server.
//!
//! This crate owns the parts of the wire protocol the simulation cares
//! about, and nothing below them:
//!
//! - The closed opcode sets for both directions ([`opcode`])
//! - Little-endian payload reading and writing ([`reader`], [`writer`])
//! - Server packet-builder helpers that produce finished payloads ([`server`])
//! - The frame boundary where the external framer and stream cipher plug in
//!   ([`frame`]): a payload is carried as `u16le length + bytes` on the wire
//!
//! Encryption and the production framer live outside this crate; everything
//! here operates on plaintext payloads whose first byte is the opcode.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod opcode;
pub mod reader;
pub mod server;
pub mod writer;

pub use error::ProtoError;
pub use opcode::{ClientOpcode, EventSub, ServerOpcode};
pub use reader::PacketReader;
pub use writer::PacketWriter;
