//! Network layer: the accept gateway and per-session plumbing.
//!
//! One reader and one writer task per session. The tick thread is the only
//! consumer of inbound queues and the only producer of outbound bytes;
//! tasks here never touch world state.

mod gateway;
mod session;

pub use gateway::Gateway;
pub use session::{Session, SessionRegistry, SessionState};
