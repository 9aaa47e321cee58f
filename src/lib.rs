//! runegated - Runegate World Server.
//!
//! An authoritative, tick-driven MMO simulation: a single world thread at
//! 5 Hz drives phased systems over explicitly-owned state, while tokio
//! tasks handle per-session network I/O and SQLite holds the durable
//! record. The binary in `main.rs` wires these together; everything is a
//! library so the integration suite can drive the simulation directly.

pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod game;
pub mod http;
pub mod metrics;
pub mod net;
pub mod script;
pub mod world;
