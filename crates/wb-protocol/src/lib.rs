//! Wire-level CAN building blocks for WortBot.
//!
//! Provides the 29-bit extended frame type, J1939-style PGN/CAN-ID math,
//! bit-level signal and message codecs, on/off helpers, and DBC database
//! generation. This crate does no I/O.

pub mod dbc;
pub mod error;
pub mod frame;
pub mod message;
pub mod onoff;
pub mod signal;

// Re-export key types for convenience
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{BROADCAST_ADDR, Frame, can_id_to_pgn, pgn_to_can_id};
pub use message::{Direction, MessageDef};
pub use onoff::{format_on_off, parse_on_off};
pub use signal::{Payload, SignalDef, SignalKind, Value};
