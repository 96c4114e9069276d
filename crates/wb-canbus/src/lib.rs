//! CAN transport for WortBot.
//!
//! Owns the physical bus behind a trait-based driver abstraction (SocketCAN
//! on Linux, a virtual driver for mock-only setups, a scripted mock for
//! tests), publishes connection lifecycle events, and hosts the bidirectional
//! message registry that turns raw frames into `(node, message, payload)`
//! triples and back.

pub mod driver;
pub mod error;
pub mod mock;
pub mod port;
pub mod registry;

#[cfg(target_os = "linux")]
pub mod socketcan;

// Re-export key types for convenience
pub use driver::{BusDriver, BusHandle, VirtualBusDriver};
pub use error::{CanError, CanResult};
pub use mock::MockBusDriver;
pub use port::{CanPort, PortEvent, connect_loop};
pub use registry::MessageRegistry;
