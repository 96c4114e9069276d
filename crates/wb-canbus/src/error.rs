//! CAN transport error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanError {
    /// The adapter is not plugged in. Normal while waiting for the device.
    #[error("no such CAN device")]
    NoDevice,

    /// The adapter disappeared mid-session (ENODEV-class I/O error).
    #[error("CAN device lost")]
    DeviceLost,

    #[error("CAN interface error: {0}")]
    Interface(String),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("unknown message '{message}' on node '{node}'")]
    UnknownMessage { node: String, message: String },

    #[error(transparent)]
    Protocol(#[from] wb_protocol::ProtocolError),
}

/// Convenience alias for CAN transport results.
pub type CanResult<T> = Result<T, CanError>;
