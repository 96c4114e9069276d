//! Protocol error types.

use thiserror::Error;

/// Errors from signal/message codecs and frame handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    #[error("unknown message '{0}'")]
    UnknownMessage(String),

    #[error("payload is missing signal '{0}'")]
    MissingSignal(String),

    #[error("signal '{signal}': invalid flag byte 0x{value:02X}")]
    InvalidFlag { signal: String, value: u64 },

    #[error("signal '{signal}': expected a {expected} value")]
    KindMismatch {
        signal: String,
        expected: &'static str,
    },

    #[error("signal '{signal}': {reason}")]
    InvalidSignal { signal: String, reason: String },

    #[error("frame data too short: {0} bytes")]
    ShortFrame(usize),

    #[error("invalid on/off token '{0}'")]
    InvalidOnOff(String),
}

/// Convenience alias for protocol results.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
