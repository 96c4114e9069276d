//! Configuration error types. All fatal at startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("duplicate {kind} key '{key}'")]
    Duplicate { kind: &'static str, key: String },

    #[error("unresolved {kind} reference '{reference}' in {context}")]
    UnresolvedRef {
        kind: &'static str,
        reference: String,
        context: String,
    },

    #[error("node '{node}': address {addr} out of [0, 254]")]
    NodeAddr { node: String, addr: u16 },

    #[error("duplicate PGN 0x{pgn:05X} within direction {direction}")]
    DuplicatePgn { pgn: u32, direction: &'static str },

    #[error("assembly '{assembly}': missing role '{role}'")]
    MissingRole { assembly: String, role: String },

    #[error("assembly '{assembly}': role '{role}' expects a single node")]
    RoleCardinality { assembly: String, role: String },

    #[error("assembly '{assembly}': missing param '{name}'")]
    MissingParam { assembly: String, name: String },

    #[error("assembly '{assembly}': param '{name}' is malformed: {reason}")]
    BadParam {
        assembly: String,
        name: String,
        reason: String,
    },

    #[error(transparent)]
    Protocol(#[from] wb_protocol::ProtocolError),

    #[error("{0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
