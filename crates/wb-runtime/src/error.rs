//! Runtime error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A node state or mock received a message it does not accept.
    /// Programmer error; fatal to the task that delivered it.
    #[error("node '{node}' does not accept message '{message}'")]
    InvalidMessage { node: String, message: String },

    #[error("unknown node state class '{0}'")]
    UnknownNodeStateClass(String),

    #[error("unknown mock class '{0}'")]
    UnknownMockClass(String),

    #[error("mocked node '{0}' has no mock class")]
    MissingMockClass(String),

    #[error("unknown assembly class '{0}'")]
    UnknownAssemblyClass(String),

    #[error("node '{node}' is not a {expected}")]
    NodeKind {
        node: String,
        expected: &'static str,
    },

    #[error("no state for node '{0}'")]
    UnknownNode(String),

    /// A task failed to finish during teardown. Signals a bug.
    #[error("task '{0}' did not complete during teardown")]
    TaskIncomplete(String),

    #[error(transparent)]
    Config(#[from] wb_config::ConfigError),

    #[error(transparent)]
    Can(#[from] wb_canbus::CanError),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
