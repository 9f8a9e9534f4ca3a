//! Runtime errors
//!
//! `Clone` so a single outcome can be handed to every caller awaiting a
//! shared lifecycle future.

/// Runtime error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("component `{name}` has been destroyed")]
    Destroyed { name: String },

    #[error("component `{name}` failed during {phase}: {reason}")]
    Setup { name: String, phase: &'static str, reason: String },

    #[error("bar `{id}` does not contain any items")]
    EmptyBar { id: String },

    #[error("bar `{id}` was dismissed")]
    Dismissed { id: String },

    #[error("transition cancelled")]
    TransitionCancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<foobar_dom::StorageError> for Error {
    fn from(err: foobar_dom::StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;
