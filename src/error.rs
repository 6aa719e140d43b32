//! Error taxonomy shared by the gamification core, the problem desk and the tutor.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Unknown student, achievement, problem or chat session.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected before any mutation happens.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backing store could not complete the write; nothing was committed.
    #[error("Store unavailable: {0}")]
    Store(String),
}

impl CoreError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound(format!("{} {}", what, id))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        CoreError::InvalidInput(msg.into())
    }

    /// Short machine-readable tag used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::Store(_) => "store",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
