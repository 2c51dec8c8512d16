use std::fmt;

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// A well-formed refusal from the ledger: precondition, authorization, or
/// argument failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub operation: String,
    pub status: u16,
    pub messages: Vec<String>,
}

impl Rejection {
    pub fn new(operation: impl Into<String>, status: u16, messages: Vec<String>) -> Self {
        Self {
            operation: operation.into(),
            status,
            messages,
        }
    }

    pub fn message(&self) -> String {
        self.messages.join("; ")
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rejected with status {}: {}",
            self.operation,
            self.status,
            self.message()
        )
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Connection failure or a non-success response without an error
    /// envelope. Always fatal to the scenario.
    #[error("transport failure during {operation}: {detail}")]
    Transport { operation: String, detail: String },

    #[error("{0}")]
    Rejected(Rejection),

    /// A success response whose structure the harness does not recognize.
    #[error("unexpected response shape from {operation}: {detail}")]
    Shape { operation: String, detail: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl LedgerError {
    pub fn transport(operation: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Transport {
            operation: operation.into(),
            detail: detail.to_string(),
        }
    }

    pub fn shape(operation: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Shape {
            operation: operation.into(),
            detail: detail.to_string(),
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
