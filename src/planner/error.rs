//! Planner error types

use std::fmt;

use crate::executor::ExecutorError;
use crate::index::IndexError;

/// Planner error
#[derive(Debug)]
pub enum PlannerError {
    /// The right hand side of an IN did not evaluate to a tuple
    InvalidInRight(String),
    /// Evaluating a constant expression failed
    Eval(ExecutorError),
    /// An index operation failed
    Index(IndexError),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::InvalidInRight(kind) => write!(
                f,
                "expecting evaluation of IN expression right hand side to be a tuple, but it is {}",
                kind
            ),
            PlannerError::Eval(e) => write!(f, "constant evaluation failed: {}", e),
            PlannerError::Index(e) => write!(f, "index error: {}", e),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::Eval(e) => Some(e),
            PlannerError::Index(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExecutorError> for PlannerError {
    fn from(e: ExecutorError) -> Self {
        PlannerError::Eval(e)
    }
}

impl From<IndexError> for PlannerError {
    fn from(e: IndexError) -> Self {
        PlannerError::Index(e)
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
