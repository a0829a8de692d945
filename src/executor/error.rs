//! Executor error types

use std::fmt;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Executor errors
#[derive(Debug)]
pub enum ExecutorError {
    /// Invalid operation (e.g., division by zero)
    InvalidOperation(String),

    /// A row was indexed past its width
    ColumnOutOfRange { index: usize, width: usize },

    /// Table not found
    TableNotFound(String),

    /// A placeholder plan node was executed directly instead of being
    /// replaced by a later planning phase
    PlaceholderNotExecutable(String),

    /// Plan contains unresolved references
    NotResolved(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            ExecutorError::ColumnOutOfRange { index, width } => {
                write!(f, "column {} is out of range for a row of {} columns", index, width)
            }
            ExecutorError::TableNotFound(name) => write!(f, "table not found: {}", name),
            ExecutorError::PlaceholderNotExecutable(node) => {
                write!(f, "{} is a placeholder node and cannot be executed", node)
            }
            ExecutorError::NotResolved(name) => {
                write!(f, "unresolved table reference: {}", name)
            }
        }
    }
}

impl std::error::Error for ExecutorError {}
