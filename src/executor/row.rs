//! Result rows
//!
//! A `Row` is an ordered list of datums addressed by resolved column
//! position. Rows deref to slices, so callers index and iterate them
//! like any other sequence; `get` is the checked accessor expression
//! evaluation uses.

use std::ops::Deref;

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};

/// One result row
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Row(Vec<Datum>);

impl Row {
    /// Build a row from its values
    pub fn new(values: Vec<Datum>) -> Self {
        Self(values)
    }

    /// Value at a column position, or an error when the position is past
    /// the row's width
    pub fn get(&self, index: usize) -> ExecutorResult<&Datum> {
        self.0.get(index).ok_or(ExecutorError::ColumnOutOfRange {
            index,
            width: self.0.len(),
        })
    }

    /// Append another row's values, producing the combined row a join
    /// emits
    pub fn concat(mut self, other: Row) -> Row {
        self.0.extend(other.0);
        self
    }
}

impl Deref for Row {
    type Target = [Datum];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
