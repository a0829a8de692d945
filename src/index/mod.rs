//! Index abstractions
//!
//! An [`Index`] maps key tuples to row positions. Indexes are owned by the
//! [`IndexRegistry`] and borrowed through [`IndexHandle`] smart handles:
//! cloning a handle takes another borrow, dropping it releases one. Lookups
//! produced by an index are opaque [`IndexLookup`] values; whether two
//! lookups can be combined into unions or intersections is decided by the
//! optional [`Mergeable`] and [`SetOperations`] capabilities.

pub mod memory;
pub mod registry;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::executor::Datum;
use crate::planner::logical::Expr;

pub use memory::{MemoryIndex, MemoryLookup};
pub use registry::{IndexHandle, IndexRegistry};

/// Index layer errors
#[derive(Error, Debug)]
pub enum IndexError {
    /// An index with the same database and id is already registered
    #[error("index '{0}' is already registered")]
    AlreadyRegistered(String),

    /// A key of the wrong arity was passed to an index operation
    #[error("index '{id}' expects a key of {expected} values, got {got}")]
    KeyLength {
        id: String,
        expected: usize,
        got: usize,
    },

    /// Two lookups that do not originate from the same index were combined
    #[error("lookups from '{left}' and '{right}' cannot be combined")]
    IncompatibleLookups { left: String, right: String },
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// SHA-1 digest of an expression's canonical string form.
///
/// Index key columns are identified by hash so that an index declared on
/// `commits.commit_hash` matches that column no matter which filter
/// expression mentions it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpressionHash([u8; 20]);

impl ExpressionHash {
    /// Hash an expression's canonical string form
    pub fn of(expr: &Expr) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(expr.to_string().as_bytes());
        ExpressionHash(hasher.finalize().into())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for ExpressionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Shared reference to an index lookup
pub type LookupRef = Arc<dyn IndexLookup>;

/// A set of row positions an index-driven scan would visit
pub trait IndexLookup: fmt::Debug + Send + Sync {
    /// Row positions this lookup resolves to, in index order
    fn values(&self) -> IndexResult<Vec<u64>>;

    /// Downcast support for concrete lookup implementations
    fn as_any(&self) -> &dyn Any;

    /// Mergeability capability, if this lookup supports it
    fn as_mergeable(&self) -> Option<&dyn Mergeable> {
        None
    }

    /// Set-operation capability, if this lookup supports it
    fn as_set_operations(&self) -> Option<&dyn SetOperations> {
        None
    }
}

/// Capability: decide whether another lookup can be combined with this one
pub trait Mergeable: IndexLookup {
    /// True when `other` originates from the same physical index with a
    /// compatible direction
    fn is_mergeable(&self, other: &dyn IndexLookup) -> bool;
}

/// Capability: combine lookups set-theoretically
pub trait SetOperations: IndexLookup {
    /// Rows visited by either lookup
    fn union(&self, other: &dyn IndexLookup) -> IndexResult<LookupRef>;

    /// Rows visited by both lookups
    fn intersection(&self, other: &dyn IndexLookup) -> IndexResult<LookupRef>;
}

/// A catalog-managed index over one or more key expressions
pub trait Index: fmt::Debug + Send + Sync {
    /// Database the index belongs to
    fn database(&self) -> &str;

    /// Table the index belongs to
    fn table(&self) -> &str;

    /// Identifier, unique within the database
    fn id(&self) -> &str;

    /// Hashes of the key column expressions, in declared key order
    fn expression_hashes(&self) -> &[ExpressionHash];

    /// Point lookup on a full key
    fn get(&self, key: &[Datum]) -> IndexResult<LookupRef>;

    /// Ascending-order capability, if supported
    fn as_ascend(&self) -> Option<&dyn AscendIndex> {
        None
    }

    /// Descending-order capability, if supported
    fn as_descend(&self) -> Option<&dyn DescendIndex> {
        None
    }
}

/// Capability: ascending ordered traversal
pub trait AscendIndex: Index {
    /// Keys greater than or equal to `key`
    fn ascend_greater_or_equal(&self, key: &[Datum]) -> IndexResult<LookupRef>;

    /// Keys strictly less than `key`
    fn ascend_less_than(&self, key: &[Datum]) -> IndexResult<LookupRef>;

    /// Keys in `[from, to)`
    fn ascend_range(&self, from: &[Datum], to: &[Datum]) -> IndexResult<LookupRef>;
}

/// Capability: descending ordered traversal
pub trait DescendIndex: Index {
    /// Keys strictly greater than `key`
    fn descend_greater(&self, key: &[Datum]) -> IndexResult<LookupRef>;

    /// Keys less than or equal to `key`
    fn descend_less_or_equal(&self, key: &[Datum]) -> IndexResult<LookupRef>;

    /// Keys in `(to, from]`, visited from `from` downwards
    fn descend_range(&self, from: &[Datum], to: &[Datum]) -> IndexResult<LookupRef>;
}

/// A lookup together with every borrowed index that contributed to it.
///
/// Keeping the handles next to the lookup makes release and transfer
/// atomic: dropping the binding releases all contributing borrows, moving
/// it into a plan node transfers them.
#[derive(Debug, Clone)]
pub struct IndexLookupBinding {
    /// The combined lookup
    pub lookup: LookupRef,
    /// Borrowed indexes backing the lookup
    pub indexes: Vec<IndexHandle>,
}

impl IndexLookupBinding {
    /// Bind a lookup to the single index that produced it
    pub fn new(lookup: LookupRef, index: IndexHandle) -> Self {
        Self {
            lookup,
            indexes: vec![index],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::planner::logical::{ColumnRef, Literal};

    fn col(table: &str, name: &str) -> Expr {
        Expr::Column(ColumnRef {
            table: table.to_string(),
            name: name.to_string(),
            index: 0,
            data_type: DataType::Int,
            nullable: true,
        })
    }

    #[test]
    fn test_expression_hash_tracks_canonical_form() {
        let a = col("commits", "commit_hash");
        let b = col("commits", "commit_hash");
        let c = col("commits", "commit_author_name");

        assert_eq!(ExpressionHash::of(&a), ExpressionHash::of(&b));
        assert_ne!(ExpressionHash::of(&a), ExpressionHash::of(&c));

        // the hash covers the whole subtree, not just the root
        let lit1 = Expr::Literal(Literal::Integer(1));
        let lit2 = Expr::Literal(Literal::Integer(2));
        assert_ne!(ExpressionHash::of(&lit1), ExpressionHash::of(&lit2));
    }
}
