//! Index registry - process-wide index ownership and borrow counting
//!
//! The registry is shared by every query compilation, so its state sits
//! behind a lock. Borrows are tracked per index: [`IndexRegistry::index_by_expression`]
//! and [`IndexRegistry::expressions_with_indexes`] hand out work through
//! [`IndexHandle`] values whose clone/drop adjust the borrow count, which
//! keeps release exactly paired with acquisition on every code path.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::planner::logical::Expr;

use super::{ExpressionHash, Index, IndexError, IndexResult};

struct Registered {
    index: Arc<dyn Index>,
    uses: Arc<AtomicUsize>,
}

/// Process-wide registry of live indexes
#[derive(Default)]
pub struct IndexRegistry {
    // registration order is preserved so candidate selection is deterministic
    entries: RwLock<Vec<Registered>>,
}

impl IndexRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register an index. Fails if an index with the same database and id
    /// already exists.
    pub fn register(&self, index: Arc<dyn Index>) -> IndexResult<()> {
        let mut entries = self.entries.write();
        if entries
            .iter()
            .any(|e| e.index.database() == index.database() && e.index.id() == index.id())
        {
            return Err(IndexError::AlreadyRegistered(index.id().to_string()));
        }
        trace!(id = index.id(), table = index.table(), "registering index");
        entries.push(Registered {
            index,
            uses: Arc::new(AtomicUsize::new(0)),
        });
        Ok(())
    }

    /// Borrow the index keyed by exactly the given expressions, matched by
    /// hash in declared key order.
    pub fn index_by_expression(&self, database: &str, exprs: &[Expr]) -> Option<IndexHandle> {
        let hashes: Vec<ExpressionHash> = exprs.iter().map(ExpressionHash::of).collect();
        let entries = self.entries.read();
        for entry in entries.iter() {
            if entry.index.database() == database && entry.index.expression_hashes() == &hashes[..]
            {
                return Some(IndexHandle::new(
                    entry.index.clone(),
                    entry.uses.clone(),
                ));
            }
        }
        None
    }

    /// For each registered index in the database, return the longest prefix
    /// of its key expressions that is fully covered by `columns`. Prefixes
    /// are returned in registration order, each expressed with the caller's
    /// own expressions rearranged into the index's key order.
    pub fn expressions_with_indexes(&self, database: &str, columns: &[Expr]) -> Vec<Vec<Expr>> {
        let hashes: Vec<ExpressionHash> = columns.iter().map(ExpressionHash::of).collect();
        let entries = self.entries.read();

        let mut result = Vec::new();
        for entry in entries.iter() {
            if entry.index.database() != database {
                continue;
            }

            let mut covered = Vec::new();
            for key_hash in entry.index.expression_hashes() {
                match hashes.iter().position(|h| h == key_hash) {
                    Some(pos) => covered.push(columns[pos].clone()),
                    None => break,
                }
            }

            if !covered.is_empty() {
                result.push(covered);
            }
        }
        result
    }

    /// Current number of outstanding borrows of an index
    pub fn use_count(&self, database: &str, id: &str) -> Option<usize> {
        let entries = self.entries.read();
        entries
            .iter()
            .find(|e| e.index.database() == database && e.index.id() == id)
            .map(|e| e.uses.load(Ordering::SeqCst))
    }

    /// Total outstanding borrows across all indexes
    pub fn outstanding_borrows(&self) -> usize {
        let entries = self.entries.read();
        entries
            .iter()
            .map(|e| e.uses.load(Ordering::SeqCst))
            .sum()
    }
}

/// Borrowed reference to a registered index.
///
/// The handle is the borrow: creating or cloning one increments the
/// index's use count, dropping it decrements. Embedding a handle in a plan
/// node therefore transfers the borrow to the plan, and the release
/// happens when the plan itself is dropped.
pub struct IndexHandle {
    index: Arc<dyn Index>,
    uses: Arc<AtomicUsize>,
}

impl IndexHandle {
    fn new(index: Arc<dyn Index>, uses: Arc<AtomicUsize>) -> Self {
        uses.fetch_add(1, Ordering::SeqCst);
        trace!(id = index.id(), "index borrowed");
        Self { index, uses }
    }
}

impl Deref for IndexHandle {
    type Target = dyn Index;

    fn deref(&self) -> &Self::Target {
        self.index.as_ref()
    }
}

impl Clone for IndexHandle {
    fn clone(&self) -> Self {
        Self::new(self.index.clone(), self.uses.clone())
    }
}

impl Drop for IndexHandle {
    fn drop(&mut self) {
        self.uses.fetch_sub(1, Ordering::SeqCst);
        trace!(id = self.index.id(), "index released");
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("id", &self.index.id())
            .field("table", &self.index.table())
            .finish()
    }
}
