//! In-memory index implementation
//!
//! Backs embedded use and the test suites: a sorted list of key tuples
//! mapping to row positions, with optional ascending and descending
//! traversal capabilities so capability-dependent planner behavior can be
//! exercised.

use std::any::Any;
use std::sync::Arc;

use crate::executor::Datum;
use crate::planner::logical::Expr;

use super::{
    AscendIndex, DescendIndex, ExpressionHash, Index, IndexError, IndexLookup, IndexResult,
    LookupRef, Mergeable, SetOperations,
};

/// Sorted in-memory index over key tuples
#[derive(Debug)]
pub struct MemoryIndex {
    database: String,
    table: String,
    id: String,
    hashes: Vec<ExpressionHash>,
    // sorted by key
    entries: Vec<(Vec<Datum>, u64)>,
    ascend: bool,
    descend: bool,
}

impl MemoryIndex {
    /// Create an empty index keyed on the given expressions, with both
    /// traversal capabilities enabled
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        id: impl Into<String>,
        keys: &[Expr],
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            id: id.into(),
            hashes: keys.iter().map(ExpressionHash::of).collect(),
            entries: Vec::new(),
            ascend: true,
            descend: true,
        }
    }

    /// Enable or disable ascending traversal
    #[must_use]
    pub fn ascend(mut self, enabled: bool) -> Self {
        self.ascend = enabled;
        self
    }

    /// Enable or disable descending traversal
    #[must_use]
    pub fn descend(mut self, enabled: bool) -> Self {
        self.descend = enabled;
        self
    }

    /// Insert a key for a row position
    pub fn insert(&mut self, key: Vec<Datum>, row: u64) {
        let at = self
            .entries
            .partition_point(|(k, r)| (k, r) < (&key, &row));
        self.entries.insert(at, (key, row));
    }

    fn check_key(&self, key: &[Datum]) -> IndexResult<()> {
        if key.len() > self.hashes.len() {
            return Err(IndexError::KeyLength {
                id: self.id.clone(),
                expected: self.hashes.len(),
                got: key.len(),
            });
        }
        Ok(())
    }

    fn lookup<F>(&self, pred: F, reverse: bool) -> LookupRef
    where
        F: Fn(&[Datum]) -> bool,
    {
        let mut rows: Vec<u64> = self
            .entries
            .iter()
            .filter(|(k, _)| pred(k))
            .map(|(_, row)| *row)
            .collect();
        if reverse {
            rows.reverse();
        }
        Arc::new(MemoryLookup {
            index_id: self.id.clone(),
            rows,
        })
    }
}

impl Index for MemoryIndex {
    fn database(&self) -> &str {
        &self.database
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn expression_hashes(&self) -> &[ExpressionHash] {
        &self.hashes
    }

    fn get(&self, key: &[Datum]) -> IndexResult<LookupRef> {
        if key.len() != self.hashes.len() {
            return Err(IndexError::KeyLength {
                id: self.id.clone(),
                expected: self.hashes.len(),
                got: key.len(),
            });
        }
        Ok(self.lookup(|k| k == key, false))
    }

    fn as_ascend(&self) -> Option<&dyn AscendIndex> {
        if self.ascend {
            Some(self)
        } else {
            None
        }
    }

    fn as_descend(&self) -> Option<&dyn DescendIndex> {
        if self.descend {
            Some(self)
        } else {
            None
        }
    }
}

impl AscendIndex for MemoryIndex {
    fn ascend_greater_or_equal(&self, key: &[Datum]) -> IndexResult<LookupRef> {
        self.check_key(key)?;
        Ok(self.lookup(|k| k >= key, false))
    }

    fn ascend_less_than(&self, key: &[Datum]) -> IndexResult<LookupRef> {
        self.check_key(key)?;
        Ok(self.lookup(|k| k < key, false))
    }

    fn ascend_range(&self, from: &[Datum], to: &[Datum]) -> IndexResult<LookupRef> {
        self.check_key(from)?;
        self.check_key(to)?;
        Ok(self.lookup(|k| k >= from && k < to, false))
    }
}

impl DescendIndex for MemoryIndex {
    fn descend_greater(&self, key: &[Datum]) -> IndexResult<LookupRef> {
        self.check_key(key)?;
        Ok(self.lookup(|k| k > key, true))
    }

    fn descend_less_or_equal(&self, key: &[Datum]) -> IndexResult<LookupRef> {
        self.check_key(key)?;
        Ok(self.lookup(|k| k <= key, true))
    }

    fn descend_range(&self, from: &[Datum], to: &[Datum]) -> IndexResult<LookupRef> {
        self.check_key(from)?;
        self.check_key(to)?;
        Ok(self.lookup(|k| k <= from && k > to, true))
    }
}

/// Lookup produced by a [`MemoryIndex`]: a resolved set of row positions
#[derive(Debug, Clone)]
pub struct MemoryLookup {
    index_id: String,
    rows: Vec<u64>,
}

impl MemoryLookup {
    fn merged<F>(&self, other: &dyn IndexLookup, combine: F) -> IndexResult<LookupRef>
    where
        F: Fn(&[u64], &[u64]) -> Vec<u64>,
    {
        let other = other
            .as_any()
            .downcast_ref::<MemoryLookup>()
            .filter(|o| o.index_id == self.index_id)
            .ok_or_else(|| IndexError::IncompatibleLookups {
                left: self.index_id.clone(),
                right: format!("{:?}", other),
            })?;
        Ok(Arc::new(MemoryLookup {
            index_id: self.index_id.clone(),
            rows: combine(&self.rows, &other.rows),
        }))
    }
}

impl IndexLookup for MemoryLookup {
    fn values(&self) -> IndexResult<Vec<u64>> {
        Ok(self.rows.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_mergeable(&self) -> Option<&dyn Mergeable> {
        Some(self)
    }

    fn as_set_operations(&self) -> Option<&dyn SetOperations> {
        Some(self)
    }
}

impl Mergeable for MemoryLookup {
    fn is_mergeable(&self, other: &dyn IndexLookup) -> bool {
        other
            .as_any()
            .downcast_ref::<MemoryLookup>()
            .is_some_and(|o| o.index_id == self.index_id)
    }
}

impl SetOperations for MemoryLookup {
    fn union(&self, other: &dyn IndexLookup) -> IndexResult<LookupRef> {
        self.merged(other, |a, b| {
            let mut rows: Vec<u64> = a.iter().chain(b.iter()).copied().collect();
            rows.sort_unstable();
            rows.dedup();
            rows
        })
    }

    fn intersection(&self, other: &dyn IndexLookup) -> IndexResult<LookupRef> {
        self.merged(other, |a, b| {
            let mut rows: Vec<u64> = a.iter().filter(|r| b.contains(r)).copied().collect();
            rows.sort_unstable();
            rows.dedup();
            rows
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::planner::logical::ColumnRef;

    fn col(name: &str) -> Expr {
        Expr::Column(ColumnRef {
            table: "t".to_string(),
            name: name.to_string(),
            index: 0,
            data_type: DataType::Int,
            nullable: true,
        })
    }

    fn sample_index() -> MemoryIndex {
        let mut idx = MemoryIndex::new("db", "t", "idx_a", &[col("a")]);
        for (i, v) in [10, 20, 30, 40].iter().enumerate() {
            idx.insert(vec![Datum::Int(*v)], i as u64);
        }
        idx
    }

    #[test]
    fn test_point_get() {
        let idx = sample_index();
        let lookup = idx.get(&[Datum::Int(30)]).unwrap();
        assert_eq!(lookup.values().unwrap(), vec![2]);

        let miss = idx.get(&[Datum::Int(99)]).unwrap();
        assert!(miss.values().unwrap().is_empty());

        assert!(matches!(
            idx.get(&[Datum::Int(1), Datum::Int(2)]),
            Err(IndexError::KeyLength { .. })
        ));
    }

    #[test]
    fn test_ordered_traversal() {
        let idx = sample_index();
        let ascend = idx.as_ascend().unwrap();
        let descend = idx.as_descend().unwrap();

        let gte = ascend.ascend_greater_or_equal(&[Datum::Int(20)]).unwrap();
        assert_eq!(gte.values().unwrap(), vec![1, 2, 3]);

        let lt = ascend.ascend_less_than(&[Datum::Int(30)]).unwrap();
        assert_eq!(lt.values().unwrap(), vec![0, 1]);

        let gt = descend.descend_greater(&[Datum::Int(20)]).unwrap();
        assert_eq!(gt.values().unwrap(), vec![3, 2]);

        let lte = descend.descend_less_or_equal(&[Datum::Int(20)]).unwrap();
        assert_eq!(lte.values().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_range_union_covers_closed_interval() {
        let idx = sample_index();
        // [20, 40) ascending plus (20, 40] descending union to [20, 40]
        let asc = idx
            .as_ascend()
            .unwrap()
            .ascend_range(&[Datum::Int(20)], &[Datum::Int(40)])
            .unwrap();
        let desc = idx
            .as_descend()
            .unwrap()
            .descend_range(&[Datum::Int(40)], &[Datum::Int(20)])
            .unwrap();

        assert_eq!(asc.values().unwrap(), vec![1, 2]);
        assert_eq!(desc.values().unwrap(), vec![3, 2]);

        assert!(asc.as_mergeable().unwrap().is_mergeable(desc.as_ref()));
        let both = asc
            .as_set_operations()
            .unwrap()
            .union(desc.as_ref())
            .unwrap();
        assert_eq!(both.values().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_lookups_from_different_indexes_do_not_merge() {
        let idx_a = sample_index();
        let mut idx_b = MemoryIndex::new("db", "t", "idx_b", &[col("b")]);
        idx_b.insert(vec![Datum::Int(1)], 0);

        let la = idx_a.get(&[Datum::Int(10)]).unwrap();
        let lb = idx_b.get(&[Datum::Int(1)]).unwrap();

        assert!(!la.as_mergeable().unwrap().is_mergeable(lb.as_ref()));
        assert!(matches!(
            la.as_set_operations().unwrap().union(lb.as_ref()),
            Err(IndexError::IncompatibleLookups { .. })
        ));
    }

    #[test]
    fn test_capability_toggles() {
        let idx = MemoryIndex::new("db", "t", "idx", &[col("a")])
            .ascend(false)
            .descend(false);
        assert!(idx.as_ascend().is_none());
        assert!(idx.as_descend().is_none());

        let idx = MemoryIndex::new("db", "t", "idx2", &[col("a")]).descend(false);
        assert!(idx.as_ascend().is_some());
        assert!(idx.as_descend().is_none());
    }

    #[test]
    fn test_intersection() {
        let idx = sample_index();
        let gte20 = idx
            .as_ascend()
            .unwrap()
            .ascend_greater_or_equal(&[Datum::Int(20)])
            .unwrap();
        let lt40 = idx
            .as_ascend()
            .unwrap()
            .ascend_less_than(&[Datum::Int(40)])
            .unwrap();
        let both = gte20
            .as_set_operations()
            .unwrap()
            .intersection(lt40.as_ref())
            .unwrap();
        assert_eq!(both.values().unwrap(), vec![1, 2]);
    }
}
