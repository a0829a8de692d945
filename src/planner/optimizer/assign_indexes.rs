//! Index assignment
//!
//! Inspects the filter predicates of a resolved plan, matches them against
//! the indexes declared in the registry, and wraps each indexable table
//! scan into an [`IndexedScan`] placeholder carrying the tightest lookup
//! the predicates reach. The residual `Filter` node stays above the
//! wrapped scan, so a lookup that is broader than the predicate never
//! changes the rows a query returns.
//!
//! Index borrows are owned by [`IndexLookupBinding`] values: a borrow
//! either travels into the rewritten plan inside a binding or is released
//! when the binding drops, so no code path can leak or double-release.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::executor::{eval_const, Datum};
use crate::index::{
    ExpressionHash, Index, IndexHandle, IndexLookupBinding, IndexRegistry, LookupRef,
};
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::{BinaryOp, ColumnRef, Expr, IndexedScan, LogicalPlan};

use super::rules::OptimizationRule;

/// Lookups per table name. Dropping the map releases every borrow still
/// inside it.
type LookupMap = HashMap<String, IndexLookupBinding>;

/// Rewrite indexable table scans into `IndexedScan` placeholders driven
/// by the indexes the filter predicates can use.
pub struct IndexAssignment {
    registry: Arc<IndexRegistry>,
    database: String,
}

impl IndexAssignment {
    /// Create the rule for a database's indexes
    pub fn new(registry: Arc<IndexRegistry>, database: impl Into<String>) -> Self {
        Self {
            registry,
            database: database.into(),
        }
    }

    /// Collect per-table lookups for one filter predicate
    fn lookups_for(&self, e: &Expr) -> PlannerResult<LookupMap> {
        let mut result = LookupMap::new();
        match e {
            Expr::BinaryOp {
                left,
                op: BinaryOp::Or,
                right,
            } => {
                let left_map = self.lookups_for(left)?;
                let mut right_map = self.lookups_for(right)?;

                // a table missing from either branch cannot be narrowed
                // by the disjunction; bindings not moved into the result
                // release their borrows when the maps drop
                for (table, mut binding) in left_map {
                    let Some(other) = right_map.remove(&table) else {
                        continue;
                    };
                    if let Some(merged) = try_union(&binding.lookup, &other.lookup)? {
                        binding.lookup = merged;
                        binding.indexes.extend(other.indexes);
                    }
                    result.insert(table, binding);
                }
            }

            Expr::BinaryOp {
                op: BinaryOp::And, ..
            } => {
                let conjuncts = e.split_conjunction();
                let mut used = HashSet::new();

                result = self.multi_column_lookups(&conjuncts, &mut used)?;

                for (pos, conjunct) in conjuncts.iter().enumerate() {
                    if used.contains(&pos) {
                        continue;
                    }
                    let map = self.lookups_for(conjunct)?;
                    result = intersect(result, map)?;
                }
            }

            Expr::BinaryOp { left, op, right } if is_index_comparison(*op) => {
                if let Some((index, lookup)) = self.comparison_lookup(left, *op, right)? {
                    result.insert(
                        index.table().to_string(),
                        IndexLookupBinding::new(lookup, index),
                    );
                }
            }

            Expr::In {
                expr,
                list,
                negated: false,
            } => {
                // usable only when the left side carries the columns and
                // the right side evaluates without a row
                if !expr.is_evaluable() && list.is_evaluable() {
                    if let Some(index) = self
                        .registry
                        .index_by_expression(&self.database, std::slice::from_ref(expr.as_ref()))
                    {
                        let values = match eval_const(list)? {
                            Datum::Tuple(values) => values,
                            other => {
                                return Err(PlannerError::InvalidInRight(
                                    other.kind().to_string(),
                                ))
                            }
                        };
                        let Some(first) = values.first() else {
                            return Ok(result);
                        };

                        let mut lookup = index.get(std::slice::from_ref(first))?;
                        for value in &values[1..] {
                            let next = index.get(std::slice::from_ref(value))?;
                            match try_union(&lookup, &next)? {
                                Some(merged) => lookup = merged,
                                // keep the partial union; the residual
                                // filter covers the remaining values
                                None => break,
                            }
                        }

                        result.insert(
                            index.table().to_string(),
                            IndexLookupBinding::new(lookup, index),
                        );
                    }
                }
            }

            Expr::Between {
                expr: value,
                low,
                high,
                negated: false,
            } => {
                if !value.is_evaluable() && low.is_evaluable() && high.is_evaluable() {
                    if let Some(index) = self
                        .registry
                        .index_by_expression(&self.database, std::slice::from_ref(value.as_ref()))
                    {
                        let low_val = eval_const(low)?;
                        let high_val = eval_const(high)?;
                        if let Some(lookup) =
                            between_lookup(&*index, &[high_val], &[low_val])?
                        {
                            result.insert(
                                index.table().to_string(),
                                IndexLookupBinding::new(lookup, index),
                            );
                        }
                    }
                }
            }

            // everything else is opaque to index matching
            _ => {}
        }

        Ok(result)
    }

    /// Match a single comparison against a single-key index
    fn comparison_lookup(
        &self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
    ) -> PlannerResult<Option<(IndexHandle, LookupRef)>> {
        // normalize to {column-bearing} op {evaluable}, mirroring the
        // comparison when the sides swap
        let (col_side, val_side, op) = if right.is_evaluable() {
            (left, right, op)
        } else {
            (right, left, mirror(op))
        };

        if col_side.is_evaluable() || !val_side.is_evaluable() {
            return Ok(None);
        }

        let Some(index) = self
            .registry
            .index_by_expression(&self.database, std::slice::from_ref(col_side))
        else {
            return Ok(None);
        };

        let value = eval_const(val_side)?;
        Ok(lookup_by_operator(op, &*index, &[value])?.map(|lookup| (index, lookup)))
    }

    /// Match a conjunct set against composite indexes, one lookup per
    /// (table, comparison kind) group. Conjuncts consumed here are marked
    /// in `used` so the single-predicate path does not reprocess them.
    fn multi_column_lookups(
        &self,
        conjuncts: &[&Expr],
        used: &mut HashSet<usize>,
    ) -> PlannerResult<LookupMap> {
        let mut result = LookupMap::new();

        for (table, table_exprs) in column_exprs_by_table(conjuncts) {
            for group in group_by_operator(&table_exprs) {
                let cols: Vec<Expr> = group
                    .iter()
                    .map(|ce| Expr::Column(ce.col.clone()))
                    .collect();

                // longest covered prefix wins, ties broken by
                // registration order
                let mut selected: Vec<Expr> = Vec::new();
                for candidate in self
                    .registry
                    .expressions_with_indexes(&self.database, &cols)
                {
                    if candidate.len() > selected.len() {
                        selected = candidate;
                    }
                }
                if selected.is_empty() {
                    continue;
                }

                let Some((index, lookup)) =
                    self.multi_column_lookup_for(&selected, &group, used)?
                else {
                    continue;
                };

                let binding = IndexLookupBinding::new(lookup, index);
                if result.contains_key(&table) {
                    let mut single = LookupMap::new();
                    single.insert(table.clone(), binding);
                    result = intersect(result, single)?;
                } else {
                    result.insert(table.clone(), binding);
                }
            }
        }

        Ok(result)
    }

    /// Build one composite lookup for the selected key prefix
    fn multi_column_lookup_for(
        &self,
        selected: &[Expr],
        group: &[&ColumnExpr<'_>],
        used: &mut HashSet<usize>,
    ) -> PlannerResult<Option<(IndexHandle, LookupRef)>> {
        let Some(index) = self.registry.index_by_expression(&self.database, selected) else {
            return Ok(None);
        };
        let hashes = index.expression_hashes().to_vec();

        match group[0].op {
            MatchOp::Cmp(op) => {
                let mut key = Vec::with_capacity(hashes.len());
                for hash in &hashes {
                    let Some(ce) = group.iter().find(|ce| ce.hash == *hash) else {
                        return Ok(None);
                    };
                    used.insert(ce.pos);
                    let Some(value) = ce.val else {
                        return Ok(None);
                    };
                    key.push(eval_const(value)?);
                }
                Ok(lookup_by_operator(op, &*index, &key)?.map(|lookup| (index, lookup)))
            }
            MatchOp::Between => {
                let mut lowers = Vec::with_capacity(hashes.len());
                let mut uppers = Vec::with_capacity(hashes.len());
                for hash in &hashes {
                    let Some(ce) = group.iter().find(|ce| ce.hash == *hash) else {
                        return Ok(None);
                    };
                    used.insert(ce.pos);
                    let Expr::Between { low, high, .. } = ce.expr else {
                        return Ok(None);
                    };
                    lowers.push(eval_const(low)?);
                    uppers.push(eval_const(high)?);
                }
                Ok(between_lookup(&*index, &uppers, &lowers)?.map(|lookup| (index, lookup)))
            }
        }
    }
}

impl OptimizationRule for IndexAssignment {
    fn name(&self) -> &'static str {
        "assign_indexes"
    }

    fn apply(&self, plan: LogicalPlan) -> PlannerResult<LogicalPlan> {
        if !plan.is_resolved() {
            debug!("plan is not resolved, skipping index assignment");
            return Ok(plan);
        }

        // gather lookups from every filter before touching the tree; on
        // failure the partial map drops, releasing every borrow taken so
        // far, and the caller keeps an untouched plan
        let mut lookups: Option<LookupMap> = None;
        let mut failed: Option<PlannerError> = None;
        plan.visit(&mut |node| {
            if failed.is_some() {
                return false;
            }
            match node {
                // already-assigned subtrees are left alone
                LogicalPlan::IndexedScan(_) => false,
                LogicalPlan::Filter { predicate, .. } => {
                    let folded = self.lookups_for(predicate).and_then(|map| {
                        match lookups.take() {
                            Some(prev) => intersect(prev, map),
                            None => Ok(map),
                        }
                    });
                    match folded {
                        Ok(map) => lookups = Some(map),
                        Err(e) => failed = Some(e),
                    }
                    true
                }
                _ => true,
            }
        });
        if let Some(e) = failed {
            return Err(e);
        }

        let mut lookups = lookups.unwrap_or_default();
        debug!(tables = lookups.len(), "assigning indexes");

        let rewritten = plan.transform_up(&mut |node| match node {
            LogicalPlan::Scan(scan) if scan.indexable => match lookups.remove(&scan.table) {
                // moving the binding into the node transfers its borrows
                // to the plan
                Some(binding) => LogicalPlan::IndexedScan(IndexedScan::new(binding, scan)),
                None => LogicalPlan::Scan(scan),
            },
            other => other,
        });

        // whatever is left belongs to tables that are absent from the
        // plan or already wrapped; dropping the map releases them
        drop(lookups);
        Ok(rewritten)
    }
}

/// Comparison kind a multi-column group was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchOp {
    Cmp(BinaryOp),
    Between,
}

/// One indexable conjunct: the column it constrains, the value side (for
/// comparisons), the source expression and its position in the conjunct
/// list
struct ColumnExpr<'a> {
    col: &'a ColumnRef,
    hash: ExpressionHash,
    val: Option<&'a Expr>,
    expr: &'a Expr,
    op: MatchOp,
    pos: usize,
}

/// Extract the indexable shape of a conjunct, if it has one
fn classify(expr: &Expr, pos: usize) -> Option<ColumnExpr<'_>> {
    match expr {
        Expr::BinaryOp { left, op, right } if is_index_comparison(*op) => {
            let (col_side, val_side, op) = if right.is_evaluable() {
                (left.as_ref(), right.as_ref(), *op)
            } else if left.is_evaluable() {
                (right.as_ref(), left.as_ref(), mirror(*op))
            } else {
                return None;
            };
            let Expr::Column(col) = col_side else {
                return None;
            };
            Some(ColumnExpr {
                col,
                hash: ExpressionHash::of(col_side),
                val: Some(val_side),
                expr,
                op: MatchOp::Cmp(op),
                pos,
            })
        }
        Expr::Between {
            expr: value,
            low,
            high,
            negated: false,
        } => {
            if value.is_evaluable() || !low.is_evaluable() || !high.is_evaluable() {
                return None;
            }
            let Expr::Column(col) = value.as_ref() else {
                return None;
            };
            Some(ColumnExpr {
                col,
                hash: ExpressionHash::of(value),
                val: None,
                expr,
                op: MatchOp::Between,
                pos,
            })
        }
        _ => None,
    }
}

/// Group indexable conjuncts by target table, preserving first-seen order
fn column_exprs_by_table<'a>(conjuncts: &[&'a Expr]) -> Vec<(String, Vec<ColumnExpr<'a>>)> {
    let mut result: Vec<(String, Vec<ColumnExpr>)> = Vec::new();
    for (pos, expr) in conjuncts.iter().enumerate() {
        let Some(ce) = classify(expr, pos) else {
            continue;
        };
        match result.iter_mut().find(|(table, _)| *table == ce.col.table) {
            Some((_, exprs)) => exprs.push(ce),
            None => result.push((ce.col.table.clone(), vec![ce])),
        }
    }
    result
}

/// Partition a table's conjuncts by comparison kind; one composite lookup
/// never mixes kinds because the capability choice depends on the kind
fn group_by_operator<'a, 'b>(exprs: &'b [ColumnExpr<'a>]) -> Vec<Vec<&'b ColumnExpr<'a>>> {
    let mut groups: Vec<Vec<&ColumnExpr>> = Vec::new();
    for ce in exprs {
        match groups.iter_mut().find(|g| g[0].op == ce.op) {
            Some(group) => group.push(ce),
            None => groups.push(vec![ce]),
        }
    }
    groups
}

fn is_index_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Eq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
    )
}

/// Mirror a comparison around its operands: `5 > a` constrains `a < 5`
fn mirror(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::LtEq => BinaryOp::GtEq,
        BinaryOp::GtEq => BinaryOp::LtEq,
        other => other,
    }
}

/// Build the lookup matching a comparison operator, if the index has the
/// capability it needs
fn lookup_by_operator(
    op: BinaryOp,
    index: &dyn Index,
    key: &[Datum],
) -> PlannerResult<Option<LookupRef>> {
    match op {
        BinaryOp::Eq => Ok(Some(index.get(key)?)),
        BinaryOp::Gt => match index.as_descend() {
            Some(descend) => Ok(Some(descend.descend_greater(key)?)),
            None => Ok(None),
        },
        BinaryOp::GtEq => match index.as_ascend() {
            Some(ascend) => Ok(Some(ascend.ascend_greater_or_equal(key)?)),
            None => Ok(None),
        },
        BinaryOp::Lt => match index.as_ascend() {
            Some(ascend) => Ok(Some(ascend.ascend_less_than(key)?)),
            None => Ok(None),
        },
        BinaryOp::LtEq => match index.as_descend() {
            Some(descend) => Ok(Some(descend.descend_less_or_equal(key)?)),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Build the closed-interval lookup for BETWEEN: the ascending `[lo, hi)`
/// range and the descending `(lo, hi]` range union to `[lo, hi]`. Needs
/// both traversal capabilities and mergeable ranges.
fn between_lookup(
    index: &dyn Index,
    upper: &[Datum],
    lower: &[Datum],
) -> PlannerResult<Option<LookupRef>> {
    let (Some(ascend), Some(descend)) = (index.as_ascend(), index.as_descend()) else {
        return Ok(None);
    };
    let ascending = ascend.ascend_range(lower, upper)?;
    let descending = descend.descend_range(upper, lower)?;
    try_union(&ascending, &descending)
}

/// Union two lookups when they advertise mergeability for each other and
/// support set operations; `None` means the pair stays uncombined
fn try_union(a: &LookupRef, b: &LookupRef) -> PlannerResult<Option<LookupRef>> {
    let Some(mergeable) = a.as_mergeable() else {
        return Ok(None);
    };
    if !mergeable.is_mergeable(b.as_ref()) {
        return Ok(None);
    }
    let Some(ops) = a.as_set_operations() else {
        return Ok(None);
    };
    Ok(Some(ops.union(b.as_ref())?))
}

/// Intersection counterpart of [`try_union`]
fn try_intersection(a: &LookupRef, b: &LookupRef) -> PlannerResult<Option<LookupRef>> {
    let Some(mergeable) = a.as_mergeable() else {
        return Ok(None);
    };
    if !mergeable.is_mergeable(b.as_ref()) {
        return Ok(None);
    }
    let Some(ops) = a.as_set_operations() else {
        return Ok(None);
    };
    Ok(Some(ops.intersection(b.as_ref())?))
}

/// Fold two lookup maps across a conjunction. Mergeable lookups for the
/// same table intersect; unmergeable pairs keep the left entry and drop
/// the right one's borrows. Tables present on one side pass through.
fn intersect(left: LookupMap, mut right: LookupMap) -> PlannerResult<LookupMap> {
    let mut result = LookupMap::new();
    for (table, mut binding) in left {
        if let Some(other) = right.remove(&table) {
            if let Some(merged) = try_intersection(&binding.lookup, &other.lookup)? {
                binding.lookup = merged;
                binding.indexes.extend(other.indexes);
            }
        }
        result.insert(table, binding);
    }
    result.extend(right);
    Ok(result)
}
