//! Logical plan interpreter
//!
//! Runs a logical plan against an in-memory database, row at a time.
//! Placeholder nodes produced by the analyzer are not executable here:
//! an [`IndexedScan`](crate::planner::logical::IndexedScan) must be
//! replaced by a real index-driven scan before execution.

use crate::planner::logical::{JoinType, LogicalPlan};
use crate::storage::MemoryDatabase;

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::eval::eval;
use super::row::Row;

/// Execute a logical plan and collect its rows
pub fn run(plan: &LogicalPlan, db: &MemoryDatabase) -> ExecutorResult<Vec<Row>> {
    match plan {
        LogicalPlan::UnresolvedScan { table } => {
            Err(ExecutorError::NotResolved(table.clone()))
        }

        LogicalPlan::Scan(scan) => {
            let table = db
                .table(&scan.table)
                .ok_or_else(|| ExecutorError::TableNotFound(scan.table.clone()))?;
            let mut out = Vec::new();
            for row in table.rows() {
                if let Some(filter) = &scan.filter {
                    if eval(filter, row)?.as_bool() != Some(true) {
                        continue;
                    }
                }
                out.push(row.clone());
            }
            Ok(out)
        }

        LogicalPlan::IndexedScan(indexed) => Err(ExecutorError::PlaceholderNotExecutable(
            format!("IndexedScan({})", indexed.name()),
        )),

        LogicalPlan::Filter { input, predicate } => {
            let mut out = Vec::new();
            for row in run(input, db)? {
                if eval(predicate, &row)?.as_bool() == Some(true) {
                    out.push(row);
                }
            }
            Ok(out)
        }

        LogicalPlan::Project { input, expressions } => {
            let mut out = Vec::new();
            for row in run(input, db)? {
                let mut values = Vec::with_capacity(expressions.len());
                for (expr, _) in expressions {
                    values.push(eval(expr, &row)?);
                }
                out.push(Row::new(values));
            }
            Ok(out)
        }

        LogicalPlan::Join {
            left,
            right,
            join_type,
            condition,
        } => {
            let left_rows = run(left, db)?;
            let right_rows = run(right, db)?;
            let mut out = Vec::new();
            for lrow in &left_rows {
                for rrow in &right_rows {
                    let row = lrow.clone().concat(rrow.clone());
                    let keep = match (join_type, condition) {
                        (JoinType::Cross, None) => true,
                        (_, Some(cond)) => eval(cond, &row)?.as_bool() == Some(true),
                        (JoinType::Inner, None) => true,
                    };
                    if keep {
                        out.push(row);
                    }
                }
            }
            Ok(out)
        }

        LogicalPlan::Sort { input, order_by } => {
            let rows = run(input, db)?;
            let mut keyed: Vec<(Vec<Datum>, Row)> = Vec::with_capacity(rows.len());
            for row in rows {
                let mut keys = Vec::with_capacity(order_by.len());
                for (expr, _) in order_by {
                    keys.push(eval(expr, &row)?);
                }
                keyed.push((keys, row));
            }
            keyed.sort_by(|(a, _), (b, _)| {
                for (i, (_, ascending)) in order_by.iter().enumerate() {
                    let ord = a[i].cmp(&b[i]);
                    let ord = if *ascending { ord } else { ord.reverse() };
                    if !ord.is_eq() {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
            Ok(keyed.into_iter().map(|(_, row)| row).collect())
        }

        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => {
            let rows = run(input, db)?;
            let skip = offset.unwrap_or(0) as usize;
            let take = limit.map(|l| l as usize).unwrap_or(usize::MAX);
            Ok(rows.into_iter().skip(skip).take(take).collect())
        }
    }
}
