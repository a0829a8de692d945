//! Optimization rules
//!
//! Rules that transform logical plans to improve execution efficiency.

use crate::planner::error::PlannerResult;
use crate::planner::logical::{Expr, LogicalPlan};

/// Optimization rule trait
pub trait OptimizationRule: Send + Sync {
    /// Rule name for debugging
    fn name(&self) -> &'static str;

    /// Apply the rule to a logical plan
    fn apply(&self, plan: LogicalPlan) -> PlannerResult<LogicalPlan>;
}

/// Merge consecutive filter nodes
pub struct FilterMerge;

impl OptimizationRule for FilterMerge {
    fn name(&self) -> &'static str {
        "filter_merge"
    }

    fn apply(&self, plan: LogicalPlan) -> PlannerResult<LogicalPlan> {
        Ok(plan.transform_up(&mut |node| match node {
            LogicalPlan::Filter { input, predicate } => match *input {
                LogicalPlan::Filter {
                    input: inner_input,
                    predicate: inner_predicate,
                } => LogicalPlan::Filter {
                    input: inner_input,
                    predicate: Expr::and(inner_predicate, predicate),
                },
                other => LogicalPlan::Filter {
                    input: Box::new(other),
                    predicate,
                },
            },
            other => other,
        }))
    }
}

/// Push filter predicates down into table scans.
///
/// `IndexedScan` placeholders are left untouched: the residual filter
/// above them is what guarantees an index lookup never changes the rows a
/// query returns.
pub struct PredicatePushdown;

impl OptimizationRule for PredicatePushdown {
    fn name(&self) -> &'static str {
        "predicate_pushdown"
    }

    fn apply(&self, plan: LogicalPlan) -> PlannerResult<LogicalPlan> {
        Ok(plan.transform_up(&mut |node| match node {
            LogicalPlan::Filter { input, predicate } => match *input {
                LogicalPlan::Scan(mut scan) => {
                    scan.filter = Some(match scan.filter.take() {
                        Some(existing) => Expr::and(existing, predicate),
                        None => predicate,
                    });
                    LogicalPlan::Scan(scan)
                }
                other => LogicalPlan::Filter {
                    input: Box::new(other),
                    predicate,
                },
            },
            other => other,
        }))
    }
}
