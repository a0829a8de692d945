//! Query optimizer
//!
//! Applies optimization rules to logical plans to improve execution
//! efficiency.

pub mod assign_indexes;
pub mod rules;

pub use assign_indexes::IndexAssignment;
pub use rules::{FilterMerge, OptimizationRule, PredicatePushdown};

use std::sync::Arc;

use crate::index::IndexRegistry;
use crate::planner::error::PlannerResult;
use crate::planner::logical::LogicalPlan;

/// Query optimizer that applies a sequence of optimization rules
pub struct Optimizer {
    rules: Vec<Box<dyn OptimizationRule>>,
}

impl Optimizer {
    /// Create a new optimizer with the default rules.
    ///
    /// Filters are merged first so index assignment sees whole
    /// conjunctions, and predicates are pushed into scans only after
    /// assignment so the residual filters the rewrite relies on are
    /// still in place when it runs.
    pub fn new(registry: Arc<IndexRegistry>, database: impl Into<String>) -> Self {
        Self {
            rules: vec![
                Box::new(FilterMerge),
                Box::new(IndexAssignment::new(registry, database)),
                Box::new(PredicatePushdown),
            ],
        }
    }

    /// Create an optimizer with custom rules
    pub fn with_rules(rules: Vec<Box<dyn OptimizationRule>>) -> Self {
        Self { rules }
    }

    /// Optimize a logical plan by applying all rules
    pub fn optimize(&self, plan: LogicalPlan) -> PlannerResult<LogicalPlan> {
        let mut current = plan;
        for rule in &self.rules {
            current = rule.apply(current)?;
        }
        Ok(current)
    }

    /// Get the names of all optimization rules
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}
