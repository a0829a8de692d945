//! Logical plan representation
//!
//! Logical plans represent the structure of a query before physical
//! implementation details are decided. The analyzer rules walk and
//! rewrite this tree; scans of indexable tables may be replaced by
//! [`IndexedScan`] placeholders carrying an index lookup.

pub mod expr;

pub use expr::{BinaryOp, ColumnId, ColumnRef, Expr, Literal, OutputColumn, UnaryOp};

use std::fmt;

use crate::catalog::{DataType, TableDef};
use crate::index::IndexLookupBinding;

/// JOIN type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Cross,
}

/// Scan of a base table
#[derive(Debug, Clone)]
pub struct TableScan {
    /// Table name
    pub table: String,
    /// Output columns of the scan
    pub columns: Vec<OutputColumn>,
    /// Whether the backing table accepts an index lookup at execution time
    pub indexable: bool,
    /// Optional pushed-down filter predicate
    pub filter: Option<Expr>,
}

impl TableScan {
    /// Build a scan over every column of a table definition
    pub fn from_def(def: &TableDef) -> Self {
        Self {
            table: def.name.clone(),
            columns: def
                .columns
                .iter()
                .enumerate()
                .map(|(id, col)| OutputColumn {
                    id,
                    name: col.name.clone(),
                    data_type: col.data_type.clone(),
                    nullable: col.nullable,
                })
                .collect(),
            indexable: def.indexable,
            filter: None,
        }
    }
}

/// Placeholder produced by index assignment: an indexable table scan
/// together with the lookup the executor should drive it with.
///
/// Schema, name and display delegate to the wrapped scan. The node itself
/// is not executable; a later phase replaces it with an index-driven scan.
#[derive(Debug, Clone)]
pub struct IndexedScan {
    /// The lookup and the borrowed indexes backing it
    pub binding: IndexLookupBinding,
    /// The wrapped table scan
    pub scan: TableScan,
}

impl IndexedScan {
    /// Wrap a table scan with a lookup binding
    pub fn new(binding: IndexLookupBinding, scan: TableScan) -> Self {
        Self { binding, scan }
    }

    /// Name of the wrapped table
    pub fn name(&self) -> &str {
        &self.scan.table
    }
}

/// Logical plan node
#[derive(Debug, Clone)]
pub enum LogicalPlan {
    /// Table reference not yet resolved against the catalog
    UnresolvedScan { table: String },

    /// Table scan - read all rows from a table
    Scan(TableScan),

    /// Indexable table scan wrapped with an index lookup
    IndexedScan(IndexedScan),

    /// Filter rows based on a predicate
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },

    /// Project columns (SELECT list)
    Project {
        input: Box<LogicalPlan>,
        /// (expression, alias)
        expressions: Vec<(Expr, String)>,
    },

    /// Join two inputs
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        condition: Option<Expr>,
    },

    /// Sort rows
    Sort {
        input: Box<LogicalPlan>,
        /// (expression, ascending)
        order_by: Vec<(Expr, bool)>,
    },

    /// Limit rows returned
    Limit {
        input: Box<LogicalPlan>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
}

impl LogicalPlan {
    /// Direct children of this node
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::UnresolvedScan { .. }
            | LogicalPlan::Scan(_)
            | LogicalPlan::IndexedScan(_) => vec![],
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. } => vec![input],
            LogicalPlan::Join { left, right, .. } => vec![left, right],
        }
    }

    /// Pre-order traversal. The visitor returns whether to descend into
    /// the node's children.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&LogicalPlan) -> bool,
    {
        if f(self) {
            for child in self.children() {
                child.visit(f);
            }
        }
    }

    /// Rebuild the tree bottom-up: children are transformed first, then
    /// the rebuilt node is passed to `f`.
    pub fn transform_up<F>(self, f: &mut F) -> LogicalPlan
    where
        F: FnMut(LogicalPlan) -> LogicalPlan,
    {
        let node = match self {
            LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
                input: Box::new(input.transform_up(f)),
                predicate,
            },
            LogicalPlan::Project { input, expressions } => LogicalPlan::Project {
                input: Box::new(input.transform_up(f)),
                expressions,
            },
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => LogicalPlan::Join {
                left: Box::new(left.transform_up(f)),
                right: Box::new(right.transform_up(f)),
                join_type,
                condition,
            },
            LogicalPlan::Sort { input, order_by } => LogicalPlan::Sort {
                input: Box::new(input.transform_up(f)),
                order_by,
            },
            LogicalPlan::Limit {
                input,
                limit,
                offset,
            } => LogicalPlan::Limit {
                input: Box::new(input.transform_up(f)),
                limit,
                offset,
            },
            leaf => leaf,
        };
        f(node)
    }

    /// A plan is resolved when every table reference has been resolved
    pub fn is_resolved(&self) -> bool {
        let mut resolved = true;
        self.visit(&mut |node| {
            if matches!(node, LogicalPlan::UnresolvedScan { .. }) {
                resolved = false;
            }
            resolved
        });
        resolved
    }

    /// Get the output columns of this plan node
    pub fn output_columns(&self) -> Vec<OutputColumn> {
        match self {
            LogicalPlan::UnresolvedScan { .. } => vec![],
            LogicalPlan::Scan(scan) => scan.columns.clone(),
            LogicalPlan::IndexedScan(indexed) => indexed.scan.columns.clone(),

            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. } => input.output_columns(),

            LogicalPlan::Project { expressions, .. } => expressions
                .iter()
                .enumerate()
                .map(|(i, (expr, alias))| OutputColumn {
                    id: i,
                    name: alias.clone(),
                    data_type: expr.data_type(),
                    nullable: expr.is_nullable(),
                })
                .collect(),

            LogicalPlan::Join { left, right, .. } => {
                let mut cols = left.output_columns();
                let offset = cols.len();
                for mut col in right.output_columns() {
                    col.id += offset;
                    cols.push(col);
                }
                cols
            }
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        match self {
            LogicalPlan::UnresolvedScan { table } => {
                writeln!(f, "{}UnresolvedScan: {}", prefix, table)?;
            }
            LogicalPlan::Scan(scan) => {
                let cols: Vec<_> = scan.columns.iter().map(|c| c.name.as_str()).collect();
                writeln!(f, "{}Scan: {} [{}]", prefix, scan.table, cols.join(", "))?;
                if let Some(filter) = &scan.filter {
                    writeln!(f, "{}  filter: {}", prefix, filter)?;
                }
            }
            LogicalPlan::IndexedScan(indexed) => {
                writeln!(
                    f,
                    "{}IndexedScan: {} lookup={:?}",
                    prefix,
                    indexed.name(),
                    indexed.binding.lookup
                )?;
            }
            LogicalPlan::Filter { input, predicate } => {
                writeln!(f, "{}Filter: {}", prefix, predicate)?;
                input.fmt_node(f, indent + 1)?;
            }
            LogicalPlan::Project { input, expressions } => {
                let aliases: Vec<_> = expressions.iter().map(|(_, a)| a.as_str()).collect();
                writeln!(f, "{}Project: [{}]", prefix, aliases.join(", "))?;
                input.fmt_node(f, indent + 1)?;
            }
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => {
                writeln!(f, "{}Join: {:?}", prefix, join_type)?;
                if let Some(cond) = condition {
                    writeln!(f, "{}  condition: {}", prefix, cond)?;
                }
                left.fmt_node(f, indent + 1)?;
                right.fmt_node(f, indent + 1)?;
            }
            LogicalPlan::Sort { input, order_by } => {
                let keys: Vec<String> = order_by
                    .iter()
                    .map(|(e, asc)| format!("{} {}", e, if *asc { "ASC" } else { "DESC" }))
                    .collect();
                writeln!(f, "{}Sort: [{}]", prefix, keys.join(", "))?;
                input.fmt_node(f, indent + 1)?;
            }
            LogicalPlan::Limit {
                input,
                limit,
                offset,
            } => {
                writeln!(f, "{}Limit: limit={:?} offset={:?}", prefix, limit, offset)?;
                input.fmt_node(f, indent + 1)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, 0)
    }
}

impl Expr {
    /// Get the data type of this expression
    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Column(col) => col.data_type.clone(),
            Expr::Literal(lit) => match lit {
                // NULL is polymorphic, default to Int
                Literal::Null => DataType::Int,
                Literal::Boolean(_) => DataType::Boolean,
                Literal::Integer(_) => DataType::BigInt,
                Literal::Float(_) => DataType::Double,
                Literal::String(_) => DataType::Text,
                Literal::Blob(_) => DataType::Blob,
            },
            Expr::BinaryOp { left, op, right } => {
                if op.is_comparison() || matches!(op, BinaryOp::And | BinaryOp::Or) {
                    DataType::Boolean
                } else if left.data_type() == DataType::Double
                    || right.data_type() == DataType::Double
                {
                    DataType::Double
                } else {
                    DataType::BigInt
                }
            }
            Expr::UnaryOp {
                op: UnaryOp::Not, ..
            } => DataType::Boolean,
            Expr::UnaryOp {
                op: UnaryOp::Neg,
                expr,
            } => expr.data_type(),
            Expr::IsNull { .. } | Expr::In { .. } | Expr::Between { .. } => DataType::Boolean,
            // tuples only appear as the right side of IN, never in a projection
            Expr::Tuple(_) => DataType::Blob,
        }
    }

    /// Check if this expression is nullable
    pub fn is_nullable(&self) -> bool {
        match self {
            Expr::Column(col) => col.nullable,
            Expr::Literal(Literal::Null) => true,
            Expr::Literal(_) => false,
            Expr::BinaryOp { left, right, .. } => left.is_nullable() || right.is_nullable(),
            Expr::UnaryOp { expr, .. } => expr.is_nullable(),
            Expr::IsNull { .. } => false,
            Expr::In { expr, list, .. } => expr.is_nullable() || list.is_nullable(),
            Expr::Between {
                expr, low, high, ..
            } => expr.is_nullable() || low.is_nullable() || high.is_nullable(),
            Expr::Tuple(items) => items.iter().any(|e| e.is_nullable()),
        }
    }
}
