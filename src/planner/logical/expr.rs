//! Logical expression types for the query planner
//!
//! Expressions are fully resolved: column references carry their table,
//! position and type. The canonical `Display` form of an expression is
//! what the index registry hashes to identify index key columns.

use std::fmt;

use crate::catalog::DataType;

/// Unique ID for columns in the plan
pub type ColumnId = usize;

/// Output column from a plan node
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    /// Unique ID within the plan
    pub id: ColumnId,
    /// Column name (or alias)
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Whether the column can be NULL
    pub nullable: bool,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// Check if this operator is a comparison
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Blob(Vec<u8>),
}

/// Resolved column reference with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: String,
    pub name: String,
    pub index: usize,
    pub data_type: DataType,
    pub nullable: bool,
}

/// Resolved expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Resolved column reference
    Column(ColumnRef),
    /// Literal value
    Literal(Literal),
    /// Binary operation
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Unary operation
    UnaryOp { op: UnaryOp, expr: Box<Expr> },
    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },
    /// IN - the right side must evaluate to a tuple
    In {
        expr: Box<Expr>,
        list: Box<Expr>,
        negated: bool,
    },
    /// BETWEEN
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    /// Tuple of expressions, e.g. the right side of IN
    Tuple(Vec<Expr>),
}

impl Expr {
    /// Build a binary operation
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Build a conjunction
    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::binary(left, BinaryOp::And, right)
    }

    /// Build a disjunction
    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::binary(left, BinaryOp::Or, right)
    }

    /// Check whether any column reference occurs in this subtree
    pub fn contains_columns(&self) -> bool {
        match self {
            Expr::Column(_) => true,
            Expr::Literal(_) => false,
            Expr::BinaryOp { left, right, .. } => {
                left.contains_columns() || right.contains_columns()
            }
            Expr::UnaryOp { expr, .. } => expr.contains_columns(),
            Expr::IsNull { expr, .. } => expr.contains_columns(),
            Expr::In { expr, list, .. } => expr.contains_columns() || list.contains_columns(),
            Expr::Between {
                expr, low, high, ..
            } => expr.contains_columns() || low.contains_columns() || high.contains_columns(),
            Expr::Tuple(items) => items.iter().any(|e| e.contains_columns()),
        }
    }

    /// An expression is evaluable when it can be evaluated without a row,
    /// i.e. it contains no column references
    pub fn is_evaluable(&self) -> bool {
        !self.contains_columns()
    }

    /// Flatten nested conjunctions into a list of conjuncts
    pub fn split_conjunction(&self) -> Vec<&Expr> {
        match self {
            Expr::BinaryOp {
                left,
                op: BinaryOp::And,
                right,
            } => {
                let mut out = left.split_conjunction();
                out.extend(right.split_conjunction());
                out
            }
            other => vec![other],
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Blob(b) => {
                write!(f, "x'")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, "'")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(col) => write!(f, "{}.{}", col.table, col.name),
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::UnaryOp {
                op: UnaryOp::Not,
                expr,
            } => write!(f, "(NOT {})", expr),
            Expr::UnaryOp {
                op: UnaryOp::Neg,
                expr,
            } => write!(f, "(-{})", expr),
            Expr::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "({} IS NOT NULL)", expr)
                } else {
                    write!(f, "({} IS NULL)", expr)
                }
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                if *negated {
                    write!(f, "({} NOT IN {})", expr, list)
                } else {
                    write!(f, "({} IN {})", expr, list)
                }
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                if *negated {
                    write!(f, "({} NOT BETWEEN {} AND {})", expr, low, high)
                } else {
                    write!(f, "({} BETWEEN {} AND {})", expr, low, high)
                }
            }
            Expr::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
