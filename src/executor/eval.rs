//! Expression evaluation
//!
//! Reduces an `Expr` to a `Datum`, reading column references out of a
//! row. Comparisons and BETWEEN follow SQL three-valued logic; the IN
//! right side must reduce to a tuple.

use crate::planner::logical::{BinaryOp, Expr, UnaryOp};

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::row::Row;

/// Evaluate an expression against a row
pub fn eval(expr: &Expr, row: &Row) -> ExecutorResult<Datum> {
    match expr {
        Expr::Column(col) => Ok(row.get(col.index)?.clone()),

        Expr::Literal(lit) => Ok(Datum::from(lit)),

        Expr::BinaryOp { left, op, right } => {
            let lval = eval(left, row)?;
            let rval = eval(right, row)?;
            eval_binary_op(op, &lval, &rval)
        }

        Expr::UnaryOp { op, expr } => {
            let val = eval(expr, row)?;
            eval_unary_op(op, &val)
        }

        Expr::IsNull { expr, negated } => {
            let val = eval(expr, row)?;
            let is_null = val.is_null();
            Ok(Datum::Bool(if *negated { !is_null } else { is_null }))
        }

        Expr::In {
            expr,
            list,
            negated,
        } => {
            let val = eval(expr, row)?;
            let list_val = eval(list, row)?;
            let items = list_val.as_tuple().ok_or_else(|| {
                ExecutorError::InvalidOperation(format!(
                    "IN right hand side evaluated to {}, expected a tuple",
                    list_val.kind()
                ))
            })?;

            if val.is_null() {
                return Ok(Datum::Null);
            }
            let mut found = false;
            for item in items {
                if item.is_null() {
                    continue;
                }
                if val == *item {
                    found = true;
                    break;
                }
            }
            Ok(Datum::Bool(if *negated { !found } else { found }))
        }

        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let val = eval(expr, row)?;
            let low_val = eval(low, row)?;
            let high_val = eval(high, row)?;

            if val.is_null() || low_val.is_null() || high_val.is_null() {
                return Ok(Datum::Null);
            }

            let in_range = val >= low_val && val <= high_val;
            Ok(Datum::Bool(if *negated { !in_range } else { in_range }))
        }

        Expr::Tuple(items) => {
            let vals: Vec<Datum> = items
                .iter()
                .map(|e| eval(e, row))
                .collect::<Result<_, _>>()?;
            Ok(Datum::Tuple(vals))
        }
    }
}

/// Evaluate an expression in the empty context.
///
/// Only meaningful for evaluable expressions; a column reference fails
/// against the zero-width row.
pub fn eval_const(expr: &Expr) -> ExecutorResult<Datum> {
    eval(expr, &Row::default())
}

/// Evaluate a binary operation
fn eval_binary_op(op: &BinaryOp, left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    // NULL propagation for everything but AND/OR
    if !matches!(op, BinaryOp::And | BinaryOp::Or) && (left.is_null() || right.is_null()) {
        return Ok(Datum::Null);
    }

    match op {
        // Arithmetic
        BinaryOp::Add => eval_arith(op, left, right, |a, b| a.checked_add(b), |a, b| a + b),
        BinaryOp::Sub => eval_arith(op, left, right, |a, b| a.checked_sub(b), |a, b| a - b),
        BinaryOp::Mul => eval_arith(op, left, right, |a, b| a.checked_mul(b), |a, b| a * b),
        BinaryOp::Div => {
            if matches!(right, Datum::Int(0)) {
                return Err(ExecutorError::InvalidOperation("division by zero".to_string()));
            }
            eval_arith(op, left, right, |a, b| a.checked_div(b), |a, b| a / b)
        }
        BinaryOp::Mod => {
            if matches!(right, Datum::Int(0)) {
                return Err(ExecutorError::InvalidOperation("division by zero".to_string()));
            }
            eval_arith(op, left, right, |a, b| a.checked_rem(b), |a, b| a % b)
        }

        // Comparison
        BinaryOp::Eq => Ok(Datum::Bool(left == right)),
        BinaryOp::NotEq => Ok(Datum::Bool(left != right)),
        BinaryOp::Lt => Ok(Datum::Bool(left < right)),
        BinaryOp::LtEq => Ok(Datum::Bool(left <= right)),
        BinaryOp::Gt => Ok(Datum::Bool(left > right)),
        BinaryOp::GtEq => Ok(Datum::Bool(left >= right)),

        // Logical - three-valued semantics
        BinaryOp::And => eval_and(left, right),
        BinaryOp::Or => eval_or(left, right),
    }
}

fn eval_arith(
    op: &BinaryOp,
    left: &Datum,
    right: &Datum,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> ExecutorResult<Datum> {
    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => int_op(*a, *b).map(Datum::Int).ok_or_else(|| {
            ExecutorError::InvalidOperation(format!("integer overflow in {:?}", op))
        }),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(float_op(*a, *b))),
        (Datum::Int(a), Datum::Float(b)) => Ok(Datum::Float(float_op(*a as f64, *b))),
        (Datum::Float(a), Datum::Int(b)) => Ok(Datum::Float(float_op(*a, *b as f64))),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "{:?} requires numeric operands, got {} and {}",
            op,
            left.kind(),
            right.kind()
        ))),
    }
}

/// SQL three-valued AND
fn eval_and(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    match (left.as_bool(), right.as_bool()) {
        (Some(false), _) | (_, Some(false)) => Ok(Datum::Bool(false)),
        (Some(true), Some(true)) => Ok(Datum::Bool(true)),
        _ if left.is_null() || right.is_null() => Ok(Datum::Null),
        _ => Err(ExecutorError::InvalidOperation(
            "AND requires boolean operands".to_string(),
        )),
    }
}

/// SQL three-valued OR
fn eval_or(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    match (left.as_bool(), right.as_bool()) {
        (Some(true), _) | (_, Some(true)) => Ok(Datum::Bool(true)),
        (Some(false), Some(false)) => Ok(Datum::Bool(false)),
        _ if left.is_null() || right.is_null() => Ok(Datum::Null),
        _ => Err(ExecutorError::InvalidOperation(
            "OR requires boolean operands".to_string(),
        )),
    }
}

/// Evaluate a unary operation
fn eval_unary_op(op: &UnaryOp, val: &Datum) -> ExecutorResult<Datum> {
    match (op, val) {
        (_, Datum::Null) => Ok(Datum::Null),
        (UnaryOp::Not, Datum::Bool(b)) => Ok(Datum::Bool(!b)),
        (UnaryOp::Not, other) => Err(ExecutorError::InvalidOperation(format!(
            "NOT requires a boolean, got {}",
            other.kind()
        ))),
        (UnaryOp::Neg, Datum::Int(n)) => n.checked_neg().map(Datum::Int).ok_or_else(|| {
            ExecutorError::InvalidOperation("integer overflow in unary minus".to_string())
        }),
        (UnaryOp::Neg, Datum::Float(f)) => Ok(Datum::Float(-f)),
        (UnaryOp::Neg, other) => Err(ExecutorError::InvalidOperation(format!(
            "unary minus requires a number, got {}",
            other.kind()
        ))),
    }
}
