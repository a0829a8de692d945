//! Runtime values
//!
//! `Datum` is the value vocabulary shared by rows, index keys and
//! constant evaluation. Values of different kinds still order against
//! each other: numbers compare by promotion to `f64`, everything else
//! falls back to a fixed kind order with NULL smallest, so composite
//! index keys can be compared as plain slices. Equality and hashing are
//! derived from that same ordering, which keeps `Int(3)` and
//! `Float(3.0)` interchangeable as hash keys.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::planner::logical::Literal;

/// A single runtime value
#[derive(Debug, Clone)]
pub enum Datum {
    /// NULL
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered tuple, e.g. the evaluated right side of IN
    Tuple(Vec<Datum>),
}

impl Datum {
    /// True for the NULL value
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Truth value: booleans directly, numbers by zeroness. NULL and
    /// non-scalar values have none.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Bool(b) => Some(*b),
            Datum::Int(n) => Some(*n != 0),
            Datum::Float(f) => Some(*f != 0.0),
            _ => None,
        }
    }

    /// Promoted numeric view, the form mixed-type comparisons use
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Datum::Int(n) => Some(*n as f64),
            Datum::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Tuple elements, if this is a tuple
    pub fn as_tuple(&self) -> Option<&[Datum]> {
        match self {
            Datum::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// A short name for the value's kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Datum::Null => "NULL",
            Datum::Bool(_) => "boolean",
            Datum::Int(_) => "integer",
            Datum::Float(_) => "float",
            Datum::String(_) => "string",
            Datum::Bytes(_) => "bytes",
            Datum::Tuple(_) => "tuple",
        }
    }

    // fixed order of kinds for cross-kind comparisons; both numeric
    // kinds share a slot because they compare by promotion instead
    fn rank(&self) -> u8 {
        match self {
            Datum::Null => 0,
            Datum::Bool(_) => 1,
            Datum::Int(_) | Datum::Float(_) => 2,
            Datum::String(_) => 3,
            Datum::Bytes(_) => 4,
            Datum::Tuple(_) => 5,
        }
    }
}

impl From<&Literal> for Datum {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Null => Datum::Null,
            Literal::Boolean(b) => Datum::Bool(*b),
            Literal::Integer(n) => Datum::Int(*n),
            Literal::Float(f) => Datum::Float(*f),
            Literal::String(s) => Datum::String(s.clone()),
            Literal::Blob(bytes) => Datum::Bytes(bytes.clone()),
        }
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // same-kind values compare natively; integers stay exact
            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
            (Datum::String(a), Datum::String(b)) => a.cmp(b),
            (Datum::Bytes(a), Datum::Bytes(b)) => a.cmp(b),
            (Datum::Tuple(a), Datum::Tuple(b)) => a.cmp(b),
            _ => match (self.numeric(), other.numeric()) {
                // float pairs and mixed numbers compare by promotion
                (Some(a), Some(b)) => a.total_cmp(&b),
                // otherwise the kind order decides, NULL smallest
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.rank());
        match self {
            Datum::Null => {}
            Datum::Bool(b) => b.hash(state),
            // both numeric kinds hash their promoted form so values that
            // compare equal across kinds also hash equal
            Datum::Int(n) => (*n as f64).to_bits().hash(state),
            Datum::Float(f) => f.to_bits().hash(state),
            Datum::String(s) => s.hash(state),
            Datum::Bytes(bytes) => bytes.hash(state),
            Datum::Tuple(items) => {
                for item in items {
                    item.hash(state);
                }
            }
        }
    }
}
