//! Row-at-a-time interpreter for logical plans
//!
//! Evaluates expressions against rows and runs logical plans over
//! in-memory tables. The interpreter exists for embedded use and for
//! checking planner rewrites against their unoptimized originals; it
//! executes scans, filters, projections, joins, sorts and limits, and
//! refuses placeholder nodes that a later pass must replace.

pub mod datum;
pub mod error;
pub mod eval;
pub mod exec;
pub mod row;

pub use datum::Datum;
pub use error::{ExecutorError, ExecutorResult};
pub use eval::{eval, eval_const};
pub use exec::run;
pub use row::Row;
