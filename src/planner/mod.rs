//! Query planner
//!
//! Transforms resolved logical plans into optimized logical plans.
//!
//! ## Pipeline
//!
//! ```text
//! LogicalPlan (resolved)
//!   → Optimizer::optimize() → LogicalPlan (optimized, scans may be
//!     wrapped into IndexedScan placeholders)
//! ```

pub mod error;
pub mod logical;
pub mod optimizer;

pub use error::{PlannerError, PlannerResult};
pub use logical::LogicalPlan;
pub use optimizer::{IndexAssignment, Optimizer};
