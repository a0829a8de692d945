//! Table storage
//!
//! In-memory row storage for embedded use and tests. Durable backends
//! plug in behind the same shape: a named table with a schema and an
//! ordered list of rows addressed by position.

pub mod memory;

pub use memory::{MemoryDatabase, MemoryTable};
