//! Table service backends
//!
//! Both backends implement [`TableService`](keystore_core::TableService)
//! with the same contract: per-row atomic insert, "get if exists" point
//! lookups, idempotent table create/drop and idempotent row delete.

mod memory;
mod sqlite;

pub use memory::MemoryTableService;
pub use sqlite::SqliteTableService;
