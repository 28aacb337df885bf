//! Key record persistence
//!
//! - [`ports`]: the table service boundary
//! - [`KeyRecordStore`]: cache-first CRUD for key records
//! - `entity`: `KeyRecord` to table row mapping

mod entity;
pub mod ports;
mod record_store;

pub use record_store::KeyRecordStore;
