//! Core keystore data types

mod key;
mod scope;
mod table_name;

pub use key::{KeyRecord, ResolvedKey};
pub use scope::Scope;
pub use table_name::validate_table_name;
