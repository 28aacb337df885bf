//! Table name validation

use crate::constants::{TABLE_NAME_MAX_LEN, TABLE_NAME_MIN_LEN};
use crate::errors::{KeyVaultError, Result};

/// Check a table name against `^[A-Za-z][A-Za-z0-9]{2,62}$`.
///
/// Backends interpolate table names into identifiers, so every name is
/// validated before it reaches one.
pub fn validate_table_name(name: &str) -> Result<()> {
    let len = name.len();
    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let alphanumeric = name.chars().all(|c| c.is_ascii_alphanumeric());

    if (TABLE_NAME_MIN_LEN..=TABLE_NAME_MAX_LEN).contains(&len) && starts_with_letter && alphanumeric
    {
        Ok(())
    } else {
        Err(KeyVaultError::Config(format!(
            "invalid table name '{name}': expected a letter followed by 2-62 letters or digits"
        )))
    }
}
