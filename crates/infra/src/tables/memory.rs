//! Process-local table service

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::Utc;
use keystore_core::{TableEntity, TableError, TableResult, TableService};
use keystore_domain::validate_table_name;
use parking_lot::RwLock;
use tracing::{debug, warn};

type RowKey = (String, String);

/// In-memory [`TableService`]
///
/// Every call takes the table map lock once, so an insert is atomic with
/// respect to concurrent inserts of the same row. Rows are lost when the
/// service is dropped.
///
/// [`MemoryTableService::fail_next`] arms a failure drill: the next `n`
/// calls, whatever the operation, return [`TableError::Transport`].
#[derive(Debug, Default)]
pub struct MemoryTableService {
    tables: RwLock<HashMap<String, HashMap<RowKey, TableEntity>>>,
    etag_counter: AtomicU64,
    pending_failures: AtomicUsize,
}

impl MemoryTableService {
    /// Service with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `calls` operations fail with a transport error.
    pub fn fail_next(&self, calls: usize) {
        self.pending_failures.store(calls, Ordering::SeqCst);
    }

    /// Number of rows currently held by `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, HashMap::len)
    }

    fn check(&self, operation: &str, table: &str) -> TableResult<()> {
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            warn!(operation, table, "injected table service failure");
            return Err(TableError::Transport(format!("injected failure during {operation}")));
        }

        validate_table_name(table).map_err(|_| TableError::InvalidTableName(table.to_owned()))
    }

    fn next_etag(&self) -> String {
        format!("W/\"{}\"", self.etag_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl TableService for MemoryTableService {
    fn table_exists(&self, table: &str) -> TableResult<bool> {
        self.check("table_exists", table)?;
        Ok(self.tables.read().contains_key(table))
    }

    fn create_table_if_not_exists(&self, table: &str) -> TableResult<()> {
        self.check("create_table", table)?;
        self.tables.write().entry(table.to_owned()).or_insert_with(|| {
            debug!(table, "created in-memory table");
            HashMap::new()
        });
        Ok(())
    }

    fn delete_table_if_exists(&self, table: &str) -> TableResult<()> {
        self.check("delete_table", table)?;
        if self.tables.write().remove(table).is_some() {
            debug!(table, "dropped in-memory table");
        }
        Ok(())
    }

    fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<Option<TableEntity>> {
        self.check("get_entity", table)?;
        let tables = self.tables.read();
        Ok(tables
            .get(table)
            .and_then(|rows| rows.get(&(partition_key.to_owned(), row_key.to_owned())))
            .cloned())
    }

    fn insert_entity(&self, table: &str, entity: &TableEntity) -> TableResult<()> {
        self.check("insert_entity", table)?;
        let mut tables = self.tables.write();
        let rows =
            tables.get_mut(table).ok_or_else(|| TableError::TableNotFound(table.to_owned()))?;

        let key = (entity.partition_key.clone(), entity.row_key.clone());
        if rows.contains_key(&key) {
            return Err(TableError::EntityAlreadyExists {
                partition_key: entity.partition_key.clone(),
                row_key: entity.row_key.clone(),
            });
        }

        let mut stored = entity.clone();
        stored.etag = Some(self.next_etag());
        stored.timestamp = Some(Utc::now());
        rows.insert(key, stored);
        Ok(())
    }

    fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> TableResult<()> {
        self.check("delete_entity", table)?;
        if let Some(rows) = self.tables.write().get_mut(table) {
            rows.remove(&(partition_key.to_owned(), row_key.to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for tables::memory.
    use super::*;

    fn entity(row: &str) -> TableEntity {
        TableEntity::new("SymmetricKey", row).with_property("WrappedKey", "AAAA")
    }

    #[test]
    fn test_insert_assigns_etag_and_timestamp() {
        let service = MemoryTableService::new();
        service.create_table_if_not_exists("Keys").unwrap();
        service.insert_entity("Keys", &entity("a")).unwrap();
        service.insert_entity("Keys", &entity("b")).unwrap();

        let a = service.get_entity("Keys", "SymmetricKey", "a").unwrap().unwrap();
        let b = service.get_entity("Keys", "SymmetricKey", "b").unwrap().unwrap();
        assert!(a.timestamp.is_some());
        assert_eq!(a.etag.as_deref(), Some("W/\"1\""));
        assert_eq!(b.etag.as_deref(), Some("W/\"2\""));
        assert_eq!(a.string_property("WrappedKey"), Some("AAAA"));
    }

    #[test]
    fn test_duplicate_insert_conflicts() {
        let service = MemoryTableService::new();
        service.create_table_if_not_exists("Keys").unwrap();
        service.insert_entity("Keys", &entity("a")).unwrap();

        let err = service.insert_entity("Keys", &entity("a")).unwrap_err();
        assert!(matches!(err, TableError::EntityAlreadyExists { ref row_key, .. } if row_key == "a"));
        assert_eq!(service.row_count("Keys"), 1);
    }

    #[test]
    fn test_insert_into_missing_table() {
        let service = MemoryTableService::new();
        let err = service.insert_entity("Keys", &entity("a")).unwrap_err();
        assert!(matches!(err, TableError::TableNotFound(ref t) if t == "Keys"));
    }

    #[test]
    fn test_get_on_missing_table_is_none() {
        let service = MemoryTableService::new();
        assert!(service.get_entity("Keys", "SymmetricKey", "a").unwrap().is_none());
        assert!(!service.table_exists("Keys").unwrap());
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let service = MemoryTableService::new();
        let err = service.create_table_if_not_exists("no_underscores").unwrap_err();
        assert!(matches!(err, TableError::InvalidTableName(_)));
    }

    #[test]
    fn test_fail_next_counts_down() {
        let service = MemoryTableService::new();
        service.fail_next(2);

        assert!(matches!(service.table_exists("Keys"), Err(TableError::Transport(_))));
        assert!(matches!(
            service.create_table_if_not_exists("Keys"),
            Err(TableError::Transport(_))
        ));
        assert!(service.create_table_if_not_exists("Keys").is_ok());
        assert!(service.table_exists("Keys").unwrap());
    }

    #[test]
    fn test_drop_and_delete_are_idempotent() {
        let service = MemoryTableService::new();
        service.delete_table_if_exists("Keys").unwrap();
        service.delete_entity("Keys", "SymmetricKey", "a").unwrap();

        service.create_table_if_not_exists("Keys").unwrap();
        service.insert_entity("Keys", &entity("a")).unwrap();
        service.delete_entity("Keys", "SymmetricKey", "a").unwrap();
        service.delete_entity("Keys", "SymmetricKey", "a").unwrap();
        assert_eq!(service.row_count("Keys"), 0);

        service.delete_table_if_exists("Keys").unwrap();
        assert!(!service.table_exists("Keys").unwrap());
    }
}
