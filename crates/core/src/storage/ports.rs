//! Port interfaces for partitioned table storage
//!
//! These traits define the boundary between the key record store and the
//! remote key-value service that actually holds the rows. Backends live in
//! `keystore-infra`.

use chrono::{DateTime, Utc};
use keystore_common::error::{ErrorClassification, ErrorSeverity};
use serde_json::{Map, Value};
use thiserror::Error;

/// One row of a partitioned table
///
/// `etag` and `timestamp` are assigned by the service on write and ignored
/// on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntity {
    /// Partition the row lives in
    pub partition_key: String,
    /// Row identifier, unique within the partition
    pub row_key: String,
    /// Named property values
    pub properties: Map<String, Value>,
    /// Service-assigned version tag
    pub etag: Option<String>,
    /// Time of the last write, as recorded by the service
    pub timestamp: Option<DateTime<Utc>>,
}

impl TableEntity {
    /// Row with no properties
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            properties: Map::new(),
            etag: None,
            timestamp: None,
        }
    }

    /// Builder-style property setter
    #[must_use]
    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_owned(), value.into());
        self
    }

    /// Property `name` if it holds a string
    pub fn string_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

/// Failures reported by a table service
#[derive(Debug, Error)]
pub enum TableError {
    /// Table does not exist
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// Insert hit an existing (partition, row)
    #[error("entity ({partition_key}, {row_key}) already exists")]
    EntityAlreadyExists { partition_key: String, row_key: String },

    /// Name breaks the table naming rule
    #[error("invalid table name '{0}'")]
    InvalidTableName(String),

    /// Credentials rejected by the service
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Connection, timeout or backend failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Row properties could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ErrorClassification for TableError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::EntityAlreadyExists { .. } | Self::Transport(_) => ErrorSeverity::Warning,
            Self::TableNotFound(_)
            | Self::InvalidTableName(_)
            | Self::Unauthorized(_)
            | Self::Serialization(_) => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }
}

impl From<serde_json::Error> for TableError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for table service calls
pub type TableResult<T> = Result<T, TableError>;

/// Synchronous client for a partitioned key-value table service
///
/// Every call is independent; the service provides per-row atomicity only.
pub trait TableService: Send + Sync {
    /// Whether `table` currently exists.
    fn table_exists(&self, table: &str) -> TableResult<bool>;

    /// Create the table; succeeds if it already exists.
    fn create_table_if_not_exists(&self, table: &str) -> TableResult<()>;

    /// Drop the table and its rows; succeeds if it is already gone.
    fn delete_table_if_exists(&self, table: &str) -> TableResult<()>;

    /// Point lookup. `Ok(None)` when the row is absent *or* the table does
    /// not exist; callers that need to tell those apart ask
    /// [`TableService::table_exists`].
    fn get_entity(&self, table: &str, partition_key: &str, row_key: &str) -> TableResult<Option<TableEntity>>;

    /// Insert a new row.
    ///
    /// # Errors
    /// - [`TableError::EntityAlreadyExists`] if (partition, row) is taken
    /// - [`TableError::TableNotFound`] if the table does not exist
    fn insert_entity(&self, table: &str, entity: &TableEntity) -> TableResult<()>;

    /// Delete a row. Deleting an absent row is not an error.
    fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> TableResult<()>;
}
