//! SQLite-backed table service
//!
//! Each logical table is one SQLite table named `kt_{name}`:
//!
//! ```sql
//! CREATE TABLE kt_name (
//!     partition_key TEXT NOT NULL,
//!     row_key       TEXT NOT NULL,
//!     properties    TEXT NOT NULL,  -- JSON object
//!     etag          TEXT NOT NULL,
//!     timestamp     TEXT NOT NULL,  -- RFC 3339
//!     PRIMARY KEY (partition_key, row_key)
//! ) WITHOUT ROWID;
//! ```
//!
//! The composite primary key gives per-row insert atomicity across every
//! process sharing the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use keystore_core::{TableEntity, TableError, TableResult, TableService};
use keystore_domain::validate_table_name;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const TABLE_PREFIX: &str = "kt_";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// [`TableService`] over a pooled SQLite database file
pub struct SqliteTableService {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl SqliteTableService {
    /// Open (or create) the database at `path` with up to `pool_size`
    /// connections.
    ///
    /// Every pooled connection runs in WAL mode with a busy timeout, so
    /// concurrent writers wait instead of failing immediately.
    ///
    /// # Errors
    /// Returns [`TableError::Transport`] if the file cannot be opened or the
    /// pragmas cannot be applied.
    #[instrument(skip(path), fields(db_path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, pool_size: u32) -> TableResult<Self> {
        let path = path.as_ref().to_path_buf();
        let manager =
            SqliteConnectionManager::file(&path).with_init(|conn| apply_connection_pragmas(conn));

        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .map_err(|e| {
                warn!(error = %e, "failed to create sqlite pool");
                TableError::Transport(format!("failed to open {}: {e}", path.display()))
            })?;

        info!(pool_size, "sqlite table service ready");
        Ok(Self { pool, path })
    }

    /// Database file this service opened
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> TableResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| TableError::Transport(format!("connection unavailable: {e}")))
    }
}

impl fmt::Debug for SqliteTableService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTableService")
            .field("path", &self.path)
            .field("pool_size", &self.pool.max_size())
            .finish()
    }
}

fn apply_connection_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // Before anything else: the journal switch itself can hit a busy lock.
    conn.busy_timeout(BUSY_TIMEOUT)?;

    // journal_mode answers with the resulting mode, so it has to be queried
    let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        debug!(mode, "sqlite journal mode is not WAL");
    }
    conn.execute_batch("PRAGMA synchronous=NORMAL;")
}

/// Quoted physical table name for a validated logical name.
fn physical_name(table: &str) -> TableResult<String> {
    validate_table_name(table).map_err(|_| TableError::InvalidTableName(table.to_owned()))?;
    Ok(format!("\"{TABLE_PREFIX}{table}\""))
}

fn exists(conn: &Connection, table: &str) -> TableResult<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![format!("{TABLE_PREFIX}{table}")],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
    .map_err(map_sqlite_error)
}

fn map_sqlite_error(err: rusqlite::Error) -> TableError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            TableError::Transport(format!("database busy: {err}"))
        }
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::PermissionDenied => {
            TableError::Unauthorized(err.to_string())
        }
        _ => TableError::Transport(err.to_string()),
    }
}

/// `SQLITE_ERROR` carrying sqlite's "no such table" message; the table was
/// dropped between the existence check and the statement.
fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(message))
            if e.code == ErrorCode::Unknown && message.starts_with("no such table")
    )
}

fn decode_row(
    partition_key: String,
    row_key: String,
    properties: &str,
    etag: String,
    timestamp: &str,
) -> TableResult<TableEntity> {
    let properties: Map<String, Value> = serde_json::from_str(properties)?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| TableError::Serialization(format!("invalid row timestamp: {e}")))?
        .with_timezone(&Utc);

    Ok(TableEntity {
        partition_key,
        row_key,
        properties,
        etag: Some(etag),
        timestamp: Some(timestamp),
    })
}

impl TableService for SqliteTableService {
    fn table_exists(&self, table: &str) -> TableResult<bool> {
        physical_name(table)?;
        let conn = self.connection()?;
        exists(&conn, table)
    }

    #[instrument(skip(self))]
    fn create_table_if_not_exists(&self, table: &str) -> TableResult<()> {
        let name = physical_name(table)?;
        let conn = self.connection()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {name} (
                partition_key TEXT NOT NULL,
                row_key       TEXT NOT NULL,
                properties    TEXT NOT NULL,
                etag          TEXT NOT NULL,
                timestamp     TEXT NOT NULL,
                PRIMARY KEY (partition_key, row_key)
            ) WITHOUT ROWID;"
        ))
        .map_err(map_sqlite_error)?;
        debug!("sqlite table ready");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_table_if_exists(&self, table: &str) -> TableResult<()> {
        let name = physical_name(table)?;
        let conn = self.connection()?;
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {name};")).map_err(map_sqlite_error)?;
        debug!("sqlite table dropped");
        Ok(())
    }

    fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<Option<TableEntity>> {
        let name = physical_name(table)?;
        let conn = self.connection()?;
        if !exists(&conn, table)? {
            return Ok(None);
        }

        let row = conn
            .query_row(
                &format!(
                    "SELECT properties, etag, timestamp FROM {name}
                     WHERE partition_key = ?1 AND row_key = ?2"
                ),
                params![partition_key, row_key],
                |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                },
            )
            .optional()
            .map_err(map_sqlite_error)?;

        row.map(|(properties, etag, timestamp)| {
            decode_row(partition_key.to_owned(), row_key.to_owned(), &properties, etag, &timestamp)
        })
        .transpose()
    }

    fn insert_entity(&self, table: &str, entity: &TableEntity) -> TableResult<()> {
        let name = physical_name(table)?;
        let conn = self.connection()?;
        if !exists(&conn, table)? {
            return Err(TableError::TableNotFound(table.to_owned()));
        }

        let properties = serde_json::to_string(&entity.properties)?;
        let etag = format!("W/\"{}\"", Uuid::new_v4().simple());
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let result = conn.execute(
            &format!(
                "INSERT INTO {name} (partition_key, row_key, properties, etag, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![entity.partition_key, entity.row_key, properties, etag, timestamp],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(TableError::EntityAlreadyExists {
                    partition_key: entity.partition_key.clone(),
                    row_key: entity.row_key.clone(),
                })
            }
            Err(e) if is_missing_table(&e) => {
                Err(TableError::TableNotFound(table.to_owned()))
            }
            Err(e) => Err(map_sqlite_error(e)),
        }
    }

    fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> TableResult<()> {
        let name = physical_name(table)?;
        let conn = self.connection()?;
        if !exists(&conn, table)? {
            return Ok(());
        }

        conn.execute(
            &format!("DELETE FROM {name} WHERE partition_key = ?1 AND row_key = ?2"),
            params![partition_key, row_key],
        )
        .map_err(map_sqlite_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for tables::sqlite.
    use tempfile::TempDir;

    use super::*;

    fn open_temp() -> (TempDir, SqliteTableService) {
        let dir = TempDir::new().unwrap();
        let service = SqliteTableService::open(dir.path().join("keys.db"), 2).unwrap();
        (dir, service)
    }

    #[test]
    fn test_connections_use_wal() {
        let (_dir, service) = open_temp();
        let conn = service.connection().unwrap();
        let mode: String =
            conn.pragma_query_value(None, "journal_mode", |row| row.get(0)).unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_physical_name_is_prefixed_and_validated() {
        assert_eq!(physical_name("Keys").unwrap(), "\"kt_Keys\"");
        assert!(matches!(
            physical_name("Keys\"; DROP TABLE x; --"),
            Err(TableError::InvalidTableName(_))
        ));
    }

    #[test]
    fn test_missing_table_is_recognised_from_sqlite_failure() {
        let (_dir, service) = open_temp();
        let conn = service.connection().unwrap();

        let err = conn
            .execute("INSERT INTO \"kt_Absent\" VALUES ('p', 'r', '{}', 'e', 't')", [])
            .unwrap_err();
        assert!(is_missing_table(&err));

        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("no such table: kt_Absent".to_owned()),
        );
        assert!(!is_missing_table(&busy));
        assert!(!is_missing_table(&rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn test_corrupt_properties_surface_as_serialization_error() {
        let (_dir, service) = open_temp();
        service.create_table_if_not_exists("Keys").unwrap();
        let conn = service.connection().unwrap();
        conn.execute(
            "INSERT INTO kt_Keys VALUES ('SymmetricKey', 'a', 'not json', 'W/\"x\"', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let err = service.get_entity("Keys", "SymmetricKey", "a").unwrap_err();
        assert!(matches!(err, TableError::Serialization(_)));
    }

    #[test]
    fn test_round_trips_properties_and_assigns_etag() {
        let (_dir, service) = open_temp();
        service.create_table_if_not_exists("Keys").unwrap();
        let entity = TableEntity::new("SymmetricKey", "row")
            .with_property("WrappedKey", "AAAA")
            .with_property("Scope", Value::Null);
        service.insert_entity("Keys", &entity).unwrap();

        let stored = service.get_entity("Keys", "SymmetricKey", "row").unwrap().unwrap();
        assert_eq!(stored.properties, entity.properties);
        assert!(stored.etag.unwrap().starts_with("W/\""));
        assert!(stored.timestamp.is_some());
    }
}
