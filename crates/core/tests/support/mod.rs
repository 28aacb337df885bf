//! Shared test helpers for `keystore-core` integration tests.
//!
//! Provides the PEM fixtures, a scriptable in-memory table service and
//! builders for the store / resolver / engine stack.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, OnceLock};

use chrono::Utc;
use keystore_common::cache::{ExpiringCache, MemoryCache};
use keystore_core::{
    EnvelopeCrypto, KeyRecordStore, KeyResolver, MasterKeyProvider, RsaMasterKey, TableEntity,
    TableError, TableResult, TableService,
};
use keystore_domain::{KeyRecord, Scope};
use parking_lot::Mutex;

pub const TABLE: &str = "KeyTable";
pub const PASSPHRASE: &str = "test";

pub const CERTIFICATE_BUNDLE: &[u8] = include_bytes!("../fixtures/test_certificate.pem");
pub const PUBLIC_ONLY_BUNDLE: &[u8] = include_bytes!("../fixtures/public_only.pem");
pub const MISMATCHED_BUNDLE: &[u8] = include_bytes!("../fixtures/mismatched_certificate.pem");

/// Master key from the fixture bundle, decrypted once per test binary.
pub fn master_key() -> RsaMasterKey {
    static MASTER: OnceLock<RsaMasterKey> = OnceLock::new();
    MASTER
        .get_or_init(|| RsaMasterKey::load(CERTIFICATE_BUNDLE, PASSPHRASE).expect("fixture bundle loads"))
        .clone()
}

/// Table service operations, for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    TableExists,
    CreateTable,
    DeleteTable,
    Get,
    Insert,
    Delete,
}

type Rows = HashMap<(String, String), TableEntity>;

struct GetGate {
    barrier: Barrier,
    remaining: AtomicUsize,
}

/// Holds one `get_entity` call between reading its row and returning it.
pub struct ParkedRead {
    read: Barrier,
    resume: Barrier,
}

impl ParkedRead {
    /// Block until the parked call has read its row.
    pub fn wait_until_read(&self) {
        self.read.wait();
    }

    /// Let the parked call return what it read.
    pub fn resume(&self) {
        self.resume.wait();
    }
}

/// In-memory `TableService` with scripted failures.
///
/// - `fail_next(op, err)` makes the next call of `op` return `err`
/// - `with_get_barrier(n)` makes the first `n` `get_entity` calls rendezvous
///   before reading, so `n` threads all observe the same (empty) state
/// - `park_next_get()` holds the next `get_entity` after it has read its row
#[derive(Default)]
pub struct MockTableService {
    tables: Mutex<HashMap<String, Rows>>,
    failures: Mutex<HashMap<Op, TableError>>,
    calls: Mutex<HashMap<Op, usize>>,
    get_gate: Option<GetGate>,
    parked_get: Mutex<Option<Arc<ParkedRead>>>,
    etag_counter: AtomicU64,
}

impl MockTableService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service with `table` already created.
    pub fn with_table(table: &str) -> Self {
        let service = Self::new();
        service.tables.lock().insert(table.to_owned(), Rows::new());
        service
    }

    pub fn with_get_barrier(mut self, parties: usize) -> Self {
        self.get_gate = Some(GetGate { barrier: Barrier::new(parties), remaining: AtomicUsize::new(parties) });
        self
    }

    pub fn park_next_get(&self) -> Arc<ParkedRead> {
        let parked = Arc::new(ParkedRead { read: Barrier::new(2), resume: Barrier::new(2) });
        *self.parked_get.lock() = Some(Arc::clone(&parked));
        parked
    }

    pub fn fail_next(&self, op: Op, err: TableError) {
        self.failures.lock().insert(op, err);
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, HashMap::len)
    }

    pub fn rows(&self, table: &str) -> Vec<TableEntity> {
        self.tables.lock().get(table).map(|rows| rows.values().cloned().collect()).unwrap_or_default()
    }

    /// Write a row directly, bypassing insert semantics.
    pub fn put_raw(&self, table: &str, entity: TableEntity) {
        self.tables
            .lock()
            .entry(table.to_owned())
            .or_default()
            .insert((entity.partition_key.clone(), entity.row_key.clone()), entity);
    }

    fn enter(&self, op: Op) -> TableResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        match self.failures.lock().remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl TableService for MockTableService {
    fn table_exists(&self, table: &str) -> TableResult<bool> {
        self.enter(Op::TableExists)?;
        Ok(self.tables.lock().contains_key(table))
    }

    fn create_table_if_not_exists(&self, table: &str) -> TableResult<()> {
        self.enter(Op::CreateTable)?;
        self.tables.lock().entry(table.to_owned()).or_default();
        Ok(())
    }

    fn delete_table_if_exists(&self, table: &str) -> TableResult<()> {
        self.enter(Op::DeleteTable)?;
        self.tables.lock().remove(table);
        Ok(())
    }

    fn get_entity(&self, table: &str, partition_key: &str, row_key: &str) -> TableResult<Option<TableEntity>> {
        self.enter(Op::Get)?;
        if let Some(gate) = &self.get_gate {
            if gate.remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
                gate.barrier.wait();
            }
        }

        let row = self
            .tables
            .lock()
            .get(table)
            .and_then(|rows| rows.get(&(partition_key.to_owned(), row_key.to_owned())))
            .cloned();

        let parked = self.parked_get.lock().take();
        if let Some(parked) = parked {
            parked.read.wait();
            parked.resume.wait();
        }
        Ok(row)
    }

    fn insert_entity(&self, table: &str, entity: &TableEntity) -> TableResult<()> {
        self.enter(Op::Insert)?;
        let mut tables = self.tables.lock();
        let rows = tables.get_mut(table).ok_or_else(|| TableError::TableNotFound(table.to_owned()))?;

        let key = (entity.partition_key.clone(), entity.row_key.clone());
        if rows.contains_key(&key) {
            return Err(TableError::EntityAlreadyExists {
                partition_key: entity.partition_key.clone(),
                row_key: entity.row_key.clone(),
            });
        }

        let mut stored = entity.clone();
        stored.etag = Some(format!("W/\"{}\"", self.etag_counter.fetch_add(1, Ordering::SeqCst) + 1));
        stored.timestamp = Some(Utc::now());
        rows.insert(key, stored);
        Ok(())
    }

    fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> TableResult<()> {
        self.enter(Op::Delete)?;
        if let Some(rows) = self.tables.lock().get_mut(table) {
            rows.remove(&(partition_key.to_owned(), row_key.to_owned()));
        }
        Ok(())
    }
}

/// Store over `service` with a fresh in-memory cache.
pub fn store(service: &Arc<MockTableService>) -> Arc<KeyRecordStore> {
    let cache: Arc<dyn ExpiringCache<KeyRecord>> = Arc::new(MemoryCache::new());
    Arc::new(KeyRecordStore::new(TABLE, Arc::clone(service) as Arc<dyn TableService>, cache).expect("valid table"))
}

/// Resolver over `service` using the fixture master key.
pub fn resolver(service: &Arc<MockTableService>) -> KeyResolver {
    KeyResolver::new(store(service), Arc::new(master_key()))
}

pub fn engine(service: &Arc<MockTableService>) -> EnvelopeCrypto {
    EnvelopeCrypto::new(resolver(service))
}

/// Record wrapping a caller-chosen key and IV, for deterministic vectors.
pub fn record_with_key(scope: Scope, key: &[u8; 32], iv: &[u8; 16]) -> KeyRecord {
    let master = master_key();
    KeyRecord::new(
        scope,
        master.wrap(key).expect("wrap key"),
        master.wrap(iv).expect("wrap iv"),
        Utc::now(),
    )
}
