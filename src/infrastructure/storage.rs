use crate::infrastructure::error::InfraError;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Handle to the engine's SQLite store, constructed once at startup and
/// shared by reference. The connection mutex is the store-level write lock:
/// a writer acquires it before touching the file and releases it after
/// commit, so the ledger/aggregate pair is never mutated concurrently.
pub struct TaskStore {
    connection: Mutex<Connection>,
}

impl TaskStore {
    pub fn open(path: &Path) -> Result<Self, InfraError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, InfraError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self, InfraError> {
        connection.pragma_update(None, "foreign_keys", true)?;
        connection.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, InfraError> {
        self.connection
            .lock()
            .map_err(|error| InfraError::Invariant(format!("store lock poisoned: {error}")))
    }

    pub fn with_connection<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T, InfraError>,
    ) -> Result<T, InfraError> {
        let connection = self.lock()?;
        operation(&connection)
    }

    /// Runs a mutating closure inside a single transaction. Any error rolls
    /// the transaction back, so a partial ledger/aggregate update is never
    /// observable.
    pub fn with_transaction<T>(
        &self,
        operation: impl FnOnce(&Transaction<'_>) -> Result<T, InfraError>,
    ) -> Result<T, InfraError> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;
        let value = operation(&transaction)?;
        transaction.commit()?;
        Ok(value)
    }
}
