/*!
Durable key-value state, and the delete queue persisted on top of it
*/

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

use posts_api::PostId;

use crate::manager::{config::StorageConfig, error::ManagerError};

/// SQLite-backed key-value table
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open (or create) the state database described by the config
    pub fn open(config: &StorageConfig) -> Result<Self, ManagerError> {
        Self::open_path(&config.state_db_path)
    }

    pub fn open_path(path: &Path) -> Result<Self, ManagerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;

        info!("State store opened at {:?}", path);
        Ok(store)
    }

    /// Volatile store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, ManagerError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER DEFAULT (strftime('%s', 'now'))
            );
        "#,
        )
    }

    /// Make every later write fail
    #[cfg(test)]
    pub fn drop_schema(&self) {
        self.conn.execute_batch("DROP TABLE kv_store;").unwrap();
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ManagerError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), ManagerError> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (key, value),
        )?;
        debug!("Stored {} bytes under {:?}", value.len(), key);
        Ok(())
    }
}

/// The delete queue as it lives in the state store: a JSON array of ids
pub struct QueueStore {
    store: StateStore,
    key: String,
}

impl QueueStore {
    pub fn new(store: StateStore, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn open(config: &StorageConfig) -> Result<Self, ManagerError> {
        Ok(Self::new(StateStore::open(config)?, config.queue_key.clone()))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the stored queue. A missing key is an empty queue; so is a value
    /// that no longer parses, which is logged and overwritten on next save.
    pub fn load(&self) -> Result<Vec<PostId>, ManagerError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Option<Vec<PostId>>>(&raw) {
            Ok(ids) => Ok(ids.unwrap_or_default()),
            Err(e) => {
                warn!("Discarding unreadable delete queue under {:?}: {}", self.key, e);
                Ok(Vec::new())
            }
        }
    }

    pub fn save(&self, ids: &[PostId]) -> Result<(), ManagerError> {
        let json = serde_json::to_string(ids)?;
        self.store.put(&self.key, &json)
    }

    #[cfg(test)]
    pub fn state(&self) -> &StateStore {
        &self.store
    }
}
