//! SQLite-backed store for the registration record.

use super::{PersistedPushState, PushStateStore};
use crate::config::StoreConfig;
use crate::error::{PushError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// SQLite store.
///
/// Entries live in a `(namespace, key)` table so several components can
/// share one database file. The push record is a single JSON row, written
/// with one `INSERT OR REPLACE`. Thread-safe via internal mutex on the
/// connection.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl SqliteStore {
    /// Open (or create) a store at the specified database path.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PushError::Io {
                    message: format!("Failed to create store directory: {}", e),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| PushError::Database {
            message: format!("Failed to open push state database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")
            .map_err(|e| PushError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| PushError::Database {
            message: format!("Failed to open in-memory database: {}", e),
            source: Some(e),
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: StoreConfig::DEFAULT_NAMESPACE.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Scope the store to another namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )
        .map_err(|e| PushError::Database {
            message: format!("Failed to initialize push state schema: {}", e),
            source: Some(e),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| PushError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }
}

impl PushStateStore for SqliteStore {
    fn load(&self) -> Result<Option<PersistedPushState>> {
        let conn = self.lock()?;

        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, StoreConfig::STATE_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| PushError::Database {
                message: format!("Failed to query push state: {}", e),
                source: Some(e),
            })?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, state: &PersistedPushState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO kv_entries (namespace, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                self.namespace,
                StoreConfig::STATE_KEY,
                json,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| PushError::Database {
            message: format!("Failed to save push state: {}", e),
            source: Some(e),
        })?;

        debug!("Saved push state to namespace {}", self.namespace);
        Ok(())
    }
}
