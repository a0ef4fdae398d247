use chrono::{DateTime, Utc};
use handoff_core::{SharedStore, StoreError, StoredValue};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const SHARED_STORE_SCHEMA_VERSION: i64 = 1;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const KIND_DATA: &str = "data";
const KIND_STRINGS: &str = "strings";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("unknown value kind '{kind}' for key '{key}'")]
    UnknownKind { key: String, kind: String },
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::UnknownKind { key, kind } => StoreError::UnknownKind { key, kind },
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub key: String,
    pub kind: String,
    pub size: usize,
    pub updated_at: DateTime<Utc>,
}

/// Shared store backed by a SQLite file inside the group container.
///
/// Producer and consumer open the same file; WAL journaling plus a busy
/// timeout lets a short-lived writer and a long-lived reader overlap.
pub struct SqliteGroupStore {
    conn: Connection,
    namespace: String,
}

impl SqliteGroupStore {
    pub fn open(path: impl AsRef<Path>, namespace: impl Into<String>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(event = "shared_store_open", journal_mode = %mode);
        let store = Self {
            conn,
            namespace: namespace.into(),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory(namespace: impl Into<String>) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            namespace: namespace.into(),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let current = self.schema_version()?;
        if current > SHARED_STORE_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: SHARED_STORE_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_shared_store.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
        }

        Ok(())
    }

    pub fn load(&self, key: &str) -> Result<Option<StoredValue>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT kind, payload FROM shared_entries WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
            )
            .optional()?;

        row.map(|(kind, payload)| decode_value(key, &kind, payload))
            .transpose()
    }

    pub fn save(&self, key: &str, value: &StoredValue) -> Result<(), StorageError> {
        let payload = match value {
            StoredValue::Data(bytes) => bytes.clone(),
            StoredValue::Strings(values) => serde_json::to_vec(values)
                .map_err(|err| StorageError::Serialization(err.to_string()))?,
        };

        self.conn.execute(
            "
            INSERT INTO shared_entries (namespace, key, kind, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(namespace, key) DO UPDATE SET
                kind=excluded.kind,
                payload=excluded.payload,
                updated_at=excluded.updated_at
            ",
            params![
                self.namespace,
                key,
                value.kind(),
                payload,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let changes = self.conn.execute(
            "DELETE FROM shared_entries WHERE namespace = ?1 AND key = ?2",
            params![self.namespace, key],
        )?;
        Ok(changes > 0)
    }

    pub fn entries(&self) -> Result<Vec<EntrySummary>, StorageError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT key, kind, length(payload), updated_at
            FROM shared_entries
            WHERE namespace = ?1
            ORDER BY updated_at ASC, key ASC
            ",
        )?;
        let rows = stmt.query_map(params![self.namespace], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, kind, size, updated_at) = row?;
            out.push(EntrySummary {
                key,
                kind,
                size: usize::try_from(size).unwrap_or(0),
                updated_at: parse_ts(&updated_at)?,
            });
        }
        Ok(out)
    }

    /// Drops entries last written before `cutoff`; returns how many went away.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let stale = self
            .entries()?
            .into_iter()
            .filter(|entry| entry.updated_at < cutoff)
            .map(|entry| entry.key)
            .collect::<Vec<_>>();
        for key in &stale {
            self.delete(key)?;
        }
        Ok(stale.len())
    }
}

impl SharedStore for SqliteGroupStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        Ok(self.load(key)?)
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        Ok(self.save(key, &value)?)
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.delete(key)?)
    }
}

fn decode_value(key: &str, kind: &str, payload: Vec<u8>) -> Result<StoredValue, StorageError> {
    match kind {
        KIND_DATA => Ok(StoredValue::Data(payload)),
        KIND_STRINGS => serde_json::from_slice(&payload)
            .map(StoredValue::Strings)
            .map_err(|err| StorageError::Serialization(err.to_string())),
        other => Err(StorageError::UnknownKind {
            key: key.to_string(),
            kind: other.to_string(),
        }),
    }
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| StorageError::Timestamp(err.to_string()))
}
