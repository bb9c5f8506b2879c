//! Main store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;
use tracing::{debug, info};

use sensorkit_types::{Checkpoint, CheckpointBackend, StorageError};

use crate::error::{Error, Result};
use crate::models::StoredAnchor;
use crate::queries::AnchorQuery;
use crate::schema;

/// SQLite-based checkpoint store.
///
/// The connection is guarded by a mutex so a single store can back a module
/// shared across threads.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening checkpoint database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the checkpoint stored under `key`.
    pub fn load_anchor(&self, key: &str) -> Result<Option<Checkpoint>> {
        let row: Option<Option<i64>> = self
            .conn()
            .query_row(
                "SELECT timestamp_ns FROM anchors WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        row.map(|nanos| decode(key, nanos)).transpose()
    }

    /// Insert or replace the checkpoint under `key`.
    pub fn save_anchor(&self, key: &str, checkpoint: Checkpoint) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.conn().execute(
            "INSERT INTO anchors (key, timestamp_ns, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                timestamp_ns = ?2,
                updated_at = ?3",
            rusqlite::params![key, checkpoint.to_unix_nanos(), now],
        )?;
        debug!(key, %checkpoint, "Saved checkpoint");
        Ok(())
    }

    /// Delete the checkpoint under `key`. Returns whether a row was removed.
    pub fn delete_anchor(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM anchors WHERE key = ?", [key])?;
        Ok(removed > 0)
    }

    /// Delete every checkpoint whose key starts with `prefix`.
    pub fn delete_anchors_with_prefix(&self, prefix: &str) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM anchors WHERE substr(key, 1, length(?1)) = ?1",
            [prefix],
        )?;
        info!(prefix, removed, "Deleted checkpoints");
        Ok(removed)
    }

    /// Query stored checkpoints.
    pub fn query_anchors(&self, query: &AnchorQuery) -> Result<Vec<StoredAnchor>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, nanos, updated_at)| {
                let checkpoint = decode(&key, nanos)?;
                let updated_at = OffsetDateTime::from_unix_timestamp(updated_at).map_err(|_| {
                    Error::InvalidTimestamp {
                        key: key.clone(),
                        value: updated_at,
                    }
                })?;
                Ok(StoredAnchor {
                    key,
                    checkpoint,
                    updated_at,
                })
            })
            .collect()
    }

    /// Count stored checkpoints, optionally restricted to a key prefix.
    pub fn count_anchors(&self, prefix: Option<&str>) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = match prefix {
            Some(prefix) => conn.query_row(
                "SELECT COUNT(*) FROM anchors WHERE substr(key, 1, length(?1)) = ?1",
                [prefix],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM anchors", [], |row| row.get(0))?,
        };

        Ok(count as u64)
    }
}

fn decode(key: &str, nanos: Option<i64>) -> Result<Checkpoint> {
    Checkpoint::from_unix_nanos(nanos).ok_or_else(|| Error::InvalidTimestamp {
        key: key.to_string(),
        value: nanos.unwrap_or_default(),
    })
}

impl CheckpointBackend for Store {
    fn load(&self, key: &str) -> std::result::Result<Option<Checkpoint>, StorageError> {
        Ok(self.load_anchor(key)?)
    }

    fn store(&self, key: &str, checkpoint: Checkpoint) -> std::result::Result<(), StorageError> {
        Ok(self.save_anchor(key, checkpoint)?)
    }

    fn delete(&self, key: &str) -> std::result::Result<(), StorageError> {
        self.delete_anchor(key)?;
        Ok(())
    }

    fn delete_matching(&self, prefix: &str) -> std::result::Result<usize, StorageError> {
        Ok(self.delete_anchors_with_prefix(prefix)?)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
