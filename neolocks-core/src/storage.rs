//! SQLite persistence layer for NeoLocks.
//!
//! Both registries write through to one per-server SQLite database:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS chest_locks (
//!     world      TEXT    NOT NULL,
//!     x          INTEGER NOT NULL,
//!     y          INTEGER NOT NULL,
//!     z          INTEGER NOT NULL,
//!     owner_id   TEXT    NOT NULL,
//!     owner_name TEXT    NOT NULL,
//!     locked_at  TEXT    NOT NULL,
//!     PRIMARY KEY (world, x, y, z)
//! );
//!
//! CREATE TABLE IF NOT EXISTS sign_holograms (
//!     world     TEXT    NOT NULL,
//!     x         INTEGER NOT NULL,
//!     y         INTEGER NOT NULL,
//!     z         INTEGER NOT NULL,
//!     entity_id TEXT    NOT NULL,
//!     PRIMARY KEY (world, x, y, z, entity_id)
//! );
//! ```
//!
//! Multi-key writes run inside a single transaction, so a crash never leaves
//! half of a double chest locked on disk.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PersistenceConfig;
use crate::error::{NeoLocksError, Result};
use crate::types::{EntityRef, LockRecord, PlayerId, PositionKey};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS chest_locks (
        world      TEXT    NOT NULL,
        x          INTEGER NOT NULL,
        y          INTEGER NOT NULL,
        z          INTEGER NOT NULL,
        owner_id   TEXT    NOT NULL,
        owner_name TEXT    NOT NULL,
        locked_at  TEXT    NOT NULL,
        PRIMARY KEY (world, x, y, z)
    );
    CREATE TABLE IF NOT EXISTS sign_holograms (
        world     TEXT    NOT NULL,
        x         INTEGER NOT NULL,
        y         INTEGER NOT NULL,
        z         INTEGER NOT NULL,
        entity_id TEXT    NOT NULL,
        PRIMARY KEY (world, x, y, z, entity_id)
    );";

/// Handle to the SQLite database backing both registries.
///
/// The connection sits behind a mutex; every public method holds it for the
/// whole statement or transaction.
pub struct Storage {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Open (or create) the database at `config.database_path`.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn open(config: &PersistenceConfig) -> Result<Self> {
        Self::open_at(&config.database_path, config)
    }

    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if missing. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn open_at<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "NeoLocks storage opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    // ------------------------------------------------------------------
    // Chest locks
    // ------------------------------------------------------------------

    /// Load every stored lock.
    ///
    /// Rows that fail to decode are skipped with a warning rather than
    /// failing the whole load.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn load_locks(&self) -> Result<Vec<LockRecord>> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT world, x, y, z, owner_id, owner_name, locked_at FROM chest_locks",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                PositionKey::new(row.get::<_, String>(0)?, row.get(1)?, row.get(2)?, row.get(3)?),
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (position, owner_id, owner_name, locked_at) = row?;
            match decode_lock(position, &owner_id, owner_name, &locked_at) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "Skipping undecodable lock row"),
            }
        }

        debug!(
            locks = records.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded chest locks"
        );
        Ok(records)
    }

    /// Upsert all `records` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures; nothing is
    /// written in that case.
    pub fn put_locks(&self, records: &[LockRecord]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO chest_locks (world, x, y, z, owner_id, owner_name, locked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(world, x, y, z) DO UPDATE SET
                    owner_id = excluded.owner_id,
                    owner_name = excluded.owner_name,
                    locked_at = excluded.locked_at",
            )?;
            for record in records {
                let p = &record.position;
                stmt.execute(params![
                    p.world,
                    p.x,
                    p.y,
                    p.z,
                    record.owner_id.0.to_string(),
                    record.owner_name,
                    record.locked_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete the locks at `positions` in one transaction.
    ///
    /// Returns how many rows were actually removed.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn delete_locks<'a, I>(&self, positions: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a PositionKey>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached(
                "DELETE FROM chest_locks WHERE world = ?1 AND x = ?2 AND y = ?3 AND z = ?4",
            )?;
            for p in positions {
                removed += stmt.execute(params![p.world, p.x, p.y, p.z])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Number of stored locks.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn lock_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM chest_locks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Sign holograms
    // ------------------------------------------------------------------

    /// Record that `entity` belongs to the label at `position`.
    ///
    /// Returns `false` if the pair was already stored.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn insert_hologram(&self, position: &PositionKey, entity: EntityRef) -> Result<bool> {
        let inserted = self.conn.lock().execute(
            "INSERT OR IGNORE INTO sign_holograms (world, x, y, z, entity_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![position.world, position.x, position.y, position.z, entity.0.to_string()],
        )?;
        Ok(inserted > 0)
    }

    /// Entity references at `position`, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn hologram_refs(&self, position: &PositionKey) -> Result<Vec<EntityRef>> {
        let conn = self.conn.lock();
        select_holograms(&conn, position)
    }

    /// Atomically read and delete every entity reference at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures; nothing is
    /// deleted in that case.
    pub fn take_holograms(&self, position: &PositionKey) -> Result<Vec<EntityRef>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let refs = select_holograms(&tx, position)?;
        if !refs.is_empty() {
            tx.execute(
                "DELETE FROM sign_holograms WHERE world = ?1 AND x = ?2 AND y = ?3 AND z = ?4",
                params![position.world, position.x, position.y, position.z],
            )?;
        }
        tx.commit()?;
        Ok(refs)
    }

    /// Number of stored hologram references across all positions.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn hologram_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM sign_holograms", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Copy the database to `dest_path` using SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// Run SQLite's integrity check. `Ok(false)` means corruption was found.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn select_holograms(conn: &Connection, position: &PositionKey) -> Result<Vec<EntityRef>> {
    let mut stmt = conn.prepare_cached(
        "SELECT entity_id FROM sign_holograms
         WHERE world = ?1 AND x = ?2 AND y = ?3 AND z = ?4
         ORDER BY rowid",
    )?;
    let rows = stmt.query_map(
        params![position.world, position.x, position.y, position.z],
        |row| row.get::<_, String>(0),
    )?;

    let mut refs = Vec::new();
    for row in rows {
        let id = row?;
        match Uuid::parse_str(&id) {
            Ok(uuid) => refs.push(EntityRef(uuid)),
            Err(_) => warn!(%position, id = %id, "Skipping hologram row with invalid UUID"),
        }
    }
    Ok(refs)
}

fn decode_lock(
    position: PositionKey,
    owner_id: &str,
    owner_name: String,
    locked_at: &str,
) -> Result<LockRecord> {
    let owner = Uuid::parse_str(owner_id)
        .map_err(|e| NeoLocksError::CorruptRecord(format!("{position}: owner id: {e}")))?;
    let locked_at = DateTime::parse_from_rfc3339(locked_at)
        .map_err(|e| NeoLocksError::CorruptRecord(format!("{position}: timestamp: {e}")))?
        .with_timezone(&Utc);
    Ok(LockRecord {
        owner_id: PlayerId(owner),
        owner_name,
        position,
        locked_at,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
