//! Snapshots and persistence for memory networks.
//!
//! A [`NetworkSnapshot`] is the serialisable form of a store: every record
//! with its id and usage, plus each undirected edge once. Snapshots are
//! written either as plain JSON files ([`save_json`] / [`load_json`]) or
//! into a SQLite database of named networks ([`PersistenceEngine`]):
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS memory_networks (
//!     name       TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```
//!
//! The JSON payload keeps the schema stable as record fields evolve, and the
//! optional CRC-32 column flags corrupted saves.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{NetworkConfig, PersistenceConfig};
use crate::error::{MemnetError, Result};
use crate::network::MemoryNetwork;
use crate::record::Record;
use crate::types::RecordId;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS memory_networks (
    name       TEXT PRIMARY KEY,
    data       BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

// ---------------------------------------------------------------------------
// Snapshot format
// ---------------------------------------------------------------------------

/// Serialisable image of a whole store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Format version; see [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Every stored record, sorted by id.
    pub records: Vec<SnapshotRecord>,
    /// Every undirected edge once, with `a < b`.
    pub edges: Vec<SnapshotEdge>,
}

/// One record and the id it was stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Record id.
    pub id: RecordId,
    /// Record contents including usage metadata.
    pub record: Record,
}

/// One association edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    /// Lower endpoint.
    pub a: RecordId,
    /// Higher endpoint.
    pub b: RecordId,
    /// Association strength.
    pub strength: f64,
}

impl NetworkSnapshot {
    /// Encode as JSON bytes.
    ///
    /// # Errors
    /// Returns [`MemnetError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| MemnetError::Serialization(e.to_string()))
    }

    /// Decode from JSON bytes, rejecting snapshots from a newer format.
    ///
    /// # Errors
    /// Returns [`MemnetError::Serialization`] on malformed input or an
    /// unsupported version.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_slice(data).map_err(|e| MemnetError::Serialization(e.to_string()))?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(MemnetError::Serialization(format!(
                "unsupported snapshot version {} (newest known is {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// JSON files
// ---------------------------------------------------------------------------

/// Write `network` to `path` as a JSON snapshot.
///
/// # Errors
/// Returns [`MemnetError::Serialization`] or [`MemnetError::Io`].
pub fn save_json<P: AsRef<Path>>(network: &MemoryNetwork, path: P) -> Result<()> {
    let json = network.snapshot().to_json()?;
    std::fs::write(path.as_ref(), &json)?;
    debug!(
        path = %path.as_ref().display(),
        records = network.len(),
        bytes = json.len(),
        "Saved network snapshot"
    );
    Ok(())
}

/// Read a JSON snapshot from `path` and restore it under `config`.
///
/// # Errors
/// Returns [`MemnetError::Io`], [`MemnetError::Serialization`], or the
/// error from [`MemoryNetwork::restore`].
pub fn load_json<P: AsRef<Path>>(path: P, config: NetworkConfig) -> Result<MemoryNetwork> {
    let data = std::fs::read(path.as_ref())?;
    let snapshot = NetworkSnapshot::from_json(&data)?;
    MemoryNetwork::restore(snapshot, config)
}

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32(data))
}

/// CRC-32 (ISO 3309, reflected polynomial `0xEDB88320`).
fn crc32(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (0..8).fold(crc ^ u32::from(byte), |c, _| {
            if c & 1 == 1 { (c >> 1) ^ POLY } else { c >> 1 }
        })
    })
}

// ---------------------------------------------------------------------------
// PersistenceEngine
// ---------------------------------------------------------------------------

/// SQLite database holding any number of named networks.
///
/// ```no_run
/// # use memnet_core::persistence::PersistenceEngine;
/// # use memnet_core::config::{NetworkConfig, PersistenceConfig};
/// # use memnet_core::network::MemoryNetwork;
/// let engine = PersistenceEngine::open("memories.db", &PersistenceConfig::default())?;
/// let network = MemoryNetwork::default();
/// engine.save_network("alice", &network)?;
/// let loaded = engine.load_network("alice", NetworkConfig::default())?;
/// # Ok::<(), memnet_core::error::MemnetError>(())
/// ```
pub struct PersistenceEngine {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for PersistenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceEngine")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PersistenceEngine {
    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "memnet persistence engine opened"
        );

        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open a throwaway in-memory database.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    // ------------------------------------------------------------------
    // Core CRUD
    // ------------------------------------------------------------------

    /// Save (upsert) `network` under `name`.
    ///
    /// # Errors
    /// Returns [`MemnetError::Serialization`] or [`MemnetError::Database`].
    pub fn save_network(&self, name: &str, network: &MemoryNetwork) -> Result<()> {
        self.save_snapshot(name, &network.snapshot())
    }

    /// Save (upsert) a snapshot under `name`.
    ///
    /// # Errors
    /// Returns [`MemnetError::Serialization`] or [`MemnetError::Database`].
    pub fn save_snapshot(&self, name: &str, snapshot: &NetworkSnapshot) -> Result<()> {
        let start = Instant::now();
        let json = snapshot.to_json()?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO memory_networks (name, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![name, json, now, checksum],
        )?;

        debug!(
            network = name,
            records = snapshot.records.len(),
            edges = snapshot.edges.len(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved memory network"
        );
        Ok(())
    }

    /// Load the network saved under `name` and restore it under `config`.
    ///
    /// Returns `None` if nothing is saved under `name`.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`], [`MemnetError::Serialization`], or
    /// the error from [`MemoryNetwork::restore`].
    pub fn load_network(&self, name: &str, config: NetworkConfig) -> Result<Option<MemoryNetwork>> {
        self.load_snapshot(name)?
            .map(|snapshot| MemoryNetwork::restore(snapshot, config))
            .transpose()
    }

    /// Load the raw snapshot saved under `name`.
    ///
    /// A checksum mismatch is logged but the data is still returned.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] or [`MemnetError::Serialization`].
    pub fn load_snapshot(&self, name: &str) -> Result<Option<NetworkSnapshot>> {
        let start = Instant::now();
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM memory_networks WHERE name = ?1")?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![name], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = row else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(expected) = stored_checksum {
                let actual = crc32_hex(&data);
                if expected != actual {
                    warn!(
                        network = name,
                        expected = %expected,
                        actual = %actual,
                        "Checksum mismatch; saved network may be corrupted"
                    );
                }
            }
        }

        let snapshot = NetworkSnapshot::from_json(&data)?;
        debug!(
            network = name,
            records = snapshot.records.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded memory network"
        );
        Ok(Some(snapshot))
    }

    /// Delete the network saved under `name`. Returns whether a row existed.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] on SQLite failures.
    pub fn delete_network(&self, name: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM memory_networks WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    /// Names of all saved networks, sorted.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] on SQLite failures.
    pub fn list_networks(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name FROM memory_networks ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Number of saved networks.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] on SQLite failures.
    pub fn network_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM memory_networks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Copy the database to `dest_path` with SQLite's online-backup API.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// Write `<db>.bak.1`, shifting older backups up and keeping at most
    /// `config.backup_count`. No-op for in-memory databases.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] or [`MemnetError::Io`].
    pub fn create_rotating_backup(&self) -> Result<()> {
        let max = self.config.backup_count;
        if self.is_in_memory() || max == 0 {
            return Ok(());
        }

        for i in (1..max).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                std::fs::rename(&src, self.backup_path(i + 1))?;
            }
        }
        let overflow = self.backup_path(max + 1);
        if overflow.exists() {
            std::fs::remove_file(&overflow)?;
        }

        self.backup(self.backup_path(1))?;
        info!(max_backups = max, "Rotating backup created");
        Ok(())
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut name = self.db_path.as_os_str().to_owned();
        name.push(format!(".bak.{n}"));
        PathBuf::from(name)
    }

    fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// Path to the database file, or `:memory:`.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `PRAGMA integrity_check`; `true` means the database is sound.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Reclaim unused space.
    ///
    /// # Errors
    /// Returns [`MemnetError::Database`] on SQLite failures.
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}
