//! Cache partition store trait, SQLite implementation, and in-memory implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

use crate::http::{RequestKey, Response};

/// A cached entry together with its capture timestamp.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  /// The captured response
  pub response: Response,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache partition storage backends.
///
/// Entries within a partition keep their insertion order; overwriting an
/// existing key refreshes the entry without moving it. There is no
/// entry-level expiry; entries live until their partition is deleted.
pub trait CachePartitionStore: Send + Sync {
  /// Open (create if absent) a partition by name.
  fn open_partition(&self, name: &str) -> Result<()>;

  /// Get an entry from one partition.
  fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Get an entry from whichever partition holds it, searched in partition
  /// creation order.
  fn get_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Write an entry (overwrite on conflict). Creates the partition if needed.
  fn put(&self, partition: &str, key: &RequestKey, response: &Response) -> Result<()>;

  /// All partition names, in creation order.
  fn list_partitions(&self) -> Result<Vec<String>>;

  /// Delete a partition and all of its entries.
  fn delete_partition(&self, name: &str) -> Result<()>;
}

/// SQLite-based partition store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an in-memory store (used by tests).
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("offcache").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(PARTITION_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for partition tables.
const PARTITION_SCHEMA: &str = r#"
-- Named, versioned cache partitions (rowid preserves creation order)
CREATE TABLE IF NOT EXISTS partitions (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Request -> response entries; position preserves insertion order
CREATE TABLE IF NOT EXISTS entries (
    partition_name TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    request_key TEXT NOT NULL,
    status INTEGER NOT NULL,
    reason TEXT NOT NULL,
    headers BLOB NOT NULL,
    body BLOB NOT NULL,
    position INTEGER NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (partition_name, key_hash)
);

CREATE INDEX IF NOT EXISTS idx_entries_position ON entries(partition_name, position);
"#;

fn row_to_cached(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u16, String, Vec<u8>, Vec<u8>, String)> {
  Ok((
    row.get(0)?,
    row.get(1)?,
    row.get(2)?,
    row.get(3)?,
    row.get(4)?,
  ))
}

fn build_cached(
  (status, reason, headers, body, cached_at): (u16, String, Vec<u8>, Vec<u8>, String),
) -> Result<CachedResponse> {
  let headers: Vec<(String, String)> =
    serde_json::from_slice(&headers).map_err(|e| eyre!("Failed to decode cached headers: {}", e))?;

  Ok(CachedResponse {
    response: Response {
      status,
      reason,
      headers,
      body,
    },
    cached_at: parse_datetime(&cached_at)?,
  })
}

impl CachePartitionStore for SqliteStore {
  fn open_partition(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO partitions (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open partition {}: {}", name, e))?;

    Ok(())
  }

  fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row = conn
      .query_row(
        "SELECT status, reason, headers, body, cached_at FROM entries
         WHERE partition_name = ? AND key_hash = ?",
        params![partition, key.storage_hash()],
        row_to_cached,
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", key, e))?;

    row.map(build_cached).transpose()
  }

  fn get_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row = conn
      .query_row(
        "SELECT e.status, e.reason, e.headers, e.body, e.cached_at FROM entries e
         INNER JOIN partitions p ON e.partition_name = p.name
         WHERE e.key_hash = ?
         ORDER BY p.rowid
         LIMIT 1",
        params![key.storage_hash()],
        row_to_cached,
      )
      .optional()
      .map_err(|e| eyre!("Failed to match cache entry {}: {}", key, e))?;

    row.map(build_cached).transpose()
  }

  fn put(&self, partition: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_vec(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    // Partition is created lazily on first write (the dynamic partition has
    // no install step).
    conn
      .execute(
        "INSERT OR IGNORE INTO partitions (name) VALUES (?)",
        params![partition],
      )
      .map_err(|e| eyre!("Failed to open partition {}: {}", partition, e))?;

    // Overwrite keeps the entry's original insertion position.
    conn
      .execute(
        "INSERT INTO entries (partition_name, key_hash, request_key, status, reason, headers, body, position, cached_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7,
                 (SELECT COALESCE(MAX(position) + 1, 0) FROM entries WHERE partition_name = ?1),
                 datetime('now'))
         ON CONFLICT (partition_name, key_hash) DO UPDATE SET
           status = excluded.status,
           reason = excluded.reason,
           headers = excluded.headers,
           body = excluded.body,
           cached_at = excluded.cached_at",
        params![
          partition,
          key.storage_hash(),
          key.as_str(),
          response.status,
          response.reason,
          headers,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}: {}", key, e))?;

    Ok(())
  }

  fn list_partitions(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM partitions ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare partition query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list partitions: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read partition name: {}", e))?;

    Ok(names)
  }

  fn delete_partition(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // Entries and the partition row go together or not at all.
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin deletion of partition {}: {}", name, e))?;

    tx.execute("DELETE FROM entries WHERE partition_name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete entries of partition {}: {}", name, e))?;
    tx.execute("DELETE FROM partitions WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete partition {}: {}", name, e))?;

    tx
      .commit()
      .map_err(|e| eyre!("Failed to commit deletion of partition {}: {}", name, e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

/// In-memory partition store.
///
/// Same contract as [`SqliteStore`]; useful for hosts without a filesystem
/// and as the fake storage in tests.
#[derive(Default)]
pub struct MemoryStore {
  partitions: Mutex<Vec<MemoryPartition>>,
}

struct MemoryPartition {
  name: String,
  entries: Vec<(RequestKey, CachedResponse)>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CachePartitionStore for MemoryStore {
  fn open_partition(&self, name: &str) -> Result<()> {
    let mut partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if !partitions.iter().any(|p| p.name == name) {
      partitions.push(MemoryPartition {
        name: name.to_string(),
        entries: Vec::new(),
      });
    }
    Ok(())
  }

  fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      partitions
        .iter()
        .find(|p| p.name == partition)
        .and_then(|p| p.entries.iter().find(|(k, _)| k == key))
        .map(|(_, cached)| cached.clone()),
    )
  }

  fn get_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      partitions
        .iter()
        .flat_map(|p| p.entries.iter())
        .find(|(k, _)| k == key)
        .map(|(_, cached)| cached.clone()),
    )
  }

  fn put(&self, partition: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let mut partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let index = match partitions.iter().position(|p| p.name == partition) {
      Some(index) => index,
      None => {
        partitions.push(MemoryPartition {
          name: partition.to_string(),
          entries: Vec::new(),
        });
        partitions.len() - 1
      }
    };

    let cached = CachedResponse {
      response: response.clone(),
      cached_at: Utc::now(),
    };

    let entries = &mut partitions[index].entries;

    match entries.iter_mut().find(|(k, _)| k == key) {
      Some((_, existing)) => *existing = cached,
      None => entries.push((key.clone(), cached)),
    }
    Ok(())
  }

  fn list_partitions(&self) -> Result<Vec<String>> {
    let partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(partitions.iter().map(|p| p.name.clone()).collect())
  }

  fn delete_partition(&self, name: &str) -> Result<()> {
    let mut partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    partitions.retain(|p| p.name != name);
    Ok(())
  }
}
