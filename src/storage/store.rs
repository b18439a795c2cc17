//! SQLite-backed Reading Store
//!
//! Uses a single `readings` table keyed by an AUTOINCREMENT id, with a
//! secondary B-tree index on `created_at` for newest-first queries.
//!
//! All writes go through one connection behind a mutex, so id assignment,
//! timestamping and commit happen as one serialized step. `synchronous = FULL`
//! means a successful `append` has been fsynced.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{format_timestamp, validate_sample, Reading};

/// History size used when the caller does not ask for one
pub const DEFAULT_RECENT_LIMIT: usize = 50;

const SELECT_COLUMNS: &str = "SELECT id, temperature, humidity, created_at FROM readings";

/// Configuration for the Reading Store
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the database file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("sensorcast"))
        .unwrap_or_else(|| PathBuf::from("./sensorcast_data"))
}

fn default_db_file() -> String {
    "readings.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: default_db_file(),
        }
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Full path to the database file
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }
}

/// Durable append-only store of readings.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct ReadingStore {
    /// std::sync::Mutex because rusqlite connections are !Sync
    inner: Arc<Mutex<StoreInner>>,
}

struct StoreInner {
    conn: Connection,
    /// Timestamp handed to the most recent append, used to keep created_at monotonic
    last_created_at: Option<DateTime<Utc>>,
}

impl ReadingStore {
    /// Create or open the store on disk
    pub fn open(config: &StoreConfig) -> StorageResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let path = config.db_path();
        let conn = Connection::open(&path)?;
        let store = Self::init(conn)?;
        tracing::info!(path = ?path, "Opened reading store");
        Ok(store)
    }

    /// Open a throwaway store that lives only in memory
    pub fn in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            ",
        )?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                temperature REAL NOT NULL,
                humidity REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_readings_created_at ON readings(created_at);
            ",
        )?;

        let last_created_at = conn
            .query_row(
                "SELECT created_at FROM readings ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self {
            inner: Arc::new(Mutex::new(StoreInner {
                conn,
                last_created_at,
            })),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_inner<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut StoreInner) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|e| StorageError::Lock(e.to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }

    /// Store a new reading, assigning its id and acceptance timestamp.
    ///
    /// Returns only after the row is committed to disk.
    pub async fn append(&self, temperature: f64, humidity: f64) -> StorageResult<Reading> {
        validate_sample(temperature, humidity)?;
        self.with_inner(move |inner| inner.insert(temperature, humidity))
            .await
    }

    /// Most recent readings, newest first, at most `limit` of them
    pub async fn recent(&self, limit: usize) -> StorageResult<Vec<Reading>> {
        if limit == 0 {
            return Err(StorageError::Invalid(
                "limit must be a positive integer".to_string(),
            ));
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.with_inner(move |inner| {
            let mut stmt = inner.conn.prepare_cached(&format!(
                "{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], row_to_reading)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    /// The single most recent reading, or `None` while the store is empty
    pub async fn latest(&self) -> StorageResult<Option<Reading>> {
        self.with_inner(|inner| {
            let reading = inner
                .conn
                .query_row(
                    &format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT 1"),
                    [],
                    row_to_reading,
                )
                .optional()?;
            Ok(reading)
        })
        .await
    }

    /// Look up one reading by id
    pub async fn get(&self, id: i64) -> StorageResult<Option<Reading>> {
        self.with_inner(move |inner| {
            let reading = inner
                .conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    params![id],
                    row_to_reading,
                )
                .optional()?;
            Ok(reading)
        })
        .await
    }

    /// Number of stored readings
    pub async fn count(&self) -> StorageResult<u64> {
        self.with_inner(|inner| {
            let count: i64 = inner
                .conn
                .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}

impl StoreInner {
    fn insert(&mut self, temperature: f64, humidity: f64) -> StorageResult<Reading> {
        // Never hand out a timestamp earlier than the previous one, even if the clock steps back
        let now = Utc::now();
        let stamp = match self.last_created_at {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        let created_at = format_timestamp(stamp);

        self.conn.execute(
            "INSERT INTO readings (temperature, humidity, created_at) VALUES (?1, ?2, ?3)",
            params![temperature, humidity, created_at],
        )?;
        let id = self.conn.last_insert_rowid();
        self.last_created_at = Some(stamp);

        tracing::debug!(reading_id = id, temperature, humidity, "Reading committed");

        Ok(Reading {
            id,
            temperature,
            humidity,
            created_at,
        })
    }
}

fn row_to_reading(row: &Row<'_>) -> rusqlite::Result<Reading> {
    Ok(Reading {
        id: row.get(0)?,
        temperature: row.get(1)?,
        humidity: row.get(2)?,
        created_at: row.get(3)?,
    })
}
