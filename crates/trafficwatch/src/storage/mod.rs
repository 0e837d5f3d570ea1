//! Storage layer for trafficwatch.
//!
//! This module provides `SQLite`-based persistent storage for road segments,
//! speed readings, thresholds, sensors, cars, observations, and users. Each
//! entity's queries live in their own submodule as `impl Storage` blocks.

mod cars;
pub mod migrations;
mod observations;
mod readings;
pub mod schema;
mod segments;
mod sensors;
mod thresholds;
mod users;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub use cars::normalize_plate;
pub use observations::ObservationContext;
pub use users::UserCredentials;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage engine for traffic data.
///
/// Wraps a single `SQLite` connection. Methods take `&self`; writes that must
/// be atomic across several statements go through [`Storage::atomically`].
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        Self::configure(&conn)?;
        // WAL lets readers proceed while a writer holds the lock
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        Self::configure(&conn)?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside a single immediate transaction.
    ///
    /// The write lock is taken up front, so concurrent writers queue behind
    /// the busy timeout instead of failing on a stale read snapshot. Any error
    /// returned by `f` rolls back every statement it issued.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`, or a database error if the
    /// transaction cannot be started or committed.
    pub fn atomically<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |table: &str| -> Result<i64> {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            road_segments: count("road_segments")?,
            speed_readings: count("speed_readings")?,
            sensors: count("sensors")?,
            cars: count("cars")?,
            traffic_observations: count("traffic_observations")?,
            db_size_bytes,
        })
    }
}

/// Row counts and size of the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of road segments.
    pub road_segments: i64,
    /// Number of speed readings.
    pub speed_readings: i64,
    /// Number of sensors.
    pub sensors: i64,
    /// Number of cars.
    pub cars: i64,
    /// Number of traffic observations.
    pub traffic_observations: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Current time at the precision timestamps are stored with.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Encode a timestamp as fixed-width RFC 3339 text.
pub(crate) fn encode_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read an RFC 3339 timestamp column.
pub(crate) fn column_time(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_failure(idx, e))
}

/// Read an optional RFC 3339 timestamp column.
pub(crate) fn column_time_opt(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        DateTime::parse_from_rfc3339(&t)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_failure(idx, e))
    })
    .transpose()
}

pub(crate) fn conversion_failure(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewRoadSegment;
    use geo_types::Point;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn segment_input() -> NewRoadSegment {
        NewRoadSegment {
            start_point: Point::new(1.0, 1.0),
            end_point: Point::new(2.0, 2.0),
            length: 1000.0,
        }
    }

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_path() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_encode_time_is_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2023-05-29T09:27:26.769Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2023-05-29T09:27:26Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(encode_time(a), "2023-05-29T09:27:26.769000Z");
        assert_eq!(encode_time(b), "2023-05-29T09:27:26.000000Z");
        assert!(encode_time(b) < encode_time(a));
    }

    #[test]
    fn test_atomically_commits_on_success() {
        let storage = create_test_storage();
        let id = storage
            .atomically(|s| Ok(s.create_segment(&segment_input())?.id))
            .unwrap();
        assert!(storage.segment(id).unwrap().is_some());
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let storage = create_test_storage();
        let result: Result<()> = storage.atomically(|s| {
            s.create_segment(&segment_input())?;
            s.create_segment(&segment_input())?;
            Err(Error::internal("abort"))
        });
        assert!(result.is_err());
        assert_eq!(storage.stats().unwrap().road_segments, 0);
    }

    #[test]
    fn test_stats_empty() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.road_segments, 0);
        assert_eq!(stats.cars, 0);
        assert_eq!(stats.traffic_observations, 0);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_open_file_based() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("trafficwatch_test_{}.db", std::process::id()));

        let storage = Storage::open(&db_path).unwrap();
        storage.create_segment(&segment_input()).unwrap();
        assert_eq!(storage.stats().unwrap().road_segments, 1);
        assert!(storage.stats().unwrap().db_size_bytes > 0);
        assert_eq!(storage.path(), db_path);

        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = std::env::temp_dir();
        let nested_path = temp_dir.join(format!(
            "trafficwatch_test_{}/nested/db.sqlite",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent.parent().unwrap());
        }
    }
}
