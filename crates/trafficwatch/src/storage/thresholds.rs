//! Traffic intensity threshold queries.
//!
//! The most recently written record is the current one. With no records the
//! documented defaults apply.

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{column_time, encode_time, now, Storage};
use crate::error::Result;
use crate::intensity::Thresholds;
use crate::model::ThresholdRecord;

const THRESHOLD_COLUMNS: &str = "id, medium_min, medium_max, created_at";

impl Storage {
    /// Thresholds currently in effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the stored record
    /// is not strictly ordered.
    pub fn current_thresholds(&self) -> Result<Thresholds> {
        match self.current_threshold_record()? {
            Some(record) => Thresholds::new(record.medium_min, record.medium_max),
            None => Ok(Thresholds::default()),
        }
    }

    /// The threshold record currently in effect, if any was ever written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn current_threshold_record(&self) -> Result<Option<ThresholdRecord>> {
        let sql = format!(
            "SELECT {THRESHOLD_COLUMNS} FROM traffic_thresholds ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let record = self
            .conn
            .query_row(&sql, [], Self::row_to_threshold)
            .optional()?;
        Ok(record)
    }

    /// Write a new threshold record, making it current.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidThreshold`] without touching storage when
    /// `medium_min >= medium_max`, or an error if the database operation fails.
    pub fn set_thresholds(&self, medium_min: f64, medium_max: f64) -> Result<ThresholdRecord> {
        let thresholds = Thresholds::new(medium_min, medium_max)?;
        let created_at = now();
        self.conn.execute(
            "INSERT INTO traffic_thresholds (medium_min, medium_max, created_at) VALUES (?1, ?2, ?3)",
            params![
                thresholds.medium_min(),
                thresholds.medium_max(),
                encode_time(created_at)
            ],
        )?;

        info!(
            "Traffic thresholds set to medium_min={} medium_max={}",
            medium_min, medium_max
        );
        Ok(ThresholdRecord {
            id: self.conn.last_insert_rowid(),
            medium_min,
            medium_max,
            created_at,
        })
    }

    /// Rewrite an existing threshold record. The record is re-stamped and
    /// becomes current.
    ///
    /// Returns `None` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidThreshold`] without touching storage when
    /// `medium_min >= medium_max`, or an error if the database operation fails.
    pub fn update_threshold(
        &self,
        id: i64,
        medium_min: f64,
        medium_max: f64,
    ) -> Result<Option<ThresholdRecord>> {
        let thresholds = Thresholds::new(medium_min, medium_max)?;
        let created_at = now();
        let affected = self.conn.execute(
            "UPDATE traffic_thresholds SET medium_min = ?2, medium_max = ?3, created_at = ?4 WHERE id = ?1",
            params![
                id,
                thresholds.medium_min(),
                thresholds.medium_max(),
                encode_time(created_at)
            ],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        Ok(Some(ThresholdRecord {
            id,
            medium_min,
            medium_max,
            created_at,
        }))
    }

    /// Get a threshold record by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn threshold(&self, id: i64) -> Result<Option<ThresholdRecord>> {
        let sql = format!("SELECT {THRESHOLD_COLUMNS} FROM traffic_thresholds WHERE id = ?1");
        let record = self
            .conn
            .query_row(&sql, [id], Self::row_to_threshold)
            .optional()?;
        Ok(record)
    }

    /// List threshold records, current first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn thresholds(&self) -> Result<Vec<ThresholdRecord>> {
        let sql = format!(
            "SELECT {THRESHOLD_COLUMNS} FROM traffic_thresholds ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], Self::row_to_threshold)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Delete a threshold record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_threshold(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM traffic_thresholds WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    fn row_to_threshold(row: &rusqlite::Row) -> rusqlite::Result<ThresholdRecord> {
        Ok(ThresholdRecord {
            id: row.get(0)?,
            medium_min: row.get(1)?,
            medium_max: row.get(2)?,
            created_at: column_time(row, 3)?,
        })
    }
}
