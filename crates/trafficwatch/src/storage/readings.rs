//! Speed reading queries.

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{column_time, encode_time, limit_param, now, Storage};
use crate::error::{Error, Result};
use crate::model::SpeedReading;

impl Storage {
    /// Record a speed reading for a segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for a NaN or infinite speed,
    /// [`Error::UnknownSegment`] if the segment does not exist, or an error if
    /// the database operation fails.
    pub fn insert_reading(&self, road_segment: i64, speed: f64) -> Result<SpeedReading> {
        if !speed.is_finite() {
            return Err(Error::InvalidRequest(format!(
                "speed must be a finite number, got {speed}"
            )));
        }
        if !self.segment_exists(road_segment)? {
            return Err(Error::UnknownSegment(road_segment));
        }

        let created_at = now();
        self.conn.execute(
            "INSERT INTO speed_readings (road_segment_id, speed, created_at) VALUES (?1, ?2, ?3)",
            params![road_segment, speed, encode_time(created_at)],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Recorded speed {} for segment {}", speed, road_segment);
        Ok(SpeedReading {
            id,
            road_segment,
            speed,
            created_at,
        })
    }

    /// Get a reading by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn reading(&self, id: i64) -> Result<Option<SpeedReading>> {
        let reading = self
            .conn
            .query_row(
                "SELECT id, road_segment_id, speed, created_at FROM speed_readings WHERE id = ?1",
                [id],
                Self::row_to_reading,
            )
            .optional()?;
        Ok(reading)
    }

    /// List readings newest first, optionally restricted to one segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn readings(&self, road_segment: Option<i64>, limit: usize) -> Result<Vec<SpeedReading>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, road_segment_id, speed, created_at FROM speed_readings
            WHERE ?1 IS NULL OR road_segment_id = ?1
            ORDER BY created_at DESC, id DESC LIMIT ?2
            ",
        )?;
        let readings = stmt
            .query_map(params![road_segment, limit_param(limit)], Self::row_to_reading)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    /// Delete a reading.
    ///
    /// Returns `true` if a reading was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_reading(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM speed_readings WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    fn row_to_reading(row: &rusqlite::Row) -> rusqlite::Result<SpeedReading> {
        Ok(SpeedReading {
            id: row.get(0)?,
            road_segment: row.get(1)?,
            speed: row.get(2)?,
            created_at: column_time(row, 3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewRoadSegment;
    use geo_types::Point;

    fn storage_with_segment() -> (Storage, i64) {
        let storage = Storage::open_in_memory().expect("failed to create test storage");
        let segment = storage
            .create_segment(&NewRoadSegment {
                start_point: Point::new(1.0, 1.0),
                end_point: Point::new(2.0, 2.0),
                length: 1000.0,
            })
            .unwrap();
        (storage, segment.id)
    }

    #[test]
    fn test_insert_requires_segment() {
        let (storage, _) = storage_with_segment();
        let err = storage.insert_reading(9999, 50.0).unwrap_err();
        assert!(matches!(err, Error::UnknownSegment(9999)));
        assert_eq!(storage.stats().unwrap().speed_readings, 0);
    }

    #[test]
    fn test_segment_reflects_newest_reading() {
        let (storage, segment) = storage_with_segment();
        assert!(storage.segment(segment).unwrap().unwrap().latest_reading.is_none());

        storage.insert_reading(segment, 50.0).unwrap();
        let last = storage.insert_reading(segment, 60.0).unwrap();

        let state = storage.segment(segment).unwrap().unwrap();
        let latest = state.latest_reading.unwrap();
        assert!((latest.speed - 60.0).abs() < f64::EPSILON);
        assert_eq!(latest.created_at, last.created_at);
        assert_eq!(state.readings_count, 2);
    }

    #[test]
    fn test_insert_rejects_non_finite_speed() {
        let (storage, segment) = storage_with_segment();
        for speed in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = storage.insert_reading(segment, speed).unwrap_err();
            assert!(matches!(err, Error::InvalidRequest(_)));
        }
        assert_eq!(storage.stats().unwrap().speed_readings, 0);
    }

    #[test]
    fn test_readings_newest_first_and_filtered() {
        let (storage, segment) = storage_with_segment();
        let other = storage
            .create_segment(&NewRoadSegment {
                start_point: Point::new(3.0, 3.0),
                end_point: Point::new(4.0, 4.0),
                length: 10.0,
            })
            .unwrap()
            .id;

        storage.insert_reading(segment, 50.0).unwrap();
        storage.insert_reading(segment, 60.0).unwrap();
        storage.insert_reading(other, 70.0).unwrap();

        let all = storage.readings(None, 100).unwrap();
        assert_eq!(all.len(), 3);
        assert!((all[0].speed - 70.0).abs() < f64::EPSILON);

        let filtered = storage.readings(Some(segment), 100).unwrap();
        assert_eq!(filtered.len(), 2);
        assert!((filtered[0].speed - 60.0).abs() < f64::EPSILON);
        assert!((filtered[1].speed - 50.0).abs() < f64::EPSILON);

        assert_eq!(storage.readings(None, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_get_and_delete() {
        let (storage, segment) = storage_with_segment();
        let reading = storage.insert_reading(segment, 33.0).unwrap();

        assert_eq!(storage.reading(reading.id).unwrap(), Some(reading.clone()));
        assert!(storage.delete_reading(reading.id).unwrap());
        assert!(storage.reading(reading.id).unwrap().is_none());
        assert!(!storage.delete_reading(reading.id).unwrap());
    }
}
