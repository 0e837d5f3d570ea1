//! Road segment queries.

use geo_types::Point;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{column_time, column_time_opt, conversion_failure, encode_time, now, Storage};
use crate::error::Result;
use crate::model::{wkt_point, LatestReading, NewRoadSegment, SegmentState};

/// Columns selected for a segment joined with its latest reading.
///
/// Always read through [`segment_from_row`] with the matching offset.
pub(super) const SEGMENT_COLUMNS: &str = r"
    s.id, s.start_point, s.end_point, s.length, s.created_at,
    (SELECT r.speed FROM speed_readings r WHERE r.road_segment_id = s.id
        ORDER BY r.created_at DESC, r.id DESC LIMIT 1),
    (SELECT r.created_at FROM speed_readings r WHERE r.road_segment_id = s.id
        ORDER BY r.created_at DESC, r.id DESC LIMIT 1),
    (SELECT COUNT(*) FROM speed_readings r WHERE r.road_segment_id = s.id)
";

/// Number of columns in [`SEGMENT_COLUMNS`].
pub(super) const SEGMENT_COLUMN_COUNT: usize = 8;

/// Convert the segment columns starting at `offset` into a [`SegmentState`].
pub(super) fn segment_from_row(
    row: &rusqlite::Row,
    offset: usize,
) -> rusqlite::Result<SegmentState> {
    let latest_speed: Option<f64> = row.get(offset + 5)?;
    let latest_at = column_time_opt(row, offset + 6)?;
    let latest_reading = match (latest_speed, latest_at) {
        (Some(speed), Some(created_at)) => Some(LatestReading { speed, created_at }),
        _ => None,
    };

    Ok(SegmentState {
        id: row.get(offset)?,
        start_point: column_point(row, offset + 1)?,
        end_point: column_point(row, offset + 2)?,
        length: row.get(offset + 3)?,
        created_at: column_time(row, offset + 4)?,
        latest_reading,
        readings_count: row.get(offset + 7)?,
    })
}

fn column_point(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Point<f64>> {
    let text: String = row.get(idx)?;
    wkt_point::parse(&text).map_err(|e| conversion_failure(idx, e))
}

impl Storage {
    /// Create a road segment.
    ///
    /// # Errors
    ///
    /// Returns an error if a coordinate or the length is not finite, or if the
    /// database operation fails.
    pub fn create_segment(&self, input: &NewRoadSegment) -> Result<SegmentState> {
        input.validate()?;
        let created_at = now();
        self.conn.execute(
            r"
            INSERT INTO road_segments (start_point, end_point, length, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                wkt_point::format(&input.start_point),
                wkt_point::format(&input.end_point),
                input.length,
                encode_time(created_at),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Created road segment {}", id);
        Ok(SegmentState {
            id,
            start_point: input.start_point,
            end_point: input.end_point,
            length: input.length,
            created_at,
            latest_reading: None,
            readings_count: 0,
        })
    }

    /// Get a road segment with its latest reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn segment(&self, id: i64) -> Result<Option<SegmentState>> {
        let sql = format!("SELECT {SEGMENT_COLUMNS} FROM road_segments s WHERE s.id = ?1");
        let segment = self
            .conn
            .query_row(&sql, [id], |row| segment_from_row(row, 0))
            .optional()?;
        Ok(segment)
    }

    /// List all road segments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn segments(&self) -> Result<Vec<SegmentState>> {
        let sql = format!("SELECT {SEGMENT_COLUMNS} FROM road_segments s ORDER BY s.id");
        let mut stmt = self.conn.prepare(&sql)?;
        let segments = stmt
            .query_map([], |row| segment_from_row(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(segments)
    }

    /// Check whether a road segment exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn segment_exists(&self, id: i64) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM road_segments WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Replace a road segment's attributes.
    ///
    /// Returns `None` if the segment does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a coordinate or the length is not finite, or if the
    /// database operation fails.
    pub fn update_segment(&self, id: i64, input: &NewRoadSegment) -> Result<Option<SegmentState>> {
        input.validate()?;
        let affected = self.conn.execute(
            r"
            UPDATE road_segments SET start_point = ?2, end_point = ?3, length = ?4
            WHERE id = ?1
            ",
            params![
                id,
                wkt_point::format(&input.start_point),
                wkt_point::format(&input.end_point),
                input.length,
            ],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        self.segment(id)
    }

    /// Delete a road segment together with its readings and observations.
    ///
    /// Returns `true` if a segment was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_segment(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM road_segments WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn input(x: f64, length: f64) -> NewRoadSegment {
        NewRoadSegment {
            start_point: Point::new(x, x),
            end_point: Point::new(x + 1.0, x + 1.0),
            length,
        }
    }

    #[test]
    fn test_create_and_get() {
        let storage = create_test_storage();
        let created = storage.create_segment(&input(1.0, 1000.0)).unwrap();

        let fetched = storage.segment(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.start_point, Point::new(1.0, 1.0));
        assert!(fetched.latest_reading.is_none());
        assert_eq!(fetched.readings_count, 0);
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        let storage = create_test_storage();
        assert!(storage.create_segment(&input(f64::NAN, 10.0)).is_err());
        assert!(storage.create_segment(&input(1.0, f64::INFINITY)).is_err());

        let created = storage.create_segment(&input(1.0, 10.0)).unwrap();
        assert!(storage
            .update_segment(created.id, &input(f64::NEG_INFINITY, 10.0))
            .is_err());

        let segments = storage.segments().unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_point, Point::new(1.0, 1.0));
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        assert!(storage.segment(99999).unwrap().is_none());
        assert!(!storage.segment_exists(99999).unwrap());
    }

    #[test]
    fn test_list_includes_latest_reading() {
        let storage = create_test_storage();
        let a = storage.create_segment(&input(1.0, 1000.0)).unwrap();
        let b = storage.create_segment(&input(3.0, 1500.0)).unwrap();
        storage.insert_reading(a.id, 50.0).unwrap();
        storage.insert_reading(a.id, 60.0).unwrap();

        let segments = storage.segments().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].id, a.id);
        assert_eq!(segments[0].current_speed(), Some(60.0));
        assert_eq!(segments[0].readings_count, 2);
        assert_eq!(segments[1].id, b.id);
        assert_eq!(segments[1].current_speed(), None);
    }

    #[test]
    fn test_update() {
        let storage = create_test_storage();
        let created = storage.create_segment(&input(1.0, 1000.0)).unwrap();

        let updated = storage
            .update_segment(created.id, &input(5.0, 2000.0))
            .unwrap()
            .unwrap();
        assert!((updated.length - 2000.0).abs() < f64::EPSILON);
        assert_eq!(updated.start_point, Point::new(5.0, 5.0));
        assert_eq!(updated.created_at, created.created_at);

        assert!(storage.update_segment(99999, &input(1.0, 1.0)).unwrap().is_none());
    }

    #[test]
    fn test_delete_cascades_to_readings() {
        let storage = create_test_storage();
        let created = storage.create_segment(&input(1.0, 1000.0)).unwrap();
        storage.insert_reading(created.id, 42.0).unwrap();

        assert!(storage.delete_segment(created.id).unwrap());
        assert!(storage.segment(created.id).unwrap().is_none());
        assert_eq!(storage.stats().unwrap().speed_readings, 0);
        assert!(!storage.delete_segment(created.id).unwrap());
    }
}
