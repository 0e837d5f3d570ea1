//! Traffic observation queries.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension};

use super::segments::{segment_from_row, SEGMENT_COLUMNS, SEGMENT_COLUMN_COUNT};
use super::sensors::sensor_from_row;
use super::{column_time, encode_time, limit_param, now, Storage};
use crate::error::Result;
use crate::model::{SegmentState, Sensor, TrafficObservation};

const OBSERVATION_COLUMNS: &str =
    "id, road_segment_id, car_id, sensor_id, timestamp, created_at";

/// A stored sighting joined with the segment and sensor it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationContext {
    /// When the sighting occurred.
    pub timestamp: DateTime<Utc>,
    /// The segment as it is now, with its latest reading.
    pub segment: SegmentState,
    /// The sensor that reported the sighting.
    pub sensor: Sensor,
}

fn row_to_observation(row: &rusqlite::Row) -> rusqlite::Result<TrafficObservation> {
    Ok(TrafficObservation {
        id: row.get(0)?,
        road_segment: row.get(1)?,
        car: row.get(2)?,
        sensor: row.get(3)?,
        timestamp: column_time(row, 4)?,
        created_at: column_time(row, 5)?,
    })
}

impl Storage {
    /// Persist a sighting. Callers are expected to have checked that the
    /// referenced rows exist; foreign keys reject anything they missed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_observation(
        &self,
        road_segment: i64,
        car: i64,
        sensor: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<TrafficObservation> {
        // Stored at microsecond precision; echo what was stored
        let timestamp = timestamp.trunc_subsecs(6);
        let created_at = now();
        self.conn.execute(
            r"
            INSERT INTO traffic_observations
                (road_segment_id, car_id, sensor_id, timestamp, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                road_segment,
                car,
                sensor,
                encode_time(timestamp),
                encode_time(created_at)
            ],
        )?;

        Ok(TrafficObservation {
            id: self.conn.last_insert_rowid(),
            road_segment,
            car,
            sensor,
            timestamp,
            created_at,
        })
    }

    /// Get an observation by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn observation(&self, id: i64) -> Result<Option<TrafficObservation>> {
        let sql = format!("SELECT {OBSERVATION_COLUMNS} FROM traffic_observations WHERE id = ?1");
        let observation = self
            .conn
            .query_row(&sql, [id], row_to_observation)
            .optional()?;
        Ok(observation)
    }

    /// List observations, newest sighting first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn observations(&self, limit: usize) -> Result<Vec<TrafficObservation>> {
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS} FROM traffic_observations ORDER BY timestamp DESC, id DESC LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let observations = stmt
            .query_map([limit_param(limit)], row_to_observation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(observations)
    }

    /// Sightings of a car with `since <= timestamp <= until`, newest first,
    /// each joined with its segment and sensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn observations_for_car_between(
        &self,
        car: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ObservationContext>> {
        let sql = format!(
            r"
            SELECT o.timestamp, {SEGMENT_COLUMNS},
                   se.id, se.name, se.uuid, se.created_at
            FROM traffic_observations o
            JOIN road_segments s ON s.id = o.road_segment_id
            JOIN sensors se ON se.id = o.sensor_id
            WHERE o.car_id = ?1 AND o.timestamp >= ?2 AND o.timestamp <= ?3
            ORDER BY o.timestamp DESC, o.id DESC
            "
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![car, encode_time(since), encode_time(until)],
                |row| {
                    Ok(ObservationContext {
                        timestamp: column_time(row, 0)?,
                        segment: segment_from_row(row, 1)?,
                        sensor: sensor_from_row(row, 1 + SEGMENT_COLUMN_COUNT)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
