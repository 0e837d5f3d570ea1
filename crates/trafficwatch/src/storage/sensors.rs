//! Sensor queries.

use rusqlite::{params, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use super::{column_time, conversion_failure, encode_time, now, Storage};
use crate::error::{is_unique_violation, Error, Result};
use crate::model::{NewSensor, Sensor, MAX_SENSOR_NAME_LEN};

const SENSOR_COLUMNS: &str = "id, name, uuid, created_at";

/// Convert the sensor columns starting at `offset` into a [`Sensor`].
pub(super) fn sensor_from_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<Sensor> {
    let uuid_text: String = row.get(offset + 2)?;
    Ok(Sensor {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        uuid: Uuid::parse_str(&uuid_text).map_err(|e| conversion_failure(offset + 2, e))?,
        created_at: column_time(row, offset + 3)?,
    })
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_SENSOR_NAME_LEN {
        return Err(Error::InvalidRequest(format!(
            "sensor name must be between 1 and {MAX_SENSOR_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

fn duplicate_uuid(uuid: Uuid) -> impl FnOnce(rusqlite::Error) -> Error {
    move |err| {
        if is_unique_violation(&err) {
            Error::Conflict(format!("sensor with uuid {uuid} already exists"))
        } else {
            err.into()
        }
    }
}

impl Storage {
    /// Register a sensor. A missing UUID is generated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the UUID is already registered,
    /// [`Error::InvalidRequest`] for an unusable name, or an error if the
    /// database operation fails.
    pub fn create_sensor(&self, input: &NewSensor) -> Result<Sensor> {
        let name = validate_name(&input.name)?;
        let uuid = input.uuid.unwrap_or_else(Uuid::new_v4);
        let created_at = now();

        self.conn
            .execute(
                "INSERT INTO sensors (name, uuid, created_at) VALUES (?1, ?2, ?3)",
                params![name, uuid.to_string(), encode_time(created_at)],
            )
            .map_err(duplicate_uuid(uuid))?;

        let id = self.conn.last_insert_rowid();
        debug!("Registered sensor {} ({})", id, uuid);
        Ok(Sensor {
            id,
            name: name.to_string(),
            uuid,
            created_at,
        })
    }

    /// Get a sensor by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn sensor(&self, id: i64) -> Result<Option<Sensor>> {
        let sql = format!("SELECT {SENSOR_COLUMNS} FROM sensors WHERE id = ?1");
        let sensor = self
            .conn
            .query_row(&sql, [id], |row| sensor_from_row(row, 0))
            .optional()?;
        Ok(sensor)
    }

    /// Get a sensor by its external identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn sensor_by_uuid(&self, uuid: Uuid) -> Result<Option<Sensor>> {
        let sql = format!("SELECT {SENSOR_COLUMNS} FROM sensors WHERE uuid = ?1");
        let sensor = self
            .conn
            .query_row(&sql, [uuid.to_string()], |row| sensor_from_row(row, 0))
            .optional()?;
        Ok(sensor)
    }

    /// List all sensors, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn sensors(&self) -> Result<Vec<Sensor>> {
        let sql = format!("SELECT {SENSOR_COLUMNS} FROM sensors ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let sensors = stmt
            .query_map([], |row| sensor_from_row(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sensors)
    }

    /// Administratively replace a sensor's name and, if given, its UUID.
    ///
    /// Returns `None` if the sensor does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the new UUID belongs to another sensor,
    /// [`Error::InvalidRequest`] for an unusable name, or an error if the
    /// database operation fails.
    pub fn replace_sensor(&self, id: i64, input: &NewSensor) -> Result<Option<Sensor>> {
        let name = validate_name(&input.name)?;
        let Some(existing) = self.sensor(id)? else {
            return Ok(None);
        };
        let uuid = input.uuid.unwrap_or(existing.uuid);

        self.conn
            .execute(
                "UPDATE sensors SET name = ?2, uuid = ?3 WHERE id = ?1",
                params![id, name, uuid.to_string()],
            )
            .map_err(duplicate_uuid(uuid))?;

        Ok(Some(Sensor {
            name: name.to_string(),
            uuid,
            ..existing
        }))
    }

    /// Delete a sensor together with its observations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_sensor(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM sensors WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}
