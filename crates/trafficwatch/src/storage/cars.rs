//! Car queries and license plate resolution.

use std::sync::LazyLock;

use regex::Regex;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{column_time, encode_time, now, Storage};
use crate::error::{Error, Result};
use crate::model::Car;

/// How many lookup/insert rounds [`Storage::resolve_car`] makes before giving up.
const RESOLVE_ATTEMPTS: usize = 3;

static PLATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\P{Cc}{1,20}$").expect("Invalid license plate pattern")
});

/// Trim and validate a license plate.
///
/// # Errors
///
/// Returns [`Error::InvalidLicensePlate`] if the plate is empty, longer than
/// 20 characters, or contains control characters.
pub fn normalize_plate(plate: &str) -> Result<String> {
    let trimmed = plate.trim();
    if PLATE_PATTERN.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(Error::InvalidLicensePlate(plate.to_string()))
    }
}

fn row_to_car(row: &rusqlite::Row) -> rusqlite::Result<Car> {
    Ok(Car {
        id: row.get(0)?,
        license_plate: row.get(1)?,
        created_at: column_time(row, 2)?,
    })
}

impl Storage {
    /// Get the car for a plate, creating it on first sight.
    ///
    /// An insert that loses a race against another connection registering the
    /// same plate falls back to reading the winner's row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLicensePlate`] before any write for a malformed
    /// plate, or an error if the database operation fails.
    pub fn resolve_car(&self, plate: &str) -> Result<Car> {
        let plate = normalize_plate(plate)?;

        for attempt in 1..=RESOLVE_ATTEMPTS {
            if let Some(car) = self.car_by_plate(&plate)? {
                return Ok(car);
            }
            match self.insert_car(&plate) {
                Ok(car) => {
                    debug!("Registered car {} for plate {}", car.id, plate);
                    return Ok(car);
                }
                Err(err) if err.is_unique_violation() => {
                    debug!(
                        "Plate {} registered concurrently (attempt {}), retrying lookup",
                        plate, attempt
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(Error::internal(format!(
            "could not resolve plate {plate} after {RESOLVE_ATTEMPTS} attempts"
        )))
    }

    fn insert_car(&self, plate: &str) -> Result<Car> {
        let created_at = now();
        self.conn.execute(
            "INSERT INTO cars (license_plate, created_at) VALUES (?1, ?2)",
            params![plate, encode_time(created_at)],
        )?;
        Ok(Car {
            id: self.conn.last_insert_rowid(),
            license_plate: plate.to_string(),
            created_at,
        })
    }

    /// Get a car by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn car(&self, id: i64) -> Result<Option<Car>> {
        let car = self
            .conn
            .query_row(
                "SELECT id, license_plate, created_at FROM cars WHERE id = ?1",
                [id],
                row_to_car,
            )
            .optional()?;
        Ok(car)
    }

    /// Get a car by its exact license plate.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn car_by_plate(&self, plate: &str) -> Result<Option<Car>> {
        let car = self
            .conn
            .query_row(
                "SELECT id, license_plate, created_at FROM cars WHERE license_plate = ?1",
                [plate],
                row_to_car,
            )
            .optional()?;
        Ok(car)
    }

    /// List all cars, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn cars(&self) -> Result<Vec<Car>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, license_plate, created_at FROM cars ORDER BY id")?;
        let cars = stmt
            .query_map([], row_to_car)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cars)
    }

    /// Delete a car together with its observations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_car(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM cars WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_normalize_plate() {
        assert_eq!(normalize_plate("  AA16AA ").unwrap(), "AA16AA");
        assert_eq!(normalize_plate("AB-123 CD").unwrap(), "AB-123 CD");
        assert!(normalize_plate("").is_err());
        assert!(normalize_plate("   ").is_err());
        assert_eq!(normalize_plate("ABC_123").unwrap(), "ABC_123");
        assert_eq!(normalize_plate("ÄÖ-12.3").unwrap(), "ÄÖ-12.3");
        assert_eq!(normalize_plate("W/123 #4").unwrap(), "W/123 #4");
        assert!(normalize_plate("AB\tCD").is_err());
        assert!(normalize_plate(&"A".repeat(21)).is_err());
        assert!(normalize_plate(&"A".repeat(20)).is_ok());
        assert!(normalize_plate(&"Ä".repeat(20)).is_ok());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let storage = create_test_storage();
        let first = storage.resolve_car("AA16AA").unwrap();
        let second = storage.resolve_car(" AA16AA ").unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.cars().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_rejects_malformed_plate_without_writing() {
        let storage = create_test_storage();
        let err = storage.resolve_car(&"A".repeat(21)).unwrap_err();
        assert!(matches!(err, Error::InvalidLicensePlate(_)));
        assert_eq!(storage.stats().unwrap().cars, 0);
    }

    #[test]
    fn test_insert_duplicate_is_unique_violation() {
        let storage = create_test_storage();
        storage.insert_car("AA16AA").unwrap();
        let err = storage.insert_car("AA16AA").unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_lookup_and_delete() {
        let storage = create_test_storage();
        let car = storage.resolve_car("AA16AA").unwrap();

        assert_eq!(storage.car(car.id).unwrap(), Some(car.clone()));
        assert_eq!(storage.car_by_plate("AA16AA").unwrap(), Some(car.clone()));
        assert!(storage.car_by_plate("ZZ99ZZ").unwrap().is_none());

        assert!(storage.delete_car(car.id).unwrap());
        assert!(storage.car(car.id).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_first_sightings_create_one_car() {
        let db_path = std::env::temp_dir().join(format!(
            "trafficwatch_cars_race_{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&db_path);
        drop(Storage::open(&db_path).unwrap());

        let threads = 4;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let path = db_path.clone();
                std::thread::spawn(move || {
                    let storage = Storage::open(&path).unwrap();
                    barrier.wait();
                    storage.resolve_car("RACE-1").unwrap().id
                })
            })
            .collect();

        let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));

        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(storage.cars().unwrap().len(), 1);

        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }
}
