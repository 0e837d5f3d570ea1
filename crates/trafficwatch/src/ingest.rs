//! Observation ingestion.
//!
//! Sensors report sightings of cars at road segments, one at a time or in
//! batches. A batch is recorded in a single transaction: either every
//! sighting is stored, or none is, and no car is registered for a batch that
//! fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Car, SegmentSummary, SensorSummary};
use crate::storage::Storage;

/// A sighting as reported by a sensor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObservationRequest {
    /// Segment where the car was seen.
    pub road_segment: i64,
    /// Plate of the car that was seen.
    pub license_plate: String,
    /// When the sighting occurred.
    pub timestamp: DateTime<Utc>,
    /// External identifier of the reporting sensor.
    pub sensor_uuid: Uuid,
}

/// A stored sighting, echoed back with the resolved car and live summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestedObservation {
    /// Observation identity.
    pub id: i64,
    /// When the sighting occurred.
    pub timestamp: DateTime<Utc>,
    /// When the sighting was recorded.
    pub created_at: DateTime<Utc>,
    /// The resolved car.
    pub car: Car,
    /// The reporting sensor.
    pub sensor: SensorSummary,
    /// The segment as it is now.
    pub road_segment: SegmentSummary,
}

/// Record a batch of sightings atomically.
///
/// Each item is checked in order: the segment must exist, then the sensor,
/// then the plate is resolved to a car. The first failing item aborts the
/// batch and rolls back everything written for earlier items.
///
/// # Errors
///
/// Returns [`Error::UnknownSegment`], [`Error::UnknownSensor`] or
/// [`Error::InvalidLicensePlate`] for the first invalid item, or an error if
/// the database operation fails.
pub fn ingest_observations(
    storage: &Storage,
    requests: &[ObservationRequest],
) -> Result<Vec<IngestedObservation>> {
    let created = storage.atomically(|store| {
        let thresholds = store.current_thresholds()?;
        requests
            .iter()
            .map(|request| {
                let segment = store
                    .segment(request.road_segment)?
                    .ok_or(Error::UnknownSegment(request.road_segment))?;
                let sensor = store
                    .sensor_by_uuid(request.sensor_uuid)?
                    .ok_or(Error::UnknownSensor(request.sensor_uuid))?;
                let car = store.resolve_car(&request.license_plate)?;

                let observation =
                    store.insert_observation(segment.id, car.id, sensor.id, request.timestamp)?;
                debug!(
                    "Car {} seen at segment {} by sensor {}",
                    car.license_plate, segment.id, sensor.uuid
                );

                Ok(IngestedObservation {
                    id: observation.id,
                    timestamp: observation.timestamp,
                    created_at: observation.created_at,
                    car,
                    sensor: sensor.summary(),
                    road_segment: segment.summary(thresholds),
                })
            })
            .collect::<Result<Vec<_>>>()
    })?;

    info!("Ingested {} traffic observations", created.len());
    Ok(created)
}
