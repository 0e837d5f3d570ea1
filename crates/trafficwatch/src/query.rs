//! Recent-sightings query for a single car.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Car, SegmentSummary, SensorSummary};
use crate::storage::Storage;

/// How far back [`recent_observations`] looks unless told otherwise.
pub const DEFAULT_WINDOW: Duration = Duration::hours(24);

/// Longest window, in hours, a caller may ask for (about a century).
pub const MAX_WINDOW_HOURS: u32 = 24 * 366 * 100;

/// Build a window of `hours`, rejecting zero and anything over
/// [`MAX_WINDOW_HOURS`].
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] when `hours` is out of range.
pub fn window_hours(hours: u32) -> Result<Duration> {
    if hours == 0 || hours > MAX_WINDOW_HOURS {
        return Err(Error::InvalidRequest(format!(
            "hours must be between 1 and {MAX_WINDOW_HOURS}"
        )));
    }
    Duration::try_hours(i64::from(hours))
        .ok_or_else(|| Error::InvalidRequest(format!("hours {hours} is out of range")))
}

/// A sighting with live context about where and by whom it was made.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationView {
    /// When the sighting occurred.
    pub timestamp: DateTime<Utc>,
    /// The segment as it is now.
    pub road_segment: SegmentSummary,
    /// The reporting sensor.
    pub sensor: SensorSummary,
}

/// A car and its sightings within the requested window, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentObservations {
    /// The car that was looked up.
    pub car: Car,
    /// Sightings ordered newest first.
    pub observations: Vec<ObservationView>,
}

/// Look up the sightings of a car in `[now - window, now]`.
///
/// # Errors
///
/// Returns [`Error::MissingParameter`] when no plate (or a blank one) is
/// given, [`Error::InvalidRequest`] when the window reaches outside the
/// representable time range, [`Error::CarNotFound`] when no car has that
/// plate, or an error if the database operation fails.
pub fn recent_observations(
    storage: &Storage,
    license_plate: Option<&str>,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<RecentObservations> {
    let plate = license_plate
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(Error::MissingParameter("License plate is required"))?;

    let since = now
        .checked_sub_signed(window)
        .ok_or_else(|| Error::InvalidRequest("observation window is out of range".to_string()))?;

    let car = storage
        .car_by_plate(plate)?
        .ok_or_else(|| Error::CarNotFound(plate.to_string()))?;

    let thresholds = storage.current_thresholds()?;
    let observations = storage
        .observations_for_car_between(car.id, since, now)?
        .into_iter()
        .map(|row| ObservationView {
            timestamp: row.timestamp,
            road_segment: row.segment.summary(thresholds),
            sensor: row.sensor.summary(),
        })
        .collect();

    Ok(RecentObservations { car, observations })
}
