//! Core record types for trafficwatch.
//!
//! This module defines the entities persisted by the storage layer and the
//! input shapes accepted when creating or replacing them.

use chrono::{DateTime, Utc};
use geo_types::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::intensity::{Thresholds, TrafficIntensity};

/// A road segment as exposed to callers, with its derived attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadSegment {
    /// Segment identity.
    pub id: i64,
    /// First endpoint (longitude, latitude).
    #[serde(with = "wkt_point")]
    pub start_point: Point<f64>,
    /// Second endpoint (longitude, latitude).
    #[serde(with = "wkt_point")]
    pub end_point: Point<f64>,
    /// Segment length.
    pub length: f64,
    /// When the segment was created.
    pub created_at: DateTime<Utc>,
    /// Time of the latest reading, or `created_at` when there is none.
    pub updated_at: DateTime<Utc>,
    /// Speed of the latest reading.
    pub current_speed: Option<f64>,
    /// Classification of `current_speed` against the current thresholds.
    pub traffic_intensity: TrafficIntensity,
    /// Number of readings recorded for the segment.
    pub readings_count: i64,
}

/// A segment row joined with its latest reading, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentState {
    /// Segment identity.
    pub id: i64,
    /// First endpoint.
    pub start_point: Point<f64>,
    /// Second endpoint.
    pub end_point: Point<f64>,
    /// Segment length.
    pub length: f64,
    /// When the segment was created.
    pub created_at: DateTime<Utc>,
    /// The most recent reading, if any.
    pub latest_reading: Option<LatestReading>,
    /// Number of readings recorded for the segment.
    pub readings_count: i64,
}

/// Speed and time of a segment's most recent reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatestReading {
    /// Reading speed.
    pub speed: f64,
    /// When the reading was recorded.
    pub created_at: DateTime<Utc>,
}

impl SegmentState {
    /// Speed of the latest reading.
    #[must_use]
    pub fn current_speed(&self) -> Option<f64> {
        self.latest_reading.map(|r| r.speed)
    }

    /// Time of the latest reading, falling back to the creation time.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.latest_reading
            .map_or(self.created_at, |r| r.created_at)
    }

    /// Classify the segment against the given thresholds.
    #[must_use]
    pub fn traffic_intensity(&self, thresholds: Thresholds) -> TrafficIntensity {
        TrafficIntensity::classify(self.current_speed(), thresholds)
    }

    /// Produce the caller-facing view.
    #[must_use]
    pub fn into_view(self, thresholds: Thresholds) -> RoadSegment {
        RoadSegment {
            id: self.id,
            start_point: self.start_point,
            end_point: self.end_point,
            length: self.length,
            created_at: self.created_at,
            updated_at: self.updated_at(),
            current_speed: self.current_speed(),
            traffic_intensity: self.traffic_intensity(thresholds),
            readings_count: self.readings_count,
        }
    }

    /// Produce the compact summary embedded in observation responses.
    #[must_use]
    pub fn summary(&self, thresholds: Thresholds) -> SegmentSummary {
        SegmentSummary {
            id: self.id,
            length: self.length,
            current_speed: self.current_speed(),
            traffic_intensity: self.traffic_intensity(thresholds),
        }
    }
}

/// Compact live view of a segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    /// Segment identity.
    pub id: i64,
    /// Segment length.
    pub length: f64,
    /// Speed of the latest reading.
    pub current_speed: Option<f64>,
    /// Classification of `current_speed`.
    pub traffic_intensity: TrafficIntensity,
}

/// Input for creating or replacing a road segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewRoadSegment {
    /// First endpoint, as WKT.
    #[serde(with = "wkt_point")]
    pub start_point: Point<f64>,
    /// Second endpoint, as WKT.
    #[serde(with = "wkt_point")]
    pub end_point: Point<f64>,
    /// Segment length.
    #[serde(default)]
    pub length: f64,
}

impl NewRoadSegment {
    /// Check that both endpoints and the length are finite numbers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGeometry`] for a non-finite coordinate or
    /// [`Error::InvalidRequest`] for a non-finite length.
    pub fn validate(&self) -> Result<()> {
        wkt_point::check_finite(&self.start_point)?;
        wkt_point::check_finite(&self.end_point)?;
        if !self.length.is_finite() {
            return Err(Error::InvalidRequest(format!(
                "length must be a finite number, got {}",
                self.length
            )));
        }
        Ok(())
    }
}

/// A single timestamped speed measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedReading {
    /// Reading identity.
    pub id: i64,
    /// The segment this reading belongs to.
    pub road_segment: i64,
    /// Measured speed.
    pub speed: f64,
    /// When the reading was recorded.
    pub created_at: DateTime<Utc>,
}

/// Input for recording a speed reading.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct NewSpeedReading {
    /// Target segment.
    pub road_segment: i64,
    /// Measured speed.
    pub speed: f64,
}

/// A persisted threshold record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdRecord {
    /// Record identity.
    pub id: i64,
    /// Lower medium boundary.
    pub medium_min: f64,
    /// Upper medium boundary.
    pub medium_max: f64,
    /// When the record was last written.
    pub created_at: DateTime<Utc>,
}

/// Input for writing a threshold record.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ThresholdInput {
    /// Lower medium boundary.
    #[serde(default = "default_medium_min")]
    pub medium_min: f64,
    /// Upper medium boundary.
    #[serde(default = "default_medium_max")]
    pub medium_max: f64,
}

fn default_medium_min() -> f64 {
    crate::intensity::DEFAULT_MEDIUM_MIN
}

fn default_medium_max() -> f64 {
    crate::intensity::DEFAULT_MEDIUM_MAX
}

/// A roadside sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sensor {
    /// Sensor identity.
    pub id: i64,
    /// Human-readable name.
    pub name: String,
    /// Globally unique external identifier.
    pub uuid: Uuid,
    /// When the sensor was registered.
    pub created_at: DateTime<Utc>,
}

impl Sensor {
    /// Produce the compact summary embedded in observation responses.
    #[must_use]
    pub fn summary(&self) -> SensorSummary {
        SensorSummary {
            uuid: self.uuid,
            name: self.name.clone(),
        }
    }
}

/// Compact view of a sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorSummary {
    /// External identifier.
    pub uuid: Uuid,
    /// Human-readable name.
    pub name: String,
}

/// Input for registering or replacing a sensor.
///
/// A missing `uuid` is generated on create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSensor {
    /// Human-readable name.
    pub name: String,
    /// External identifier.
    #[serde(default)]
    pub uuid: Option<Uuid>,
}

/// Maximum sensor name length.
pub const MAX_SENSOR_NAME_LEN: usize = 100;

/// A car, identified by its license plate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Car {
    /// Car identity.
    pub id: i64,
    /// Unique license plate.
    pub license_plate: String,
    /// When the car was first seen.
    pub created_at: DateTime<Utc>,
}

/// A sighting of a car at a segment by a sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficObservation {
    /// Observation identity.
    pub id: i64,
    /// Segment where the car was seen.
    pub road_segment: i64,
    /// The car that was seen.
    pub car: i64,
    /// The sensor that saw it.
    pub sensor: i64,
    /// When the sighting occurred.
    pub timestamp: DateTime<Utc>,
    /// When the sighting was recorded.
    pub created_at: DateTime<Utc>,
}

/// A staff or regular user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// User identity.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Whether the user may perform mutating operations.
    pub is_staff: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// WKT (de)serialization for `Point<f64>` fields.
pub mod wkt_point {
    use geo_types::Point;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use wkt::{ToWkt, TryFromWkt};

    use crate::error::{Error, Result};

    /// Parse a WKT `POINT(x y)` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGeometry`] if the text is not a WKT point or
    /// a coordinate is NaN or infinite.
    pub fn parse(text: &str) -> Result<Point<f64>> {
        let point = Point::<f64>::try_from_wkt_str(text.trim())
            .map_err(|e| Error::InvalidGeometry(format!("{text:?}: {e}")))?;
        check_finite(&point)?;
        Ok(point)
    }

    /// Reject points with NaN or infinite coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGeometry`] naming the point.
    pub fn check_finite(point: &Point<f64>) -> Result<()> {
        if point.x().is_finite() && point.y().is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidGeometry(format!(
                "coordinates must be finite, got ({} {})",
                point.x(),
                point.y()
            )))
        }
    }

    /// Format a point as WKT.
    #[must_use]
    pub fn format(point: &Point<f64>) -> String {
        point.wkt_string()
    }

    /// Serialize a point as a WKT string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        point: &Point<f64>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(point))
    }

    /// Deserialize a point from a WKT string.
    ///
    /// # Errors
    ///
    /// Fails if the value is not a string holding a WKT point.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Point<f64>, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn state(latest: Option<LatestReading>) -> SegmentState {
        SegmentState {
            id: 1,
            start_point: Point::new(1.0, 1.0),
            end_point: Point::new(2.0, 2.0),
            length: 1000.0,
            created_at: Utc::now() - Duration::hours(1),
            latest_reading: latest,
            readings_count: i64::from(latest.is_some()),
        }
    }

    #[test]
    fn test_segment_without_readings() {
        let s = state(None);
        assert_eq!(s.current_speed(), None);
        assert_eq!(s.updated_at(), s.created_at);
        assert_eq!(
            s.traffic_intensity(Thresholds::default()),
            TrafficIntensity::NoData
        );
    }

    #[test]
    fn test_segment_with_reading() {
        let now = Utc::now();
        let s = state(Some(LatestReading {
            speed: 60.0,
            created_at: now,
        }));
        assert_eq!(s.current_speed(), Some(60.0));
        assert_eq!(s.updated_at(), now);

        let view = s.into_view(Thresholds::default());
        assert_eq!(view.traffic_intensity, TrafficIntensity::Low);
        assert_eq!(view.readings_count, 1);
    }

    #[test]
    fn test_segment_view_serializes_points_as_wkt() {
        let view = state(None).into_view(Thresholds::default());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["start_point"], "POINT(1 1)");
        assert_eq!(json["traffic_intensity"], "no_data");
        assert!(json["current_speed"].is_null());
    }

    #[test]
    fn test_new_segment_parses_wkt() {
        let input: NewRoadSegment = serde_json::from_str(
            r#"{"start_point": "POINT(3.0 3.0)", "end_point": "POINT(4.5 -4.0)", "length": 1500.0}"#,
        )
        .unwrap();
        assert_eq!(input.start_point, Point::new(3.0, 3.0));
        assert_eq!(input.end_point, Point::new(4.5, -4.0));
        assert!((input.length - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_new_segment_length_defaults_to_zero() {
        let input: NewRoadSegment =
            serde_json::from_str(r#"{"start_point": "POINT(1 1)", "end_point": "POINT(2 2)"}"#)
                .unwrap();
        assert!(input.length.abs() < f64::EPSILON);
    }

    #[test]
    fn test_new_segment_rejects_non_point_geometry() {
        let result: std::result::Result<NewRoadSegment, _> = serde_json::from_str(
            r#"{"start_point": "LINESTRING(1 1, 2 2)", "end_point": "POINT(2 2)"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_wkt_rejects_non_finite_coordinates() {
        for text in ["POINT(NaN 1)", "POINT(1 inf)", "POINT(-inf -inf)"] {
            assert!(
                matches!(wkt_point::parse(text), Err(Error::InvalidGeometry(_))),
                "{text} should be rejected"
            );
        }
        assert_eq!(wkt_point::parse(" POINT(1 2) ").unwrap(), Point::new(1.0, 2.0));
    }

    #[test]
    fn test_new_segment_validate() {
        let segment = NewRoadSegment {
            start_point: Point::new(1.0, 1.0),
            end_point: Point::new(2.0, 2.0),
            length: 10.0,
        };
        assert!(segment.validate().is_ok());

        let bad_length = NewRoadSegment {
            length: f64::INFINITY,
            ..segment.clone()
        };
        assert!(matches!(bad_length.validate(), Err(Error::InvalidRequest(_))));

        let bad_point = NewRoadSegment {
            end_point: Point::new(f64::NAN, 2.0),
            ..segment
        };
        assert!(matches!(bad_point.validate(), Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_threshold_input_defaults() {
        let input: ThresholdInput = serde_json::from_str("{}").unwrap();
        assert!((input.medium_min - 20.0).abs() < f64::EPSILON);
        assert!((input.medium_max - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sensor_summary() {
        let sensor = Sensor {
            id: 3,
            name: "Sensor 1".to_string(),
            uuid: Uuid::nil(),
            created_at: Utc::now(),
        };
        let summary = sensor.summary();
        assert_eq!(summary.name, "Sensor 1");
        assert_eq!(summary.uuid, Uuid::nil());
    }
}
