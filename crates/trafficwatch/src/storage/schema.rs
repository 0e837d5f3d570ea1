//! `SQLite` schema definitions for trafficwatch.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text so that lexical
//! order matches chronological order.

/// SQL statement to create the road segments table.
pub const CREATE_ROAD_SEGMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS road_segments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_point TEXT NOT NULL,
    end_point TEXT NOT NULL,
    length REAL NOT NULL DEFAULT 0.0,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the speed readings table.
pub const CREATE_SPEED_READINGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS speed_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    road_segment_id INTEGER NOT NULL REFERENCES road_segments(id) ON DELETE CASCADE,
    speed REAL NOT NULL,
    created_at TEXT NOT NULL
)
";

/// Index backing the latest-reading lookup.
pub const CREATE_READINGS_SEGMENT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_speed_readings_segment
    ON speed_readings(road_segment_id, created_at DESC, id DESC)
";

/// SQL statement to create the traffic intensity thresholds table.
pub const CREATE_THRESHOLDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS traffic_thresholds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    medium_min REAL NOT NULL,
    medium_max REAL NOT NULL,
    created_at TEXT NOT NULL,
    CHECK (medium_min < medium_max)
)
";

/// Index backing the current-threshold lookup.
pub const CREATE_THRESHOLDS_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_traffic_thresholds_created
    ON traffic_thresholds(created_at DESC, id DESC)
";

/// SQL statement to create the sensors table.
pub const CREATE_SENSORS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sensors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    uuid TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the cars table.
pub const CREATE_CARS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS cars (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    license_plate TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the traffic observations table.
pub const CREATE_OBSERVATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS traffic_observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    road_segment_id INTEGER NOT NULL REFERENCES road_segments(id) ON DELETE CASCADE,
    car_id INTEGER NOT NULL REFERENCES cars(id) ON DELETE CASCADE,
    sensor_id INTEGER NOT NULL REFERENCES sensors(id) ON DELETE CASCADE,
    timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// Index backing the per-car time-window query.
pub const CREATE_OBSERVATIONS_CAR_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_traffic_observations_car
    ON traffic_observations(car_id, timestamp DESC)
";

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_staff INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ROAD_SEGMENTS_TABLE,
    CREATE_SPEED_READINGS_TABLE,
    CREATE_READINGS_SEGMENT_INDEX,
    CREATE_THRESHOLDS_TABLE,
    CREATE_THRESHOLDS_CREATED_INDEX,
    CREATE_SENSORS_TABLE,
    CREATE_CARS_TABLE,
    CREATE_OBSERVATIONS_TABLE,
    CREATE_OBSERVATIONS_CAR_INDEX,
    CREATE_USERS_TABLE,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_unique_constraints_present() {
        assert!(CREATE_CARS_TABLE.contains("license_plate TEXT NOT NULL UNIQUE"));
        assert!(CREATE_SENSORS_TABLE.contains("uuid TEXT NOT NULL UNIQUE"));
        assert!(CREATE_USERS_TABLE.contains("username TEXT NOT NULL UNIQUE"));
    }

    #[test]
    fn test_threshold_table_checks_ordering() {
        assert!(CREATE_THRESHOLDS_TABLE.contains("CHECK (medium_min < medium_max)"));
    }

    #[test]
    fn test_tables_precede_their_indexes() {
        let position = |needle: &str| SCHEMA_STATEMENTS.iter().position(|s| *s == needle);
        assert!(position(CREATE_SPEED_READINGS_TABLE) < position(CREATE_READINGS_SEGMENT_INDEX));
        assert!(position(CREATE_OBSERVATIONS_TABLE) < position(CREATE_OBSERVATIONS_CAR_INDEX));
    }
}
