//! Error types for trafficwatch.
//!
//! This module defines all error types used throughout the trafficwatch crate.
//! Domain errors carry caller-facing messages; infrastructure errors carry the
//! underlying cause for the logs.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// The main error type for trafficwatch operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Domain Errors ===
    /// A threshold write was rejected because `medium_min >= medium_max`.
    #[error("invalid threshold: medium_min ({medium_min}) must be less than medium_max ({medium_max})")]
    InvalidThreshold {
        /// Rejected lower boundary.
        medium_min: f64,
        /// Rejected upper boundary.
        medium_max: f64,
    },

    /// A request referenced a road segment that does not exist.
    #[error("road segment {0} does not exist")]
    UnknownSegment(i64),

    /// A request referenced a sensor that does not exist.
    #[error("sensor {0} does not exist")]
    UnknownSensor(Uuid),

    /// A required request parameter was absent.
    #[error("{0}")]
    MissingParameter(&'static str),

    /// No car is registered under the given plate.
    #[error("Car not found")]
    CarNotFound(String),

    /// A CSV row could not be parsed.
    #[error("Error while processing line {line}: {message}")]
    MalformedInput {
        /// The offending row, as read.
        line: String,
        /// What was wrong with it.
        message: String,
    },

    /// A geometry value could not be parsed.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A license plate is empty, too long, or contains unsupported characters.
    #[error("invalid license plate: {0:?}")]
    InvalidLicensePlate(String),

    /// A request body or parameter was malformed.
    #[error("{0}")]
    InvalidRequest(String),

    /// An entity looked up by identity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity.
        entity: &'static str,
        /// The identity that was looked up.
        id: String,
    },

    /// A write collided with a unique constraint.
    #[error("{0}")]
    Conflict(String),

    // === Auth Errors ===
    /// Credentials were supplied but did not verify.
    #[error("invalid credentials")]
    Unauthenticated,

    /// The caller is not allowed to perform this operation.
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    /// Password hashing or hash parsing failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a CSV source failed below the row level.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for trafficwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a not-found error for the given entity kind.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a malformed-input error for a CSV row.
    #[must_use]
    pub fn malformed(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            line: line.into(),
            message: message.into(),
        }
    }

    /// Check if this error was caused by the caller rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidThreshold { .. }
                | Self::UnknownSegment(_)
                | Self::UnknownSensor(_)
                | Self::MissingParameter(_)
                | Self::CarNotFound(_)
                | Self::MalformedInput { .. }
                | Self::InvalidGeometry(_)
                | Self::InvalidLicensePlate(_)
                | Self::InvalidRequest(_)
                | Self::NotFound { .. }
                | Self::Conflict(_)
                | Self::Unauthenticated
                | Self::PermissionDenied
        )
    }

    /// Check if this error is a unique-constraint violation reported by `SQLite`.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::DatabaseQuery(err) => is_unique_violation(err),
            _ => false,
        }
    }
}

/// Check if a rusqlite error is a unique (or primary key) constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == rusqlite::ErrorCode::ConstraintViolation
                && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
