//! Mapping of crate errors onto HTTP responses.
//!
//! Every error body has the shape `{"error": "<message>"}`. Server-side
//! failures are logged and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::Error;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Caller-facing message.
    pub error: String,
}

/// HTTP status for an error.
#[must_use]
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidThreshold { .. }
        | Error::UnknownSegment(_)
        | Error::UnknownSensor(_)
        | Error::MissingParameter(_)
        | Error::MalformedInput { .. }
        | Error::InvalidGeometry(_)
        | Error::InvalidLicensePlate(_)
        | Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,

        Error::Unauthenticated => StatusCode::UNAUTHORIZED,

        Error::PermissionDenied => StatusCode::FORBIDDEN,

        Error::CarNotFound(_) | Error::NotFound { .. } => StatusCode::NOT_FOUND,

        Error::Conflict(_) => StatusCode::CONFLICT,

        Error::PasswordHash(_)
        | Error::DatabaseOpen { .. }
        | Error::DatabaseQuery(_)
        | Error::DatabaseMigration { .. }
        | Error::ConfigLoad(_)
        | Error::ConfigValidation { .. }
        | Error::Io(_)
        | Error::DirectoryCreate { .. }
        | Error::Json(_)
        | Error::Csv(_)
        | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(ErrorBody { error: message })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Basic realm=\"api\""),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_client_errors_map_to_4xx() {
        assert_eq!(status_for(&Error::UnknownSegment(1)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&Error::UnknownSensor(Uuid::nil())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::MissingParameter("License plate is required")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::CarNotFound("X".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_for(&Error::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&Error::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&Error::Conflict("dup".to_string())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_status_agrees_with_client_error_flag() {
        let errors = [
            Error::InvalidThreshold {
                medium_min: 2.0,
                medium_max: 1.0,
            },
            Error::malformed("row", "bad"),
            Error::not_found("sensor", 1),
            Error::internal("boom"),
            Error::ConfigValidation {
                message: "x".to_string(),
            },
        ];
        for err in &errors {
            assert_eq!(status_for(err).is_client_error(), err.is_client_error());
        }
    }

    #[test]
    fn test_server_errors_hide_details() {
        let response = Error::internal("secret detail").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthenticated_challenges() {
        let response = Error::Unauthenticated.into_response();
        assert!(response
            .headers()
            .contains_key(axum::http::header::WWW_AUTHENTICATE));
    }
}
