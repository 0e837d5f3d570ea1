//! Request extractors.
//!
//! Wrappers around axum's extractors that reject with [`Error`], so malformed
//! requests get the same JSON error body as everything else, plus the two
//! authorization guards.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;
use axum::Json;
use serde::de::DeserializeOwned;

use super::AppState;
use crate::auth::{self, API_KEY_HEADER};
use crate::error::Error;
use crate::model::User;

/// A staff user authenticated with HTTP Basic credentials.
#[derive(Debug)]
pub struct Staff(pub User);

impl FromRequestParts<AppState> for Staff {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Error> {
        let header = match parts.headers.get(AUTHORIZATION) {
            None => None,
            Some(value) => Some(value.to_str().map_err(|_| Error::Unauthenticated)?),
        };
        let user = match auth::parse_authorization(header)? {
            None => None,
            Some(credentials) => {
                let username = credentials.username.clone();
                let stored = state
                    .run(move |storage| storage.user_credentials(&username))
                    .await?;
                // Argon2 runs with the storage lock released
                let user = tokio::task::spawn_blocking(move || {
                    auth::verify_credentials(&credentials, stored)
                })
                .await
                .map_err(|e| Error::internal(format!("credential check failed: {e}")))??;
                Some(user)
            }
        };
        auth::require_staff(user).map(Self)
    }
}

/// Proof that the request carried the configured sensor key.
#[derive(Debug)]
pub struct SensorKey;

impl FromRequestParts<AppState> for SensorKey {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Error> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        auth::require_api_key(state.api_key(), presented)?;
        Ok(Self)
    }
}

/// JSON request body.
#[derive(Debug)]
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Error> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string parameters.
#[derive(Debug)]
pub struct Params<T>(pub T);

impl<T, S> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Error> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Numeric `{id}` path segment.
#[derive(Debug, Clone, Copy)]
pub struct Id(pub i64);

impl<S> FromRequestParts<S> for Id
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Error> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;
        Ok(Self(id))
    }
}
