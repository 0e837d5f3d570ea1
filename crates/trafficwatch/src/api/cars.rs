//! Car endpoints and the recent-observations lookup.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::extract::{Id, Params, Staff};
use super::AppState;
use crate::error::{Error, Result};
use crate::model::Car;
use crate::query::{self, RecentObservations};

#[derive(Debug, Deserialize)]
pub(super) struct RecentQuery {
    license_plate: Option<String>,
    hours: Option<u32>,
}

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<Car>>> {
    let cars = state.run(|storage| storage.cars()).await?;
    Ok(Json(cars))
}

pub(super) async fn detail(State(state): State<AppState>, Id(id): Id) -> Result<Json<Car>> {
    let car = state
        .run(move |storage| storage.car(id)?.ok_or_else(|| Error::not_found("car", id)))
        .await?;
    Ok(Json(car))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    Staff(_): Staff,
    Id(id): Id,
) -> Result<StatusCode> {
    state
        .run(move |storage| {
            if storage.delete_car(id)? {
                Ok(StatusCode::NO_CONTENT)
            } else {
                Err(Error::not_found("car", id))
            }
        })
        .await
}

/// Sightings of one car within the last `hours` (or the configured window).
pub(super) async fn recent_observations(
    State(state): State<AppState>,
    Params(params): Params<RecentQuery>,
) -> Result<Json<RecentObservations>> {
    let window = match params.hours {
        Some(hours) => query::window_hours(hours)?,
        None => state.window(),
    };

    let result = state
        .run(move |storage| {
            query::recent_observations(
                storage,
                params.license_plate.as_deref(),
                window,
                crate::storage::now(),
            )
        })
        .await?;
    Ok(Json(result))
}
