//! Speed reading endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::extract::{Id, Params, Payload, Staff};
use super::{AppState, DEFAULT_LIST_LIMIT};
use crate::error::{Error, Result};
use crate::model::{NewSpeedReading, SpeedReading};

#[derive(Debug, Deserialize)]
pub(super) struct ReadingFilter {
    road_segment: Option<i64>,
    limit: Option<usize>,
}

pub(super) async fn list(
    State(state): State<AppState>,
    Params(filter): Params<ReadingFilter>,
) -> Result<Json<Vec<SpeedReading>>> {
    let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let readings = state
        .run(move |storage| storage.readings(filter.road_segment, limit))
        .await?;
    Ok(Json(readings))
}

pub(super) async fn create(
    State(state): State<AppState>,
    Staff(_): Staff,
    Payload(input): Payload<NewSpeedReading>,
) -> Result<(StatusCode, Json<SpeedReading>)> {
    let reading = state
        .run(move |storage| storage.insert_reading(input.road_segment, input.speed))
        .await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

pub(super) async fn detail(
    State(state): State<AppState>,
    Id(id): Id,
) -> Result<Json<SpeedReading>> {
    let reading = state
        .run(move |storage| {
            storage
                .reading(id)?
                .ok_or_else(|| Error::not_found("speed reading", id))
        })
        .await?;
    Ok(Json(reading))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    Staff(_): Staff,
    Id(id): Id,
) -> Result<StatusCode> {
    state
        .run(move |storage| {
            if storage.delete_reading(id)? {
                Ok(StatusCode::NO_CONTENT)
            } else {
                Err(Error::not_found("speed reading", id))
            }
        })
        .await
}
