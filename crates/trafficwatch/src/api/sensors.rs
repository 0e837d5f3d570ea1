//! Sensor endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::extract::{Id, Payload, Staff};
use super::AppState;
use crate::error::{Error, Result};
use crate::model::{NewSensor, Sensor};

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<Sensor>>> {
    let sensors = state.run(|storage| storage.sensors()).await?;
    Ok(Json(sensors))
}

pub(super) async fn create(
    State(state): State<AppState>,
    Staff(_): Staff,
    Payload(input): Payload<NewSensor>,
) -> Result<(StatusCode, Json<Sensor>)> {
    let sensor = state.run(move |storage| storage.create_sensor(&input)).await?;
    Ok((StatusCode::CREATED, Json(sensor)))
}

pub(super) async fn detail(State(state): State<AppState>, Id(id): Id) -> Result<Json<Sensor>> {
    let sensor = state
        .run(move |storage| {
            storage
                .sensor(id)?
                .ok_or_else(|| Error::not_found("sensor", id))
        })
        .await?;
    Ok(Json(sensor))
}

pub(super) async fn update(
    State(state): State<AppState>,
    Staff(_): Staff,
    Id(id): Id,
    Payload(input): Payload<NewSensor>,
) -> Result<Json<Sensor>> {
    let sensor = state
        .run(move |storage| {
            storage
                .replace_sensor(id, &input)?
                .ok_or_else(|| Error::not_found("sensor", id))
        })
        .await?;
    Ok(Json(sensor))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    Staff(_): Staff,
    Id(id): Id,
) -> Result<StatusCode> {
    state
        .run(move |storage| {
            if storage.delete_sensor(id)? {
                Ok(StatusCode::NO_CONTENT)
            } else {
                Err(Error::not_found("sensor", id))
            }
        })
        .await
}
