//! Threshold endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::extract::{Id, Payload, Staff};
use super::AppState;
use crate::error::{Error, Result};
use crate::intensity::Thresholds;
use crate::model::{ThresholdInput, ThresholdRecord};

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<ThresholdRecord>>> {
    let records = state.run(|storage| storage.thresholds()).await?;
    Ok(Json(records))
}

/// The thresholds in effect, defaults included.
pub(super) async fn current(State(state): State<AppState>) -> Result<Json<Thresholds>> {
    let thresholds = state.run(|storage| storage.current_thresholds()).await?;
    Ok(Json(thresholds))
}

pub(super) async fn create(
    State(state): State<AppState>,
    Staff(_): Staff,
    Payload(input): Payload<ThresholdInput>,
) -> Result<(StatusCode, Json<ThresholdRecord>)> {
    let record = state
        .run(move |storage| storage.set_thresholds(input.medium_min, input.medium_max))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(super) async fn detail(
    State(state): State<AppState>,
    Id(id): Id,
) -> Result<Json<ThresholdRecord>> {
    let record = state
        .run(move |storage| {
            storage
                .threshold(id)?
                .ok_or_else(|| Error::not_found("threshold", id))
        })
        .await?;
    Ok(Json(record))
}

pub(super) async fn update(
    State(state): State<AppState>,
    Staff(_): Staff,
    Id(id): Id,
    Payload(input): Payload<ThresholdInput>,
) -> Result<Json<ThresholdRecord>> {
    let record = state
        .run(move |storage| {
            storage
                .update_threshold(id, input.medium_min, input.medium_max)?
                .ok_or_else(|| Error::not_found("threshold", id))
        })
        .await?;
    Ok(Json(record))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    Staff(_): Staff,
    Id(id): Id,
) -> Result<StatusCode> {
    state
        .run(move |storage| {
            if storage.delete_threshold(id)? {
                Ok(StatusCode::NO_CONTENT)
            } else {
                Err(Error::not_found("threshold", id))
            }
        })
        .await
}
