//! Road segment endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::extract::{Id, Params, Payload, Staff};
use super::AppState;
use crate::error::{Error, Result};
use crate::intensity::TrafficIntensity;
use crate::model::{NewRoadSegment, RoadSegment};

#[derive(Debug, Deserialize)]
pub(super) struct SegmentFilter {
    intensity: Option<String>,
}

pub(super) async fn list(
    State(state): State<AppState>,
    Params(filter): Params<SegmentFilter>,
) -> Result<Json<Vec<RoadSegment>>> {
    let wanted = filter
        .intensity
        .as_deref()
        .map(str::parse::<TrafficIntensity>)
        .transpose()?;

    let segments = state
        .run(move |storage| {
            let thresholds = storage.current_thresholds()?;
            Ok(storage
                .segments()?
                .into_iter()
                .map(|segment| segment.into_view(thresholds))
                .filter(|view| wanted.map_or(true, |w| view.traffic_intensity == w))
                .collect())
        })
        .await?;
    Ok(Json(segments))
}

pub(super) async fn create(
    State(state): State<AppState>,
    Staff(_): Staff,
    Payload(input): Payload<NewRoadSegment>,
) -> Result<(StatusCode, Json<RoadSegment>)> {
    let segment = state
        .run(move |storage| {
            let thresholds = storage.current_thresholds()?;
            Ok(storage.create_segment(&input)?.into_view(thresholds))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(segment)))
}

pub(super) async fn detail(
    State(state): State<AppState>,
    Id(id): Id,
) -> Result<Json<RoadSegment>> {
    let segment = state
        .run(move |storage| {
            let thresholds = storage.current_thresholds()?;
            storage
                .segment(id)?
                .map(|segment| segment.into_view(thresholds))
                .ok_or_else(|| Error::not_found("road segment", id))
        })
        .await?;
    Ok(Json(segment))
}

pub(super) async fn update(
    State(state): State<AppState>,
    Staff(_): Staff,
    Id(id): Id,
    Payload(input): Payload<NewRoadSegment>,
) -> Result<Json<RoadSegment>> {
    let segment = state
        .run(move |storage| {
            let thresholds = storage.current_thresholds()?;
            storage
                .update_segment(id, &input)?
                .map(|segment| segment.into_view(thresholds))
                .ok_or_else(|| Error::not_found("road segment", id))
        })
        .await?;
    Ok(Json(segment))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    Staff(_): Staff,
    Id(id): Id,
) -> Result<StatusCode> {
    state
        .run(move |storage| {
            if storage.delete_segment(id)? {
                Ok(StatusCode::NO_CONTENT)
            } else {
                Err(Error::not_found("road segment", id))
            }
        })
        .await
}
