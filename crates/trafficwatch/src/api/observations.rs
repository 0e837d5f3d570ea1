//! Traffic observation endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use super::extract::{Id, Params, Payload, SensorKey};
use super::{AppState, DEFAULT_LIST_LIMIT};
use crate::error::{Error, Result};
use crate::ingest::{self, IngestedObservation, ObservationRequest};
use crate::model::TrafficObservation;

/// A single item or a batch, answered in the same shape.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

// A JSON array is a batch, anything else a single item.
impl<'de, T: DeserializeOwned> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let parsed = if value.is_array() {
            serde_json::from_value(value).map(Self::Many)
        } else {
            serde_json::from_value(value).map(Self::One)
        };
        parsed.map_err(de::Error::custom)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ObservationFilter {
    limit: Option<usize>,
}

pub(super) async fn list(
    State(state): State<AppState>,
    Params(filter): Params<ObservationFilter>,
) -> Result<Json<Vec<TrafficObservation>>> {
    let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let observations = state.run(move |storage| storage.observations(limit)).await?;
    Ok(Json(observations))
}

pub(super) async fn detail(
    State(state): State<AppState>,
    Id(id): Id,
) -> Result<Json<TrafficObservation>> {
    let observation = state
        .run(move |storage| {
            storage
                .observation(id)?
                .ok_or_else(|| Error::not_found("traffic observation", id))
        })
        .await?;
    Ok(Json(observation))
}

/// Ingest one sighting or a batch. The sensor key is checked before the
/// body is read.
pub(super) async fn create(
    State(state): State<AppState>,
    _key: SensorKey,
    Payload(body): Payload<OneOrMany<ObservationRequest>>,
) -> Result<(StatusCode, Json<OneOrMany<IngestedObservation>>)> {
    let (requests, single) = match body {
        OneOrMany::One(request) => (vec![request], true),
        OneOrMany::Many(requests) => (requests, false),
    };

    let mut created = state
        .run(move |storage| ingest::ingest_observations(storage, &requests))
        .await?;

    let body = if single && created.len() == 1 {
        OneOrMany::One(created.remove(0))
    } else {
        OneOrMany::Many(created)
    };
    Ok((StatusCode::CREATED, Json(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSOR: &str = "270e4cc0-d454-4b42-8682-80e87c3d163c";

    #[test]
    fn test_one_or_many_shapes() {
        let one: OneOrMany<ObservationRequest> = serde_json::from_value(serde_json::json!({
            "road_segment": 1,
            "license_plate": "AA16AA",
            "timestamp": "2026-10-18T10:00:00Z",
            "sensor_uuid": SENSOR,
        }))
        .unwrap();
        assert!(matches!(one, OneOrMany::One(_)));

        let many: OneOrMany<ObservationRequest> =
            serde_json::from_value(serde_json::json!([])).unwrap();
        assert!(matches!(many, OneOrMany::Many(items) if items.is_empty()));
    }

    #[test]
    fn test_one_or_many_reports_field_errors() {
        let single = serde_json::from_value::<OneOrMany<ObservationRequest>>(serde_json::json!({
            "road_segment": 1,
            "license_plate": "AA16AA",
            "timestamp": "2026-10-18T10:00:00Z",
            "sensor_uuid": "not-a-uuid",
        }))
        .unwrap_err()
        .to_string();
        assert!(!single.contains("did not match any variant"), "{single}");
        assert!(single.to_lowercase().contains("uuid"), "{single}");

        let batch = serde_json::from_value::<OneOrMany<ObservationRequest>>(serde_json::json!([
            {"road_segment": 1, "license_plate": "AA16AA", "sensor_uuid": SENSOR},
        ]))
        .unwrap_err()
        .to_string();
        assert!(batch.contains("timestamp"), "{batch}");
    }
}
