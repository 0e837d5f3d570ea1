//! CSV upload of road segments.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use super::extract::Staff;
use super::AppState;
use crate::error::{Error, Result};
use crate::import;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "csv_file";

#[derive(Debug, Serialize)]
pub(super) struct UploadResponse {
    message: &'static str,
    created_segments: Vec<i64>,
}

fn no_file() -> Error {
    Error::InvalidRequest("No CSV file uploaded.".to_string())
}

pub(super) async fn upload_csv(
    State(state): State<AppState>,
    Staff(_): Staff,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|_| no_file())?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(e.body_text()))?;
        upload = Some((file_name, content));
        break;
    }

    let (file_name, content) = upload.ok_or_else(no_file)?;
    if !file_name.ends_with(".csv") {
        return Err(Error::InvalidRequest("The file is not a CSV.".to_string()));
    }

    let created_segments = state
        .run(move |storage| import::upload_segments(storage, &content[..]))
        .await?;

    Ok(Json(UploadResponse {
        message: "CSV successfully processed",
        created_segments,
    }))
}
