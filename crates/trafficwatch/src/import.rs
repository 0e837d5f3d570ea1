//! CSV import of road segments and sensors.
//!
//! Two flavours exist. Uploads through the HTTP API are strict: every row is
//! written inside one transaction and the first bad row rolls the whole file
//! back. The command-line importers are lenient: bad rows are logged and
//! skipped.
//!
//! Segment files carry `id, start_lon, start_lat, end_lon, end_lat, length,
//! speed`; sensor files carry `id, name, uuid`. The first line is a header and
//! the `id` column is ignored.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};
use geo_types::Point;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{NewRoadSegment, NewSensor};
use crate::storage::Storage;

const SEGMENT_COLUMNS: usize = 7;
const SENSOR_COLUMNS: usize = 3;

/// Outcome of a lenient import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Rows written.
    pub imported: usize,
    /// Rows logged and skipped.
    pub skipped: usize,
}

/// A parsed segment row: the segment and its initial reading.
#[derive(Debug, Clone, PartialEq)]
struct SegmentRow {
    segment: NewRoadSegment,
    speed: f64,
}

fn csv_reader<R: Read>(source: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source)
}

/// Render a record the way it appears in error messages.
fn describe(record: &StringRecord) -> String {
    format!("{:?}", record.iter().collect::<Vec<_>>())
}

fn float_field(record: &StringRecord, idx: usize, name: &str) -> Result<f64> {
    let raw = record.get(idx).unwrap_or_default();
    let value = raw.parse::<f64>().map_err(|e| {
        Error::malformed(describe(record), format!("{name}: could not convert {raw:?} to float ({e})"))
    })?;
    if !value.is_finite() {
        return Err(Error::malformed(
            describe(record),
            format!("{name}: {raw:?} is not a finite number"),
        ));
    }
    Ok(value)
}

fn require_columns(record: &StringRecord, expected: usize) -> Result<()> {
    if record.len() < expected {
        return Err(Error::malformed(
            describe(record),
            format!("expected {expected} columns, found {}", record.len()),
        ));
    }
    Ok(())
}

fn parse_segment_row(record: &StringRecord) -> Result<SegmentRow> {
    require_columns(record, SEGMENT_COLUMNS)?;
    let start = Point::new(
        float_field(record, 1, "start_lon")?,
        float_field(record, 2, "start_lat")?,
    );
    let end = Point::new(
        float_field(record, 3, "end_lon")?,
        float_field(record, 4, "end_lat")?,
    );
    Ok(SegmentRow {
        segment: NewRoadSegment {
            start_point: start,
            end_point: end,
            length: float_field(record, 5, "length")?,
        },
        speed: float_field(record, 6, "speed")?,
    })
}

fn parse_sensor_row(record: &StringRecord) -> Result<NewSensor> {
    require_columns(record, SENSOR_COLUMNS)?;
    let raw_uuid = record.get(2).unwrap_or_default();
    let uuid = Uuid::parse_str(raw_uuid)
        .map_err(|e| Error::malformed(describe(record), format!("uuid: {e}")))?;
    Ok(NewSensor {
        name: record.get(1).unwrap_or_default().to_string(),
        uuid: Some(uuid),
    })
}

fn read_record<R: Read>(
    reader: &mut csv::Reader<R>,
    record: &mut StringRecord,
) -> Result<bool> {
    reader.read_record(record).map_err(|e| {
        let line = e
            .position()
            .map_or_else(|| "?".to_string(), |p| p.line().to_string());
        Error::malformed(line, e.to_string())
    })
}

fn write_segment_row(storage: &Storage, row: &SegmentRow) -> Result<i64> {
    let segment = storage.create_segment(&row.segment)?;
    storage.insert_reading(segment.id, row.speed)?;
    Ok(segment.id)
}

/// Import road segments from an uploaded CSV, all or nothing.
///
/// Returns the IDs of the created segments in file order.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] naming the first bad row, in which case
/// nothing is written, or an error if the database operation fails.
pub fn upload_segments<R: Read>(storage: &Storage, source: R) -> Result<Vec<i64>> {
    let mut reader = csv_reader(source);
    let mut record = StringRecord::new();

    let created = storage.atomically(|store| {
        let mut created = Vec::new();
        while read_record(&mut reader, &mut record)? {
            let row = parse_segment_row(&record)?;
            created.push(write_segment_row(store, &row)?);
        }
        Ok(created)
    })?;

    info!("Uploaded {} road segments", created.len());
    Ok(created)
}

/// Import road segments from a CSV, skipping bad rows.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn import_segments<R: Read>(storage: &Storage, source: R) -> Result<ImportSummary> {
    let summary = import_lenient(storage, source, |store, record| {
        let row = parse_segment_row(record)?;
        store.atomically(|s| write_segment_row(s, &row))?;
        Ok(())
    })?;
    info!(
        "{} road segments imported, {} rows skipped",
        summary.imported, summary.skipped
    );
    Ok(summary)
}

/// Import sensors from a CSV, skipping bad rows and duplicate UUIDs.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn import_sensors<R: Read>(storage: &Storage, source: R) -> Result<ImportSummary> {
    let summary = import_lenient(storage, source, |store, record| {
        let sensor = parse_sensor_row(record)?;
        store.create_sensor(&sensor)?;
        Ok(())
    })?;
    info!(
        "{} sensors imported, {} rows skipped",
        summary.imported, summary.skipped
    );
    Ok(summary)
}

fn import_lenient<R, F>(storage: &Storage, source: R, mut write: F) -> Result<ImportSummary>
where
    R: Read,
    F: FnMut(&Storage, &StringRecord) -> Result<()>,
{
    let mut reader = csv_reader(source);
    let mut record = StringRecord::new();
    let mut summary = ImportSummary::default();

    loop {
        match read_record(&mut reader, &mut record) {
            Ok(false) => break,
            Ok(true) => match write(storage, &record) {
                Ok(()) => summary.imported += 1,
                Err(e) if e.is_client_error() => {
                    warn!("Skipping row {}: {}", describe(&record), e);
                    summary.skipped += 1;
                }
                Err(e) => return Err(e),
            },
            Err(e) => {
                warn!("Skipping unreadable row: {}", e);
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}
