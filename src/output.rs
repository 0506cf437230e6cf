//! Output formatting and persistence for merged tables and query results.
//!
//! Supports JSON logging of reports and CSV export, optionally gzipped.

use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{DATE_COLUMN, DURATION_COLUMN};
use crate::error::PipelineError;
use crate::table::{MergedRecord, MergedTable};

/// Logs any serializable report as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Serializes `records` as CSV: every attribute column, then
/// [`DURATION_COLUMN`] and [`DATE_COLUMN`]. No index column is written.
pub fn write_records<'a, W, I>(writer: W, headers: &[String], records: I) -> Result<(), PipelineError>
where
    W: Write,
    I: IntoIterator<Item = &'a MergedRecord>,
{
    let csv_err = |source| PipelineError::Csv {
        source_name: "output",
        source,
    };

    let mut writer = WriterBuilder::new().from_writer(writer);

    writer
        .write_record(
            headers
                .iter()
                .map(String::as_str)
                .chain([DURATION_COLUMN, DATE_COLUMN]),
        )
        .map_err(csv_err)?;

    for record in records {
        let duration = record.duration_hours.map(|h| h.to_string()).unwrap_or_default();
        let date = record
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        writer
            .write_record(
                record
                    .values
                    .iter()
                    .map(String::as_str)
                    .chain([duration.as_str(), date.as_str()]),
            )
            .map_err(csv_err)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes `records` to `destination`, gzip-compressing when it ends in `.gz`.
///
/// The whole file is serialized in memory first, so a failure never leaves
/// a partial file behind.
pub fn write_file<'a, I>(destination: &Path, headers: &[String], records: I) -> Result<usize, PipelineError>
where
    I: IntoIterator<Item = &'a MergedRecord>,
{
    let mut buf = Vec::new();
    write_records(&mut buf, headers, records)?;

    let body = if destination.extension().and_then(|e| e.to_str()) == Some("gz") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&buf)?;
        encoder.finish()?
    } else {
        buf
    };

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(destination, &body)?;

    debug!(path = %destination.display(), bytes = body.len(), "Wrote table");
    Ok(body.len())
}

/// Persists a merged table (normally the above-average subset).
#[tracing::instrument(skip_all, fields(rows = table.len(), destination = %destination.display()))]
pub fn persist(table: &MergedTable, destination: &Path) -> Result<(), PipelineError> {
    write_file(destination, table.headers(), table.records())?;
    info!("Persisted table");
    Ok(())
}
