//! In-memory tables: raw CSV sources and the merged turnaround table.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::PipelineError;

/// A delimited source as read from disk, with spreadsheet index columns removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Reads a CSV source with a header row.
    ///
    /// Columns whose header is blank or starts with `Unnamed` are dropped.
    /// Short rows are padded with empty cells and long rows truncated to the
    /// header width.
    pub fn from_csv(bytes: &[u8], source_name: &'static str) -> Result<Self, PipelineError> {
        let csv_err = |source| PipelineError::Csv {
            source_name,
            source,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes);

        let all_headers: Vec<String> = rdr
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let keep: Vec<usize> = all_headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !is_index_artifact(h))
            .map(|(i, _)| i)
            .collect();

        if keep.len() != all_headers.len() {
            debug!(
                source_name,
                dropped = all_headers.len() - keep.len(),
                "Dropped unnamed columns"
            );
        }

        let headers = keep.iter().map(|&i| all_headers[i].clone()).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            let row = keep
                .iter()
                .map(|&i| record.get(i).unwrap_or_default().to_string())
                .collect();
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn is_index_artifact(header: &str) -> bool {
    header.is_empty() || header.starts_with("Unnamed")
}

/// One joined work item with its derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub values: Vec<String>,
    pub duration_hours: Option<f64>,
    pub date: Option<NaiveDate>,
}

impl MergedRecord {
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values,
            duration_hours: None,
            date: None,
        }
    }

    /// Cell text at `idx`; empty cells read as missing.
    pub fn value(&self, idx: usize) -> Option<&str> {
        self.values
            .get(idx)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// The merged productivity/volume table. Never mutated once built: every
/// filter returns a new table sharing the same header list.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    headers: Arc<[String]>,
    records: Vec<MergedRecord>,
}

impl MergedTable {
    pub fn new(headers: Vec<String>, records: Vec<MergedRecord>) -> Self {
        Self {
            headers: headers.into(),
            records,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[MergedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Present durations, in row order.
    pub fn durations(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().filter_map(|r| r.duration_hours)
    }

    /// A new table holding clones of the records that satisfy `keep`.
    pub fn filtered<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&MergedRecord) -> bool,
    {
        Self {
            headers: Arc::clone(&self.headers),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    pub(crate) fn with_records(&self, records: Vec<MergedRecord>) -> Self {
        Self {
            headers: Arc::clone(&self.headers),
            records,
        }
    }
}
