//! The turnaround-time batch: load → merge → derive → filter(valid) → filter(above-average).

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{
    DATE_COLUMN, DURATION_COLUMN, DateFrom, NegativeDurationPolicy, ParsePolicy, PipelineConfig,
    SourceColumns, attribute_column,
};
use crate::error::PipelineError;
use crate::output::persist;
use crate::table::{MergedRecord, MergedTable, RawTable};
use crate::timestamp::{parse_date, parse_timestamp};

/// Row counts gathered while running the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub productivity_rows: usize,
    pub volume_rows: usize,
    pub merged_rows: usize,
    pub unmatched_productivity: usize,
    pub unmatched_volume: usize,
    pub coerced_cells: usize,
    pub valid_rows: usize,
    pub above_average_rows: usize,
    pub threshold_hours: Option<f64>,
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Every merged row with a valid duration; the trend plot is drawn from this.
    pub valid: MergedTable,
    pub above_average: MergedTable,
    pub threshold: Option<f64>,
    pub report: RunReport,
}

/// Reads both sources and inner-joins them on `columns.join_key`.
///
/// Timestamps are parsed and the derived duration and date are filled in.
/// Productivity row order is kept. Keys match exactly. Non-key columns
/// that appear in both sources are suffixed `_x` (productivity) and `_y`
/// (volume); a column named like a derived column is renamed by
/// [`attribute_column`].
#[tracing::instrument(skip_all, fields(join_key = %columns.join_key))]
pub fn load_and_merge(
    productivity: &[u8],
    volume: &[u8],
    columns: &SourceColumns,
    policy: ParsePolicy,
) -> Result<(MergedTable, RunReport), PipelineError> {
    let left = RawTable::from_csv(productivity, "productivity")?;
    let right = RawTable::from_csv(volume, "volume")?;

    let left_key = require(&left, "productivity", &columns.join_key)?;
    let right_key = require(&right, "volume", &columns.join_key)?;

    let shared: HashSet<&str> = left
        .headers
        .iter()
        .filter(|h| **h != columns.join_key)
        .filter(|h| right.column_index(h).is_some())
        .map(String::as_str)
        .collect();

    let mut headers: Vec<String> = left
        .headers
        .iter()
        .map(|h| {
            if shared.contains(h.as_str()) {
                format!("{h}_x")
            } else {
                h.clone()
            }
        })
        .collect();
    let right_cols: Vec<usize> = (0..right.headers.len()).filter(|&i| i != right_key).collect();
    headers.extend(right_cols.iter().map(|&i| {
        let h = &right.headers[i];
        if shared.contains(h.as_str()) {
            format!("{h}_y")
        } else {
            h.clone()
        }
    }));

    let start_idx = position(&headers, &columns.start)?;
    let end_idx = position(&headers, &columns.end)?;
    let headers: Vec<String> = headers.iter().map(|h| attribute_column(h)).collect();

    let mut by_key: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        by_key.entry(row[right_key].as_str()).or_default().push(i);
    }
    warn_duplicate_keys("volume", by_key.values().map(Vec::len));

    let mut left_counts: HashMap<&str, usize> = HashMap::new();
    for row in &left.rows {
        *left_counts.entry(row[left_key].as_str()).or_default() += 1;
    }
    warn_duplicate_keys("productivity", left_counts.into_values());

    let mut matched_right: HashSet<usize> = HashSet::new();
    let mut unmatched_productivity = 0;
    let mut records = Vec::new();

    for row in &left.rows {
        let Some(matches) = by_key.get(row[left_key].as_str()) else {
            unmatched_productivity += 1;
            continue;
        };
        for &r in matches {
            matched_right.insert(r);
            let mut values = row.clone();
            values.extend(right_cols.iter().map(|&i| right.rows[r][i].clone()));
            records.push(MergedRecord::new(values));
        }
    }

    let coerced_cells = derive(
        &mut records,
        start_idx,
        end_idx,
        columns.date_from,
        &headers,
        policy,
    )?;

    let report = RunReport {
        productivity_rows: left.len(),
        volume_rows: right.len(),
        merged_rows: records.len(),
        unmatched_productivity,
        unmatched_volume: right.len() - matched_right.len(),
        coerced_cells,
        ..Default::default()
    };

    info!(
        productivity_rows = report.productivity_rows,
        volume_rows = report.volume_rows,
        merged_rows = report.merged_rows,
        unmatched_productivity = report.unmatched_productivity,
        unmatched_volume = report.unmatched_volume,
        coerced_cells,
        "Sources merged"
    );

    Ok((MergedTable::new(headers, records), report))
}

/// Recomputes duration (hours) and date from the `start_col`/`end_col` pair.
///
/// The date is taken from the side named by `date_from`. Missing or
/// unparsable timestamps give a missing duration, unless `policy` is strict.
pub fn compute_duration_hours(
    table: &MergedTable,
    start_col: &str,
    end_col: &str,
    date_from: DateFrom,
    policy: ParsePolicy,
) -> Result<MergedTable, PipelineError> {
    let headers = table.headers();
    let start_idx = position(headers, start_col)?;
    let end_idx = position(headers, end_col)?;

    let mut records = table.records().to_vec();
    let coerced = derive(&mut records, start_idx, end_idx, date_from, headers, policy)?;
    debug!(coerced, start_col, end_col, "Durations recomputed");

    Ok(table.with_records(records))
}

/// Keeps rows with a present, non-negative duration.
///
/// Under [`NegativeDurationPolicy::Include`] negative durations are kept too.
pub fn filter_valid(table: &MergedTable, policy: NegativeDurationPolicy) -> MergedTable {
    let valid = table.filtered(|r| match (r.duration_hours, policy) {
        (Some(h), NegativeDurationPolicy::Exclude) => h >= 0.0,
        (Some(h), NegativeDurationPolicy::Include) => !h.is_nan(),
        (None, _) => false,
    });
    debug!(
        before = table.len(),
        after = valid.len(),
        "Filtered to valid durations"
    );
    valid
}

/// Rows whose duration is strictly greater than the mean duration, with that mean.
///
/// The mean covers every row of `table` that has a duration. The threshold
/// is `None` when no row has one, in which case the result is empty.
pub fn above_average(table: &MergedTable) -> (MergedTable, Option<f64>) {
    let (sum, count) = table
        .durations()
        .fold((0.0, 0usize), |(s, n), h| (s + h, n + 1));

    if count == 0 {
        return (table.filtered(|_| false), None);
    }

    let threshold = sum / count as f64;
    let above = table.filtered(|r| r.duration_hours.is_some_and(|h| h > threshold));
    (above, Some(threshold))
}

/// Runs the whole batch over two in-memory sources.
#[tracing::instrument(skip_all)]
pub fn run(
    productivity: &[u8],
    volume: &[u8],
    config: &PipelineConfig,
) -> Result<PipelineRun, PipelineError> {
    let (merged, mut report) =
        load_and_merge(productivity, volume, &config.columns, config.parse_policy)?;

    let valid = filter_valid(&merged, config.negative_policy);
    let (above, threshold) = above_average(&valid);

    report.valid_rows = valid.len();
    report.above_average_rows = above.len();
    report.threshold_hours = threshold;

    info!(
        valid_rows = report.valid_rows,
        above_average_rows = report.above_average_rows,
        threshold_hours = ?threshold,
        "Pipeline complete"
    );

    Ok(PipelineRun {
        valid,
        above_average: above,
        threshold,
        report,
    })
}

/// Runs the batch and persists the above-average rows to `destination`.
///
/// Nothing is written when the run fails.
pub fn run_and_persist(
    productivity: &[u8],
    volume: &[u8],
    config: &PipelineConfig,
    destination: &std::path::Path,
) -> Result<PipelineRun, PipelineError> {
    let result = run(productivity, volume, config)?;
    persist(&result.above_average, destination)?;
    Ok(result)
}

/// Re-reads a file written by [`crate::output::persist`].
///
/// The stored duration column is used when present; otherwise durations are
/// recomputed from the timestamp pair in `columns`. The date comes from the
/// configured timestamp column, falling back to the stored date column.
pub fn load_persisted(
    bytes: &[u8],
    columns: &SourceColumns,
    policy: ParsePolicy,
) -> Result<MergedTable, PipelineError> {
    let raw = RawTable::from_csv(bytes, "persisted")?;

    // Derived columns are written last; earlier same-named columns are source attributes.
    let duration_idx = raw.headers.iter().rposition(|h| h == DURATION_COLUMN);
    let stored_date_idx = raw.headers.iter().rposition(|h| h == DATE_COLUMN);

    let attribute_cols: Vec<usize> = (0..raw.headers.len())
        .filter(|&i| Some(i) != duration_idx && Some(i) != stored_date_idx)
        .collect();
    let headers: Vec<String> = attribute_cols
        .iter()
        .map(|&i| attribute_column(&raw.headers[i]))
        .collect();

    let start_col = attribute_column(&columns.start);
    let end_col = attribute_column(&columns.end);
    let date_col = attribute_column(columns.date_column());

    if duration_idx.is_none() {
        position(&headers, &start_col).map_err(|_| missing(&columns.start))?;
        position(&headers, &end_col).map_err(|_| missing(&columns.end))?;
    }
    let date_ts_idx = headers
        .iter()
        .position(|h| *h == date_col)
        .map(|i| attribute_cols[i]);
    if date_ts_idx.is_none() && stored_date_idx.is_none() {
        return Err(missing(DATE_COLUMN));
    }

    let mut coerced = 0;
    let mut records = Vec::with_capacity(raw.len());

    for (row_no, row) in raw.rows.iter().enumerate() {
        let mut record =
            MergedRecord::new(attribute_cols.iter().map(|&i| row[i].clone()).collect());

        if let Some(i) = duration_idx {
            record.duration_hours = parse_cell(
                &row[i],
                DURATION_COLUMN,
                row_no,
                policy,
                &mut coerced,
                |s| s.parse::<f64>().ok().filter(|h| h.is_finite()),
            )?;
        }

        let from_ts = match date_ts_idx {
            Some(i) => parse_cell(&row[i], &date_col, row_no, policy, &mut coerced, parse_date)?,
            None => None,
        };
        record.date = from_ts.or_else(|| stored_date_idx.and_then(|i| parse_date(&row[i])));

        records.push(record);
    }

    let table = MergedTable::new(headers, records);
    let table = if duration_idx.is_none() {
        let recomputed =
            compute_duration_hours(&table, &start_col, &end_col, columns.date_from, policy)?;
        let records = recomputed
            .records()
            .iter()
            .zip(table.records())
            .map(|(new, old)| MergedRecord {
                date: new.date.or(old.date),
                ..new.clone()
            })
            .collect();
        table.with_records(records)
    } else {
        table
    };

    info!(rows = table.len(), coerced, "Loaded persisted table");
    Ok(table)
}

fn missing(column: &str) -> PipelineError {
    PipelineError::Schema {
        source_name: "persisted",
        column: column.to_string(),
    }
}

fn warn_duplicate_keys(source_name: &str, counts: impl Iterator<Item = usize>) {
    let duplicate_keys = counts.filter(|&n| n > 1).count();
    if duplicate_keys > 0 {
        warn!(source_name, duplicate_keys, "Repeated join keys");
    }
}

fn require(table: &RawTable, source_name: &'static str, column: &str) -> Result<usize, PipelineError> {
    table
        .column_index(column)
        .ok_or_else(|| PipelineError::Schema {
            source_name,
            column: column.to_string(),
        })
}

fn position(headers: &[String], column: &str) -> Result<usize, PipelineError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| PipelineError::Schema {
            source_name: "merged table",
            column: column.to_string(),
        })
}

/// Parses one cell under `policy`. Blank cells are missing, not errors.
fn parse_cell<T>(
    raw: &str,
    column: &str,
    row: usize,
    policy: ParsePolicy,
    coerced: &mut usize,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, PipelineError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match parse(raw.trim()) {
        Some(v) => Ok(Some(v)),
        None => match policy {
            ParsePolicy::Coerce => {
                *coerced += 1;
                Ok(None)
            }
            ParsePolicy::Strict => Err(PipelineError::Parse {
                column: column.to_string(),
                row,
                value: raw.to_string(),
            }),
        },
    }
}

/// Fills in duration and date for every record; returns the number of coerced cells.
fn derive(
    records: &mut [MergedRecord],
    start_idx: usize,
    end_idx: usize,
    date_from: DateFrom,
    headers: &[String],
    policy: ParsePolicy,
) -> Result<usize, PipelineError> {
    let mut coerced = 0;

    for (row, record) in records.iter_mut().enumerate() {
        let start = parse_cell(
            &record.values[start_idx],
            &headers[start_idx],
            row,
            policy,
            &mut coerced,
            parse_timestamp,
        )?;
        let end = parse_cell(
            &record.values[end_idx],
            &headers[end_idx],
            row,
            policy,
            &mut coerced,
            parse_timestamp,
        )?;

        record.duration_hours = match (start, end) {
            (Some(s), Some(e)) => Some((e - s).num_milliseconds() as f64 / 3_600_000.0),
            _ => None,
        };

        record.date = match date_from {
            DateFrom::Start => start.map(|s| s.date()),
            DateFrom::End => end.map(|e| e.date()),
        };
    }

    if coerced > 0 {
        warn!(coerced, "Unparsable timestamps coerced to missing");
    }

    Ok(coerced)
}
