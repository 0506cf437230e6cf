//! Predicate application over a merged table.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{ConfigError, PipelineError};
use crate::output::write_file;
use crate::query::types::FilterConfig;
use crate::table::{MergedRecord, MergedTable};

/// A read-only selection of rows from a [`MergedTable`].
///
/// Views borrow the table and never modify it, so any number of them can be
/// built concurrently from one shared table.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredView<'a> {
    table: &'a MergedTable,
    rows: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// A view over every row of `table`.
    pub fn all(table: &'a MergedTable) -> Self {
        Self {
            table,
            rows: (0..table.len()).collect(),
        }
    }

    pub fn table(&self) -> &'a MergedTable {
        self.table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &'a MergedRecord> + '_ {
        let records = self.table.records();
        self.rows.iter().map(move |&i| &records[i])
    }

    /// Narrows this view further with `config`.
    pub fn refine(&self, config: &FilterConfig) -> Result<FilteredView<'a>, ConfigError> {
        let mut categorical = Vec::new();
        for (column, accepted) in &config.categorical {
            let idx = self.column(column)?;
            if !accepted.is_empty() {
                categorical.push((idx, accepted));
            }
        }

        let records = self.table.records();
        let rows = self
            .rows
            .iter()
            .copied()
            .filter(|&i| {
                let record = &records[i];
                let in_range = config.date_range.is_none_or(|range| {
                    record.date.is_some_and(|d| range.contains(d))
                });
                in_range
                    && categorical.iter().all(|(idx, accepted)| {
                        record.value(*idx).is_some_and(|v| accepted.contains(v))
                    })
            })
            .collect();

        Ok(FilteredView {
            table: self.table,
            rows,
        })
    }

    /// Writes the view in the persisted CSV layout ("download filtered data").
    pub fn export(&self, destination: &Path) -> Result<usize, PipelineError> {
        write_file(destination, self.table.headers(), self.records())
    }

    pub(crate) fn column(&self, name: &str) -> Result<usize, ConfigError> {
        self.table
            .column_index(name)
            .ok_or_else(|| ConfigError::UnknownColumn(name.to_string()))
    }
}

/// Rows of `table` that satisfy every predicate in `config`.
///
/// Dates compare by calendar day, inclusive at both ends; rows without a
/// date never match a configured range. A row matches a categorical filter
/// when its cell is one of the accepted values; missing cells never match.
pub fn apply_filters<'a>(
    table: &'a MergedTable,
    config: &FilterConfig,
) -> Result<FilteredView<'a>, ConfigError> {
    FilteredView::all(table).refine(config)
}

/// Distinct non-missing values of `column` in first-seen order.
///
/// Called on an already-filtered view this yields cascading dropdown options.
pub fn distinct_values(view: &FilteredView<'_>, column: &str) -> Result<Vec<String>, ConfigError> {
    let idx = view.column(column)?;
    let mut seen = HashSet::new();
    Ok(view
        .records()
        .filter_map(|r| r.value(idx))
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect())
}

/// Earliest and latest date in the view.
pub fn date_bounds(view: &FilteredView<'_>) -> Option<(NaiveDate, NaiveDate)> {
    view.records()
        .filter_map(|r| r.date)
        .fold(None, |acc, d| match acc {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })
}
