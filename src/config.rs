//! Column layout and run policies for the turnaround pipeline.

use serde::{Deserialize, Serialize};

/// Name of the derived duration column written to persisted output.
pub const DURATION_COLUMN: &str = "Turnaround_Time_Hours";
/// Name of the derived calendar date column written to persisted output.
pub const DATE_COLUMN: &str = "Date";
/// Appended to a source column whose name collides with a derived column.
pub const SOURCE_SUFFIX: &str = "_src";

/// Name an attribute column is stored under in a merged table.
///
/// Source columns named like a derived column get [`SOURCE_SUFFIX`], so
/// persisted files never carry two columns with the same header.
pub fn attribute_column(name: &str) -> String {
    if name == DURATION_COLUMN || name == DATE_COLUMN {
        format!("{name}{SOURCE_SUFFIX}")
    } else {
        name.to_string()
    }
}

/// Which timestamp of a row supplies its calendar [`DATE_COLUMN`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFrom {
    #[default]
    Start,
    End,
}

/// Join key and timestamp pair of one deployment's exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceColumns {
    pub join_key: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub date_from: DateFrom,
}

/// The two export layouts seen in practice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ColumnPreset {
    /// `Start_Time` → `End_Time`
    #[default]
    StartEnd,
    /// `End Date` → `Finalize Time`
    FinalizeEndDate,
}

impl SourceColumns {
    pub fn new(join_key: &str, start: &str, end: &str) -> Self {
        Self {
            join_key: join_key.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            date_from: DateFrom::Start,
        }
    }

    pub fn preset(preset: ColumnPreset) -> Self {
        match preset {
            ColumnPreset::StartEnd => Self::new("Accession", "Start_Time", "End_Time"),
            ColumnPreset::FinalizeEndDate => Self::new("Accession", "End Date", "Finalize Time"),
        }
    }

    pub fn with_date_from(mut self, date_from: DateFrom) -> Self {
        self.date_from = date_from;
        self
    }

    pub(crate) fn date_column(&self) -> &str {
        match self.date_from {
            DateFrom::Start => &self.start,
            DateFrom::End => &self.end,
        }
    }
}

impl Default for SourceColumns {
    fn default() -> Self {
        Self::preset(ColumnPreset::default())
    }
}

/// What to do with a cell that should hold a timestamp or number but doesn't parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParsePolicy {
    /// Treat the cell as missing and keep loading.
    #[default]
    Coerce,
    /// Abort the load with [`crate::error::PipelineError::Parse`].
    Strict,
}

/// Whether rows with `end < start` count as valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NegativeDurationPolicy {
    #[default]
    Exclude,
    Include,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub columns: SourceColumns,
    pub parse_policy: ParsePolicy,
    pub negative_policy: NegativeDurationPolicy,
}

impl PipelineConfig {
    pub fn new(columns: SourceColumns) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    pub fn with_parse_policy(mut self, parse_policy: ParsePolicy) -> Self {
        self.parse_policy = parse_policy;
        self
    }

    pub fn with_negative_policy(mut self, negative_policy: NegativeDurationPolicy) -> Self {
        self.negative_policy = negative_policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_preset_measures_end_date_to_finalize() {
        let cols = SourceColumns::preset(ColumnPreset::FinalizeEndDate);
        assert_eq!(cols.start, "End Date");
        assert_eq!(cols.end, "Finalize Time");
        assert_eq!(cols.date_column(), "End Date");
    }

    #[test]
    fn test_date_from_end() {
        let cols = SourceColumns::default().with_date_from(DateFrom::End);
        assert_eq!(cols.date_column(), "End_Time");
    }

    #[test]
    fn test_attribute_column_renames_derived_names() {
        assert_eq!(attribute_column("Date"), "Date_src");
        assert_eq!(attribute_column("Turnaround_Time_Hours"), "Turnaround_Time_Hours_src");
        assert_eq!(attribute_column("Modality"), "Modality");
    }

    #[test]
    fn test_default_policies() {
        let config = PipelineConfig::default();
        assert_eq!(config.parse_policy, ParsePolicy::Coerce);
        assert_eq!(config.negative_policy, NegativeDurationPolicy::Exclude);
        assert_eq!(config.columns.join_key, "Accession");
    }
}
