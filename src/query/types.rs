//! Data types used by the query layer.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConfigError;

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Filter controls set by a viewer.
///
/// Stored as JSON:
/// ```json
/// {
///   "date_range": { "start": "2024-01-01", "end": "2024-01-31" },
///   "categorical": { "Modality": ["CT", "MR"], "Hospital Location": [] }
/// }
/// ```
/// An empty or absent value set places no restriction on that column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub categorical: BTreeMap<String, BTreeSet<String>>,
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some(DateRange::new(start, end));
        self
    }

    pub fn with_values<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical
            .entry(column.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let load_err = |message: String| ConfigError::Load {
            path: path.to_string(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| load_err(e.to_string()))
    }
}

/// An aggregate that may be unavailable because there was nothing to aggregate.
///
/// Displays and serializes as `"N/A"` when unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Value(f64),
    NotAvailable,
}

impl Metric {
    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::NotAvailable => None,
        }
    }
}

impl From<Option<f64>> for Metric {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Metric::NotAvailable, Metric::Value)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => write!(f, "{v:.2}"),
            Metric::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Value(v) => serializer.serialize_f64(*v),
            Metric::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

/// Headline numbers for a view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean_duration: Metric,
    pub max_duration: Metric,
    pub record_count: usize,
}

/// One cell of the date × category heat map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub date: NaiveDate,
    pub group: String,
    pub mean_duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_display_and_json() {
        assert_eq!(Metric::NotAvailable.to_string(), "N/A");
        assert_eq!(Metric::Value(2.0).to_string(), "2.00");
        assert_eq!(serde_json::to_string(&Metric::NotAvailable).unwrap(), "\"N/A\"");
        assert_eq!(serde_json::to_string(&Metric::Value(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn test_filter_config_from_json() {
        let json = r#"{
            "date_range": {"start": "2024-01-01", "end": "2024-01-31"},
            "categorical": {"Modality": ["CT", "MR"]}
        }"#;
        let config: FilterConfig = serde_json::from_str(json).unwrap();

        let range = config.date_range.unwrap();
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        assert_eq!(config.categorical["Modality"].len(), 2);
    }

    #[test]
    fn test_filter_config_empty_json() {
        let config: FilterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, FilterConfig::new());
    }

    #[test]
    fn test_filter_config_load_missing_file() {
        let err = FilterConfig::load("/nonexistent/filters.json").unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }
}
