use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::ConfigError;
use crate::query::filter::FilteredView;
use crate::query::types::{HeatmapCell, Summary};
use crate::query::utility::{max, mean};

/// Mean and max duration plus row count of a view.
///
/// Mean and max are `N/A` when no row in the view carries a duration.
pub fn summarize(view: &FilteredView<'_>) -> Summary {
    let durations: Vec<f64> = view.records().filter_map(|r| r.duration_hours).collect();

    Summary {
        mean_duration: mean(&durations).into(),
        max_duration: max(&durations).into(),
        record_count: view.len(),
    }
}

/// Mean duration per date, ascending by date. Rows without a date or duration are skipped.
pub fn group_by_date_mean(view: &FilteredView<'_>) -> Vec<(NaiveDate, f64)> {
    let mut series: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();

    for record in view.records() {
        if let (Some(date), Some(hours)) = (record.date, record.duration_hours) {
            series.entry(date).or_default().push(hours);
        }
    }

    series
        .into_iter()
        .filter_map(|(date, values)| mean(&values).map(|m| (date, m)))
        .collect()
}

/// Mean duration per distinct value of `column`.
///
/// Values with no duration data have no entry.
pub fn group_by_category_mean(
    view: &FilteredView<'_>,
    column: &str,
) -> Result<BTreeMap<String, f64>, ConfigError> {
    let idx = view.column(column)?;
    let mut series: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for record in view.records() {
        if let (Some(group), Some(hours)) = (record.value(idx), record.duration_hours) {
            series.entry(group).or_default().push(hours);
        }
    }

    Ok(series
        .into_iter()
        .filter_map(|(group, values)| mean(&values).map(|m| (group.to_string(), m)))
        .collect())
}

/// Date × `column` pivot of mean duration, backing the heat map.
///
/// Only populated cells are returned, ordered by date then group.
pub fn pivot_date_by_category(
    view: &FilteredView<'_>,
    column: &str,
) -> Result<Vec<HeatmapCell>, ConfigError> {
    let idx = view.column(column)?;
    let mut series: BTreeMap<(NaiveDate, &str), Vec<f64>> = BTreeMap::new();

    for record in view.records() {
        if let (Some(date), Some(group), Some(hours)) =
            (record.date, record.value(idx), record.duration_hours)
        {
            series.entry((date, group)).or_default().push(hours);
        }
    }

    Ok(series
        .into_iter()
        .filter_map(|((date, group), values)| {
            mean(&values).map(|mean_duration| HeatmapCell {
                date,
                group: group.to_string(),
                mean_duration,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::apply_filters;
    use crate::query::types::{FilterConfig, Metric};
    use crate::table::{MergedRecord, MergedTable};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn table(rows: &[(&str, Option<u32>, Option<f64>)]) -> MergedTable {
        let records = rows
            .iter()
            .map(|(dept, day, hours)| MergedRecord {
                values: vec![dept.to_string()],
                duration_hours: *hours,
                date: day.map(date),
            })
            .collect();
        MergedTable::new(vec!["Department".into()], records)
    }

    #[test]
    fn test_summarize_empty_view() {
        let t = table(&[]);
        let summary = summarize(&FilteredView::all(&t));

        assert_eq!(summary.mean_duration, Metric::NotAvailable);
        assert_eq!(summary.max_duration, Metric::NotAvailable);
        assert_eq!(summary.record_count, 0);
    }

    #[test]
    fn test_summarize_single_row() {
        let t = table(&[("ER", Some(1), Some(4.25))]);
        let summary = summarize(&FilteredView::all(&t));

        assert_eq!(summary.mean_duration, Metric::Value(4.25));
        assert_eq!(summary.max_duration, Metric::Value(4.25));
        assert_eq!(summary.record_count, 1);
    }

    #[test]
    fn test_summarize_after_filter_with_no_match() {
        let t = table(&[("ER", Some(1), Some(4.0))]);
        let config = FilterConfig::new().with_values("Department", ["ICU"]);
        let view = apply_filters(&t, &config).unwrap();

        let summary = summarize(&view);
        assert_eq!(summary.mean_duration.to_string(), "N/A");
        assert_eq!(summary.max_duration.to_string(), "N/A");
        assert_eq!(summary.record_count, 0);
    }

    #[test]
    fn test_group_by_date_mean_ordered() {
        let t = table(&[
            ("ER", Some(3), Some(6.0)),
            ("ER", Some(1), Some(1.0)),
            ("ICU", Some(1), Some(3.0)),
            ("ICU", None, Some(9.0)),
            ("ICU", Some(2), None),
        ]);
        let daily = group_by_date_mean(&FilteredView::all(&t));

        assert_eq!(daily, vec![(date(1), 2.0), (date(3), 6.0)]);
    }

    #[test]
    fn test_group_by_category_mean() {
        let t = table(&[
            ("ER", Some(1), Some(1.0)),
            ("ER", Some(2), Some(5.0)),
            ("ICU", Some(1), Some(2.0)),
            ("", Some(1), Some(8.0)),
            ("OR", Some(1), None),
        ]);
        let by_dept = group_by_category_mean(&FilteredView::all(&t), "Department").unwrap();

        assert_eq!(by_dept.len(), 2);
        assert_eq!(by_dept["ER"], 3.0);
        assert_eq!(by_dept["ICU"], 2.0);
        assert!(!by_dept.contains_key("OR"));
    }

    #[test]
    fn test_group_by_unknown_column() {
        let t = table(&[]);
        assert!(group_by_category_mean(&FilteredView::all(&t), "Modality").is_err());
    }

    #[test]
    fn test_pivot_only_populated_cells() {
        let t = table(&[
            ("ER", Some(1), Some(1.0)),
            ("ER", Some(1), Some(3.0)),
            ("ICU", Some(2), Some(4.0)),
        ]);
        let cells = pivot_date_by_category(&FilteredView::all(&t), "Department").unwrap();

        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].date, date(1));
        assert_eq!(cells[0].group, "ER");
        assert_eq!(cells[0].mean_duration, 2.0);
        assert_eq!(cells[1].group, "ICU");
    }
}
