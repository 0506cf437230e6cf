//! Filtering and aggregation over the pipeline's output table.
//!
//! A visualization host builds a [`FilterConfig`] from its controls, calls
//! [`apply_filters`] and then any of the aggregations on the resulting view.
//! Nothing here mutates the table or performs I/O except [`FilteredView::export`].

pub mod aggregate;
pub mod filter;
pub mod types;
pub mod utility;

pub use aggregate::{group_by_category_mean, group_by_date_mean, pivot_date_by_category, summarize};
pub use filter::{FilteredView, apply_filters, date_bounds, distinct_values};
pub use types::{DateRange, FilterConfig, HeatmapCell, Metric, Summary};
