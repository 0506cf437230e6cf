//! CLI entry point for the turnaround-time tool.
//!
//! Provides subcommands for running the merge/above-average pipeline,
//! querying a persisted result with filters, exporting a filtered view,
//! and listing the columns of the source exports.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use turnaround::{
    config::{
        ColumnPreset, DateFrom, NegativeDurationPolicy, ParsePolicy, PipelineConfig, SourceColumns,
    },
    dataset::{Dataset, DatasetSource},
    fetch::{BasicClient, read_source},
    output::print_json,
    pipeline::run_and_persist,
    plot::write_trend_plot,
    query::{
        FilterConfig, FilteredView, HeatmapCell, Summary, date_bounds, distinct_values,
        group_by_category_mean, group_by_date_mean, pivot_date_by_category, summarize,
    },
    table::RawTable,
};

#[derive(Parser)]
#[command(name = "turnaround")]
#[command(about = "Turnaround-time analysis for productivity and volume exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the exports, keep above-average turnaround rows, and save them
    Run {
        /// Productivity export (path or URL)
        #[arg(long, env = "PRODUCTIVITY_PATH")]
        productivity: String,

        /// Volume export (path or URL)
        #[arg(long, env = "VOLUME_PATH")]
        volume: String,

        /// CSV file to write the above-average rows to (`.gz` to compress)
        #[arg(short, long, env = "OUTPUT_PATH", default_value = "Above_Average_Turnaround.csv")]
        output: PathBuf,

        /// Optional: PNG (or `.svg`) chart of the daily average over all valid rows
        #[arg(long, env = "PLOT_PATH")]
        plot: Option<PathBuf>,

        /// Count negative turnaround times as valid
        #[arg(long, default_value_t = false)]
        keep_negative: bool,

        #[command(flatten)]
        columns: ColumnArgs,
    },
    /// Filter a saved result and print summary, daily and per-group averages as JSON
    Query {
        /// Saved pipeline output (path or URL)
        #[arg(long, env = "DATA_PATH", default_value = "Above_Average_Turnaround.csv")]
        data: String,

        /// JSON filter configuration file
        #[arg(short, long)]
        filters: Option<String>,

        /// Column to average by and to pivot against date
        #[arg(short, long)]
        group_by: Option<String>,

        /// Columns whose distinct values should be listed as filter options
        #[arg(long = "options", value_delimiter = ',')]
        option_columns: Vec<String>,

        #[command(flatten)]
        columns: ColumnArgs,
    },
    /// Write the rows of a saved result that match a filter configuration
    Export {
        /// Saved pipeline output (path or URL)
        #[arg(long, env = "DATA_PATH", default_value = "Above_Average_Turnaround.csv")]
        data: String,

        /// JSON filter configuration file
        #[arg(short, long)]
        filters: Option<String>,

        /// CSV file to write (`.gz` to compress)
        #[arg(short, long, default_value = "Filtered_Data.csv")]
        output: PathBuf,

        #[command(flatten)]
        columns: ColumnArgs,
    },
    /// List the columns of both exports
    Columns {
        #[arg(long, env = "PRODUCTIVITY_PATH")]
        productivity: String,

        #[arg(long, env = "VOLUME_PATH")]
        volume: String,
    },
}

#[derive(Args)]
struct ColumnArgs {
    /// Export layout that names the join key and timestamp columns
    #[arg(long, value_enum, default_value_t = ColumnPreset::StartEnd)]
    preset: ColumnPreset,

    /// Override the join key column
    #[arg(long)]
    join_key: Option<String>,

    /// Override the start timestamp column
    #[arg(long)]
    start_col: Option<String>,

    /// Override the end timestamp column
    #[arg(long)]
    end_col: Option<String>,

    /// Take the calendar date from the end timestamp instead of the start
    #[arg(long, default_value_t = false)]
    date_from_end: bool,

    /// Fail on unparsable timestamps instead of treating them as missing
    #[arg(long, default_value_t = false)]
    strict: bool,
}

impl ColumnArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut columns = SourceColumns::preset(self.preset);
        if let Some(key) = &self.join_key {
            columns.join_key = key.clone();
        }
        if let Some(start) = &self.start_col {
            columns.start = start.clone();
        }
        if let Some(end) = &self.end_col {
            columns.end = end.clone();
        }
        if self.date_from_end {
            columns = columns.with_date_from(DateFrom::End);
        }

        let policy = if self.strict {
            ParsePolicy::Strict
        } else {
            ParsePolicy::Coerce
        };
        PipelineConfig::new(columns).with_parse_policy(policy)
    }
}

#[derive(Serialize)]
struct QueryReport {
    filters: FilterConfig,
    date_bounds: Option<(NaiveDate, NaiveDate)>,
    summary: Summary,
    daily_mean: Vec<(NaiveDate, f64)>,
    group_by: Option<String>,
    group_mean: Option<BTreeMap<String, f64>>,
    heatmap: Option<Vec<HeatmapCell>>,
    options: BTreeMap<String, Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/turnaround.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("turnaround.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let client = BasicClient::new();

    match cli.command {
        Commands::Run {
            productivity,
            volume,
            output,
            plot,
            keep_negative,
            columns,
        } => {
            let negative = if keep_negative {
                NegativeDurationPolicy::Include
            } else {
                NegativeDurationPolicy::Exclude
            };
            let config = columns.pipeline_config().with_negative_policy(negative);

            let productivity = read_source(&client, &productivity).await?;
            let volume = read_source(&client, &volume).await?;

            let result = run_and_persist(&productivity, &volume, &config, &output)?;
            info!(path = %output.display(), "Filtered data saved");

            if let Some(plot) = plot {
                let daily = group_by_date_mean(&FilteredView::all(&result.valid));
                write_trend_plot(&plot, &daily)?;
            }

            print_json(&result.report)?;
        }
        Commands::Query {
            data,
            filters,
            group_by,
            option_columns,
            columns,
        } => {
            let dataset = load_dataset(&client, data, &columns).await?;
            let filters = load_filters(filters.as_deref())?;
            let view = dataset.query(&filters)?;

            let (group_mean, heatmap) = match &group_by {
                Some(column) => (
                    Some(group_by_category_mean(&view, column)?),
                    Some(pivot_date_by_category(&view, column)?),
                ),
                None => (None, None),
            };

            let mut options = BTreeMap::new();
            for column in option_columns {
                let values = distinct_values(&view, &column)?;
                options.insert(column, values);
            }

            let report = QueryReport {
                date_bounds: date_bounds(&view),
                summary: summarize(&view),
                daily_mean: group_by_date_mean(&view),
                group_by,
                group_mean,
                heatmap,
                options,
                filters,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Export {
            data,
            filters,
            output,
            columns,
        } => {
            let dataset = load_dataset(&client, data, &columns).await?;
            let filters = load_filters(filters.as_deref())?;
            let view = dataset.query(&filters)?;

            let bytes = view.export(&output)?;
            info!(path = %output.display(), rows = view.len(), bytes, "Filtered data exported");
        }
        Commands::Columns {
            productivity,
            volume,
        } => {
            for (name, location) in [("productivity", &productivity), ("volume", &volume)] {
                let bytes = read_source(&client, location).await?;
                let table = RawTable::from_csv(&bytes, "columns")?;
                info!(source = name, rows = table.len(), columns = ?table.headers, "Columns");
            }
        }
    }

    Ok(())
}

async fn load_dataset(client: &BasicClient, data: String, columns: &ColumnArgs) -> Result<Dataset> {
    Dataset::load(
        client,
        DatasetSource::Persisted { location: data },
        columns.pipeline_config(),
    )
    .await
}

fn load_filters(path: Option<&str>) -> Result<FilterConfig> {
    Ok(match path {
        Some(path) => FilterConfig::load(path)?,
        None => FilterConfig::new(),
    })
}
