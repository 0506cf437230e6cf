//! Error types for the pipeline and the query layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{source_name} is missing required column '{column}'")]
    Schema {
        source_name: &'static str,
        column: String,
    },

    #[error("row {row} column '{column}': cannot parse '{value}'")]
    Parse {
        column: String,
        row: usize,
        value: String,
    },

    #[error("{source_name} CSV error: {source}")]
    Csv {
        source_name: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("cannot load filter configuration from {path}: {message}")]
    Load { path: String, message: String },
}
