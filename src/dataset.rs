//! Process-lifetime dataset handed to the query layer.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::fetch::{HttpClient, read_source};
use crate::pipeline::{load_persisted, run};
use crate::query::{FilterConfig, FilteredView, apply_filters};
use crate::table::MergedTable;

/// Where a [`Dataset`] is (re)built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// A file previously written by [`crate::output::persist`].
    Persisted { location: String },
    /// Raw exports run through the pipeline; the above-average subset is kept.
    Sources {
        productivity: String,
        volume: String,
    },
}

/// The loaded table plus enough information to rebuild it.
///
/// Built once at start-up. Queries borrow the table; it only changes
/// through [`Dataset::reload`].
#[derive(Debug)]
pub struct Dataset {
    source: DatasetSource,
    config: PipelineConfig,
    table: Arc<MergedTable>,
    loaded_at: DateTime<Utc>,
}

impl Dataset {
    pub async fn load<C: HttpClient>(
        client: &C,
        source: DatasetSource,
        config: PipelineConfig,
    ) -> Result<Self> {
        let table = build(client, &source, &config).await?;
        Ok(Self {
            source,
            config,
            table: Arc::new(table),
            loaded_at: Utc::now(),
        })
    }

    /// Rebuilds the table from its source. On failure the previous table is kept.
    pub async fn reload<C: HttpClient>(&mut self, client: &C) -> Result<()> {
        let table = build(client, &self.source, &self.config).await?;
        self.table = Arc::new(table);
        self.loaded_at = Utc::now();
        info!(rows = self.table.len(), "Dataset reloaded");
        Ok(())
    }

    pub fn table(&self) -> &MergedTable {
        &self.table
    }

    /// A handle to the current table that outlives a later reload.
    pub fn shared(&self) -> Arc<MergedTable> {
        Arc::clone(&self.table)
    }

    pub fn source(&self) -> &DatasetSource {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn query(&self, filters: &FilterConfig) -> Result<FilteredView<'_>, ConfigError> {
        apply_filters(&self.table, filters)
    }
}

#[tracing::instrument(skip(client, config))]
async fn build<C: HttpClient>(
    client: &C,
    source: &DatasetSource,
    config: &PipelineConfig,
) -> Result<MergedTable> {
    let table = match source {
        DatasetSource::Persisted { location } => {
            let bytes = read_source(client, location).await?;
            load_persisted(&bytes, &config.columns, config.parse_policy)?
        }
        DatasetSource::Sources {
            productivity,
            volume,
        } => {
            let productivity = read_source(client, productivity).await?;
            let volume = read_source(client, volume).await?;
            run(&productivity, &volume, config)?.above_average
        }
    };
    info!(rows = table.len(), "Dataset loaded");
    Ok(table)
}
