//! Subcommand implementations.

pub mod explain;
pub mod round;
pub mod serve;
pub mod status;
pub mod table_types;

use anyhow::{Context, Result};
use hql_core::metastore::{InMemoryMetastore, Table};
use hql_core::Config;
use std::path::Path;
use tracing::info;

/// In-memory metastore from the config, seeded from a JSON table list.
pub fn load_metastore(config: &Config, schema: Option<&Path>) -> Result<InMemoryMetastore> {
    let metastore = InMemoryMetastore::from_config(&config.metastore);
    if let Some(path) = schema {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file {}", path.display()))?;
        let tables: Vec<Table> =
            serde_json::from_str(&content).map_err(hql_core::Error::from)?;
        metastore.seed(&tables)?;
        info!(path = %path.display(), tables = tables.len(), "Seeded metastore");
    }
    Ok(metastore)
}
