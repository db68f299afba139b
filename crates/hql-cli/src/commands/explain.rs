//! Explain command implementation.

use super::load_metastore;
use anyhow::{Context, Result};
use hql_core::plan::{explain, QueryBlock, QueryPlanner};
use hql_core::Config;
use std::path::Path;
use tracing::info;

/// Plan the query in `query_path` and print its EXPLAIN text.
pub fn run(config: Config, query_path: &Path, hiveconf: &[String], schema: Option<&Path>) -> Result<()> {
    print!("{}", render(config, query_path, hiveconf, schema)?);
    Ok(())
}

fn render(
    config: Config,
    query_path: &Path,
    hiveconf: &[String],
    schema: Option<&Path>,
) -> Result<String> {
    let mut planner_config = config.planner.clone();
    for assignment in hiveconf {
        planner_config.apply_assignment(assignment)?;
    }

    let content = std::fs::read_to_string(query_path)
        .with_context(|| format!("Failed to read query file {}", query_path.display()))?;
    let query: QueryBlock = serde_json::from_str(&content).map_err(hql_core::Error::from)?;

    let metastore = load_metastore(&config, schema)?;
    let plan = QueryPlanner::new(&metastore, planner_config).plan(&query)?;
    info!(stages = plan.stages().len(), "Query planned");
    Ok(explain(&plan))
}
