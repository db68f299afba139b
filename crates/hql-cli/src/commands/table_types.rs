//! Table types command implementation.

use anyhow::Result;
use hql_core::config::TableTypeMappingKind;
use hql_core::metastore::InMemoryMetastore;
use hql_core::service::{FetchOrientation, GetTableTypesOperation, HiveSession, Operation};
use hql_core::Config;
use std::sync::Arc;

/// Run GetTableTypes and print one type per line.
pub fn run(config: Config, mapping: Option<&str>) -> Result<()> {
    for table_type in table_types(config, mapping)? {
        println!("{}", table_type);
    }
    Ok(())
}

fn table_types(mut config: Config, mapping: Option<&str>) -> Result<Vec<String>> {
    if let Some(mapping) = mapping {
        config.server.table_type_mapping = parse_mapping(mapping)?;
    }
    let max_rows = config.server.max_fetch_rows;
    let metastore = Arc::new(InMemoryMetastore::from_config(&config.metastore));
    let session = Arc::new(HiveSession::new(config, metastore));

    let mut op = GetTableTypesOperation::new(session);
    op.run()?;
    let mut types = Vec::new();
    loop {
        let rows = op.next_row_set(FetchOrientation::FetchNext, max_rows.max(1))?;
        if rows.is_empty() {
            break;
        }
        types.extend(rows.rows().iter().map(|row| {
            row.first()
                .map(|value| value.to_string())
                .unwrap_or_default()
        }));
    }
    op.close()?;
    Ok(types)
}

fn parse_mapping(name: &str) -> Result<TableTypeMappingKind> {
    match name.trim().to_ascii_lowercase().as_str() {
        "classic" => Ok(TableTypeMappingKind::Classic),
        "hive" => Ok(TableTypeMappingKind::Hive),
        other => Err(hql_core::Error::Config(format!(
            "Unknown table type mapping: {} (expected classic or hive)",
            other
        ))
        .into()),
    }
}
