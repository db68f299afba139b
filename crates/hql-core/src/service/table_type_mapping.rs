//! Mapping between metastore table types and the types reported to clients.

use crate::config::TableTypeMappingKind;
use crate::metastore::TableType;
use std::fmt;

/// Client-side table type names used by the classic mapping.
pub const CLASSIC_TABLE: &str = "TABLE";
pub const CLASSIC_VIEW: &str = "VIEW";

/// Translates metastore table types to client table types and back.
pub trait TableTypeMapping: Send + Sync + fmt::Debug {
    /// Metastore types that a client type stands for.
    fn map_to_hive_types(&self, client_type: &str) -> Vec<String>;

    /// Client type for a metastore type.
    fn map_to_client_type(&self, hive_type: &str) -> String;

    /// Every client type this mapping can report.
    fn table_type_names(&self) -> Vec<String>;
}

/// Reports metastore table types unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct HiveTableTypeMapping;

impl TableTypeMapping for HiveTableTypeMapping {
    fn map_to_hive_types(&self, client_type: &str) -> Vec<String> {
        vec![client_type.to_string()]
    }

    fn map_to_client_type(&self, hive_type: &str) -> String {
        hive_type.to_string()
    }

    fn table_type_names(&self) -> Vec<String> {
        TableType::ALL.iter().map(|t| t.to_string()).collect()
    }
}

/// Reports managed and external tables as `TABLE` and views as `VIEW`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassicTableTypeMapping;

impl TableTypeMapping for ClassicTableTypeMapping {
    fn map_to_hive_types(&self, client_type: &str) -> Vec<String> {
        match client_type.to_ascii_uppercase().as_str() {
            CLASSIC_TABLE => vec![
                TableType::ManagedTable.to_string(),
                TableType::ExternalTable.to_string(),
            ],
            CLASSIC_VIEW => vec![TableType::VirtualView.to_string()],
            _ => vec![client_type.to_string()],
        }
    }

    fn map_to_client_type(&self, hive_type: &str) -> String {
        match hive_type.parse::<TableType>() {
            Ok(TableType::ManagedTable) | Ok(TableType::ExternalTable) => CLASSIC_TABLE.to_string(),
            Ok(TableType::VirtualView) => CLASSIC_VIEW.to_string(),
            _ => hive_type.to_string(),
        }
    }

    fn table_type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for table_type in TableType::ALL {
            let client = self.map_to_client_type(table_type.as_str());
            if !names.contains(&client) {
                names.push(client);
            }
        }
        names
    }
}

/// Mapping for a `hive.server2.table.type.mapping` value: `CLASSIC` in any
/// case selects the classic mapping, anything else the identity mapping.
pub fn table_type_mapping(name: &str) -> Box<dyn TableTypeMapping> {
    if name.trim().eq_ignore_ascii_case("CLASSIC") {
        Box::new(ClassicTableTypeMapping)
    } else {
        Box::new(HiveTableTypeMapping)
    }
}

/// Mapping for a configured kind.
pub fn mapping_for(kind: TableTypeMappingKind) -> Box<dyn TableTypeMapping> {
    match kind {
        TableTypeMappingKind::Classic => Box::new(ClassicTableTypeMapping),
        TableTypeMappingKind::Hive => Box::new(HiveTableTypeMapping),
    }
}
