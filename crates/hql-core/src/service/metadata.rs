//! Metadata operations: table types, schemas and tables.

use super::operation::{FetchOrientation, Operation, OperationBase, OperationState, OperationType};
use super::schema::{RowSet, TableSchema};
use super::session::HiveSession;
use super::table_type_mapping::TableTypeMapping;
use crate::metastore::TableType;
use crate::types::Value;
use crate::{MetastoreError, OperationError, Result};
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::{info, warn};

/// Compile a JDBC search pattern: `%` matches any run, `_` one character,
/// and `\%` / `\_` stand for themselves. Matching ignores case. A missing or
/// empty pattern matches everything.
pub fn jdbc_pattern(pattern: Option<&str>) -> Result<Regex> {
    let pattern = pattern.unwrap_or("");
    let mut regex = String::from("^");
    if pattern.is_empty() {
        regex.push_str(".*");
    }
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some('%') | Some('_')) => {
                if let Some(literal) = chars.next() {
                    regex.push_str(&regex::escape(&literal.to_string()));
                }
            }
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    RegexBuilder::new(&regex)
        .case_insensitive(true)
        .build()
        .map_err(|e| OperationError::Failed(format!("Invalid pattern {}: {}", pattern, e)).into())
}

/// Shared run wrapper: Running, then Finished or Error.
fn run_metadata(
    base: &mut OperationBase,
    session: &HiveSession,
    build: impl FnOnce() -> Result<RowSet>,
) -> Result<RowSet> {
    base.set_state(OperationState::Running)?;
    match build() {
        Ok(rows) => {
            base.set_state(OperationState::Finished)?;
            if let Some(metrics) = session.metrics() {
                metrics.record_operation(base.handle().operation_type.as_str());
            }
            info!(
                operation = %base.handle().id,
                operation_type = %base.handle().operation_type,
                rows = rows.num_rows(),
                "Metadata operation finished"
            );
            Ok(rows)
        }
        Err(e) => {
            base.set_state(OperationState::Error)?;
            warn!(
                operation = %base.handle().id,
                operation_type = %base.handle().operation_type,
                error = %e,
                "Metadata operation failed"
            );
            Err(OperationError::Failed(e.to_string()).into())
        }
    }
}

fn fetch(
    base: &OperationBase,
    rows: &mut RowSet,
    orientation: FetchOrientation,
    max_rows: usize,
) -> Result<RowSet> {
    base.assert_state(OperationState::Finished)?;
    base.validate_default_fetch_orientation(orientation)?;
    if orientation == FetchOrientation::FetchFirst {
        rows.set_start_offset(0);
    }
    Ok(rows.extract_subset(max_rows))
}

/// Lists the table types clients can see.
pub struct GetTableTypesOperation {
    base: OperationBase,
    session: Arc<HiveSession>,
    mapping: Box<dyn TableTypeMapping>,
    row_set: RowSet,
}

impl GetTableTypesOperation {
    pub fn new(session: Arc<HiveSession>) -> Self {
        let mapping = session.table_type_mapping();
        Self {
            base: OperationBase::new(OperationType::GetTableTypes),
            session,
            mapping,
            row_set: RowSet::new(),
        }
    }

    pub fn result_schema() -> TableSchema {
        TableSchema::new().add_string_column("TABLE_TYPE", "Table type name.")
    }
}

impl Operation for GetTableTypesOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OperationBase {
        &mut self.base
    }

    fn run(&mut self) -> Result<()> {
        let mapping = &self.mapping;
        self.row_set = run_metadata(&mut self.base, &self.session, || {
            let schema = Self::result_schema();
            let mut rows = RowSet::new();
            // One row per metastore type; the classic mapping repeats TABLE.
            for table_type in TableType::ALL {
                let client_type = mapping.map_to_client_type(table_type.as_str());
                rows.add_row(&schema, vec![Value::String(client_type)])?;
            }
            Ok(rows)
        })?;
        Ok(())
    }

    fn result_set_schema(&self) -> Result<TableSchema> {
        self.base.assert_state(OperationState::Finished)?;
        Ok(Self::result_schema())
    }

    fn next_row_set(&mut self, orientation: FetchOrientation, max_rows: usize) -> Result<RowSet> {
        fetch(&self.base, &mut self.row_set, orientation, max_rows)
    }
}

/// Lists databases matching a schema pattern.
pub struct GetSchemasOperation {
    base: OperationBase,
    session: Arc<HiveSession>,
    catalog_name: Option<String>,
    schema_pattern: Option<String>,
    row_set: RowSet,
}

impl GetSchemasOperation {
    pub fn new(
        session: Arc<HiveSession>,
        catalog_name: Option<String>,
        schema_pattern: Option<String>,
    ) -> Self {
        Self {
            base: OperationBase::new(OperationType::GetSchemas),
            session,
            catalog_name,
            schema_pattern,
            row_set: RowSet::new(),
        }
    }

    pub fn result_schema() -> TableSchema {
        TableSchema::new()
            .add_string_column("TABLE_SCHEM", "Schema name.")
            .add_string_column("TABLE_CATALOG", "Catalog name.")
    }
}

impl Operation for GetSchemasOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OperationBase {
        &mut self.base
    }

    fn run(&mut self) -> Result<()> {
        let session = Arc::clone(&self.session);
        let pattern = self.schema_pattern.clone();
        let catalog = self.catalog_name.clone().unwrap_or_default();
        self.row_set = run_metadata(&mut self.base, &session, || {
            let schema = Self::result_schema();
            let matcher = jdbc_pattern(pattern.as_deref())?;
            let mut rows = RowSet::new();
            for db in session.metastore().get_databases()? {
                if matcher.is_match(&db) {
                    rows.add_row(&schema, vec![Value::String(db), Value::String(catalog.clone())])?;
                }
            }
            Ok(rows)
        })?;
        Ok(())
    }

    fn result_set_schema(&self) -> Result<TableSchema> {
        self.base.assert_state(OperationState::Finished)?;
        Ok(Self::result_schema())
    }

    fn next_row_set(&mut self, orientation: FetchOrientation, max_rows: usize) -> Result<RowSet> {
        fetch(&self.base, &mut self.row_set, orientation, max_rows)
    }
}

/// Lists tables matching schema and table patterns, optionally filtered by
/// client table type.
pub struct GetTablesOperation {
    base: OperationBase,
    session: Arc<HiveSession>,
    mapping: Box<dyn TableTypeMapping>,
    catalog_name: Option<String>,
    schema_pattern: Option<String>,
    table_pattern: Option<String>,
    table_types: Option<Vec<String>>,
    row_set: RowSet,
}

impl GetTablesOperation {
    pub fn new(
        session: Arc<HiveSession>,
        catalog_name: Option<String>,
        schema_pattern: Option<String>,
        table_pattern: Option<String>,
        table_types: Option<Vec<String>>,
    ) -> Self {
        let mapping = session.table_type_mapping();
        Self {
            base: OperationBase::new(OperationType::GetTables),
            session,
            mapping,
            catalog_name,
            schema_pattern,
            table_pattern,
            table_types,
            row_set: RowSet::new(),
        }
    }

    pub fn result_schema() -> TableSchema {
        TableSchema::new()
            .add_string_column("TABLE_CAT", "Catalog name. NULL if not applicable.")
            .add_string_column("TABLE_SCHEM", "Schema name.")
            .add_string_column("TABLE_NAME", "Table name.")
            .add_string_column("TABLE_TYPE", "The table type, e.g. \"TABLE\", \"VIEW\", etc.")
            .add_string_column("REMARKS", "Comments about the table.")
    }
}

impl Operation for GetTablesOperation {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OperationBase {
        &mut self.base
    }

    fn run(&mut self) -> Result<()> {
        let session = Arc::clone(&self.session);
        let mapping = &self.mapping;
        let catalog = self.catalog_name.clone().unwrap_or_default();
        let schema_pattern = self.schema_pattern.clone();
        let table_pattern = self.table_pattern.clone();
        let wanted_types = self.table_types.clone();
        self.row_set = run_metadata(&mut self.base, &session, || {
            let schema = Self::result_schema();
            let db_matcher = jdbc_pattern(schema_pattern.as_deref())?;
            let table_matcher = jdbc_pattern(table_pattern.as_deref())?;
            let metastore = session.metastore();
            let mut rows = RowSet::new();
            for db in metastore.get_databases()? {
                if !db_matcher.is_match(&db) {
                    continue;
                }
                for name in metastore.get_tables(&db, "*")? {
                    if !table_matcher.is_match(&name) {
                        continue;
                    }
                    let table = match metastore.get_table(&db, &name) {
                        Ok(table) => table,
                        // Dropped between listing and lookup.
                        Err(crate::Error::Metastore(MetastoreError::NoSuchObject(_))) => continue,
                        Err(e) => return Err(e),
                    };
                    let client_type = mapping.map_to_client_type(table.table_type.as_str());
                    if let Some(types) = &wanted_types {
                        if !types.iter().any(|t| t.eq_ignore_ascii_case(&client_type)) {
                            continue;
                        }
                    }
                    let remarks = table
                        .parameters
                        .get("comment")
                        .cloned()
                        .map(Value::String)
                        .unwrap_or(Value::Null);
                    rows.add_row(
                        &schema,
                        vec![
                            Value::String(catalog.clone()),
                            Value::String(db.clone()),
                            Value::String(table.table_name),
                            Value::String(client_type),
                            remarks,
                        ],
                    )?;
                }
            }
            Ok(rows)
        })?;
        Ok(())
    }

    fn result_set_schema(&self) -> Result<TableSchema> {
        self.base.assert_state(OperationState::Finished)?;
        Ok(Self::result_schema())
    }

    fn next_row_set(&mut self, orientation: FetchOrientation, max_rows: usize) -> Result<RowSet> {
        fetch(&self.base, &mut self.row_set, orientation, max_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TableTypeMappingKind};
    use crate::metastore::{FieldSchema, InMemoryMetastore, MetastoreHandler, Table};
    use crate::metrics::PlannerMetrics;

    fn session(kind: TableTypeMappingKind) -> Arc<HiveSession> {
        let mut config = Config::default();
        config.server.table_type_mapping = kind;
        let metastore = InMemoryMetastore::new("/warehouse");
        metastore.create_database("sales", "").unwrap();
        let mut src = Table::new("default", "src", vec![FieldSchema::new("key", "string")]);
        src.parameters.insert("comment".into(), "source rows".into());
        let view = Table::new("default", "src_view", vec![FieldSchema::new("key", "string")])
            .with_table_type(TableType::VirtualView);
        let ext = Table::new("sales", "orders", vec![FieldSchema::new("id", "int")])
            .with_table_type(TableType::ExternalTable);
        metastore.seed(&[src, view, ext]).unwrap();
        Arc::new(HiveSession::new(config, Arc::new(metastore)))
    }

    fn strings(rows: &RowSet, col: usize) -> Vec<String> {
        rows.rows().iter().map(|r| r[col].to_string()).collect()
    }

    #[test]
    fn test_jdbc_pattern() {
        let re = jdbc_pattern(Some("src%")).unwrap();
        assert!(re.is_match("src"));
        assert!(re.is_match("SRC_view"));
        assert!(!re.is_match("xsrc"));

        let re = jdbc_pattern(Some("s_c")).unwrap();
        assert!(re.is_match("src"));
        assert!(!re.is_match("srcc"));

        let re = jdbc_pattern(Some("a\\_b")).unwrap();
        assert!(re.is_match("a_b"));
        assert!(!re.is_match("axb"));

        assert!(jdbc_pattern(None).unwrap().is_match("anything"));
        assert!(jdbc_pattern(Some("")).unwrap().is_match(""));
        assert!(jdbc_pattern(Some("a.b")).unwrap().is_match("a.b"));
        assert!(!jdbc_pattern(Some("a.b")).unwrap().is_match("axb"));
    }

    #[test]
    fn test_get_table_types_classic() {
        let metrics = Arc::new(PlannerMetrics::new().unwrap());
        let session = session(TableTypeMappingKind::Classic);
        let session = Arc::new(
            HiveSession::new(session.config().clone(), Arc::clone(session.metastore()))
                .with_metrics(Arc::clone(&metrics)),
        );
        let mut op = GetTableTypesOperation::new(session);

        assert!(op.result_set_schema().is_err());
        assert!(op
            .next_row_set(FetchOrientation::FetchNext, 10)
            .is_err());

        op.run().unwrap();
        assert_eq!(op.state(), OperationState::Finished);
        assert_eq!(
            op.result_set_schema().unwrap().column_names(),
            vec!["TABLE_TYPE"]
        );

        let rows = op.next_row_set(FetchOrientation::FetchNext, 10).unwrap();
        // Managed and external tables both report as TABLE.
        assert_eq!(
            strings(&rows, 0),
            vec!["TABLE", "TABLE", "VIEW", "INDEX_TABLE"]
        );
        assert!(op
            .next_row_set(FetchOrientation::FetchNext, 10)
            .unwrap()
            .is_empty());

        let rows = op.next_row_set(FetchOrientation::FetchFirst, 1).unwrap();
        assert_eq!(strings(&rows, 0), vec!["TABLE"]);

        assert!(op.next_row_set(FetchOrientation::FetchLast, 1).is_err());
        assert_eq!(metrics.operations_total("GET_TABLE_TYPES"), 1);

        op.close().unwrap();
        assert_eq!(op.state(), OperationState::Closed);
        assert!(op.run().is_err());
    }

    #[test]
    fn test_get_table_types_hive() {
        let mut op = GetTableTypesOperation::new(session(TableTypeMappingKind::Hive));
        op.run().unwrap();
        let rows = op.next_row_set(FetchOrientation::FetchNext, 100).unwrap();
        assert_eq!(
            strings(&rows, 0),
            vec!["MANAGED_TABLE", "EXTERNAL_TABLE", "VIRTUAL_VIEW", "INDEX_TABLE"]
        );
    }

    #[test]
    fn test_cancel() {
        let mut op = GetTableTypesOperation::new(session(TableTypeMappingKind::Hive));
        op.cancel().unwrap();
        assert_eq!(op.state(), OperationState::Canceled);
        assert!(op.run().is_err());
    }

    #[test]
    fn test_get_schemas() {
        let mut op = GetSchemasOperation::new(
            session(TableTypeMappingKind::Classic),
            None,
            Some("SAL%".into()),
        );
        op.run().unwrap();
        let rows = op.next_row_set(FetchOrientation::FetchNext, 10).unwrap();
        assert_eq!(strings(&rows, 0), vec!["sales"]);

        let mut op = GetSchemasOperation::new(session(TableTypeMappingKind::Classic), None, None);
        op.run().unwrap();
        let rows = op.next_row_set(FetchOrientation::FetchNext, 10).unwrap();
        assert_eq!(strings(&rows, 0), vec!["default", "sales"]);
    }

    #[test]
    fn test_get_tables() {
        let mut op = GetTablesOperation::new(
            session(TableTypeMappingKind::Classic),
            None,
            None,
            Some("%".into()),
            None,
        );
        op.run().unwrap();
        let rows = op.next_row_set(FetchOrientation::FetchNext, 10).unwrap();
        assert_eq!(strings(&rows, 2), vec!["src", "src_view", "orders"]);
        assert_eq!(strings(&rows, 3), vec!["TABLE", "VIEW", "TABLE"]);
        assert_eq!(rows.rows()[0][4], Value::String("source rows".into()));
        assert_eq!(rows.rows()[1][4], Value::Null);

        let mut op = GetTablesOperation::new(
            session(TableTypeMappingKind::Classic),
            None,
            Some("default".into()),
            Some("src\\_%".into()),
            Some(vec!["view".into()]),
        );
        op.run().unwrap();
        let rows = op.next_row_set(FetchOrientation::FetchNext, 10).unwrap();
        assert_eq!(strings(&rows, 2), vec!["src_view"]);
    }

    #[test]
    fn test_get_tables_hive_type_filter() {
        let mut op = GetTablesOperation::new(
            session(TableTypeMappingKind::Hive),
            None,
            None,
            None,
            Some(vec!["EXTERNAL_TABLE".into()]),
        );
        op.run().unwrap();
        let rows = op.next_row_set(FetchOrientation::FetchNext, 10).unwrap();
        assert_eq!(strings(&rows, 1), vec!["sales"]);
        assert_eq!(strings(&rows, 3), vec!["EXTERNAL_TABLE"]);
    }
}
