//! In-memory metastore.

use super::model::{Database, FieldSchema, Partition, Table, TableType, Type};
use super::{
    make_partition_name, parse_partition_name, validate_name, MetastoreHandler,
    DEFAULT_DATABASE_NAME, HIDDEN_CONFIG_PREFIX,
};
use crate::config::MetastoreConfig;
use crate::{MetastoreError, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use regex::RegexBuilder;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

type TableKey = (String, String);

#[derive(Debug, Default)]
struct CatalogState {
    databases: BTreeMap<String, Database>,
    tables: BTreeMap<TableKey, Table>,
    /// Partitions per table, keyed by partition name in creation order.
    partitions: HashMap<TableKey, IndexMap<String, Partition>>,
    types: BTreeMap<String, Type>,
}

/// Metastore kept entirely in memory behind a `RwLock`.
pub struct InMemoryMetastore {
    warehouse_dir: String,
    config_values: HashMap<String, String>,
    state: RwLock<CatalogState>,
}

fn key(db_name: &str, table_name: &str) -> TableKey {
    (db_name.to_ascii_lowercase(), table_name.to_ascii_lowercase())
}

fn now_secs() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

fn unknown_table(db_name: &str, table_name: &str) -> MetastoreError {
    MetastoreError::UnknownTable(format!("Table {}.{} does not exist", db_name, table_name))
}

/// Compile a metastore pattern: `*` is a wildcard and `|` separates alternatives.
fn compile_pattern(pattern: &str) -> Result<regex::Regex> {
    let alternatives: Vec<String> = pattern
        .split('|')
        .map(|alt| regex::escape(alt.trim()).replace("\\*", ".*"))
        .collect();
    RegexBuilder::new(&format!("^(?:{})$", alternatives.join("|")))
        .case_insensitive(true)
        .build()
        .map_err(|e| MetastoreError::InvalidObject(format!("Invalid pattern {}: {}", pattern, e)).into())
}

impl InMemoryMetastore {
    /// Empty metastore holding only the `default` database.
    pub fn new(warehouse_dir: impl Into<String>) -> Self {
        let warehouse_dir = warehouse_dir.into().trim_end_matches('/').to_string();
        let mut state = CatalogState::default();
        state.databases.insert(
            DEFAULT_DATABASE_NAME.to_string(),
            Database {
                name: DEFAULT_DATABASE_NAME.to_string(),
                description: "Default Hive database".to_string(),
                location_uri: warehouse_dir.clone(),
                parameters: HashMap::new(),
            },
        );
        Self {
            warehouse_dir,
            config_values: HashMap::new(),
            state: RwLock::new(state),
        }
    }

    pub fn from_config(config: &MetastoreConfig) -> Self {
        let mut metastore = Self::new(config.warehouse_dir.clone());
        metastore.config_values = config
            .config_values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        metastore
    }

    /// Register every table, creating missing databases.
    pub fn seed(&self, tables: &[Table]) -> Result<()> {
        for table in tables {
            let db_name = table.db_name.to_ascii_lowercase();
            if !self.state.read().databases.contains_key(&db_name) {
                self.create_database(&db_name, "")?;
            }
            self.create_table(table)?;
        }
        Ok(())
    }

    pub fn warehouse_dir(&self) -> &str {
        &self.warehouse_dir
    }

    fn database_location(&self, db_name: &str) -> String {
        if db_name == DEFAULT_DATABASE_NAME {
            self.warehouse_dir.clone()
        } else {
            format!("{}/{}.db", self.warehouse_dir, db_name)
        }
    }

    fn default_table_location(&self, db_name: &str, table_name: &str) -> String {
        format!("{}/{}", self.database_location(db_name), table_name)
    }

    fn build_partition(table: &Table, values: Vec<String>) -> Result<(String, Partition)> {
        let name = make_partition_name(&table.partition_keys, &values)?;
        let mut sd = table.sd.clone();
        sd.location = format!("{}/{}", table.sd.location, name);
        let partition = Partition {
            values,
            db_name: table.db_name.clone(),
            table_name: table.table_name.clone(),
            create_time: now_secs(),
            last_access_time: 0,
            sd,
            parameters: HashMap::new(),
        };
        Ok((name, partition))
    }

    fn insert_partition(&self, partition: Partition) -> Result<Partition> {
        let table_key = key(&partition.db_name, &partition.table_name);
        let mut state = self.state.write();
        let table = state.tables.get(&table_key).ok_or_else(|| {
            MetastoreError::InvalidObject(
                "Unable to add partition because table or database do not exist".into(),
            )
        })?;
        let name = make_partition_name(&table.partition_keys, &partition.values)?;

        let mut partition = partition;
        partition.db_name = table.db_name.clone();
        partition.table_name = table.table_name.clone();
        if partition.sd.location.is_empty() {
            partition.sd.location = format!("{}/{}", table.sd.location, name);
        }
        if partition.sd.cols.is_empty() {
            partition.sd.cols = table.sd.cols.clone();
        }
        if partition.create_time == 0 {
            partition.create_time = now_secs();
        }

        let parts = state.partitions.entry(table_key).or_default();
        if parts.contains_key(&name) {
            return Err(MetastoreError::AlreadyExists(format!(
                "Partition already exists: {}",
                name
            ))
            .into());
        }
        parts.insert(name.clone(), partition.clone());
        info!(
            db = %partition.db_name,
            table = %partition.table_name,
            partition = %name,
            "Added partition"
        );
        Ok(partition)
    }

    fn values_from_name(table: &Table, part_name: &str) -> Result<Vec<String>> {
        let pairs = parse_partition_name(part_name)?;
        if pairs.len() != table.partition_keys.len() {
            return Err(MetastoreError::InvalidObject(format!(
                "Invalid partition name {} for table {}",
                part_name,
                table.qualified_name()
            ))
            .into());
        }
        let mut values = Vec::with_capacity(pairs.len());
        for (key, (name, value)) in table.partition_keys.iter().zip(pairs) {
            if !key.name.eq_ignore_ascii_case(&name) {
                return Err(MetastoreError::InvalidObject(format!(
                    "Invalid partition key {} in {}",
                    name, part_name
                ))
                .into());
            }
            values.push(value);
        }
        Ok(values)
    }

    fn with_table<T>(
        &self,
        db_name: &str,
        table_name: &str,
        f: impl FnOnce(&Table, Option<&IndexMap<String, Partition>>) -> Result<T>,
    ) -> Result<T> {
        let table_key = key(db_name, table_name);
        let state = self.state.read();
        let table = state
            .tables
            .get(&table_key)
            .ok_or_else(|| MetastoreError::NoSuchObject(format!("{}.{} table not found", db_name, table_name)))?;
        f(table, state.partitions.get(&table_key))
    }

    fn filter_partitions(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
        max_parts: i16,
    ) -> Result<Vec<(String, Partition)>> {
        self.with_table(db_name, table_name, |table, parts| {
            if part_vals.len() > table.partition_keys.len() {
                return Err(MetastoreError::InvalidObject(format!(
                    "Incorrect number of partition values: {:?}",
                    part_vals
                ))
                .into());
            }
            let limit = if max_parts < 0 {
                usize::MAX
            } else {
                max_parts as usize
            };
            let matches = parts
                .into_iter()
                .flat_map(|p| p.iter())
                .filter(|(_, partition)| {
                    part_vals
                        .iter()
                        .zip(&partition.values)
                        .all(|(want, have)| want.is_empty() || want == have)
                })
                .take(limit)
                .map(|(name, partition)| (name.clone(), partition.clone()))
                .collect();
            Ok(matches)
        })
    }
}

impl Default for InMemoryMetastore {
    fn default() -> Self {
        Self::from_config(&MetastoreConfig::default())
    }
}

impl MetastoreHandler for InMemoryMetastore {
    fn create_database(&self, name: &str, description: &str) -> Result<bool> {
        if !validate_name(name) {
            return Err(
                MetastoreError::InvalidObject(format!("{} is not a valid database name", name))
                    .into(),
            );
        }
        let name = name.to_ascii_lowercase();
        let location = self.database_location(&name);
        let mut state = self.state.write();
        if state.databases.contains_key(&name) {
            return Err(
                MetastoreError::AlreadyExists(format!("Database {} already exists", name)).into(),
            );
        }
        info!(database = %name, location = %location, "Created database");
        state.databases.insert(
            name.clone(),
            Database {
                name,
                description: description.to_string(),
                location_uri: location,
                parameters: HashMap::new(),
            },
        );
        Ok(true)
    }

    fn get_database(&self, name: &str) -> Result<Database> {
        self.state
            .read()
            .databases
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                MetastoreError::NoSuchObject(format!("There is no database named {}", name)).into()
            })
    }

    fn drop_database(&self, name: &str) -> Result<bool> {
        let name = name.to_ascii_lowercase();
        if name == DEFAULT_DATABASE_NAME {
            return Err(
                MetastoreError::InvalidOperation("Can not drop default database".into()).into(),
            );
        }
        let mut state = self.state.write();
        if !state.databases.contains_key(&name) {
            return Err(
                MetastoreError::NoSuchObject(format!("There is no database named {}", name))
                    .into(),
            );
        }
        if state.tables.keys().any(|(db, _)| *db == name) {
            return Err(MetastoreError::InvalidOperation(format!(
                "Database {} is not empty",
                name
            ))
            .into());
        }
        state.databases.remove(&name);
        info!(database = %name, "Dropped database");
        Ok(true)
    }

    fn get_databases(&self) -> Result<Vec<String>> {
        Ok(self.state.read().databases.keys().cloned().collect())
    }

    fn get_type(&self, name: &str) -> Result<Type> {
        self.state
            .read()
            .types
            .get(name)
            .cloned()
            .ok_or_else(|| MetastoreError::NoSuchObject(format!("Type {} not found", name)).into())
    }

    fn create_type(&self, type_: &Type) -> Result<bool> {
        if !validate_name(&type_.name) {
            return Err(MetastoreError::InvalidObject(format!(
                "{} is not a valid type name",
                type_.name
            ))
            .into());
        }
        let mut state = self.state.write();
        if state.types.contains_key(&type_.name) {
            return Err(
                MetastoreError::AlreadyExists(format!("Type {} already exists", type_.name))
                    .into(),
            );
        }
        state.types.insert(type_.name.clone(), type_.clone());
        debug!(type_name = %type_.name, "Created type");
        Ok(true)
    }

    fn drop_type(&self, name: &str) -> Result<bool> {
        match self.state.write().types.remove(name) {
            Some(_) => Ok(true),
            None => Err(MetastoreError::NoSuchObject(format!("Type {} not found", name)).into()),
        }
    }

    fn get_type_all(&self, name: &str) -> Result<HashMap<String, Type>> {
        let state = self.state.read();
        Ok(state
            .types
            .iter()
            .filter(|(type_name, _)| name.is_empty() || type_name.as_str() == name)
            .map(|(type_name, t)| (type_name.clone(), t.clone()))
            .collect())
    }

    fn get_fields(&self, db_name: &str, table_name: &str) -> Result<Vec<FieldSchema>> {
        let state = self.state.read();
        if !state.databases.contains_key(&db_name.to_ascii_lowercase()) {
            return Err(MetastoreError::UnknownDb(format!("Database {} does not exist", db_name)).into());
        }
        state
            .tables
            .get(&key(db_name, table_name))
            .map(|t| t.sd.cols.clone())
            .ok_or_else(|| unknown_table(db_name, table_name).into())
    }

    fn get_schema(&self, db_name: &str, table_name: &str) -> Result<Vec<FieldSchema>> {
        let mut fields = self.get_fields(db_name, table_name)?;
        let table = self.get_table(db_name, table_name)?;
        fields.extend(table.partition_keys);
        Ok(fields)
    }

    fn create_table(&self, table: &Table) -> Result<()> {
        if !validate_name(&table.table_name) {
            return Err(MetastoreError::InvalidObject(format!(
                "{} is not a valid object name",
                table.table_name
            ))
            .into());
        }
        let mut seen = std::collections::HashSet::new();
        for col in table.sd.cols.iter().chain(&table.partition_keys) {
            if !validate_name(&col.name) {
                return Err(MetastoreError::InvalidObject(format!(
                    "{} is not a valid column name",
                    col.name
                ))
                .into());
            }
            if !seen.insert(col.name.to_ascii_lowercase()) {
                return Err(MetastoreError::InvalidObject(format!(
                    "Duplicate column name {} in table {}",
                    col.name, table.table_name
                ))
                .into());
            }
        }

        let mut table = table.clone();
        table.db_name = table.db_name.to_ascii_lowercase();
        table.table_name = table.table_name.to_ascii_lowercase();
        if table.sd.location.is_empty() && table.table_type != TableType::VirtualView {
            table.sd.location = self.default_table_location(&table.db_name, &table.table_name);
        }
        if table.create_time == 0 {
            table.create_time = now_secs();
        }

        let mut state = self.state.write();
        if !state.databases.contains_key(&table.db_name) {
            return Err(MetastoreError::NoSuchObject(format!(
                "There is no database named {}",
                table.db_name
            ))
            .into());
        }
        let table_key = (table.db_name.clone(), table.table_name.clone());
        if state.tables.contains_key(&table_key) {
            return Err(MetastoreError::AlreadyExists(format!(
                "Table {} already exists",
                table.table_name
            ))
            .into());
        }
        info!(
            table = %table.qualified_name(),
            table_type = %table.table_type,
            location = %table.sd.location,
            "Created table"
        );
        state.tables.insert(table_key, table);
        Ok(())
    }

    fn drop_table(&self, db_name: &str, name: &str, delete_data: bool) -> Result<()> {
        let table_key = key(db_name, name);
        let mut state = self.state.write();
        if state.tables.remove(&table_key).is_none() {
            return Err(MetastoreError::NoSuchObject(format!("{}.{} table not found", db_name, name)).into());
        }
        let dropped = state
            .partitions
            .remove(&table_key)
            .map(|p| p.len())
            .unwrap_or(0);
        info!(
            db = %table_key.0,
            table = %table_key.1,
            partitions = dropped,
            delete_data,
            "Dropped table"
        );
        Ok(())
    }

    fn get_tables(&self, db_name: &str, pattern: &str) -> Result<Vec<String>> {
        let db_name = db_name.to_ascii_lowercase();
        let regex = compile_pattern(if pattern.is_empty() { "*" } else { pattern })?;
        let state = self.state.read();
        Ok(state
            .tables
            .keys()
            .filter(|(db, name)| *db == db_name && regex.is_match(name))
            .map(|(_, name)| name.clone())
            .collect())
    }

    fn get_table(&self, db_name: &str, table_name: &str) -> Result<Table> {
        self.state
            .read()
            .tables
            .get(&key(db_name, table_name))
            .cloned()
            .ok_or_else(|| {
                MetastoreError::NoSuchObject(format!("{}.{} table not found", db_name, table_name))
                    .into()
            })
    }

    fn alter_table(&self, db_name: &str, table_name: &str, new_table: &Table) -> Result<()> {
        if !validate_name(&new_table.table_name) {
            return Err(MetastoreError::InvalidOperation(format!(
                "{} is not a valid object name",
                new_table.table_name
            ))
            .into());
        }
        let old_key = key(db_name, table_name);
        let mut state = self.state.write();
        let old = state.tables.get(&old_key).cloned().ok_or_else(|| {
            MetastoreError::InvalidOperation(format!(
                "table {}.{} doesn't exist",
                db_name, table_name
            ))
        })?;

        let mut altered = new_table.clone();
        altered.db_name = old.db_name.clone();
        altered.table_name = new_table.table_name.to_ascii_lowercase();
        let new_key = (altered.db_name.clone(), altered.table_name.clone());
        let renamed = new_key != old_key;

        if renamed {
            if state.tables.contains_key(&new_key) {
                return Err(MetastoreError::InvalidOperation(format!(
                    "new table {}.{} already exists",
                    new_key.0, new_key.1
                ))
                .into());
            }
            let default_location = self.default_table_location(&old.db_name, &old.table_name);
            if old.sd.location == default_location && altered.sd.location == old.sd.location {
                altered.sd.location = self.default_table_location(&new_key.0, &new_key.1);
            }
            if let Some(mut parts) = state.partitions.remove(&old_key) {
                for partition in parts.values_mut() {
                    partition.table_name = altered.table_name.clone();
                    if let Some(suffix) = partition.sd.location.strip_prefix(&old.sd.location) {
                        partition.sd.location = format!("{}{}", altered.sd.location, suffix);
                    }
                }
                state.partitions.insert(new_key.clone(), parts);
            }
        }

        state.tables.remove(&old_key);
        info!(
            from = %format!("{}.{}", old_key.0, old_key.1),
            to = %altered.qualified_name(),
            "Altered table"
        );
        state.tables.insert(new_key, altered);
        Ok(())
    }

    fn add_partition(&self, partition: &Partition) -> Result<Partition> {
        self.insert_partition(partition.clone())
    }

    fn append_partition(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
    ) -> Result<Partition> {
        let table = self.get_table(db_name, table_name).map_err(|_| {
            MetastoreError::InvalidObject(
                "Unable to add partition because table or database do not exist".into(),
            )
        })?;
        let (_, partition) = Self::build_partition(&table, part_vals.to_vec())?;
        self.insert_partition(partition)
    }

    fn append_partition_by_name(
        &self,
        db_name: &str,
        table_name: &str,
        part_name: &str,
    ) -> Result<Partition> {
        let table = self.get_table(db_name, table_name)?;
        let values = Self::values_from_name(&table, part_name)?;
        self.append_partition(db_name, table_name, &values)
    }

    fn drop_partition(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
        delete_data: bool,
    ) -> Result<bool> {
        let table = self.get_table(db_name, table_name)?;
        let name = make_partition_name(&table.partition_keys, part_vals)?;
        let mut state = self.state.write();
        let removed = state
            .partitions
            .get_mut(&key(db_name, table_name))
            .and_then(|parts| parts.shift_remove(&name));
        match removed {
            Some(_) => {
                info!(table = %table.qualified_name(), partition = %name, delete_data, "Dropped partition");
                Ok(true)
            }
            None => Err(MetastoreError::NoSuchObject(format!(
                "Partition doesn't exist. {}",
                name
            ))
            .into()),
        }
    }

    fn drop_partition_by_name(
        &self,
        db_name: &str,
        table_name: &str,
        part_name: &str,
        delete_data: bool,
    ) -> Result<bool> {
        let table = self.get_table(db_name, table_name)?;
        let values = Self::values_from_name(&table, part_name)?;
        self.drop_partition(db_name, table_name, &values, delete_data)
    }

    fn get_partition(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
    ) -> Result<Partition> {
        self.with_table(db_name, table_name, |table, parts| {
            let name = make_partition_name(&table.partition_keys, part_vals)?;
            parts
                .and_then(|p| p.get(&name))
                .cloned()
                .ok_or_else(|| {
                    MetastoreError::NoSuchObject(format!("partition values={:?}", part_vals)).into()
                })
        })
    }

    fn get_partition_by_name(
        &self,
        db_name: &str,
        table_name: &str,
        part_name: &str,
    ) -> Result<Partition> {
        let table = self.get_table(db_name, table_name)?;
        let values = Self::values_from_name(&table, part_name)?;
        self.get_partition(db_name, table_name, &values)
    }

    fn get_partitions(
        &self,
        db_name: &str,
        table_name: &str,
        max_parts: i16,
    ) -> Result<Vec<Partition>> {
        Ok(self
            .filter_partitions(db_name, table_name, &[], max_parts)?
            .into_iter()
            .map(|(_, p)| p)
            .collect())
    }

    fn get_partition_names(
        &self,
        db_name: &str,
        table_name: &str,
        max_parts: i16,
    ) -> Result<Vec<String>> {
        Ok(self
            .filter_partitions(db_name, table_name, &[], max_parts)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn get_partitions_ps(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
        max_parts: i16,
    ) -> Result<Vec<Partition>> {
        Ok(self
            .filter_partitions(db_name, table_name, part_vals, max_parts)?
            .into_iter()
            .map(|(_, p)| p)
            .collect())
    }

    fn get_partition_names_ps(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
        max_parts: i16,
    ) -> Result<Vec<String>> {
        Ok(self
            .filter_partitions(db_name, table_name, part_vals, max_parts)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn alter_partition(
        &self,
        db_name: &str,
        table_name: &str,
        partition: &Partition,
    ) -> Result<()> {
        let table_key = key(db_name, table_name);
        let mut state = self.state.write();
        let table = state.tables.get(&table_key).ok_or_else(|| {
            MetastoreError::InvalidOperation(format!(
                "alter is not possible: table {}.{} doesn't exist",
                db_name, table_name
            ))
        })?;
        let name = make_partition_name(&table.partition_keys, &partition.values)?;
        let existing = state
            .partitions
            .get_mut(&table_key)
            .and_then(|parts| parts.get_mut(&name))
            .ok_or_else(|| {
                MetastoreError::InvalidOperation(format!(
                    "alter is not possible: partition {} doesn't exist",
                    name
                ))
            })?;
        let mut altered = partition.clone();
        altered.db_name = existing.db_name.clone();
        altered.table_name = existing.table_name.clone();
        *existing = altered;
        debug!(db = %db_name, table = %table_name, partition = %name, "Altered partition");
        Ok(())
    }

    fn get_config_value(&self, name: &str, default_value: &str) -> Result<String> {
        if name.starts_with(HIDDEN_CONFIG_PREFIX) {
            return Err(MetastoreError::ConfigValSecurity(format!(
                "For security reasons, the config key {} cannot be accessed",
                name
            ))
            .into());
        }
        Ok(self
            .config_values
            .get(name)
            .cloned()
            .unwrap_or_else(|| default_value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metastore::Catalog;
    use crate::types::TypeInfo;
    use crate::Error;

    fn metastore() -> InMemoryMetastore {
        InMemoryMetastore::new("/warehouse/")
    }

    fn sales_table() -> Table {
        Table::new(
            "default",
            "Sales",
            vec![
                FieldSchema::new("key", "string"),
                FieldSchema::new("amount", "decimal(10,2)"),
            ],
        )
        .with_partition_keys(vec![
            FieldSchema::new("ds", "string"),
            FieldSchema::new("hr", "string"),
        ])
    }

    fn vals(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn is_metastore_err(err: &Error, pred: impl Fn(&MetastoreError) -> bool) -> bool {
        matches!(err, Error::Metastore(e) if pred(e))
    }

    #[test]
    fn test_default_database() {
        let ms = metastore();
        assert_eq!(ms.get_databases().unwrap(), vec!["default"]);
        assert_eq!(ms.get_database("DEFAULT").unwrap().location_uri, "/warehouse");

        let err = ms.drop_database("default").unwrap_err();
        assert!(is_metastore_err(&err, |e| matches!(
            e,
            MetastoreError::InvalidOperation(_)
        )));
    }

    #[test]
    fn test_database_lifecycle() {
        let ms = metastore();
        assert!(ms.create_database("Sales_DB", "sales").unwrap());
        assert_eq!(
            ms.get_database("sales_db").unwrap().location_uri,
            "/warehouse/sales_db.db"
        );
        let err = ms.create_database("sales_db", "").unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(ms.create_database("bad-name", "").is_err());

        ms.create_table(&Table::new("sales_db", "t", vec![FieldSchema::new("a", "int")]))
            .unwrap();
        let err = ms.drop_database("sales_db").unwrap_err();
        assert!(err.to_string().contains("is not empty"));

        ms.drop_table("sales_db", "t", true).unwrap();
        assert!(ms.drop_database("sales_db").unwrap());
        assert!(ms.get_database("sales_db").is_err());
        assert!(ms.drop_database("sales_db").is_err());
    }

    #[test]
    fn test_create_table_defaults() {
        let ms = metastore();
        ms.create_table(&sales_table()).unwrap();

        let table = ms.get_table("default", "SALES").unwrap();
        assert_eq!(table.table_name, "sales");
        assert_eq!(table.sd.location, "/warehouse/sales");
        assert!(table.create_time > 0);

        let err = ms.create_table(&sales_table()).unwrap_err();
        assert!(is_metastore_err(&err, |e| matches!(e, MetastoreError::AlreadyExists(_))));

        let err = ms
            .create_table(&Table::new("nodb", "t", vec![]))
            .unwrap_err();
        assert!(err.to_string().contains("There is no database named nodb"));

        let dup = Table::new(
            "default",
            "dup",
            vec![FieldSchema::new("a", "int"), FieldSchema::new("A", "int")],
        );
        assert!(ms.create_table(&dup).is_err());
    }

    #[test]
    fn test_fields_and_schema() {
        let ms = metastore();
        ms.create_table(&sales_table()).unwrap();
        assert_eq!(ms.get_fields("default", "sales").unwrap().len(), 2);

        let schema = ms.get_schema("default", "sales").unwrap();
        let names: Vec<_> = schema.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["key", "amount", "ds", "hr"]);

        let err = ms.get_fields("default", "missing").unwrap_err();
        assert!(is_metastore_err(&err, |e| matches!(e, MetastoreError::UnknownTable(_))));
        let err = ms.get_fields("nodb", "sales").unwrap_err();
        assert!(is_metastore_err(&err, |e| matches!(e, MetastoreError::UnknownDb(_))));
    }

    #[test]
    fn test_get_tables_pattern() {
        let ms = metastore();
        for name in ["src", "src1", "srcpart", "dest_j1", "T1"] {
            ms.create_table(&Table::new("default", name, vec![FieldSchema::new("key", "string")]))
                .unwrap();
        }
        assert_eq!(
            ms.get_tables("default", "src*").unwrap(),
            vec!["src", "src1", "srcpart"]
        );
        assert_eq!(
            ms.get_tables("default", "SRC|t1").unwrap(),
            vec!["src", "t1"]
        );
        assert_eq!(ms.get_tables("default", "").unwrap().len(), 5);
        assert!(ms.get_tables("other", "*").unwrap().is_empty());
    }

    #[test]
    fn test_alter_table_rename() {
        let ms = metastore();
        ms.create_table(&sales_table()).unwrap();
        ms.append_partition("default", "sales", &vals(&["2008-04-08", "11"]))
            .unwrap();
        ms.create_table(&Table::new("default", "other", vec![FieldSchema::new("a", "int")]))
            .unwrap();

        let mut renamed = ms.get_table("default", "sales").unwrap();
        renamed.table_name = "other".into();
        let err = ms.alter_table("default", "sales", &renamed).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        renamed.table_name = "sales2".into();
        ms.alter_table("default", "sales", &renamed).unwrap();
        assert!(ms.get_table("default", "sales").is_err());

        let table = ms.get_table("default", "sales2").unwrap();
        assert_eq!(table.sd.location, "/warehouse/sales2");
        let parts = ms.get_partitions("default", "sales2", -1).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].table_name, "sales2");
        assert_eq!(parts[0].sd.location, "/warehouse/sales2/ds=2008-04-08/hr=11");

        let missing = Table::new("default", "x", vec![]);
        assert!(ms.alter_table("default", "missing", &missing).is_err());
    }

    #[test]
    fn test_partitions() {
        let ms = metastore();
        ms.create_table(&sales_table()).unwrap();

        let p = ms
            .append_partition("default", "sales", &vals(&["2008-04-08", "11"]))
            .unwrap();
        assert_eq!(p.sd.location, "/warehouse/sales/ds=2008-04-08/hr=11");
        ms.append_partition_by_name("default", "sales", "ds=2008-04-08/hr=12")
            .unwrap();
        ms.append_partition("default", "sales", &vals(&["2008-04-09", "11"]))
            .unwrap();

        let err = ms
            .append_partition("default", "sales", &vals(&["2008-04-08", "11"]))
            .unwrap_err();
        assert!(err.to_string().contains("Partition already exists"));
        assert!(ms
            .append_partition("default", "sales", &vals(&["2008-04-08"]))
            .is_err());

        assert_eq!(
            ms.get_partition_names("default", "sales", -1).unwrap(),
            vec![
                "ds=2008-04-08/hr=11",
                "ds=2008-04-08/hr=12",
                "ds=2008-04-09/hr=11"
            ]
        );
        assert_eq!(ms.get_partitions("default", "sales", 2).unwrap().len(), 2);
        assert_eq!(
            ms.get_partition_names_ps("default", "sales", &vals(&["", "11"]), -1)
                .unwrap(),
            vec!["ds=2008-04-08/hr=11", "ds=2008-04-09/hr=11"]
        );
        assert_eq!(
            ms.get_partitions_ps("default", "sales", &vals(&["2008-04-08"]), -1)
                .unwrap()
                .len(),
            2
        );

        let p = ms
            .get_partition_by_name("default", "sales", "ds=2008-04-09/hr=11")
            .unwrap();
        assert_eq!(p.values, vals(&["2008-04-09", "11"]));

        assert!(ms
            .drop_partition_by_name("default", "sales", "ds=2008-04-09/hr=11", true)
            .unwrap());
        assert!(ms
            .get_partition("default", "sales", &vals(&["2008-04-09", "11"]))
            .is_err());
        assert!(ms
            .drop_partition("default", "sales", &vals(&["2008-04-09", "11"]), true)
            .is_err());

        ms.drop_table("default", "sales", true).unwrap();
        ms.create_table(&sales_table()).unwrap();
        assert!(ms.get_partitions("default", "sales", -1).unwrap().is_empty());
    }

    #[test]
    fn test_alter_partition() {
        let ms = metastore();
        ms.create_table(&sales_table()).unwrap();
        let mut p = ms
            .append_partition("default", "sales", &vals(&["2008-04-08", "11"]))
            .unwrap();
        p.parameters.insert("numRows".into(), "500".into());
        ms.alter_partition("default", "sales", &p).unwrap();
        let stored = ms
            .get_partition("default", "sales", &vals(&["2008-04-08", "11"]))
            .unwrap();
        assert_eq!(stored.parameters["numRows"], "500");

        p.values = vals(&["2009-01-01", "00"]);
        assert!(ms.alter_partition("default", "sales", &p).is_err());
    }

    #[test]
    fn test_types() {
        let ms = metastore();
        let t = Type {
            name: "point".into(),
            fields: Some(vec![FieldSchema::new("x", "int"), FieldSchema::new("y", "int")]),
            ..Default::default()
        };
        assert!(ms.create_type(&t).unwrap());
        assert!(ms.create_type(&t).is_err());
        assert_eq!(ms.get_type("point").unwrap(), t);
        assert_eq!(ms.get_type_all("").unwrap().len(), 1);
        assert!(ms.get_type_all("other").unwrap().is_empty());
        assert!(ms.drop_type("point").unwrap());
        assert!(ms.get_type("point").is_err());
        assert!(ms.drop_type("point").is_err());
    }

    #[test]
    fn test_config_values() {
        let mut config = MetastoreConfig::default();
        config
            .config_values
            .insert("hive.exec.scratchdir".into(), "/tmp/hive".into());
        let ms = InMemoryMetastore::from_config(&config);

        assert_eq!(
            ms.get_config_value("hive.exec.scratchdir", "x").unwrap(),
            "/tmp/hive"
        );
        assert_eq!(ms.get_config_value("unset.key", "fallback").unwrap(), "fallback");
        let err = ms
            .get_config_value("javax.jdo.option.ConnectionPassword", "")
            .unwrap_err();
        assert!(is_metastore_err(&err, |e| matches!(
            e,
            MetastoreError::ConfigValSecurity(_)
        )));
    }

    #[test]
    fn test_catalog_lookup() {
        let ms = metastore();
        ms.seed(&[sales_table(), Table::new("db2", "t", vec![FieldSchema::new("C", "bigint")])])
            .unwrap();

        let cols = ms.table_columns("default", "sales").unwrap();
        assert_eq!(cols[1], ("amount".to_string(), TypeInfo::decimal(10, 2)));
        assert_eq!(cols[3], ("hr".to_string(), TypeInfo::String));
        assert_eq!(
            ms.table_columns("db2", "t").unwrap(),
            vec![("c".to_string(), TypeInfo::Long)]
        );

        let err = ms.table_columns("default", "missing").unwrap_err();
        assert_eq!(err.to_string(), "Plan error: Table not found: default.missing");
    }
}
