//! Metastore catalog service.
//!
//! [`MetastoreHandler`] carries every call of the metastore Thrift service.
//! [`InMemoryMetastore`] implements it; the CLI serves it as JSON over HTTP.
//! Any handler also acts as the planner's [`Catalog`].

pub mod memory;
pub mod model;

pub use memory::InMemoryMetastore;
pub use model::{
    Database, FieldSchema, Order, Partition, SerDeInfo, StorageDescriptor, Table, TableType, Type,
};

use crate::types::TypeInfo;
use crate::{Error, MetastoreError, PlanError, Result};
use std::collections::HashMap;

/// Name of the database that always exists.
pub const DEFAULT_DATABASE_NAME: &str = "default";

/// Partition value used for NULL or empty partition column values.
pub const DEFAULT_PARTITION_NAME: &str = "__HIVE_DEFAULT_PARTITION__";

/// Prefix of configuration names that are never served to clients.
pub const HIDDEN_CONFIG_PREFIX: &str = "javax.jdo.option";

/// The metastore service calls.
pub trait MetastoreHandler: Send + Sync {
    fn create_database(&self, name: &str, description: &str) -> Result<bool>;
    fn get_database(&self, name: &str) -> Result<Database>;
    fn drop_database(&self, name: &str) -> Result<bool>;
    fn get_databases(&self) -> Result<Vec<String>>;

    fn get_type(&self, name: &str) -> Result<Type>;
    fn create_type(&self, type_: &Type) -> Result<bool>;
    fn drop_type(&self, name: &str) -> Result<bool>;
    fn get_type_all(&self, name: &str) -> Result<HashMap<String, Type>>;

    /// Table columns without partition keys.
    fn get_fields(&self, db_name: &str, table_name: &str) -> Result<Vec<FieldSchema>>;
    /// Table columns followed by partition keys.
    fn get_schema(&self, db_name: &str, table_name: &str) -> Result<Vec<FieldSchema>>;

    fn create_table(&self, table: &Table) -> Result<()>;
    fn drop_table(&self, db_name: &str, name: &str, delete_data: bool) -> Result<()>;
    fn get_tables(&self, db_name: &str, pattern: &str) -> Result<Vec<String>>;
    fn get_table(&self, db_name: &str, table_name: &str) -> Result<Table>;
    fn alter_table(&self, db_name: &str, table_name: &str, new_table: &Table) -> Result<()>;

    fn add_partition(&self, partition: &Partition) -> Result<Partition>;
    fn append_partition(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
    ) -> Result<Partition>;
    fn append_partition_by_name(
        &self,
        db_name: &str,
        table_name: &str,
        part_name: &str,
    ) -> Result<Partition>;
    fn drop_partition(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
        delete_data: bool,
    ) -> Result<bool>;
    fn drop_partition_by_name(
        &self,
        db_name: &str,
        table_name: &str,
        part_name: &str,
        delete_data: bool,
    ) -> Result<bool>;
    fn get_partition(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
    ) -> Result<Partition>;
    fn get_partition_by_name(
        &self,
        db_name: &str,
        table_name: &str,
        part_name: &str,
    ) -> Result<Partition>;
    /// A negative `max_parts` returns every partition.
    fn get_partitions(&self, db_name: &str, table_name: &str, max_parts: i16)
        -> Result<Vec<Partition>>;
    fn get_partition_names(
        &self,
        db_name: &str,
        table_name: &str,
        max_parts: i16,
    ) -> Result<Vec<String>>;
    /// Partitions matching a leading partial spec; empty values match anything.
    fn get_partitions_ps(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
        max_parts: i16,
    ) -> Result<Vec<Partition>>;
    fn get_partition_names_ps(
        &self,
        db_name: &str,
        table_name: &str,
        part_vals: &[String],
        max_parts: i16,
    ) -> Result<Vec<String>>;
    fn alter_partition(&self, db_name: &str, table_name: &str, partition: &Partition)
        -> Result<()>;

    fn get_config_value(&self, name: &str, default_value: &str) -> Result<String>;
}

/// Table lookup used by the planner.
pub trait Catalog {
    /// Lower-cased column names and types of `db.table`, partition keys last.
    fn table_columns(&self, db_name: &str, table_name: &str) -> Result<Vec<(String, TypeInfo)>>;
}

impl<T: MetastoreHandler + ?Sized> Catalog for T {
    fn table_columns(&self, db_name: &str, table_name: &str) -> Result<Vec<(String, TypeInfo)>> {
        let fields = self.get_schema(db_name, table_name).map_err(|e| match e {
            Error::Metastore(
                MetastoreError::UnknownTable(_)
                | MetastoreError::UnknownDb(_)
                | MetastoreError::NoSuchObject(_),
            ) => PlanError::TableNotFound(format!("{}.{}", db_name, table_name)).into(),
            other => other,
        })?;
        fields
            .iter()
            .map(|f| Ok((f.name.to_ascii_lowercase(), f.type_name.parse::<TypeInfo>()?)))
            .collect()
    }
}

/// Whether a database, table or column name is acceptable.
pub fn validate_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn needs_escaping(c: char) -> bool {
    matches!(
        c,
        '\u{01}'..='\u{1F}'
            | '"'
            | '#'
            | '%'
            | '\''
            | '*'
            | '/'
            | ':'
            | '='
            | '?'
            | '\\'
            | '\u{7F}'
            | '{'
            | '['
            | ']'
            | '^'
    )
}

/// Escape a partition path component (`a/b` becomes `a%2Fb`).
pub fn escape_path_name(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if needs_escaping(c) {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Undo [`escape_path_name`]. Malformed escapes are kept verbatim.
pub fn unescape_path_name(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            if let Ok(code) = u8::from_str_radix(&path[i + 1..i + 3], 16) {
                out.push(code as char);
                i += 3;
                continue;
            }
        }
        let c = path[i..].chars().next().unwrap_or('%');
        out.push(c);
        i += c.len_utf8();
    }
    out
}

/// `k1=v1/k2=v2`, escaping keys and values.
pub fn make_partition_name(keys: &[FieldSchema], values: &[String]) -> Result<String> {
    if keys.len() != values.len() {
        return Err(MetastoreError::InvalidObject(format!(
            "Invalid partition key & values; keys {:?}, values {:?}",
            keys.iter().map(|k| k.name.as_str()).collect::<Vec<_>>(),
            values
        ))
        .into());
    }
    let parts: Vec<String> = keys
        .iter()
        .zip(values)
        .map(|(key, value)| {
            let value = if value.is_empty() {
                DEFAULT_PARTITION_NAME.to_string()
            } else {
                escape_path_name(value)
            };
            format!("{}={}", escape_path_name(&key.name.to_ascii_lowercase()), value)
        })
        .collect();
    Ok(parts.join("/"))
}

/// Parse `k1=v1/k2=v2` into (key, value) pairs, unescaping both.
pub fn parse_partition_name(name: &str) -> Result<Vec<(String, String)>> {
    name.split('/')
        .filter(|component| !component.is_empty())
        .map(|component| {
            let (key, value) = component.split_once('=').ok_or_else(|| {
                Error::from(MetastoreError::InvalidObject(format!(
                    "Invalid partition name: {}",
                    name
                )))
            })?;
            Ok((unescape_path_name(key), unescape_path_name(value)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("src_table1"));
        assert!(!validate_name("bad-name"));
        assert!(!validate_name(""));
    }

    #[test]
    fn test_escape_path_name() {
        assert_eq!(escape_path_name("2012-01-01"), "2012-01-01");
        assert_eq!(escape_path_name("a/b=c"), "a%2Fb%3Dc");
        assert_eq!(escape_path_name("10:30"), "10%3A30");
        assert_eq!(unescape_path_name("a%2Fb%3Dc"), "a/b=c");
        assert_eq!(unescape_path_name("100%"), "100%");
        assert_eq!(unescape_path_name("%zz"), "%zz");
    }

    #[test]
    fn test_partition_names() {
        let keys = vec![FieldSchema::new("ds", "string"), FieldSchema::new("HR", "string")];
        let name = make_partition_name(&keys, &["2008-04-08".into(), "1/2".into()]).unwrap();
        assert_eq!(name, "ds=2008-04-08/hr=1%2F2");

        let parsed = parse_partition_name(&name).unwrap();
        assert_eq!(
            parsed,
            vec![
                ("ds".to_string(), "2008-04-08".to_string()),
                ("hr".to_string(), "1/2".to_string()),
            ]
        );

        let name = make_partition_name(&keys[..1], &[String::new()]).unwrap();
        assert_eq!(name, "ds=__HIVE_DEFAULT_PARTITION__");

        assert!(make_partition_name(&keys, &["x".into()]).is_err());
        assert!(parse_partition_name("novalue").is_err());
    }
}
