//! Metastore object model, shaped after the metastore Thrift IDL.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_INPUT_FORMAT: &str = "org.apache.hadoop.mapred.TextInputFormat";
pub const DEFAULT_OUTPUT_FORMAT: &str =
    "org.apache.hadoop.hive.ql.io.HiveIgnoreKeyTextOutputFormat";
pub const DEFAULT_SERDE: &str = "org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe";

/// Kind of table stored in the metastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableType {
    #[default]
    ManagedTable,
    ExternalTable,
    VirtualView,
    IndexTable,
}

impl TableType {
    /// Every table type, in declaration order.
    pub const ALL: [TableType; 4] = [
        TableType::ManagedTable,
        TableType::ExternalTable,
        TableType::VirtualView,
        TableType::IndexTable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableType::ManagedTable => "MANAGED_TABLE",
            TableType::ExternalTable => "EXTERNAL_TABLE",
            TableType::VirtualView => "VIRTUAL_VIEW",
            TableType::IndexTable => "INDEX_TABLE",
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::Serialization(format!("Unknown table type: {}", s)))
    }
}

/// A database (namespace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Database {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location_uri: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// One column: name, Hive type name and comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub comment: String,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            comment: String::new(),
        }
    }
}

/// A user-registered type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Type {
    pub name: String,
    #[serde(default)]
    pub type1: Option<String>,
    #[serde(default)]
    pub type2: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<FieldSchema>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SerDeInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub serialization_lib: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// Sort column of a bucketed table; `order` is 1 for ascending, 0 for descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub col: String,
    pub order: i32,
}

/// Physical layout of a table or partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    #[serde(default)]
    pub cols: Vec<FieldSchema>,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_input_format")]
    pub input_format: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub compressed: bool,
    #[serde(default = "default_num_buckets")]
    pub num_buckets: i32,
    #[serde(default = "default_serde_info")]
    pub serde_info: SerDeInfo,
    #[serde(default)]
    pub bucket_cols: Vec<String>,
    #[serde(default)]
    pub sort_cols: Vec<Order>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

fn default_input_format() -> String {
    DEFAULT_INPUT_FORMAT.to_string()
}

fn default_output_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}

fn default_num_buckets() -> i32 {
    -1
}

fn default_serde_info() -> SerDeInfo {
    SerDeInfo {
        name: String::new(),
        serialization_lib: DEFAULT_SERDE.to_string(),
        parameters: HashMap::from([("serialization.format".to_string(), "1".to_string())]),
    }
}

impl Default for StorageDescriptor {
    fn default() -> Self {
        Self {
            cols: Vec::new(),
            location: String::new(),
            input_format: default_input_format(),
            output_format: default_output_format(),
            compressed: false,
            num_buckets: default_num_buckets(),
            serde_info: default_serde_info(),
            bucket_cols: Vec::new(),
            sort_cols: Vec::new(),
            parameters: HashMap::new(),
        }
    }
}

/// A table or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Table {
    pub table_name: String,
    pub db_name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub create_time: i32,
    #[serde(default)]
    pub last_access_time: i32,
    #[serde(default)]
    pub retention: i32,
    #[serde(default)]
    pub sd: StorageDescriptor,
    #[serde(default)]
    pub partition_keys: Vec<FieldSchema>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub view_original_text: Option<String>,
    #[serde(default)]
    pub view_expanded_text: Option<String>,
    #[serde(default)]
    pub table_type: TableType,
}

impl Table {
    /// A managed table with the given columns and default storage.
    pub fn new(db_name: &str, table_name: &str, cols: Vec<FieldSchema>) -> Self {
        Self {
            table_name: table_name.to_string(),
            db_name: db_name.to_string(),
            sd: StorageDescriptor {
                cols,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_partition_keys(mut self, keys: Vec<FieldSchema>) -> Self {
        self.partition_keys = keys;
        self
    }

    pub fn with_table_type(mut self, table_type: TableType) -> Self {
        self.table_type = table_type;
        self
    }

    /// `db.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.db_name, self.table_name)
    }
}

/// One partition of a partitioned table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Partition {
    pub values: Vec<String>,
    pub db_name: String,
    pub table_name: String,
    #[serde(default)]
    pub create_time: i32,
    #[serde(default)]
    pub last_access_time: i32,
    #[serde(default)]
    pub sd: StorageDescriptor,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}
