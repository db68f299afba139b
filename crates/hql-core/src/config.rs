//! Configuration structures for hql.
//!
//! Configuration is loaded from TOML files and can be overridden via CLI flags
//! (`--hiveconf name=value` for planner variables).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Query planner configuration
    #[serde(default)]
    pub planner: PlannerConfig,

    /// HiveServer2-style operation configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Metastore service configuration
    #[serde(default)]
    pub metastore: MetastoreConfig,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Planner configuration, named after the Hive variables it mirrors.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// `hive.new.job.grouping.set.cardinality`: above this many grouping sets
    /// an additional MR job is introduced
    #[serde(default = "default_grouping_set_cardinality")]
    pub new_job_grouping_set_cardinality: usize,

    /// `hive.map.aggr`: hash aggregation on the map side
    #[serde(default = "default_map_aggr")]
    pub map_aggr: bool,

    /// `hive.groupby.skewindata`: two-job plan spreading keys randomly first
    #[serde(default)]
    pub groupby_skewindata: bool,

    /// `hive.multigroupby.singlereducer`
    #[serde(default)]
    pub multigroupby_single_reducer: bool,

    /// Database used for unqualified table names
    #[serde(default = "default_database")]
    pub default_database: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            new_job_grouping_set_cardinality: default_grouping_set_cardinality(),
            map_aggr: default_map_aggr(),
            groupby_skewindata: false,
            multigroupby_single_reducer: false,
            default_database: default_database(),
        }
    }
}

impl PlannerConfig {
    /// Apply a Hive variable override.
    pub fn set_var(&mut self, name: &str, value: &str) -> crate::Result<()> {
        let value = value.trim();
        match name.trim() {
            "hive.new.job.grouping.set.cardinality" => {
                self.new_job_grouping_set_cardinality = value.parse().map_err(|_| {
                    crate::Error::Config(format!("Invalid value for {}: {}", name, value))
                })?;
            }
            "hive.map.aggr" => self.map_aggr = parse_bool(name, value)?,
            "hive.groupby.skewindata" => self.groupby_skewindata = parse_bool(name, value)?,
            "hive.multigroupby.singlereducer" => {
                self.multigroupby_single_reducer = parse_bool(name, value)?
            }
            "hive.default.database" => self.default_database = value.to_lowercase(),
            other => {
                return Err(crate::Error::Config(format!(
                    "Unknown planner variable: {}",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Apply a `name=value` assignment as given on the command line.
    pub fn apply_assignment(&mut self, assignment: &str) -> crate::Result<()> {
        let (name, value) = assignment.split_once('=').ok_or_else(|| {
            crate::Error::Config(format!("Expected name=value, got: {}", assignment))
        })?;
        self.set_var(name, value)
    }
}

fn parse_bool(name: &str, value: &str) -> crate::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(crate::Error::Config(format!(
            "Invalid boolean for {}: {}",
            name, value
        ))),
    }
}

/// Table type mapping used by metadata operations
/// (`hive.server2.table.type.mapping`).
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TableTypeMappingKind {
    /// JDBC-classic names (TABLE, VIEW)
    #[default]
    Classic,
    /// Hive names (MANAGED_TABLE, EXTERNAL_TABLE, ...)
    Hive,
}

/// Fetch formatter used for result rows.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FetchFormatterKind {
    /// Typed Thrift payload per column
    #[default]
    Thrift,
    /// Delimited text row
    Default,
}

/// HiveServer2-style operation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Table type mapping
    #[serde(default)]
    pub table_type_mapping: TableTypeMappingKind,

    /// Fetch formatter
    #[serde(default)]
    pub fetch_formatter: FetchFormatterKind,

    /// Maximum rows returned by one fetch
    #[serde(default = "default_max_fetch_rows")]
    pub max_fetch_rows: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            table_type_mapping: TableTypeMappingKind::default(),
            fetch_formatter: FetchFormatterKind::default(),
            max_fetch_rows: default_max_fetch_rows(),
        }
    }
}

/// Metastore service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetastoreConfig {
    /// Bind address of the metastore service
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port of the metastore service
    #[serde(default = "default_metastore_port")]
    pub port: u16,

    /// Root directory for managed tables
    #[serde(default = "default_warehouse_dir")]
    pub warehouse_dir: String,

    /// Values returned by `get_config_value`
    #[serde(default)]
    pub config_values: BTreeMap<String, String>,
}

impl Default for MetastoreConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_metastore_port(),
            warehouse_dir: default_warehouse_dir(),
            config_values: BTreeMap::new(),
        }
    }
}

/// Monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Metrics HTTP port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            log_level: LogLevel::default(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Filter directive for `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Plain text format (default)
    #[default]
    Text,
}

// Default value functions
fn default_grouping_set_cardinality() -> usize {
    30
}
fn default_map_aggr() -> bool {
    true
}
fn default_database() -> String {
    "default".to_string()
}
fn default_max_fetch_rows() -> usize {
    1000
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_metastore_port() -> u16 {
    9083
}
fn default_warehouse_dir() -> String {
    "/user/hive/warehouse".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.planner.new_job_grouping_set_cardinality == 0 {
            return Err(crate::Error::Config(
                "new_job_grouping_set_cardinality must be at least 1".into(),
            ));
        }

        if self.planner.default_database.is_empty() {
            return Err(crate::Error::Config("Default database is required".into()));
        }

        if self.metastore.port == 0 {
            return Err(crate::Error::Config("Metastore port is required".into()));
        }

        if self.metastore.port == self.monitoring.metrics_port {
            return Err(crate::Error::Config(format!(
                "Metastore and metrics ports must differ (both {})",
                self.metastore.port
            )));
        }

        if self.server.max_fetch_rows == 0 {
            return Err(crate::Error::Config(
                "max_fetch_rows must be at least 1".into(),
            ));
        }

        if self.planner.groupby_skewindata && !self.planner.map_aggr {
            tracing::warn!("Skew handling without map-side aggregation doubles shuffle volume");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_planner_config() {
        let config = PlannerConfig::default();
        assert_eq!(config.new_job_grouping_set_cardinality, 30);
        assert!(config.map_aggr);
        assert!(!config.groupby_skewindata);
        assert!(!config.multigroupby_single_reducer);
        assert_eq!(config.default_database, "default");
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_cardinality() {
        let mut config = Config::default();
        config.planner.new_job_grouping_set_cardinality = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cardinality"));
    }

    #[test]
    fn test_config_validation_port_clash() {
        let mut config = Config::default();
        config.monitoring.metrics_port = config.metastore.port;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ports must differ"));
    }

    #[test]
    fn test_set_var() {
        let mut config = PlannerConfig::default();
        config
            .set_var("hive.new.job.grouping.set.cardinality", "2")
            .unwrap();
        config.apply_assignment("hive.map.aggr=false").unwrap();
        config.apply_assignment("hive.groupby.skewindata = TRUE").unwrap();
        assert_eq!(config.new_job_grouping_set_cardinality, 2);
        assert!(!config.map_aggr);
        assert!(config.groupby_skewindata);
    }

    #[test]
    fn test_set_var_rejects_garbage() {
        let mut config = PlannerConfig::default();
        assert!(config.set_var("hive.map.aggr", "yes").is_err());
        assert!(config.set_var("hive.exec.parallel", "true").is_err());
        assert!(config.apply_assignment("hive.map.aggr").is_err());
        assert!(config
            .set_var("hive.new.job.grouping.set.cardinality", "-1")
            .is_err());
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.table_type_mapping, TableTypeMappingKind::Classic);
        assert_eq!(config.fetch_formatter, FetchFormatterKind::Thrift);
        assert_eq!(config.max_fetch_rows, 1000);
    }

    #[test]
    fn test_default_metastore_config() {
        let config = MetastoreConfig::default();
        assert_eq!(config.port, 9083);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.warehouse_dir, "/user/hive/warehouse");
        assert!(config.config_values.is_empty());
    }

    #[test]
    fn test_default_monitoring_config() {
        let config = MonitoringConfig::default();
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.log_level.as_directive(), "info");
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [planner]
            new_job_grouping_set_cardinality = 3
            groupby_skewindata = true

            [server]
            table_type_mapping = "hive"
            fetch_formatter = "default"

            [metastore]
            port = 9999
            [metastore.config_values]
            "hive.exec.scratchdir" = "/tmp/hive"
            "#,
        )
        .unwrap();

        assert_eq!(config.planner.new_job_grouping_set_cardinality, 3);
        assert!(config.planner.map_aggr);
        assert!(config.planner.groupby_skewindata);
        assert_eq!(config.server.table_type_mapping, TableTypeMappingKind::Hive);
        assert_eq!(config.server.fetch_formatter, FetchFormatterKind::Default);
        assert_eq!(config.metastore.port, 9999);
        assert_eq!(
            config.metastore.config_values.get("hive.exec.scratchdir"),
            Some(&"/tmp/hive".to_string())
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[planner]\nmap_aggr = false").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert!(!config.planner.map_aggr);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "[planner]\nnew_job_grouping_set_cardinality = 0").unwrap();
        assert!(Config::from_file(bad.path()).is_err());
    }
}
