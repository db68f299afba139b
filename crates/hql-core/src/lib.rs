//! HQL Core - Hive-compatible grouping-sets planning and metadata services
//!
//! This library provides the pieces of a Hive query front end:
//!
//! - Grouping-sets planning (CUBE, ROLLUP, GROUPING SETS) into MapReduce stages
//! - In-memory evaluation of the planned Group By operators
//! - The ROUND UDF and a small function registry
//! - Result fetching with typed row formatting
//! - Metadata operations (catalogs, schemas, tables, columns, types) over a metastore

pub mod config;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod health;
pub mod metastore;
pub mod metrics;
pub mod plan;
pub mod service;
pub mod types;
pub mod udf;

// Re-export commonly used types
pub use config::Config;
pub use error::{MetastoreError, OperationError, PlanError, UdfError};
pub use error::{Error, Result};
