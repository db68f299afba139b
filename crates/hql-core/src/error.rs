//! Error types for hql core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.

use thiserror::Error;

/// Result type alias for hql operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for hql.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query planning error
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// User-defined function error
    #[error("UDF error: {0}")]
    Udf(#[from] UdfError),

    /// Metadata operation error
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    /// Metastore error
    #[error("Metastore error: {0}")]
    Metastore(#[from] MetastoreError),

    /// Aggregation runtime error
    #[error("Execution error: {0}")]
    Execution(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Planner errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// Table is not known to the catalog
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Column cannot be resolved against the row schema
    #[error("Invalid table alias or column reference '{0}'")]
    ColumnNotFound(String),

    /// Unqualified column matches more than one input
    #[error("Ambiguous column reference '{0}'")]
    AmbiguousColumn(String),

    /// Select expression is neither a group key nor an aggregate
    #[error("Expression not in GROUP BY key '{0}'")]
    ExpressionNotInGroupBy(String),

    /// Aggregate call used where none is allowed
    #[error("Aggregate function not allowed here: {0}")]
    AggregateNotAllowed(String),

    /// Aggregate function is not supported
    #[error("Invalid function '{0}'")]
    UnknownFunction(String),

    /// Empty GROUPING SETS list
    #[error("Empty grouping sets not allowed")]
    GroupingSetsEmpty,

    /// Grouping set member is not one of the group keys
    #[error("Grouping sets expression is not in GROUP BY key: {0}")]
    GroupingSetExprNotInGroupBy(String),

    /// Grouping-set bitmasks cannot address that many keys
    #[error("Grouping sets support at most {max} GROUP BY keys, got {actual}")]
    TooManyGroupingKeys { max: usize, actual: usize },

    /// CUBE would produce more grouping sets than a plan may carry
    #[error("Grouping sets produce {actual} rows per input row, at most {max} are allowed")]
    TooManyGroupingSets { max: u64, actual: u64 },

    /// Aggregation argument overlaps a group key
    #[error(
        "Grouping sets aggregations (with rollups or cubes) are not allowed if aggregation \
         function parameters overlap with the aggregation functions columns"
    )]
    GroupingSetsAggrExpressionInvalid,

    /// Grouping sets need map-side aggregation
    #[error(
        "Grouping sets aggregations (with rollups or cubes) are not allowed if map-side \
         aggregation is turned off. Set hive.map.aggr=true if you want to use grouping sets"
    )]
    GroupingSetsNoMapAggr,

    /// Grouping sets with the single-reducer multi group-by rewrite
    #[error(
        "Grouping sets aggregations (with rollups or cubes) are not allowed when \
         hive.multigroupby.singlereducer is turned on. Set \
         hive.multigroupby.singlereducer=false if you want to use grouping sets"
    )]
    GroupingSetsMultiGroupBySingleReducer,

    /// Additional job combined with skew handling
    #[error(
        "An additional MR job is introduced since the number of rows created per input row \
         due to grouping sets is more than hive.new.job.grouping.set.cardinality. There is no \
         need to handle skew separately. set hive.groupby.skewindata to false. The number of \
         rows per input row due to grouping sets is {0}"
    )]
    GroupingSetsThresholdWithSkew(usize),

    /// Additional job combined with DISTINCT aggregates
    #[error(
        "An additional MR job is introduced since the cardinality of grouping sets is more \
         than hive.new.job.grouping.set.cardinality. This functionality is not supported with \
         distincts. Either set hive.new.job.grouping.set.cardinality to a high number (higher \
         than the number of rows per input row due to grouping sets in the query), or rewrite \
         the query to not use distincts. The number of rows per input row due to grouping sets \
         is {0}"
    )]
    GroupingSetsThresholdWithDistinct(usize),

    /// Two map inputs of one job share an alias
    #[error("Duplicate table alias '{0}' in join")]
    DuplicateAlias(String),

    /// Join without any equality condition
    #[error("Join requires at least one equality condition: {0}")]
    InvalidJoinCondition(String),

    /// Stage graph references an unknown stage
    #[error("Stage-{0} depends on unknown Stage-{1}")]
    UnknownStage(u32, u32),

    /// Stage graph contains a cycle
    #[error("Stage dependency cycle detected at Stage-{0}")]
    StageCycle(u32),

    /// Planner reached a state it cannot continue from
    #[error("Internal planner error: {0}")]
    Internal(String),
}

/// UDF errors, raised while initializing or evaluating a function.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UdfError {
    /// Wrong number of arguments
    #[error("{0}")]
    ArgumentLength(String),

    /// Argument of the wrong type or shape
    #[error("{0}")]
    Argument(String),

    /// Function not registered
    #[error("Invalid function {0}")]
    UnknownFunction(String),

    /// Evaluate called before initialize
    #[error("Function {0} evaluated before initialization")]
    NotInitialized(String),
}

/// Errors from HiveServer2-style operations and fetch formatting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    /// Illegal state change
    #[error("Illegal Operation state transition from {from} to {to}")]
    IllegalStateTransition { from: String, to: String },

    /// Operation is not in the required state
    #[error("Expected state {expected}, but found {actual}")]
    UnexpectedState { expected: String, actual: String },

    /// Fetch orientation not supported by this operation
    #[error("The fetch type {0} is not supported for this resultset")]
    UnsupportedFetchOrientation(String),

    /// Row does not match the result set schema
    #[error("Schema mismatch: expected {expected} columns, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// Operation failed while running
    #[error("{0}")]
    Failed(String),
}

/// Metastore errors, mirroring the Thrift IDL exceptions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetastoreError {
    /// Object already exists
    #[error("AlreadyExistsException: {0}")]
    AlreadyExists(String),

    /// Object does not exist
    #[error("NoSuchObjectException: {0}")]
    NoSuchObject(String),

    /// Object is malformed
    #[error("InvalidObjectException: {0}")]
    InvalidObject(String),

    /// Operation not allowed in the current state
    #[error("InvalidOperationException: {0}")]
    InvalidOperation(String),

    /// Database does not exist
    #[error("UnknownDBException: {0}")]
    UnknownDb(String),

    /// Table does not exist
    #[error("UnknownTableException: {0}")]
    UnknownTable(String),

    /// Config value may not be exposed
    #[error("ConfigValSecurityException: {0}")]
    ConfigValSecurity(String),
}

// Conversion implementations for external error types

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
