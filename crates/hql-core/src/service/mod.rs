//! HiveServer2-style metadata operations.

pub mod metadata;
pub mod operation;
pub mod schema;
pub mod session;
pub mod table_type_mapping;

pub use metadata::{jdbc_pattern, GetSchemasOperation, GetTableTypesOperation, GetTablesOperation};
pub use operation::{
    FetchOrientation, Operation, OperationBase, OperationHandle, OperationState, OperationType,
};
pub use schema::{ColumnDescriptor, RowSet, TableSchema};
pub use session::HiveSession;
pub use table_type_mapping::{
    mapping_for, table_type_mapping, ClassicTableTypeMapping, HiveTableTypeMapping,
    TableTypeMapping,
};
