//! Result set schemas and row sets.

use crate::types::{TypeInfo, Value};
use crate::{OperationError, Result};
use serde::{Deserialize, Serialize};

/// One result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_info: TypeInfo,
    pub comment: String,
    /// 1-based position in the result set.
    pub position: usize,
}

/// Ordered list of result columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_column(mut self, name: &str, type_info: TypeInfo, comment: &str) -> Self {
        let position = self.columns.len() + 1;
        self.columns.push(ColumnDescriptor {
            name: name.to_string(),
            type_info,
            comment: comment.to_string(),
            position,
        });
        self
    }

    pub fn add_string_column(self, name: &str, comment: &str) -> Self {
        self.add_column(name, TypeInfo::String, comment)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Materialized rows with a fetch cursor.
///
/// `extract_subset` hands out the next rows and advances `start_offset`; setting
/// the offset back to zero rewinds the cursor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    start_offset: usize,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row after checking it against the schema.
    pub fn add_row(&mut self, schema: &TableSchema, row: Vec<Value>) -> Result<()> {
        if row.len() != schema.len() {
            return Err(OperationError::SchemaMismatch {
                expected: schema.len(),
                actual: row.len(),
            }
            .into());
        }
        self.rows.push(row);
        Ok(())
    }

    /// The next `max_rows` rows from the cursor, as a new row set.
    pub fn extract_subset(&mut self, max_rows: usize) -> RowSet {
        let start = self.start_offset.min(self.rows.len());
        let end = start.saturating_add(max_rows).min(self.rows.len());
        let subset = RowSet {
            start_offset: start,
            rows: self.rows[start..end].to_vec(),
        };
        self.start_offset = end;
        subset
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn set_start_offset(&mut self, offset: usize) {
        self.start_offset = offset;
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
