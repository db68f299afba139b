//! Fetch formatters: turn result rows into client payloads.

use crate::service::TableSchema;
use crate::types::Value;
use crate::{OperationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Property naming the field delimiter of the text formatter.
pub const FIELD_DELIM: &str = "field.delim";
/// Property naming the NULL marker of the text formatter.
pub const SERIALIZATION_NULL_FORMAT: &str = "serialization.null.format";

/// Converts rows for one fetch; `Output` is the per-row client representation.
pub trait FetchFormatter: Send {
    type Output;

    /// Configure the formatter from table properties.
    fn initialize(&mut self, props: &HashMap<String, String>) -> Result<()>;

    /// Convert one row described by `schema`.
    fn convert(&self, row: &[Value], schema: &TableSchema) -> Result<Self::Output>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Thrift column value, as carried in a HiveServer2 row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ThriftPayload {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
}

impl ThriftPayload {
    /// Payload for a non-null value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let payload = match value {
            Value::Null => return None,
            Value::Boolean(v) => ThriftPayload::Bool(*v),
            Value::Byte(v) => ThriftPayload::Byte(*v),
            Value::Short(v) => ThriftPayload::I16(*v),
            Value::Int(v) => ThriftPayload::I32(*v),
            Value::Long(v) => ThriftPayload::I64(*v),
            Value::Float(v) => ThriftPayload::Double(*v as f64),
            Value::Double(v) => ThriftPayload::Double(*v),
            Value::String(v) => ThriftPayload::String(v.clone()),
            Value::Binary(v) => ThriftPayload::Binary(v.clone()),
            Value::Decimal(_) | Value::Date(_) | Value::Timestamp(_) => {
                ThriftPayload::String(value.to_string())
            }
        };
        Some(payload)
    }
}

fn check_arity(row: &[Value], schema: &TableSchema) -> Result<()> {
    if row.len() != schema.len() {
        return Err(OperationError::SchemaMismatch {
            expected: schema.len(),
            actual: row.len(),
        }
        .into());
    }
    Ok(())
}

/// Formatter producing Thrift payloads, NULL fields as `None`.
#[derive(Debug, Default, Clone)]
pub struct ThriftFormatter;

impl FetchFormatter for ThriftFormatter {
    type Output = Vec<Option<ThriftPayload>>;

    fn initialize(&mut self, _props: &HashMap<String, String>) -> Result<()> {
        Ok(())
    }

    fn convert(&self, row: &[Value], schema: &TableSchema) -> Result<Self::Output> {
        check_arity(row, schema)?;
        Ok(row.iter().map(ThriftPayload::from_value).collect())
    }
}

/// Formatter producing one delimited text line per row.
#[derive(Debug, Clone)]
pub struct DefaultFetchFormatter {
    delimiter: String,
    null_format: String,
}

impl Default for DefaultFetchFormatter {
    fn default() -> Self {
        Self {
            delimiter: "\t".to_string(),
            null_format: "NULL".to_string(),
        }
    }
}

impl FetchFormatter for DefaultFetchFormatter {
    type Output = String;

    fn initialize(&mut self, props: &HashMap<String, String>) -> Result<()> {
        if let Some(delim) = props.get(FIELD_DELIM) {
            self.delimiter = delim.clone();
        }
        if let Some(null_format) = props.get(SERIALIZATION_NULL_FORMAT) {
            self.null_format = null_format.clone();
        }
        Ok(())
    }

    fn convert(&self, row: &[Value], schema: &TableSchema) -> Result<Self::Output> {
        check_arity(row, schema)?;
        let fields: Vec<String> = row
            .iter()
            .map(|v| match v {
                Value::Null => self.null_format.clone(),
                other => other.to_string(),
            })
            .collect();
        Ok(fields.join(&self.delimiter))
    }
}

/// Collects formatted rows, optionally up to a limit.
pub struct ListSink<F: FetchFormatter> {
    formatter: F,
    schema: TableSchema,
    limit: Option<usize>,
    rows: Vec<F::Output>,
    closed: bool,
}

impl<F: FetchFormatter> ListSink<F> {
    pub fn new(formatter: F, schema: TableSchema, limit: Option<usize>) -> Self {
        Self {
            formatter,
            schema,
            limit,
            rows: Vec::new(),
            closed: false,
        }
    }

    /// Convert and store a row. Returns false once the limit is reached.
    pub fn process(&mut self, row: &[Value]) -> Result<bool> {
        if self.is_full() {
            return Ok(false);
        }
        let converted = self.formatter.convert(row, &self.schema)?;
        self.rows.push(converted);
        Ok(true)
    }

    pub fn is_full(&self) -> bool {
        matches!(self.limit, Some(limit) if self.rows.len() >= limit)
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Drain the collected rows.
    pub fn take_rows(&mut self) -> Vec<F::Output> {
        std::mem::take(&mut self.rows)
    }

    pub fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.formatter.close()?;
        }
        Ok(())
    }
}
