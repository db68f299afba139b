//! Fan-out of input rows into one row per grouping set.

use crate::plan::grouping_sets::{MAX_GROUPING_KEYS, MAX_GROUPING_SETS};
use crate::types::Value;
use crate::{Error, Result};

/// Replicates a key row once per grouping-set mask, nulling absent keys.
#[derive(Debug, Clone)]
pub struct GroupingSetExpander {
    masks: Vec<u32>,
    key_count: usize,
}

impl GroupingSetExpander {
    pub fn new(masks: Vec<u32>, key_count: usize) -> Result<Self> {
        if key_count > MAX_GROUPING_KEYS {
            return Err(Error::Execution(format!(
                "{} grouping keys exceed the limit of {}",
                key_count, MAX_GROUPING_KEYS
            )));
        }
        if masks.len() as u64 > MAX_GROUPING_SETS {
            return Err(Error::Execution(format!(
                "{} grouping sets exceed the limit of {}",
                masks.len(),
                MAX_GROUPING_SETS
            )));
        }
        let limit = 1u64 << key_count;
        if let Some(mask) = masks.iter().find(|m| u64::from(**m) >= limit) {
            return Err(Error::Execution(format!(
                "Grouping set mask {} references keys beyond the {} group keys",
                mask, key_count
            )));
        }
        Ok(Self { masks, key_count })
    }

    pub fn masks(&self) -> &[u32] {
        &self.masks
    }

    /// One `(keys, mask)` pair per grouping set, in mask order.
    pub fn expand(&self, keys: &[Value]) -> Result<Vec<(Vec<Value>, u32)>> {
        if keys.len() != self.key_count {
            return Err(Error::Execution(format!(
                "Expected {} group keys, got {}",
                self.key_count,
                keys.len()
            )));
        }
        Ok(self
            .masks
            .iter()
            .map(|mask| {
                let row = keys
                    .iter()
                    .enumerate()
                    .map(|(i, key)| {
                        if mask & (1 << i) != 0 {
                            key.clone()
                        } else {
                            Value::Null
                        }
                    })
                    .collect();
                (row, *mask)
            })
            .collect())
    }

    /// Rows with the grouping id appended as the last key.
    pub fn expand_rows(&self, keys: &[Value]) -> Result<Vec<Vec<Value>>> {
        Ok(self
            .expand(keys)?
            .into_iter()
            .map(|(mut row, mask)| {
                row.push(grouping_id_value(mask));
                row
            })
            .collect())
    }
}

/// `GROUPING__ID` travels as a string key.
pub fn grouping_id_value(mask: u32) -> Value {
    Value::String(mask.to_string())
}
