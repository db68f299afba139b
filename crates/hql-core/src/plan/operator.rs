//! Operator descriptors and operator trees.

use super::query::JoinKind;
use crate::types::TypeInfo;
use serde::Serialize;
use std::fmt;

/// Group-by evaluation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupByMode {
    /// Raw rows to final values.
    Complete,
    /// Raw rows to partial state.
    Partial1,
    /// Partial state to partial state.
    Partial2,
    /// Partial state to partial state, expanding grouping sets.
    Partials,
    /// Map-side hash aggregation, raw rows to partial state.
    Hash,
    /// Partial state to final values after a sorted shuffle.
    MergePartial,
    /// Partial state to final values.
    Final,
}

impl GroupByMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupByMode::Complete => "complete",
            GroupByMode::Partial1 => "partial1",
            GroupByMode::Partial2 => "partial2",
            GroupByMode::Partials => "partials",
            GroupByMode::Hash => "hash",
            GroupByMode::MergePartial => "mergepartial",
            GroupByMode::Final => "final",
        }
    }

    /// Whether the operator consumes raw input rather than partial state.
    pub fn consumes_raw(&self) -> bool {
        matches!(
            self,
            GroupByMode::Complete | GroupByMode::Partial1 | GroupByMode::Hash
        )
    }

    /// Whether the operator produces final values.
    pub fn produces_final(&self) -> bool {
        matches!(
            self,
            GroupByMode::Complete | GroupByMode::MergePartial | GroupByMode::Final
        )
    }
}

impl fmt::Display for GroupByMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved expression: its text in terms of the operator's input row, and
/// its type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprDesc {
    pub expr: String,
    pub type_info: TypeInfo,
    /// Printed type; differs from `type_info` only for aggregate partial
    /// state such as avg's count/sum struct.
    pub type_name: String,
}

impl ExprDesc {
    pub fn new(expr: impl Into<String>, type_info: TypeInfo) -> Self {
        Self {
            expr: expr.into(),
            type_name: type_info.to_string(),
            type_info,
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Reference to a reduce-side key column.
    pub fn key(index: usize, type_info: TypeInfo) -> Self {
        Self::new(format!("KEY._col{}", index), type_info)
    }

    /// Reference to a reduce-side value column.
    pub fn value(index: usize, type_info: TypeInfo) -> Self {
        Self::new(format!("VALUE._col{}", index), type_info)
    }
}

impl fmt::Display for ExprDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

/// One aggregate call inside a GroupBy operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationDesc {
    pub name: String,
    pub args: Vec<ExprDesc>,
    pub distinct: bool,
    pub output_type: TypeInfo,
}

impl fmt::Display for AggregationDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<&str> = self.args.iter().map(|a| a.expr.as_str()).collect();
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        write!(f, "{}({}{})", self.name, distinct, args.join(", "))
    }
}

/// Where a FileOutput writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSinkKind {
    /// Temporary file re-read by a dependent stage.
    Intermediate,
    /// Query result read by the fetch stage.
    Final,
}

impl FileSinkKind {
    pub fn input_format(&self) -> &'static str {
        match self {
            FileSinkKind::Intermediate => "org.apache.hadoop.mapred.SequenceFileInputFormat",
            FileSinkKind::Final => "org.apache.hadoop.mapred.TextInputFormat",
        }
    }

    pub fn output_format(&self) -> &'static str {
        match self {
            FileSinkKind::Intermediate => {
                "org.apache.hadoop.hive.ql.io.HiveSequenceFileOutputFormat"
            }
            FileSinkKind::Final => "org.apache.hadoop.hive.ql.io.HiveIgnoreKeyTextOutputFormat",
        }
    }
}

/// A join between two tagged inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JoinCondition {
    pub left: usize,
    pub right: usize,
    pub kind: JoinKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum OperatorDesc {
    TableScan {
        alias: String,
    },
    Filter {
        predicate: ExprDesc,
    },
    Select {
        exprs: Vec<ExprDesc>,
        output: Vec<String>,
    },
    GroupBy {
        mode: GroupByMode,
        keys: Vec<ExprDesc>,
        aggregations: Vec<AggregationDesc>,
        output: Vec<String>,
        /// Masks expanded by this operator, if it expands grouping sets.
        grouping_sets: Option<Vec<u32>>,
    },
    ReduceSink {
        keys: Vec<ExprDesc>,
        /// One `+` or `-` per key.
        sort_order: String,
        partition_cols: Vec<ExprDesc>,
        values: Vec<ExprDesc>,
        tag: i32,
    },
    Join {
        conditions: Vec<JoinCondition>,
        /// Value expressions per input tag.
        exprs: Vec<Vec<ExprDesc>>,
        output: Vec<String>,
    },
    Extract,
    Limit {
        limit: u64,
    },
    FileOutput {
        destination: FileSinkKind,
        compressed: bool,
    },
}

impl OperatorDesc {
    /// Operator name as printed by EXPLAIN.
    pub fn name(&self) -> &'static str {
        match self {
            OperatorDesc::TableScan { .. } => "TableScan",
            OperatorDesc::Filter { .. } => "Filter Operator",
            OperatorDesc::Select { .. } => "Select Operator",
            OperatorDesc::GroupBy { .. } => "Group By Operator",
            OperatorDesc::ReduceSink { .. } => "Reduce Output Operator",
            OperatorDesc::Join { .. } => "Join Operator",
            OperatorDesc::Extract => "Extract",
            OperatorDesc::Limit { .. } => "Limit",
            OperatorDesc::FileOutput { .. } => "File Output Operator",
        }
    }

    pub fn is_reduce_sink(&self) -> bool {
        matches!(self, OperatorDesc::ReduceSink { .. })
    }
}

/// A node in an operator tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operator {
    pub desc: OperatorDesc,
    pub children: Vec<Operator>,
}

impl Operator {
    pub fn leaf(desc: OperatorDesc) -> Self {
        Self {
            desc,
            children: Vec::new(),
        }
    }

    /// Build a linear pipeline, first descriptor at the root.
    pub fn chain(descs: Vec<OperatorDesc>) -> Option<Operator> {
        descs.into_iter().rev().fold(None, |child, desc| {
            Some(Operator {
                desc,
                children: child.into_iter().collect(),
            })
        })
    }

    /// Descriptors of the tree in pre-order.
    pub fn descriptors(&self) -> Vec<&OperatorDesc> {
        let mut out = vec![&self.desc];
        for child in &self.children {
            out.extend(child.descriptors());
        }
        out
    }

    /// First descriptor, in pre-order, matching the predicate.
    pub fn find(&self, predicate: impl Fn(&OperatorDesc) -> bool + Copy) -> Option<&OperatorDesc> {
        if predicate(&self.desc) {
            return Some(&self.desc);
        }
        self.children.iter().find_map(|c| c.find(predicate))
    }

    /// Operator names in pre-order.
    pub fn names(&self) -> Vec<&'static str> {
        self.descriptors().iter().map(|d| d.name()).collect()
    }
}
