//! Grouping-sets query planner.
//!
//! A [`QueryBlock`] is resolved against a [`Catalog`](crate::metastore::Catalog)
//! and split into MapReduce stages. The group-by shape is picked by
//! [`GroupByStrategy`], and [`explain`] renders the result in Hive's EXPLAIN
//! layout.

pub mod explain;
pub mod grouping_sets;
pub mod operator;
pub mod planner;
pub mod query;
pub mod stage;
pub mod strategy;

pub use explain::explain;
pub use operator::{
    AggregationDesc, ExprDesc, FileSinkKind, GroupByMode, JoinCondition, Operator, OperatorDesc,
};
pub use planner::QueryPlanner;
pub use query::{
    agg, agg_distinct, col, count_star, func, lit, qcol, BinaryOp, Expr, FromClause,
    GroupByClause, GroupingModifier, JoinKind, OrderByItem, QueryBlock, SelectItem,
};
pub use stage::{MapRedWork, Stage, StagePlan, StageWork, FETCH_STAGE_ID};
pub use strategy::{GroupByStrategy, Partitioning};
