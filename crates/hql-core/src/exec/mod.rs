//! In-memory evaluation of Group By operators.
//!
//! [`HashAggregator`] runs one operator of a plan in a given
//! [`GroupByMode`](crate::plan::GroupByMode): raw modes consume rows, the
//! others merge [`PartialRow`]s produced upstream. Chaining aggregators the
//! way the planner chains operators reproduces a query's result without a
//! cluster.

pub mod accumulator;
pub mod aggregator;
pub mod grouping;

pub use accumulator::{Accumulator, AggregateFunction, PartialState};
pub use aggregator::{AggregateSpec, HashAggregator, PartialRow};
pub use grouping::{grouping_id_value, GroupingSetExpander};
