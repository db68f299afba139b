//! Hash aggregation for one Group By operator.

use super::accumulator::{Accumulator, AggregateFunction, PartialState};
use super::grouping::{grouping_id_value, GroupingSetExpander};
use crate::plan::GroupByMode;
use crate::types::Value;
use crate::{Error, Result};
use indexmap::IndexMap;
use tracing::debug;

/// One aggregate call evaluated by a [`HashAggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSpec {
    pub function: AggregateFunction,
    pub distinct: bool,
}

impl AggregateSpec {
    pub fn new(function: AggregateFunction) -> Self {
        Self {
            function,
            distinct: false,
        }
    }

    pub fn distinct(function: AggregateFunction) -> Self {
        Self {
            function,
            distinct: true,
        }
    }
}

/// A group's keys and partial states, as shuffled between operators.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRow {
    pub keys: Vec<Value>,
    /// Grouping set the row belongs to, once sets have been expanded.
    pub grouping_id: Option<u32>,
    pub states: Vec<PartialState>,
}

type GroupKey = (Vec<Value>, Option<u32>);

/// Groups rows by key and grouping set, keeping first-seen group order.
#[derive(Debug)]
pub struct HashAggregator {
    mode: GroupByMode,
    key_count: usize,
    expander: Option<GroupingSetExpander>,
    aggregates: Vec<AggregateSpec>,
    groups: IndexMap<GroupKey, Vec<Accumulator>>,
}

impl HashAggregator {
    /// `grouping_sets` makes the operator expand each input row once per
    /// mask.
    pub fn new(
        mode: GroupByMode,
        key_count: usize,
        grouping_sets: Option<Vec<u32>>,
        aggregates: Vec<AggregateSpec>,
    ) -> Result<Self> {
        let expander = grouping_sets
            .map(|masks| GroupingSetExpander::new(masks, key_count))
            .transpose()?;
        Ok(Self {
            mode,
            key_count,
            expander,
            aggregates,
            groups: IndexMap::new(),
        })
    }

    pub fn mode(&self) -> GroupByMode {
        self.mode
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Feed one raw row: its group keys and one argument list per aggregate.
    pub fn process(&mut self, keys: &[Value], args: &[Vec<Value>]) -> Result<()> {
        if !self.mode.consumes_raw() {
            return Err(self.wrong_mode("raw rows"));
        }
        if args.len() != self.aggregates.len() {
            return Err(Error::Execution(format!(
                "Expected arguments for {} aggregates, got {}",
                self.aggregates.len(),
                args.len()
            )));
        }
        for group in self.group_keys(keys, None)? {
            let accumulators = self.accumulators(group);
            for (accumulator, args) in accumulators.iter_mut().zip(args) {
                accumulator.update(args)?;
            }
        }
        Ok(())
    }

    /// Fold in a partial row from an upstream operator.
    pub fn merge(&mut self, row: &PartialRow) -> Result<()> {
        if self.mode.consumes_raw() {
            return Err(self.wrong_mode("partial rows"));
        }
        if row.states.len() != self.aggregates.len() {
            return Err(Error::Execution(format!(
                "Expected {} partial states, got {}",
                self.aggregates.len(),
                row.states.len()
            )));
        }
        for group in self.group_keys(&row.keys, row.grouping_id)? {
            let accumulators = self.accumulators(group);
            for (accumulator, state) in accumulators.iter_mut().zip(&row.states) {
                accumulator.merge(state)?;
            }
        }
        Ok(())
    }

    /// Partial rows for the next operator, in first-seen group order.
    pub fn partial_rows(&self) -> Result<Vec<PartialRow>> {
        if self.mode.produces_final() {
            return Err(self.wrong_mode("partial output"));
        }
        Ok(self
            .groups
            .iter()
            .map(|((keys, grouping_id), accumulators)| PartialRow {
                keys: keys.clone(),
                grouping_id: *grouping_id,
                states: accumulators.iter().map(Accumulator::partial).collect(),
            })
            .collect())
    }

    /// Final rows: group keys, the grouping id when present, then one value
    /// per aggregate.
    pub fn final_rows(&self) -> Result<Vec<Vec<Value>>> {
        if !self.mode.produces_final() {
            return Err(self.wrong_mode("final output"));
        }
        debug!(mode = %self.mode, groups = self.groups.len(), "Emitting final rows");
        Ok(self
            .groups
            .iter()
            .map(|((keys, grouping_id), accumulators)| {
                let mut row = keys.clone();
                if let Some(mask) = grouping_id {
                    row.push(grouping_id_value(*mask));
                }
                row.extend(accumulators.iter().map(Accumulator::evaluate));
                row
            })
            .collect())
    }

    fn group_keys(&self, keys: &[Value], grouping_id: Option<u32>) -> Result<Vec<GroupKey>> {
        if keys.len() != self.key_count {
            return Err(Error::Execution(format!(
                "Expected {} group keys, got {}",
                self.key_count,
                keys.len()
            )));
        }
        match (&self.expander, grouping_id) {
            (Some(expander), None) => Ok(expander
                .expand(keys)?
                .into_iter()
                .map(|(row, mask)| (row, Some(mask)))
                .collect()),
            (Some(_), Some(mask)) => Err(Error::Execution(format!(
                "Row of grouping set {} cannot be expanded again",
                mask
            ))),
            (None, grouping_id) => Ok(vec![(keys.to_vec(), grouping_id)]),
        }
    }

    fn accumulators(&mut self, group: GroupKey) -> &mut Vec<Accumulator> {
        let aggregates = &self.aggregates;
        self.groups.entry(group).or_insert_with(|| {
            aggregates
                .iter()
                .map(|spec| Accumulator::new(spec.function, spec.distinct))
                .collect()
        })
    }

    fn wrong_mode(&self, what: &str) -> Error {
        Error::Execution(format!(
            "Group By in {} mode does not accept {}",
            self.mode, what
        ))
    }
}
