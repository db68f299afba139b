//! Choice of group-by plan shape.
//!
//! The shape depends on map-side aggregation, skew handling, the number of
//! grouping sets and whether DISTINCT aggregates are present:
//!
//! | map aggr | skew  | sets > cardinality | shape                |
//! |----------|-------|--------------------|----------------------|
//! | off      | off   | -                  | [`ReduceOnly`]       |
//! | off      | on    | -                  | [`TwoJobNoMapAggr`]  |
//! | on       | off   | no                 | [`SingleJob`]        |
//! | on       | off   | yes                | [`AdditionalJob`]    |
//! | on       | on    | no                 | [`SkewTwoJob`]       |
//!
//! [`ReduceOnly`]: GroupByStrategy::ReduceOnly
//! [`TwoJobNoMapAggr`]: GroupByStrategy::TwoJobNoMapAggr
//! [`SingleJob`]: GroupByStrategy::SingleJob
//! [`AdditionalJob`]: GroupByStrategy::AdditionalJob
//! [`SkewTwoJob`]: GroupByStrategy::SkewTwoJob

use crate::config::PlannerConfig;
use crate::{PlanError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupByStrategy {
    /// ReduceSink, then a complete GroupBy on the reducer.
    ReduceOnly,
    /// Random shuffle into partial1, then a second job computing final values.
    TwoJobNoMapAggr,
    /// Map-side hash aggregation with grouping sets, merged on the reducer.
    SingleJob,
    /// Hash aggregation without grouping sets, sets expanded on the first
    /// reducer, final values in a second job.
    AdditionalJob,
    /// Map-side hash aggregation, random shuffle into partials, then final.
    SkewTwoJob,
}

/// How a ReduceSink distributes rows among reducers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitioning {
    /// Hash of the first `n` shuffle keys.
    Keys(usize),
    /// `rand()`
    Random,
}

impl GroupByStrategy {
    /// Pick the plan shape. `grouping_sets` is the number of sets, if any.
    pub fn decide(
        config: &PlannerConfig,
        grouping_sets: Option<usize>,
        has_distinct: bool,
    ) -> Result<Self> {
        if grouping_sets.is_some() && config.multigroupby_single_reducer {
            return Err(PlanError::GroupingSetsMultiGroupBySingleReducer.into());
        }

        if !config.map_aggr {
            if grouping_sets.is_some() {
                return Err(PlanError::GroupingSetsNoMapAggr.into());
            }
            return Ok(if config.groupby_skewindata {
                GroupByStrategy::TwoJobNoMapAggr
            } else {
                GroupByStrategy::ReduceOnly
            });
        }

        let over_threshold = grouping_sets
            .filter(|&count| count > config.new_job_grouping_set_cardinality);

        match (config.groupby_skewindata, over_threshold) {
            (false, None) => Ok(GroupByStrategy::SingleJob),
            (false, Some(count)) if has_distinct => {
                Err(PlanError::GroupingSetsThresholdWithDistinct(count).into())
            }
            (false, Some(_)) => Ok(GroupByStrategy::AdditionalJob),
            (true, None) => Ok(GroupByStrategy::SkewTwoJob),
            (true, Some(count)) => Err(PlanError::GroupingSetsThresholdWithSkew(count).into()),
        }
    }

    /// Number of MapReduce jobs the group-by needs.
    pub fn job_count(&self) -> usize {
        match self {
            GroupByStrategy::ReduceOnly | GroupByStrategy::SingleJob => 1,
            GroupByStrategy::TwoJobNoMapAggr
            | GroupByStrategy::AdditionalJob
            | GroupByStrategy::SkewTwoJob => 2,
        }
    }

    pub fn map_side_aggregation(&self) -> bool {
        matches!(
            self,
            GroupByStrategy::SingleJob | GroupByStrategy::AdditionalJob | GroupByStrategy::SkewTwoJob
        )
    }

    /// Partitioning of the first shuffle.
    ///
    /// `shuffle_keys` counts every key of the ReduceSink, `group_keys` only the
    /// group keys and grouping id (the keys in front of any distinct columns).
    pub fn first_partitioning(
        &self,
        shuffle_keys: usize,
        group_keys: usize,
        has_distinct: bool,
    ) -> Partitioning {
        match self {
            GroupByStrategy::TwoJobNoMapAggr | GroupByStrategy::SkewTwoJob => {
                if has_distinct {
                    Partitioning::Keys(shuffle_keys)
                } else {
                    Partitioning::Random
                }
            }
            _ if has_distinct => Partitioning::Keys(group_keys),
            _ => Partitioning::Keys(shuffle_keys),
        }
    }
}

impl fmt::Display for GroupByStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupByStrategy::ReduceOnly => "reduce-only",
            GroupByStrategy::TwoJobNoMapAggr => "two-job-no-map-aggr",
            GroupByStrategy::SingleJob => "single-job",
            GroupByStrategy::AdditionalJob => "additional-job",
            GroupByStrategy::SkewTwoJob => "skew-two-job",
        };
        f.write_str(name)
    }
}
