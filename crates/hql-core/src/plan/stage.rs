//! Stage graph: MapReduce jobs, the fetch stage and their dependencies.

use super::operator::Operator;
use crate::{PlanError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Id of the fetch stage every plan ends with.
pub const FETCH_STAGE_ID: u32 = 0;

/// Work of one MapReduce job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapRedWork {
    /// Map operator trees by input alias.
    pub map: Vec<(String, Operator)>,
    pub reduce: Option<Operator>,
}

impl MapRedWork {
    pub fn map_aliases(&self) -> Vec<&str> {
        self.map.iter().map(|(alias, _)| alias.as_str()).collect()
    }

    pub fn map_tree(&self, alias: &str) -> Option<&Operator> {
        self.map
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, op)| op)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageWork {
    MapReduce(MapRedWork),
    Fetch { limit: Option<u64> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    pub id: u32,
    pub work: StageWork,
}

impl Stage {
    pub fn name(&self) -> String {
        format!("Stage-{}", self.id)
    }

    pub fn map_reduce(&self) -> Option<&MapRedWork> {
        match &self.work {
            StageWork::MapReduce(work) => Some(work),
            StageWork::Fetch { .. } => None,
        }
    }
}

/// Stages and the edges between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StagePlan {
    stages: Vec<Stage>,
    dependencies: BTreeMap<u32, BTreeSet<u32>>,
}

impl StagePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage depending on `depends_on`. Edges are checked by
    /// [`StagePlan::validate`].
    pub fn add_stage(&mut self, stage: Stage, depends_on: impl IntoIterator<Item = u32>) {
        self.dependencies
            .insert(stage.id, depends_on.into_iter().collect());
        self.stages.push(stage);
    }

    /// Stages in insertion order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, id: u32) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// MapReduce stages in insertion order.
    pub fn map_reduce_stages(&self) -> impl Iterator<Item = (&Stage, &MapRedWork)> {
        self.stages
            .iter()
            .filter_map(|s| s.map_reduce().map(|work| (s, work)))
    }

    pub fn dependencies_of(&self, id: u32) -> Vec<u32> {
        self.dependencies
            .get(&id)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Stages with no dependencies, in insertion order.
    pub fn root_stages(&self) -> Vec<u32> {
        self.stages
            .iter()
            .map(|s| s.id)
            .filter(|id| self.dependencies_of(*id).is_empty())
            .collect()
    }

    /// Stages that depend directly on `id`.
    pub fn dependents(&self, id: u32) -> Vec<u32> {
        self.stages
            .iter()
            .map(|s| s.id)
            .filter(|other| {
                self.dependencies
                    .get(other)
                    .is_some_and(|deps| deps.contains(&id))
            })
            .collect()
    }

    /// Every edge must point at a stage of this plan, and the graph must be
    /// acyclic.
    pub fn validate(&self) -> Result<()> {
        for (stage, deps) in &self.dependencies {
            for dep in deps {
                if self.stage(*dep).is_none() {
                    return Err(PlanError::UnknownStage(*stage, *dep).into());
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Stage ids ordered so that every stage follows its dependencies.
    pub fn topological_order(&self) -> Result<Vec<u32>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            plan: &StagePlan,
            id: u32,
            marks: &mut BTreeMap<u32, Mark>,
            order: &mut Vec<u32>,
        ) -> Result<()> {
            match marks.get(&id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => return Err(PlanError::StageCycle(id).into()),
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            for dep in plan.dependencies_of(id) {
                visit(plan, dep, marks, order)?;
            }
            marks.insert(id, Mark::Done);
            order.push(id);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        let mut order = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            visit(self, stage.id, &mut marks, &mut order)?;
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn mr(id: u32) -> Stage {
        Stage {
            id,
            work: StageWork::MapReduce(MapRedWork {
                map: Vec::new(),
                reduce: None,
            }),
        }
    }

    fn fetch() -> Stage {
        Stage {
            id: FETCH_STAGE_ID,
            work: StageWork::Fetch { limit: None },
        }
    }

    #[test]
    fn test_graph_queries() {
        let mut plan = StagePlan::new();
        plan.add_stage(mr(1), []);
        plan.add_stage(mr(2), []);
        plan.add_stage(mr(3), [1, 2]);
        plan.add_stage(fetch(), []);

        assert_eq!(plan.root_stages(), vec![1, 2, 0]);
        assert_eq!(plan.dependencies_of(3), vec![1, 2]);
        assert_eq!(plan.dependents(1), vec![3]);
        assert!(plan.dependents(3).is_empty());
        assert_eq!(plan.map_reduce_stages().count(), 3);
        assert_eq!(plan.stage(3).unwrap().name(), "Stage-3");
        plan.validate().unwrap();

        let order = plan.topological_order().unwrap();
        let pos = |id| order.iter().position(|s| *s == id).unwrap();
        assert!(pos(1) < pos(3));
        assert!(pos(2) < pos(3));
    }

    #[test]
    fn test_unknown_stage() {
        let mut plan = StagePlan::new();
        plan.add_stage(mr(1), [7]);
        let err = plan.validate().unwrap_err();
        assert!(matches!(err, Error::Plan(PlanError::UnknownStage(1, 7))));
    }

    #[test]
    fn test_cycle_detected() {
        let mut plan = StagePlan::new();
        plan.add_stage(mr(1), [2]);
        plan.add_stage(mr(2), [1]);
        let err = plan.topological_order().unwrap_err();
        assert!(matches!(err, Error::Plan(PlanError::StageCycle(_))));
        assert!(plan.validate().is_err());
    }
}
