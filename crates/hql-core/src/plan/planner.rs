//! Query planner: turns a [`QueryBlock`] into a [`StagePlan`].
//!
//! Operators are appended to the current job until a ReduceSink is needed. A
//! ReduceSink on the map side opens the job's reduce side. A ReduceSink after
//! the reduce side closes the job with an intermediate FileOutput, and a
//! dependent job reads the result back as a `$INTNAME` map input.

use super::grouping_sets;
use super::operator::{
    AggregationDesc, ExprDesc, FileSinkKind, GroupByMode, JoinCondition, Operator, OperatorDesc,
};
use super::query::{BinaryOp, Expr, FromClause, JoinKind, QueryBlock, SelectItem};
use super::stage::{MapRedWork, Stage, StagePlan, StageWork, FETCH_STAGE_ID};
use super::strategy::{GroupByStrategy, Partitioning};
use crate::config::PlannerConfig;
use crate::metastore::Catalog;
use crate::metrics::{PlanFailureKind, PlannerMetrics};
use crate::types::{TypeInfo, Value};
use crate::udf::{FunctionRegistry, ObjectInspector};
use crate::{Error, PlanError, Result, UdfError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Plans query blocks against a catalog.
pub struct QueryPlanner<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    config: PlannerConfig,
    functions: FunctionRegistry,
    metrics: Option<Arc<PlannerMetrics>>,
}

impl<'a, C: Catalog + ?Sized> QueryPlanner<'a, C> {
    pub fn new(catalog: &'a C, config: PlannerConfig) -> Self {
        Self {
            catalog,
            config,
            functions: FunctionRegistry::builtin(),
            metrics: None,
        }
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PlannerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan a query. The result always ends with the fetch stage `Stage-0`.
    pub fn plan(&self, query: &QueryBlock) -> Result<StagePlan> {
        let started = Instant::now();
        let result = self.build(query);

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(plan) => metrics.record_plan(plan.stages().len(), started.elapsed()),
                Err(e) => metrics.record_plan_failure(PlanFailureKind::of(e)),
            }
        }
        result
    }

    fn build(&self, query: &QueryBlock) -> Result<StagePlan> {
        let mut ctx = PlanContext::new(self);
        let pipeline = ctx.plan_block(query)?;
        ctx.close_job(pipeline.job, FileSinkKind::Final)?;
        ctx.plan.add_stage(
            Stage {
                id: FETCH_STAGE_ID,
                work: StageWork::Fetch { limit: query.limit },
            },
            [],
        );
        ctx.plan.validate()?;
        info!(stages = ctx.plan.stages().len(), "Query plan created");
        Ok(ctx.plan)
    }
}

/// One column of an operator's output row.
#[derive(Debug, Clone)]
struct ColumnInfo {
    internal: String,
    type_info: TypeInfo,
    type_name: Option<String>,
    qualifier: Option<String>,
    name: Option<String>,
    /// Expression the column was computed from, for group keys, aggregates
    /// and select items.
    source: Option<Expr>,
}

impl ColumnInfo {
    fn desc(&self) -> ExprDesc {
        let desc = ExprDesc::new(self.internal.clone(), self.type_info);
        match &self.type_name {
            Some(name) => desc.with_type_name(name.clone()),
            None => desc,
        }
    }

    fn matches(&self, qualifier: Option<&str>, name: &str) -> bool {
        let name_matches = self
            .name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(name));
        let qualifier_matches = match (qualifier, self.qualifier.as_deref()) {
            (None, _) => true,
            (Some(q), Some(own)) => q.eq_ignore_ascii_case(own),
            (Some(_), None) => false,
        };
        name_matches && qualifier_matches
    }
}

/// Schema of the rows flowing out of the last operator.
#[derive(Debug, Clone, Default)]
struct RowResolver {
    columns: Vec<ColumnInfo>,
    /// Set for group-by output, where only keys and aggregates exist.
    aggregated: bool,
}

impl RowResolver {
    fn resolve_column(&self, qualifier: Option<&str>, name: &str) -> Result<Option<&ColumnInfo>> {
        let mut matches = self.columns.iter().filter(|c| c.matches(qualifier, name));
        let first = matches.next();
        if first.is_some() && matches.next().is_some() {
            return Err(PlanError::AmbiguousColumn(name.to_string()).into());
        }
        Ok(first)
    }

    fn find_source(&self, expr: &Expr) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.source.as_ref() == Some(expr))
    }

    fn requalify(&mut self, alias: &str) {
        for column in &mut self.columns {
            column.qualifier = Some(alias.to_string());
        }
    }
}

/// A MapReduce job under construction.
#[derive(Debug, Default)]
struct Job {
    map: Vec<(String, Vec<OperatorDesc>)>,
    reduce: Option<Vec<OperatorDesc>>,
    depends_on: BTreeSet<u32>,
}

impl Job {
    fn scan(alias: &str) -> Self {
        Self {
            map: vec![(
                alias.to_string(),
                vec![OperatorDesc::TableScan {
                    alias: alias.to_string(),
                }],
            )],
            reduce: None,
            depends_on: BTreeSet::new(),
        }
    }

    /// Append to the reduce side if there is one, otherwise to the only map
    /// input.
    fn push(&mut self, op: OperatorDesc) -> Result<()> {
        if let Some(reduce) = &mut self.reduce {
            reduce.push(op);
            return Ok(());
        }
        match self.map.as_mut_slice() {
            [(_, ops)] => {
                ops.push(op);
                Ok(())
            }
            _ => Err(PlanError::Internal(format!(
                "map-only job with {} inputs",
                self.map.len()
            ))
            .into()),
        }
    }
}

struct Pipeline {
    job: Job,
    row: RowResolver,
}

/// Group-by inputs shared by every strategy.
struct GroupBySpec {
    keys: Vec<ExprDesc>,
    aggregates: Vec<AggregateInfo>,
    distinct_columns: Vec<ExprDesc>,
    grouping_sets: Option<Vec<u32>>,
    strategy: GroupByStrategy,
}

impl GroupBySpec {
    fn has_distinct(&self) -> bool {
        !self.distinct_columns.is_empty()
    }

    fn distinct_index(&self, arg: &ExprDesc) -> usize {
        self.distinct_columns
            .iter()
            .position(|d| d.expr == arg.expr)
            .unwrap_or_default()
    }

    /// Width of the group-by output key: keys plus the grouping id.
    fn group_width(&self) -> usize {
        self.keys.len() + usize::from(self.grouping_sets.is_some())
    }

    fn key_types(&self) -> Vec<TypeInfo> {
        let mut types: Vec<TypeInfo> = self.keys.iter().map(|k| k.type_info).collect();
        if self.grouping_sets.is_some() {
            types.push(TypeInfo::String);
        }
        types
    }

    fn aggregations(
        &self,
        args: impl Fn(usize, &AggregateInfo) -> Vec<ExprDesc>,
        distinct: bool,
        final_values: bool,
    ) -> Vec<AggregationDesc> {
        self.aggregates
            .iter()
            .enumerate()
            .map(|(j, a)| AggregationDesc {
                name: a.name.clone(),
                args: args(j, a),
                distinct: distinct && a.distinct,
                output_type: if final_values {
                    a.output_type
                } else {
                    a.partial_type
                },
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct AggregateInfo {
    source: Expr,
    name: String,
    args: Vec<ExprDesc>,
    distinct: bool,
    output_type: TypeInfo,
    partial_type: TypeInfo,
    partial_type_name: String,
}

impl AggregateInfo {
    fn partial(&self, expr: String) -> ExprDesc {
        ExprDesc::new(expr, self.partial_type).with_type_name(self.partial_type_name.clone())
    }
}

/// Mutable state of one planning run.
struct PlanContext<'p, 'a, C: Catalog + ?Sized> {
    planner: &'p QueryPlanner<'a, C>,
    plan: StagePlan,
    next_stage_id: u32,
    intermediates: usize,
}

impl<'p, 'a, C: Catalog + ?Sized> PlanContext<'p, 'a, C> {
    fn new(planner: &'p QueryPlanner<'a, C>) -> Self {
        Self {
            planner,
            plan: StagePlan::new(),
            next_stage_id: 1,
            intermediates: 0,
        }
    }

    fn plan_block(&mut self, query: &QueryBlock) -> Result<Pipeline> {
        let mut pipeline = match &query.from {
            FromClause::Table { name, alias } => {
                self.scan_table(name, alias.as_deref(), query.filter.as_ref())?
            }
            other => {
                let mut pipeline = self.plan_source(other)?;
                if let Some(filter) = &query.filter {
                    self.push_filter(&mut pipeline, filter)?;
                }
                pipeline
            }
        };

        if query.is_aggregation() {
            self.prune_columns(query, &mut pipeline)?;
            self.plan_group_by(query, &mut pipeline)?;
        }
        self.plan_select(&query.select, &mut pipeline)?;

        if !query.order_by.is_empty() {
            self.plan_order_by(query, &mut pipeline)?;
        } else if let Some(limit) = query.limit {
            pipeline.job.push(OperatorDesc::Limit { limit })?;
        }
        Ok(pipeline)
    }

    fn plan_source(&mut self, from: &FromClause) -> Result<Pipeline> {
        match from {
            FromClause::Table { name, alias } => self.scan_table(name, alias.as_deref(), None),
            FromClause::Subquery { query, alias } => {
                let mut pipeline = self.plan_block(query)?;
                pipeline.row.requalify(alias);
                // A map-only subquery scans its table as `alias:table`.
                if pipeline.job.reduce.is_none() {
                    for (input, _) in &mut pipeline.job.map {
                        *input = format!("{}:{}", alias.to_ascii_lowercase(), input);
                    }
                }
                Ok(pipeline)
            }
            FromClause::Join {
                left,
                right,
                join_kind,
                on,
            } => self.plan_join(left, right, *join_kind, on),
        }
    }

    fn scan_table(
        &mut self,
        name: &str,
        alias: Option<&str>,
        filter: Option<&Expr>,
    ) -> Result<Pipeline> {
        let (db_name, table_name) = match name.split_once('.') {
            Some((db, table)) => (db.to_ascii_lowercase(), table.to_ascii_lowercase()),
            None => (
                self.planner.config.default_database.clone(),
                name.to_ascii_lowercase(),
            ),
        };
        let columns = self.planner.catalog.table_columns(&db_name, &table_name)?;
        let alias = alias
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| table_name.clone());

        debug!(table = %format!("{}.{}", db_name, table_name), alias = %alias, "Scanning table");

        let row = RowResolver {
            columns: columns
                .into_iter()
                .map(|(name, type_info)| ColumnInfo {
                    internal: name.clone(),
                    type_info,
                    type_name: None,
                    qualifier: Some(alias.clone()),
                    name: Some(name),
                    source: None,
                })
                .collect(),
            aggregated: false,
        };
        let mut pipeline = Pipeline {
            job: Job::scan(&alias),
            row,
        };
        if let Some(filter) = filter {
            self.push_filter(&mut pipeline, filter)?;
        }
        Ok(pipeline)
    }

    fn push_filter(&self, pipeline: &mut Pipeline, filter: &Expr) -> Result<()> {
        let predicate = self.describe_scalar(filter, &pipeline.row)?;
        pipeline.job.push(OperatorDesc::Filter { predicate })
    }

    /// Keep only the columns the block references.
    fn prune_columns(&self, query: &QueryBlock, pipeline: &mut Pipeline) -> Result<()> {
        let mut refs = Vec::new();
        for item in &query.select {
            refs.extend(item.expr.columns());
        }
        if let Some(group_by) = &query.group_by {
            for key in &group_by.keys {
                refs.extend(key.columns());
            }
        }
        for item in &query.order_by {
            refs.extend(item.expr.columns());
        }

        let needed: Vec<ColumnInfo> = pipeline
            .row
            .columns
            .iter()
            .filter(|c| refs.iter().any(|(q, n)| c.matches(q.as_deref(), n)))
            .cloned()
            .collect();
        if needed.is_empty() {
            return Ok(());
        }

        pipeline.job.push(OperatorDesc::Select {
            exprs: needed.iter().map(ColumnInfo::desc).collect(),
            output: needed.iter().map(|c| c.internal.clone()).collect(),
        })?;
        pipeline.row.columns = needed;
        Ok(())
    }

    fn plan_join(
        &mut self,
        left: &FromClause,
        right: &FromClause,
        kind: JoinKind,
        on: &Expr,
    ) -> Result<Pipeline> {
        let left = self.plan_source(left)?;
        let right = self.plan_source(right)?;

        let mut left_keys = Vec::new();
        let mut right_keys = Vec::new();
        for conjunct in on.conjuncts() {
            let Expr::Binary {
                op: BinaryOp::Eq,
                left: a,
                right: b,
            } = conjunct
            else {
                return Err(PlanError::InvalidJoinCondition(conjunct.to_string()).into());
            };
            let sides = match (
                self.describe_scalar(a, &left.row),
                self.describe_scalar(b, &right.row),
            ) {
                (Ok(l), Ok(r)) => (l, r),
                _ => match (
                    self.describe_scalar(b, &left.row),
                    self.describe_scalar(a, &right.row),
                ) {
                    (Ok(l), Ok(r)) => (l, r),
                    _ => {
                        return Err(PlanError::InvalidJoinCondition(conjunct.to_string()).into())
                    }
                },
            };
            left_keys.push(sides.0);
            right_keys.push(sides.1);
        }

        let mut job = Job::default();
        let mut columns = Vec::new();
        let mut exprs = Vec::new();
        for (tag, (side, keys)) in [(left, left_keys), (right, right_keys)]
            .into_iter()
            .enumerate()
        {
            let (alias, mut ops, depends_on, row) = self.into_map_input(side)?;
            if job.map.iter().any(|(existing, _)| *existing == alias) {
                return Err(PlanError::DuplicateAlias(alias).into());
            }
            let values: Vec<ExprDesc> = row.columns.iter().map(ColumnInfo::desc).collect();
            exprs.push(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| ExprDesc::value(i, v.type_info))
                    .collect(),
            );
            ops.push(OperatorDesc::ReduceSink {
                sort_order: "+".repeat(keys.len()),
                partition_cols: keys.clone(),
                keys,
                values,
                tag: tag as i32,
            });
            job.map.push((alias, ops));
            job.depends_on.extend(depends_on);

            for column in row.columns {
                columns.push(ColumnInfo {
                    internal: format!("_col{}", columns.len()),
                    source: None,
                    ..column
                });
            }
        }

        job.reduce = Some(vec![OperatorDesc::Join {
            conditions: vec![JoinCondition {
                left: 0,
                right: 1,
                kind,
            }],
            exprs,
            output: columns.iter().map(|c| c.internal.clone()).collect(),
        }]);
        Ok(Pipeline {
            job,
            row: RowResolver {
                columns,
                aggregated: false,
            },
        })
    }

    /// Turn a pipeline into one map input of a new job, closing it first if it
    /// already has a reduce side.
    fn into_map_input(
        &mut self,
        pipeline: Pipeline,
    ) -> Result<(String, Vec<OperatorDesc>, BTreeSet<u32>, RowResolver)> {
        let Pipeline { mut job, row } = pipeline;
        if job.reduce.is_some() {
            let stage = self.close_job(job, FileSinkKind::Intermediate)?;
            return Ok((
                self.intermediate_alias(),
                Vec::new(),
                BTreeSet::from([stage]),
                row,
            ));
        }
        if job.map.len() != 1 {
            return Err(PlanError::Internal(format!(
                "map-only job with {} inputs",
                job.map.len()
            ))
            .into());
        }
        let (alias, ops) = job.map.remove(0);
        Ok((alias, ops, job.depends_on, row))
    }

    fn plan_group_by(&mut self, query: &QueryBlock, pipeline: &mut Pipeline) -> Result<()> {
        let clause = query.group_by.clone().unwrap_or_default();
        let grouping_sets = grouping_sets::expand(&clause)?;

        let keys = clause
            .keys
            .iter()
            .map(|k| self.describe_scalar(k, &pipeline.row))
            .collect::<Result<Vec<_>>>()?;
        let aggregates = collect_aggregates(&query.select)
            .into_iter()
            .map(|e| self.aggregate_info(e, &pipeline.row))
            .collect::<Result<Vec<_>>>()?;

        if grouping_sets.is_some() {
            let key_exprs: Vec<&str> = keys.iter().map(|k| k.expr.as_str()).collect();
            let arg_exprs: Vec<&str> = aggregates
                .iter()
                .flat_map(|a| a.args.iter().map(|d| d.expr.as_str()))
                .collect();
            grouping_sets::check_aggregate_args(&key_exprs, &arg_exprs)?;
        }

        let mut distinct_columns: Vec<ExprDesc> = Vec::new();
        for arg in aggregates
            .iter()
            .filter(|a| a.distinct)
            .flat_map(|a| a.args.iter())
        {
            if !distinct_columns.iter().any(|d| d.expr == arg.expr) {
                distinct_columns.push(arg.clone());
            }
        }

        let strategy = GroupByStrategy::decide(
            &self.planner.config,
            grouping_sets.as_ref().map(Vec::len),
            !distinct_columns.is_empty(),
        )?;
        if let (Some(metrics), Some(sets)) = (&self.planner.metrics, &grouping_sets) {
            metrics.record_grouping_sets(sets.len(), strategy == GroupByStrategy::AdditionalJob);
        }
        debug!(
            strategy = %strategy,
            keys = keys.len(),
            aggregates = aggregates.len(),
            grouping_sets = ?grouping_sets,
            "Planning group by"
        );

        let output_row = group_by_output_row(
            &clause.keys,
            &keys,
            &aggregates,
            grouping_sets.is_some(),
            &pipeline.row,
        )?;
        let spec = GroupBySpec {
            keys,
            aggregates,
            distinct_columns,
            grouping_sets,
            strategy,
        };

        match strategy {
            GroupByStrategy::ReduceOnly | GroupByStrategy::TwoJobNoMapAggr => {
                self.plan_reduce_side_group_by(&spec, pipeline)?
            }
            GroupByStrategy::SingleJob
            | GroupByStrategy::AdditionalJob
            | GroupByStrategy::SkewTwoJob => self.plan_map_side_group_by(&spec, pipeline)?,
        }
        pipeline.row = output_row;
        Ok(())
    }

    /// ReduceOnly and TwoJobNoMapAggr: raw rows are shuffled.
    fn plan_reduce_side_group_by(&mut self, spec: &GroupBySpec, pipeline: &mut Pipeline) -> Result<()> {
        let key_count = spec.keys.len();
        let mut shuffle_keys = spec.keys.clone();
        shuffle_keys.extend(spec.distinct_columns.iter().cloned());

        let mut values: Vec<ExprDesc> = Vec::new();
        let mut reduce_args = Vec::with_capacity(spec.aggregates.len());
        for aggregate in &spec.aggregates {
            let args = aggregate
                .args
                .iter()
                .map(|arg| {
                    if aggregate.distinct {
                        ExprDesc::key(key_count + spec.distinct_index(arg), arg.type_info)
                    } else {
                        let index = match values.iter().position(|v| v.expr == arg.expr) {
                            Some(index) => index,
                            None => {
                                values.push(arg.clone());
                                values.len() - 1
                            }
                        };
                        ExprDesc::value(index, arg.type_info)
                    }
                })
                .collect::<Vec<_>>();
            reduce_args.push(args);
        }

        let partitioning =
            spec.strategy
                .first_partitioning(shuffle_keys.len(), key_count, spec.has_distinct());
        let sink = OperatorDesc::ReduceSink {
            sort_order: "+".repeat(shuffle_keys.len()),
            partition_cols: partition_columns(partitioning, &shuffle_keys),
            keys: shuffle_keys,
            values,
            tag: -1,
        };

        let final_values = spec.strategy == GroupByStrategy::ReduceOnly;
        let group_by = OperatorDesc::GroupBy {
            mode: if final_values {
                GroupByMode::Complete
            } else {
                GroupByMode::Partial1
            },
            keys: spec
                .keys
                .iter()
                .enumerate()
                .map(|(i, k)| ExprDesc::key(i, k.type_info))
                .collect(),
            aggregations: spec.aggregations(|j, _| reduce_args[j].clone(), true, final_values),
            output: column_names(key_count + spec.aggregates.len()),
            grouping_sets: None,
        };
        self.shuffle(pipeline, sink, vec![group_by])?;

        if !final_values {
            self.plan_final_group_by(spec, pipeline)?;
        }
        Ok(())
    }

    /// SingleJob, AdditionalJob and SkewTwoJob: hash aggregation on the map
    /// side, partial state is shuffled.
    fn plan_map_side_group_by(&mut self, spec: &GroupBySpec, pipeline: &mut Pipeline) -> Result<()> {
        let key_count = spec.keys.len();
        let sets_on_map =
            spec.grouping_sets.is_some() && spec.strategy != GroupByStrategy::AdditionalJob;

        let mut hash_keys = spec.keys.clone();
        if sets_on_map {
            hash_keys.push(grouping_id_placeholder());
        }
        hash_keys.extend(spec.distinct_columns.iter().cloned());
        let hash_width = hash_keys.len();

        pipeline.job.push(OperatorDesc::GroupBy {
            mode: GroupByMode::Hash,
            keys: hash_keys.clone(),
            aggregations: spec.aggregations(|_, a| a.args.clone(), true, false),
            output: column_names(hash_width + spec.aggregates.len()),
            grouping_sets: if sets_on_map {
                spec.grouping_sets.clone()
            } else {
                None
            },
        })?;

        let shuffle_keys: Vec<ExprDesc> = hash_keys
            .iter()
            .enumerate()
            .map(|(i, k)| ExprDesc::new(format!("_col{}", i), k.type_info))
            .collect();
        let mut values = Vec::new();
        let mut value_index = vec![0; spec.aggregates.len()];
        for (j, aggregate) in spec.aggregates.iter().enumerate() {
            if !aggregate.distinct {
                value_index[j] = values.len();
                values.push(aggregate.partial(format!("_col{}", hash_width + j)));
            }
        }

        let group_width = key_count + usize::from(sets_on_map);
        let partitioning =
            spec.strategy
                .first_partitioning(hash_width, group_width, spec.has_distinct());
        let sink = OperatorDesc::ReduceSink {
            sort_order: "+".repeat(hash_width),
            partition_cols: partition_columns(partitioning, &shuffle_keys),
            keys: shuffle_keys,
            values,
            tag: -1,
        };

        let mut reduce_keys: Vec<ExprDesc> = spec
            .keys
            .iter()
            .enumerate()
            .map(|(i, k)| ExprDesc::key(i, k.type_info))
            .collect();
        let reduce_sets = if spec.strategy == GroupByStrategy::AdditionalJob {
            reduce_keys.push(grouping_id_placeholder());
            spec.grouping_sets.clone()
        } else {
            if sets_on_map {
                reduce_keys.push(ExprDesc::key(key_count, TypeInfo::String));
            }
            None
        };

        let final_values = spec.strategy == GroupByStrategy::SingleJob;
        let aggregations = spec.aggregations(
            |j, a| {
                if a.distinct {
                    a.args
                        .iter()
                        .map(|arg| {
                            ExprDesc::key(group_width + spec.distinct_index(arg), arg.type_info)
                        })
                        .collect()
                } else {
                    let value = ExprDesc::value(value_index[j], a.partial_type)
                        .with_type_name(a.partial_type_name.clone());
                    vec![value]
                }
            },
            true,
            final_values,
        );
        let group_by = OperatorDesc::GroupBy {
            mode: if final_values {
                GroupByMode::MergePartial
            } else {
                GroupByMode::Partials
            },
            output: column_names(reduce_keys.len() + spec.aggregates.len()),
            keys: reduce_keys,
            aggregations,
            grouping_sets: reduce_sets,
        };
        self.shuffle(pipeline, sink, vec![group_by])?;

        if !final_values {
            self.plan_final_group_by(spec, pipeline)?;
        }
        Ok(())
    }

    /// Second job of the two-job strategies: partial state to final values.
    fn plan_final_group_by(&mut self, spec: &GroupBySpec, pipeline: &mut Pipeline) -> Result<()> {
        let group_width = spec.group_width();
        let key_types = spec.key_types();

        let shuffle_keys: Vec<ExprDesc> = key_types
            .iter()
            .enumerate()
            .map(|(i, t)| ExprDesc::new(format!("_col{}", i), *t))
            .collect();
        let values = spec
            .aggregates
            .iter()
            .enumerate()
            .map(|(j, a)| a.partial(format!("_col{}", group_width + j)))
            .collect();
        let sink = OperatorDesc::ReduceSink {
            sort_order: "+".repeat(group_width),
            partition_cols: shuffle_keys.clone(),
            keys: shuffle_keys,
            values,
            tag: -1,
        };

        let group_by = OperatorDesc::GroupBy {
            mode: GroupByMode::Final,
            keys: key_types
                .iter()
                .enumerate()
                .map(|(i, t)| ExprDesc::key(i, *t))
                .collect(),
            aggregations: spec.aggregations(
                |j, a| {
                    vec![ExprDesc::value(j, a.partial_type)
                        .with_type_name(a.partial_type_name.clone())]
                },
                false,
                true,
            ),
            output: column_names(group_width + spec.aggregates.len()),
            grouping_sets: None,
        };
        self.shuffle(pipeline, sink, vec![group_by])
    }

    fn plan_select(&self, items: &[SelectItem], pipeline: &mut Pipeline) -> Result<()> {
        let mut expanded: Vec<SelectItem> = Vec::with_capacity(items.len());
        for item in items {
            if item.expr == Expr::Star && !pipeline.row.aggregated {
                for column in &pipeline.row.columns {
                    if let Some(name) = &column.name {
                        expanded.push(SelectItem::new(Expr::Column {
                            qualifier: column.qualifier.clone(),
                            name: name.clone(),
                        }));
                    }
                }
            } else {
                expanded.push(item.clone());
            }
        }

        let mut exprs = Vec::with_capacity(expanded.len());
        let mut columns = Vec::with_capacity(expanded.len());
        for (i, item) in expanded.iter().enumerate() {
            let desc = self.describe(&item.expr, &pipeline.row)?;
            let name = match (&item.alias, &item.expr) {
                (Some(alias), _) => alias.to_ascii_lowercase(),
                (None, Expr::Column { name, .. }) => name.to_ascii_lowercase(),
                (None, _) => format!("_c{}", i),
            };
            columns.push(ColumnInfo {
                internal: format!("_col{}", i),
                type_info: desc.type_info,
                type_name: None,
                qualifier: None,
                name: Some(name),
                source: Some(item.expr.clone()),
            });
            exprs.push(desc);
        }

        pipeline.job.push(OperatorDesc::Select {
            exprs,
            output: columns.iter().map(|c| c.internal.clone()).collect(),
        })?;
        pipeline.row = RowResolver {
            columns,
            aggregated: false,
        };
        Ok(())
    }

    /// ORDER BY over the select output: a single sorted shuffle.
    fn plan_order_by(&mut self, query: &QueryBlock, pipeline: &mut Pipeline) -> Result<()> {
        let mut keys = Vec::with_capacity(query.order_by.len());
        let mut sort_order = String::with_capacity(query.order_by.len());
        for item in &query.order_by {
            let column = match &item.expr {
                Expr::Column { qualifier, name } => pipeline
                    .row
                    .find_source(&item.expr)
                    .or(pipeline.row.resolve_column(qualifier.as_deref(), name)?),
                other => pipeline.row.find_source(other),
            }
            .ok_or_else(|| PlanError::ColumnNotFound(item.expr.to_string()))?;
            keys.push(column.desc());
            sort_order.push(if item.ascending { '+' } else { '-' });
        }

        let sink = OperatorDesc::ReduceSink {
            keys,
            sort_order,
            partition_cols: Vec::new(),
            values: pipeline.row.columns.iter().map(ColumnInfo::desc).collect(),
            tag: -1,
        };
        let mut reduce = vec![OperatorDesc::Extract];
        if let Some(limit) = query.limit {
            reduce.push(OperatorDesc::Limit { limit });
        }
        self.shuffle(pipeline, sink, reduce)
    }

    /// Add a ReduceSink and open a reduce side, closing the current job first
    /// if it already has one.
    fn shuffle(
        &mut self,
        pipeline: &mut Pipeline,
        sink: OperatorDesc,
        reduce: Vec<OperatorDesc>,
    ) -> Result<()> {
        if pipeline.job.reduce.is_some() {
            let job = std::mem::take(&mut pipeline.job);
            let stage = self.close_job(job, FileSinkKind::Intermediate)?;
            pipeline.job = Job {
                map: vec![(self.intermediate_alias(), vec![sink])],
                reduce: Some(reduce),
                depends_on: BTreeSet::from([stage]),
            };
        } else {
            pipeline.job.push(sink)?;
            pipeline.job.reduce = Some(reduce);
        }
        Ok(())
    }

    /// Finish a job with a FileOutput and add it as the next stage.
    fn close_job(&mut self, mut job: Job, destination: FileSinkKind) -> Result<u32> {
        job.push(OperatorDesc::FileOutput {
            destination,
            compressed: false,
        })?;

        let mut map = Vec::with_capacity(job.map.len());
        for (alias, ops) in job.map {
            let tree = Operator::chain(ops)
                .ok_or_else(|| PlanError::Internal(format!("empty map tree for {}", alias)))?;
            map.push((alias, tree));
        }
        let reduce = job.reduce.and_then(Operator::chain);

        let id = self.next_stage_id;
        self.next_stage_id += 1;
        info!(
            stage = %format!("Stage-{}", id),
            map_inputs = ?map.iter().map(|(a, _)| a.as_str()).collect::<Vec<_>>(),
            has_reduce = reduce.is_some(),
            depends_on = ?job.depends_on,
            "Created MapReduce stage"
        );
        self.plan.add_stage(
            Stage {
                id,
                work: StageWork::MapReduce(MapRedWork { map, reduce }),
            },
            job.depends_on,
        );
        Ok(id)
    }

    fn intermediate_alias(&mut self) -> String {
        let alias = if self.intermediates == 0 {
            "$INTNAME".to_string()
        } else {
            format!("$INTNAME{}", self.intermediates)
        };
        self.intermediates += 1;
        alias
    }

    fn aggregate_info(&self, expr: Expr, row: &RowResolver) -> Result<AggregateInfo> {
        let Expr::Aggregate {
            name,
            args,
            distinct,
        } = &expr
        else {
            return Err(PlanError::Internal(format!("not an aggregate: {}", expr)).into());
        };
        let args = args
            .iter()
            .map(|a| self.describe_scalar(a, row))
            .collect::<Result<Vec<_>>>()?;
        if *distinct && args.is_empty() {
            return Err(PlanError::UnknownFunction(expr.to_string()).into());
        }

        let output_type = aggregate_output_type(name, &args)?;
        let (partial_type, partial_type_name) = match name.as_str() {
            "count" => (TypeInfo::Long, TypeInfo::Long.to_string()),
            "avg" => {
                let sum = match output_type {
                    TypeInfo::Decimal { scale, .. } => TypeInfo::decimal(38, scale as u32),
                    _ => TypeInfo::Double,
                };
                (output_type, format!("struct<count:bigint,sum:{}>", sum))
            }
            _ => (output_type, output_type.to_string()),
        };

        Ok(AggregateInfo {
            name: name.clone(),
            args,
            distinct: *distinct,
            output_type,
            partial_type,
            partial_type_name,
            source: expr,
        })
    }

    /// Describe an expression in which aggregate calls are not allowed.
    fn describe_scalar(&self, expr: &Expr, row: &RowResolver) -> Result<ExprDesc> {
        if expr.contains_aggregate() {
            return Err(PlanError::AggregateNotAllowed(expr.to_string()).into());
        }
        self.describe(expr, row)
    }

    /// Resolve an expression against a row.
    fn describe(&self, expr: &Expr, row: &RowResolver) -> Result<ExprDesc> {
        if let Some(column) = row.find_source(expr) {
            return Ok(column.desc());
        }

        match expr {
            Expr::Column { qualifier, name } => {
                match row.resolve_column(qualifier.as_deref(), name)? {
                    Some(column) => Ok(column.desc()),
                    None if row.aggregated => {
                        Err(PlanError::ExpressionNotInGroupBy(expr.to_string()).into())
                    }
                    None => Err(PlanError::ColumnNotFound(expr.to_string()).into()),
                }
            }
            Expr::Literal { value } => Ok(ExprDesc::new(literal_text(value), value.type_info())),
            Expr::Function { name, args } => {
                let descs = args
                    .iter()
                    .map(|a| self.describe(a, row))
                    .collect::<Result<Vec<_>>>()?;
                let inspectors: Vec<ObjectInspector> = args
                    .iter()
                    .zip(&descs)
                    .map(|(arg, desc)| match arg {
                        Expr::Literal { value } => {
                            ObjectInspector::typed_constant(desc.type_info, value.clone())
                        }
                        _ => ObjectInspector::new(desc.type_info),
                    })
                    .collect();
                let (udf, output) = self
                    .planner
                    .functions
                    .resolve(name, &inspectors)
                    .map_err(|e| match e {
                        Error::Udf(UdfError::UnknownFunction(_)) => {
                            PlanError::UnknownFunction(name.clone()).into()
                        }
                        other => other,
                    })?;
                let children: Vec<String> = descs.into_iter().map(|d| d.expr).collect();
                Ok(ExprDesc::new(udf.display_string(&children), output))
            }
            Expr::Aggregate { .. } => match row.find_source(&normalize_aggregate(expr)) {
                Some(column) => Ok(column.desc()),
                None => Err(PlanError::AggregateNotAllowed(expr.to_string()).into()),
            },
            Expr::Binary { op, left, right } => {
                let left = self.describe(left, row)?;
                let right = self.describe(right, row)?;
                let type_info = if op.is_predicate() {
                    TypeInfo::Boolean
                } else {
                    arithmetic_type(*op, left.type_info, right.type_info)
                };
                Ok(ExprDesc::new(
                    format!("({} {} {})", left.expr, op.symbol(), right.expr),
                    type_info,
                ))
            }
            Expr::Not { expr: inner } => {
                let inner = self.describe(inner, row)?;
                Ok(ExprDesc::new(format!("not {}", inner.expr), TypeInfo::Boolean))
            }
            Expr::IsNull { expr: inner } => {
                let inner = self.describe(inner, row)?;
                Ok(ExprDesc::new(
                    format!("{} is null", inner.expr),
                    TypeInfo::Boolean,
                ))
            }
            Expr::Star if row.aggregated => {
                Err(PlanError::ExpressionNotInGroupBy("*".to_string()).into())
            }
            Expr::Star => Err(PlanError::ColumnNotFound("*".to_string()).into()),
            Expr::GroupingId => Err(PlanError::ColumnNotFound("GROUPING__ID".to_string()).into()),
        }
    }
}

/// Group keys, grouping id and aggregates as `_col0..`.
fn group_by_output_row(
    key_exprs: &[Expr],
    keys: &[ExprDesc],
    aggregates: &[AggregateInfo],
    has_grouping_id: bool,
    input: &RowResolver,
) -> Result<RowResolver> {
    let mut columns = Vec::new();
    for (expr, desc) in key_exprs.iter().zip(keys) {
        let (qualifier, name) = match expr {
            Expr::Column { qualifier, name } => {
                match input.resolve_column(qualifier.as_deref(), name)? {
                    Some(c) => (c.qualifier.clone(), c.name.clone()),
                    None => (None, None),
                }
            }
            _ => (None, None),
        };
        columns.push(ColumnInfo {
            internal: format!("_col{}", columns.len()),
            type_info: desc.type_info,
            type_name: None,
            qualifier,
            name,
            source: Some(expr.clone()),
        });
    }
    if has_grouping_id {
        columns.push(ColumnInfo {
            internal: format!("_col{}", columns.len()),
            type_info: TypeInfo::String,
            type_name: None,
            qualifier: None,
            name: Some("grouping__id".to_string()),
            source: Some(Expr::GroupingId),
        });
    }
    for aggregate in aggregates {
        columns.push(ColumnInfo {
            internal: format!("_col{}", columns.len()),
            type_info: aggregate.output_type,
            type_name: None,
            qualifier: None,
            name: None,
            source: Some(aggregate.source.clone()),
        });
    }
    Ok(RowResolver {
        columns,
        aggregated: true,
    })
}

/// `count(*)` and `count()` are the same call; names are case-insensitive.
fn normalize_aggregate(expr: &Expr) -> Expr {
    match expr {
        Expr::Aggregate {
            name,
            args,
            distinct,
        } => Expr::Aggregate {
            name: name.to_ascii_lowercase(),
            args: if args.as_slice() == [Expr::Star] {
                Vec::new()
            } else {
                args.clone()
            },
            distinct: *distinct,
        },
        other => other.clone(),
    }
}

/// Distinct aggregate calls of a select list, in order of appearance.
fn collect_aggregates(select: &[SelectItem]) -> Vec<Expr> {
    let mut found = Vec::new();
    for item in select {
        item.expr.visit(&mut |e| {
            if e.is_aggregate() {
                let normalized = normalize_aggregate(e);
                if !found.contains(&normalized) {
                    found.push(normalized);
                }
            }
        });
    }
    found
}

fn aggregate_output_type(name: &str, args: &[ExprDesc]) -> Result<TypeInfo> {
    if name == "count" {
        return Ok(TypeInfo::Long);
    }
    let arg = match args {
        [arg] => arg.type_info,
        _ => {
            return Err(PlanError::UnknownFunction(format!(
                "{} with {} arguments",
                name,
                args.len()
            ))
            .into())
        }
    };
    let numeric_like = arg.is_numeric() || arg.is_string_family() || arg == TypeInfo::Void;
    match name {
        "sum" if arg.is_integral() => Ok(TypeInfo::Long),
        "sum" => match arg {
            TypeInfo::Decimal { scale, .. } => Ok(TypeInfo::decimal(38, scale as u32)),
            _ if numeric_like => Ok(TypeInfo::Double),
            _ => Err(PlanError::UnknownFunction(format!("sum({})", arg)).into()),
        },
        "avg" => match arg {
            TypeInfo::Decimal { precision, scale } => Ok(TypeInfo::decimal(
                precision as u32 + 4,
                scale as u32 + 4,
            )),
            _ if numeric_like => Ok(TypeInfo::Double),
            _ => Err(PlanError::UnknownFunction(format!("avg({})", arg)).into()),
        },
        "min" | "max" => Ok(arg),
        other => Err(PlanError::UnknownFunction(other.to_string()).into()),
    }
}

fn arithmetic_type(op: BinaryOp, left: TypeInfo, right: TypeInfo) -> TypeInfo {
    fn rank(t: TypeInfo) -> u8 {
        match t {
            TypeInfo::Byte => 1,
            TypeInfo::Short => 2,
            TypeInfo::Int => 3,
            _ => 4,
        }
    }

    match (left, right) {
        _ if op == BinaryOp::Divide => TypeInfo::Double,
        (l, r) if l.is_integral() && r.is_integral() => {
            if rank(l) >= rank(r) {
                l
            } else {
                r
            }
        }
        (TypeInfo::Decimal { scale: a, .. }, TypeInfo::Decimal { scale: b, .. }) => {
            TypeInfo::decimal(38, a.max(b) as u32)
        }
        (TypeInfo::Decimal { scale, .. }, other) | (other, TypeInfo::Decimal { scale, .. })
            if other.is_integral() =>
        {
            TypeInfo::decimal(38, scale as u32)
        }
        _ => TypeInfo::Double,
    }
}

fn literal_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

/// The `'0'` key that map-side grouping-set expansion fills with the mask.
fn grouping_id_placeholder() -> ExprDesc {
    ExprDesc::new("'0'", TypeInfo::String)
}

fn column_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("_col{}", i)).collect()
}

fn partition_columns(partitioning: Partitioning, keys: &[ExprDesc]) -> Vec<ExprDesc> {
    match partitioning {
        Partitioning::Keys(count) => keys.iter().take(count).cloned().collect(),
        Partitioning::Random => vec![ExprDesc::new("rand()", TypeInfo::Double)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metastore::{FieldSchema, InMemoryMetastore, MetastoreHandler, Table};
    use crate::plan::query::{agg, col, count_star, func, lit, qcol, GroupByClause, OrderByItem};

    fn metastore() -> InMemoryMetastore {
        let metastore = InMemoryMetastore::new("/tmp/warehouse");
        metastore
            .create_table(&Table::new(
                "default",
                "t1",
                vec![
                    FieldSchema::new("a", "string"),
                    FieldSchema::new("b", "string"),
                    FieldSchema::new("c", "int"),
                ],
            ))
            .unwrap();
        metastore
            .create_table(&Table::new(
                "default",
                "t2",
                vec![
                    FieldSchema::new("a", "string"),
                    FieldSchema::new("d", "decimal(10,2)"),
                ],
            ))
            .unwrap();
        metastore
    }

    fn group_by_ab(modifier: fn(GroupByClause) -> GroupByClause) -> QueryBlock {
        QueryBlock::new(
            FromClause::table("t1"),
            vec![col("a").into(), col("b").into(), count_star().into()],
        )
        .group_by(modifier(GroupByClause::new(vec![col("a"), col("b")])))
    }

    fn reduce_group_by(plan: &StagePlan, stage: u32) -> OperatorDesc {
        let work = plan.stage(stage).unwrap().map_reduce().unwrap();
        work.reduce
            .as_ref()
            .unwrap()
            .find(|d| matches!(d, OperatorDesc::GroupBy { .. }))
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_cube_single_job() {
        let ms = metastore();
        let planner = QueryPlanner::new(&ms, PlannerConfig::default());
        let plan = planner.plan(&group_by_ab(GroupByClause::with_cube)).unwrap();

        assert_eq!(plan.stages().len(), 2);
        let work = plan.stage(1).unwrap().map_reduce().unwrap();
        let map = work.map_tree("t1").unwrap();
        assert_eq!(
            map.names(),
            vec![
                "TableScan",
                "Select Operator",
                "Group By Operator",
                "Reduce Output Operator"
            ]
        );
        let Some(OperatorDesc::GroupBy {
            mode,
            keys,
            grouping_sets,
            ..
        }) = map.find(|d| matches!(d, OperatorDesc::GroupBy { .. }))
        else {
            panic!("missing hash group by");
        };
        assert_eq!(*mode, GroupByMode::Hash);
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[2].expr, "'0'");
        assert_eq!(grouping_sets.as_deref(), Some(&[0, 1, 2, 3][..]));

        let Some(OperatorDesc::ReduceSink { partition_cols, .. }) =
            map.find(OperatorDesc::is_reduce_sink)
        else {
            panic!("missing reduce sink");
        };
        assert_eq!(partition_cols.len(), 3);

        let OperatorDesc::GroupBy {
            mode, aggregations, ..
        } = reduce_group_by(&plan, 1)
        else {
            unreachable!()
        };
        assert_eq!(mode, GroupByMode::MergePartial);
        assert_eq!(aggregations[0].to_string(), "count(VALUE._col0)");
    }

    #[test]
    fn test_additional_job_over_cardinality() {
        let ms = metastore();
        let config = PlannerConfig {
            new_job_grouping_set_cardinality: 2,
            ..Default::default()
        };
        let metrics = Arc::new(PlannerMetrics::new().unwrap());
        let planner = QueryPlanner::new(&ms, config).with_metrics(metrics.clone());
        let plan = planner.plan(&group_by_ab(GroupByClause::with_cube)).unwrap();

        assert_eq!(plan.stages().len(), 3);
        assert_eq!(plan.dependencies_of(2), vec![1]);
        let first = plan.stage(1).unwrap().map_reduce().unwrap();
        let Some(OperatorDesc::GroupBy { grouping_sets, keys, .. }) = first
            .map_tree("t1")
            .unwrap()
            .find(|d| matches!(d, OperatorDesc::GroupBy { .. }))
        else {
            panic!("missing hash group by");
        };
        assert!(grouping_sets.is_none());
        assert_eq!(keys.len(), 2);

        let OperatorDesc::GroupBy {
            mode,
            grouping_sets,
            ..
        } = reduce_group_by(&plan, 1)
        else {
            unreachable!()
        };
        assert_eq!(mode, GroupByMode::Partials);
        assert_eq!(grouping_sets, Some(vec![0, 1, 2, 3]));

        let second = plan.stage(2).unwrap().map_reduce().unwrap();
        assert_eq!(second.map_aliases(), vec!["$INTNAME"]);
        let OperatorDesc::GroupBy { mode, .. } = reduce_group_by(&plan, 2) else {
            unreachable!()
        };
        assert_eq!(mode, GroupByMode::Final);

        assert_eq!(metrics.additional_jobs_total(), 1);
        assert_eq!(metrics.plans_total(), 1);
    }

    #[test]
    fn test_skew_partitions_randomly() {
        let ms = metastore();
        let config = PlannerConfig {
            groupby_skewindata: true,
            ..Default::default()
        };
        let plan = QueryPlanner::new(&ms, config)
            .plan(&group_by_ab(GroupByClause::with_rollup))
            .unwrap();
        let first = plan.stage(1).unwrap().map_reduce().unwrap();
        let Some(OperatorDesc::ReduceSink { partition_cols, .. }) =
            first.map_tree("t1").unwrap().find(OperatorDesc::is_reduce_sink)
        else {
            panic!("missing reduce sink");
        };
        assert_eq!(partition_cols.len(), 1);
        assert_eq!(partition_cols[0].expr, "rand()");
        assert_eq!(plan.stages().len(), 3);
    }

    #[test]
    fn test_reduce_only_with_distinct() {
        let ms = metastore();
        let config = PlannerConfig {
            map_aggr: false,
            ..Default::default()
        };
        let query = QueryBlock::new(
            FromClause::table("t1"),
            vec![
                col("a").into(),
                crate::plan::query::agg_distinct("count", col("b")).into(),
            ],
        )
        .group_by(GroupByClause::new(vec![col("a")]));
        let plan = QueryPlanner::new(&ms, config).plan(&query).unwrap();

        let work = plan.stage(1).unwrap().map_reduce().unwrap();
        let Some(OperatorDesc::ReduceSink {
            keys,
            partition_cols,
            ..
        }) = work.map_tree("t1").unwrap().find(OperatorDesc::is_reduce_sink)
        else {
            panic!("missing reduce sink");
        };
        assert_eq!(keys.len(), 2);
        assert_eq!(partition_cols.len(), 1);

        let OperatorDesc::GroupBy {
            mode, aggregations, ..
        } = reduce_group_by(&plan, 1)
        else {
            unreachable!()
        };
        assert_eq!(mode, GroupByMode::Complete);
        assert_eq!(aggregations[0].to_string(), "count(DISTINCT KEY._col1)");
    }

    #[test]
    fn test_aggregate_output_types() {
        let ms = metastore();
        let query = QueryBlock::new(
            FromClause::table("t2"),
            vec![
                col("a").into(),
                agg("sum", col("d")).into(),
                agg("avg", col("d")).into(),
                agg("max", col("a")).into(),
            ],
        )
        .group_by(GroupByClause::new(vec![col("a")]));
        let plan = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&query)
            .unwrap();
        let OperatorDesc::GroupBy { aggregations, .. } = reduce_group_by(&plan, 1) else {
            unreachable!()
        };
        assert_eq!(aggregations[0].output_type, TypeInfo::decimal(38, 2));
        assert_eq!(aggregations[1].output_type, TypeInfo::decimal(14, 6));
        assert_eq!(aggregations[2].output_type, TypeInfo::String);
    }

    #[test]
    fn test_select_must_reference_keys() {
        let ms = metastore();
        let query = QueryBlock::new(
            FromClause::table("t1"),
            vec![col("a").into(), col("c").into(), count_star().into()],
        )
        .group_by(GroupByClause::new(vec![col("a")]));
        let err = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&query)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Plan(PlanError::ExpressionNotInGroupBy(ref e)) if e == "c"
        ));
    }

    #[test]
    fn test_grouping_id_and_functions_of_keys() {
        let ms = metastore();
        let query = QueryBlock::new(
            FromClause::table_as("t1", "x"),
            vec![
                qcol("x", "a").into(),
                Expr::GroupingId.into(),
                func("round", vec![agg("sum", col("c")), lit(Value::Int(1))]).into(),
            ],
        )
        .group_by(GroupByClause::new(vec![col("a")]).with_rollup());
        let plan = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&query)
            .unwrap();
        let reduce = plan.stage(1).unwrap().map_reduce().unwrap().reduce.as_ref().unwrap();
        let Some(OperatorDesc::Select { exprs, .. }) =
            reduce.find(|d| matches!(d, OperatorDesc::Select { .. }))
        else {
            panic!("missing select");
        };
        let texts: Vec<&str> = exprs.iter().map(|e| e.expr.as_str()).collect();
        assert_eq!(texts, vec!["_col0", "_col1", "round(_col2, 1)"]);
        assert_eq!(exprs[1].type_info, TypeInfo::String);
        assert_eq!(exprs[2].type_info, TypeInfo::Long);
    }

    #[test]
    fn test_aggregate_in_where_rejected() {
        let ms = metastore();
        let query = QueryBlock::new(FromClause::table("t1"), vec![col("a").into()])
            .filter(count_star().gt(lit(Value::Int(1))));
        let err = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&query)
            .unwrap_err();
        assert!(matches!(err, Error::Plan(PlanError::AggregateNotAllowed(_))));
    }

    #[test]
    fn test_order_by_after_group_by_adds_stage() {
        let ms = metastore();
        let query = group_by_ab(|g| g)
            .order_by(vec![OrderByItem::desc(col("a"))])
            .limit(5);
        let plan = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&query)
            .unwrap();
        assert_eq!(plan.stages().len(), 3);
        let sort = plan.stage(2).unwrap().map_reduce().unwrap();
        let Some(OperatorDesc::ReduceSink {
            sort_order,
            partition_cols,
            values,
            ..
        }) = sort.map_tree("$INTNAME").unwrap().find(OperatorDesc::is_reduce_sink)
        else {
            panic!("missing reduce sink");
        };
        assert_eq!(sort_order, "-");
        assert!(partition_cols.is_empty());
        assert_eq!(values.len(), 3);
        assert_eq!(
            sort.reduce.as_ref().unwrap().names(),
            vec!["Extract", "Limit", "File Output Operator"]
        );
        assert_eq!(
            plan.stage(FETCH_STAGE_ID).unwrap().work,
            StageWork::Fetch { limit: Some(5) }
        );
    }

    #[test]
    fn test_unknown_function() {
        let ms = metastore();
        let query = QueryBlock::new(
            FromClause::table("t1"),
            vec![func("no_such_fn", vec![col("a")]).into()],
        );
        let err = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&query)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Plan(PlanError::UnknownFunction(ref f)) if f == "no_such_fn"
        ));
    }

    #[test]
    fn test_planner_over_dyn_handler() {
        let ms: Arc<dyn MetastoreHandler> = Arc::new(metastore());
        let query = QueryBlock::new(FromClause::table("t1"), vec![Expr::Star.into()]);
        let plan = QueryPlanner::new(ms.as_ref(), PlannerConfig::default())
            .plan(&query)
            .unwrap();
        let work = plan.stage(1).unwrap().map_reduce().unwrap();
        assert!(work.reduce.is_none());
        let Some(OperatorDesc::Select { output, .. }) = work
            .map_tree("t1")
            .unwrap()
            .find(|d| matches!(d, OperatorDesc::Select { .. }))
        else {
            panic!("missing select");
        };
        assert_eq!(output.len(), 3);
    }

    fn join_t1_t2(on: Expr, select: Vec<SelectItem>) -> QueryBlock {
        QueryBlock::new(
            FromClause::join(
                FromClause::table("t1"),
                FromClause::table("t2"),
                JoinKind::Inner,
                on,
            ),
            select,
        )
    }

    fn grouped_by_a(table: &str) -> QueryBlock {
        QueryBlock::new(
            FromClause::table(table),
            vec![col("a").into(), count_star().into()],
        )
        .group_by(GroupByClause::new(vec![col("a")]))
    }

    fn reduce_sink(work: &MapRedWork, alias: &str) -> (Vec<ExprDesc>, Vec<ExprDesc>, i32) {
        let Some(OperatorDesc::ReduceSink {
            keys,
            partition_cols,
            tag,
            ..
        }) = work.map_tree(alias).unwrap().find(OperatorDesc::is_reduce_sink)
        else {
            panic!("missing reduce sink for {}", alias);
        };
        (keys.clone(), partition_cols.clone(), *tag)
    }

    #[test]
    fn test_join_tags_and_partitioning() {
        let ms = metastore();
        let query = join_t1_t2(
            qcol("t1", "a").eq(qcol("t2", "a")),
            vec![qcol("t1", "b").into(), qcol("t2", "d").into()],
        );
        let plan = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&query)
            .unwrap();

        assert_eq!(plan.map_reduce_stages().count(), 1);
        assert_eq!(plan.root_stages(), vec![1, 0]);
        let work = plan.stage(1).unwrap().map_reduce().unwrap();
        assert_eq!(work.map_aliases(), vec!["t1", "t2"]);
        for (expected_tag, alias) in ["t1", "t2"].into_iter().enumerate() {
            let (keys, partition_cols, tag) = reduce_sink(work, alias);
            assert_eq!(tag, expected_tag as i32);
            assert_eq!(keys.len(), 1);
            assert_eq!(partition_cols, keys);
        }

        let reduce = work.reduce.as_ref().unwrap();
        assert_eq!(
            reduce.names(),
            vec!["Join Operator", "Select Operator", "File Output Operator"]
        );
        let OperatorDesc::Join {
            conditions, exprs, ..
        } = &reduce.desc
        else {
            panic!("reduce side does not start with a join");
        };
        assert_eq!(
            conditions,
            &vec![JoinCondition {
                left: 0,
                right: 1,
                kind: JoinKind::Inner,
            }]
        );
        assert_eq!(exprs.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 2]);

        // Sides of the condition may be written in either order.
        let swapped = join_t1_t2(
            qcol("t2", "a").eq(qcol("t1", "a")),
            vec![qcol("t1", "b").into()],
        );
        let plan = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&swapped)
            .unwrap();
        let work = plan.stage(1).unwrap().map_reduce().unwrap();
        assert_eq!(reduce_sink(work, "t1").2, 0);
        assert_eq!(reduce_sink(work, "t2").2, 1);
    }

    #[test]
    fn test_join_reads_grouped_subquery_back() {
        let ms = metastore();
        let query = QueryBlock::new(
            FromClause::join(
                FromClause::subquery(grouped_by_a("t1"), "s"),
                FromClause::table("t2"),
                JoinKind::LeftOuter,
                qcol("s", "a").eq(qcol("t2", "a")),
            ),
            vec![qcol("s", "a").into(), qcol("s", "_c1").into(), qcol("t2", "d").into()],
        );
        let plan = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&query)
            .unwrap();

        assert_eq!(plan.map_reduce_stages().count(), 2);
        assert_eq!(plan.dependencies_of(2), vec![1]);
        assert_eq!(plan.root_stages(), vec![1, 0]);

        let grouped = plan.stage(1).unwrap().map_reduce().unwrap();
        assert_eq!(grouped.map_aliases(), vec!["t1"]);
        assert!(grouped
            .reduce
            .as_ref()
            .unwrap()
            .find(|d| matches!(
                d,
                OperatorDesc::FileOutput {
                    destination: FileSinkKind::Intermediate,
                    ..
                }
            ))
            .is_some());

        let join = plan.stage(2).unwrap().map_reduce().unwrap();
        assert_eq!(join.map_aliases(), vec!["$INTNAME", "t2"]);
        assert_eq!(reduce_sink(join, "$INTNAME").2, 0);
        assert_eq!(reduce_sink(join, "t2").2, 1);
        assert!(matches!(
            join.reduce.as_ref().map(|r| &r.desc),
            Some(OperatorDesc::Join { conditions, .. })
                if conditions[0].kind == JoinKind::LeftOuter
        ));

        // Both sides grouped: the join waits on both jobs.
        let query = QueryBlock::new(
            FromClause::join(
                FromClause::subquery(grouped_by_a("t1"), "x"),
                FromClause::subquery(grouped_by_a("t2"), "y"),
                JoinKind::Inner,
                qcol("x", "a").eq(qcol("y", "a")),
            ),
            vec![qcol("x", "a").into(), qcol("y", "_c1").into()],
        );
        let plan = QueryPlanner::new(&ms, PlannerConfig::default())
            .plan(&query)
            .unwrap();
        assert_eq!(plan.map_reduce_stages().count(), 3);
        assert_eq!(plan.dependencies_of(3), vec![1, 2]);
        let join = plan.stage(3).unwrap().map_reduce().unwrap();
        assert_eq!(join.map_aliases(), vec!["$INTNAME", "$INTNAME1"]);
        plan.validate().unwrap();
    }

    #[test]
    fn test_join_requires_equality_conditions() {
        let ms = metastore();
        let planner = QueryPlanner::new(&ms, PlannerConfig::default());

        let range = join_t1_t2(
            qcol("t1", "c").lt(lit(Value::Int(3))),
            vec![qcol("t1", "b").into()],
        );
        let err = planner.plan(&range).unwrap_err();
        assert!(matches!(
            err,
            Error::Plan(PlanError::InvalidJoinCondition(_))
        ));

        let mixed = join_t1_t2(
            qcol("t1", "a")
                .eq(qcol("t2", "a"))
                .and(qcol("t1", "c").lt(lit(Value::Int(3)))),
            vec![qcol("t1", "b").into()],
        );
        let err = planner.plan(&mixed).unwrap_err();
        assert!(matches!(
            err,
            Error::Plan(PlanError::InvalidJoinCondition(_))
        ));
    }

    #[test]
    fn test_join_output_column_must_be_unambiguous() {
        let ms = metastore();
        let planner = QueryPlanner::new(&ms, PlannerConfig::default());

        let query = join_t1_t2(qcol("t1", "a").eq(qcol("t2", "a")), vec![col("a").into()]);
        let err = planner.plan(&query).unwrap_err();
        assert!(matches!(
            err,
            Error::Plan(PlanError::AmbiguousColumn(ref c)) if c == "a"
        ));

        // Unqualified columns present on one side only resolve.
        let query = join_t1_t2(
            qcol("t1", "a").eq(qcol("t2", "a")),
            vec![col("b").into(), col("d").into()],
        );
        planner.plan(&query).unwrap();
    }

    #[test]
    fn test_self_join_needs_distinct_aliases() {
        let ms = metastore();
        let planner = QueryPlanner::new(&ms, PlannerConfig::default());

        let query = QueryBlock::new(
            FromClause::join(
                FromClause::table("t1"),
                FromClause::table("t1"),
                JoinKind::Inner,
                qcol("t1", "a").eq(qcol("t1", "a")),
            ),
            vec![Expr::Star.into()],
        );
        let err = planner.plan(&query).unwrap_err();
        assert!(matches!(
            err,
            Error::Plan(PlanError::DuplicateAlias(ref a)) if a == "t1"
        ));

        let query = QueryBlock::new(
            FromClause::join(
                FromClause::table_as("t1", "x"),
                FromClause::table_as("t1", "y"),
                JoinKind::Inner,
                qcol("x", "a").eq(qcol("y", "a")),
            ),
            vec![qcol("x", "b").into(), qcol("y", "c").into()],
        );
        let plan = planner.plan(&query).unwrap();
        let work = plan.stage(1).unwrap().map_reduce().unwrap();
        assert_eq!(work.map_aliases(), vec!["x", "y"]);

        // Map-only subqueries scan under `alias:table`.
        let scan_a = |alias: &str| {
            FromClause::subquery(
                QueryBlock::new(FromClause::table("t1"), vec![col("a").into()]),
                alias,
            )
        };
        let query = QueryBlock::new(
            FromClause::join(
                scan_a("l"),
                scan_a("r"),
                JoinKind::Inner,
                qcol("l", "a").eq(qcol("r", "a")),
            ),
            vec![qcol("l", "a").into()],
        );
        let plan = planner.plan(&query).unwrap();
        let work = plan.stage(1).unwrap().map_reduce().unwrap();
        assert_eq!(work.map_aliases(), vec!["l:t1", "r:t1"]);
    }
}
