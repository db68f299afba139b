//! Prometheus metrics export.

use crate::{Error, PlanError, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Histogram bucket boundaries in seconds for plan duration.
const PLAN_DURATION_BUCKETS: [f64; 7] = [0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5];

/// Failure categories for labeled plan metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanFailureKind {
    /// Unknown tables, columns or functions
    Resolution,
    /// Grouping-set validation and stage-splitting errors
    GroupingSets,
    /// Join condition errors
    Join,
    /// Everything else
    Other,
}

impl PlanFailureKind {
    /// All kinds, in export order.
    pub const ALL: [PlanFailureKind; 4] = [
        PlanFailureKind::Resolution,
        PlanFailureKind::GroupingSets,
        PlanFailureKind::Join,
        PlanFailureKind::Other,
    ];

    /// Get the label value for Prometheus export.
    pub fn as_label(&self) -> &'static str {
        match self {
            PlanFailureKind::Resolution => "resolution",
            PlanFailureKind::GroupingSets => "grouping_sets",
            PlanFailureKind::Join => "join",
            PlanFailureKind::Other => "other",
        }
    }

    /// Categorize a planning error.
    pub fn of(err: &Error) -> Self {
        match err {
            Error::Plan(plan) => match plan {
                PlanError::TableNotFound(_)
                | PlanError::ColumnNotFound(_)
                | PlanError::AmbiguousColumn(_)
                | PlanError::ExpressionNotInGroupBy(_)
                | PlanError::AggregateNotAllowed(_)
                | PlanError::UnknownFunction(_) => PlanFailureKind::Resolution,
                PlanError::GroupingSetsEmpty
                | PlanError::GroupingSetExprNotInGroupBy(_)
                | PlanError::TooManyGroupingKeys { .. }
                | PlanError::TooManyGroupingSets { .. }
                | PlanError::GroupingSetsAggrExpressionInvalid
                | PlanError::GroupingSetsNoMapAggr
                | PlanError::GroupingSetsMultiGroupBySingleReducer
                | PlanError::GroupingSetsThresholdWithSkew(_)
                | PlanError::GroupingSetsThresholdWithDistinct(_) => PlanFailureKind::GroupingSets,
                PlanError::InvalidJoinCondition(_) | PlanError::DuplicateAlias(_) => {
                    PlanFailureKind::Join
                }
                _ => PlanFailureKind::Other,
            },
            Error::Udf(_) => PlanFailureKind::Resolution,
            _ => PlanFailureKind::Other,
        }
    }
}

/// Planner, operation and metastore metrics backed by a prometheus registry.
pub struct PlannerMetrics {
    registry: Registry,

    /// Plans built successfully
    plans_total: IntCounter,
    /// Plan failures by kind
    plan_failures: IntCounterVec,
    /// MapReduce stages generated
    stages_total: IntCounter,
    /// Group-bys that needed an additional job for grouping sets
    additional_jobs_total: IntCounter,
    /// Grouping sets expanded across all plans
    grouping_sets_total: IntCounter,
    /// Metadata operations by type
    operations: IntCounterVec,
    /// Metastore calls by name
    metastore_calls: IntCounterVec,
    /// Time spent planning
    plan_duration: Histogram,
}

impl PlannerMetrics {
    /// Create metrics registered under the `hql` prefix.
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("hql".to_string()), None)?;

        let plans_total = IntCounter::with_opts(Opts::new(
            "plans_total",
            "Total query plans built",
        ))?;
        let plan_failures = IntCounterVec::new(
            Opts::new("plan_failures_total", "Query plans rejected, by failure kind"),
            &["kind"],
        )?;
        let stages_total = IntCounter::with_opts(Opts::new(
            "stages_total",
            "Total MapReduce stages generated",
        ))?;
        let additional_jobs_total = IntCounter::with_opts(Opts::new(
            "grouping_set_additional_jobs_total",
            "Group-bys split into an additional job because of grouping set cardinality",
        ))?;
        let grouping_sets_total = IntCounter::with_opts(Opts::new(
            "grouping_sets_total",
            "Total grouping sets expanded",
        ))?;
        let operations = IntCounterVec::new(
            Opts::new("operations_total", "Metadata operations run, by type"),
            &["type"],
        )?;
        let metastore_calls = IntCounterVec::new(
            Opts::new("metastore_calls_total", "Metastore calls served, by call"),
            &["call"],
        )?;
        let plan_duration = Histogram::with_opts(
            HistogramOpts::new("plan_duration_seconds", "Duration of query planning")
                .buckets(PLAN_DURATION_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(plans_total.clone()))?;
        registry.register(Box::new(plan_failures.clone()))?;
        registry.register(Box::new(stages_total.clone()))?;
        registry.register(Box::new(additional_jobs_total.clone()))?;
        registry.register(Box::new(grouping_sets_total.clone()))?;
        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(metastore_calls.clone()))?;
        registry.register(Box::new(plan_duration.clone()))?;

        // Export every failure kind from the start, even at zero.
        for kind in PlanFailureKind::ALL {
            plan_failures.with_label_values(&[kind.as_label()]);
        }

        Ok(Self {
            registry,
            plans_total,
            plan_failures,
            stages_total,
            additional_jobs_total,
            grouping_sets_total,
            operations,
            metastore_calls,
            plan_duration,
        })
    }

    // === RECORDING ===

    /// Record a successful plan with its stage count and planning time.
    pub fn record_plan(&self, stages: usize, duration: Duration) {
        self.plans_total.inc();
        self.stages_total.inc_by(stages as u64);
        self.plan_duration.observe(duration.as_secs_f64());
    }

    /// Record a rejected plan.
    pub fn record_plan_failure(&self, kind: PlanFailureKind) {
        self.plan_failures.with_label_values(&[kind.as_label()]).inc();
    }

    /// Record a group-by with grouping sets, and whether it needed an extra job.
    pub fn record_grouping_sets(&self, sets: usize, additional_job: bool) {
        self.grouping_sets_total.inc_by(sets as u64);
        if additional_job {
            self.additional_jobs_total.inc();
        }
    }

    pub fn record_operation(&self, operation_type: &str) {
        self.operations.with_label_values(&[operation_type]).inc();
    }

    pub fn record_metastore_call(&self, call: &str) {
        self.metastore_calls.with_label_values(&[call]).inc();
    }

    // === GETTERS ===

    pub fn plans_total(&self) -> u64 {
        self.plans_total.get()
    }

    pub fn plan_failures(&self, kind: PlanFailureKind) -> u64 {
        self.plan_failures.with_label_values(&[kind.as_label()]).get()
    }

    pub fn stages_total(&self) -> u64 {
        self.stages_total.get()
    }

    pub fn additional_jobs_total(&self) -> u64 {
        self.additional_jobs_total.get()
    }

    pub fn grouping_sets_total(&self) -> u64 {
        self.grouping_sets_total.get()
    }

    pub fn operations_total(&self, operation_type: &str) -> u64 {
        self.operations.with_label_values(&[operation_type]).get()
    }

    pub fn metastore_calls_total(&self, call: &str) -> u64 {
        self.metastore_calls.with_label_values(&[call]).get()
    }

    pub fn plan_duration_count(&self) -> u64 {
        self.plan_duration.get_sample_count()
    }

    /// Export metrics in Prometheus text exposition format.
    ///
    /// # Example
    ///
    /// ```
    /// use hql_core::metrics::PlannerMetrics;
    ///
    /// let metrics = PlannerMetrics::new().unwrap();
    /// metrics.record_plan(2, std::time::Duration::from_millis(3));
    /// let text = metrics.export_prometheus_text().unwrap();
    /// assert!(text.contains("hql_plans_total 1"));
    /// ```
    pub fn export_prometheus_text(&self) -> Result<String> {
        let mut buffer = Vec::with_capacity(4096);
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
