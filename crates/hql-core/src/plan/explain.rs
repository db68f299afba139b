//! EXPLAIN rendering in Hive's text layout.

use super::operator::{ExprDesc, Operator, OperatorDesc};
use super::stage::{StagePlan, StageWork};
use std::fmt::Write;

/// Render the plan as `STAGE DEPENDENCIES:` followed by `STAGE PLANS:`.
pub fn explain(plan: &StagePlan) -> String {
    let mut out = String::new();

    out.push_str("STAGE DEPENDENCIES:\n");
    for stage in plan.stages() {
        let deps = plan.dependencies_of(stage.id);
        if deps.is_empty() {
            line(&mut out, 2, &format!("{} is a root stage", stage.name()));
        } else {
            let deps: Vec<String> = deps.iter().map(|d| format!("Stage-{}", d)).collect();
            line(
                &mut out,
                2,
                &format!("{} depends on stages: {}", stage.name(), deps.join(", ")),
            );
        }
    }

    out.push_str("\nSTAGE PLANS:\n");
    for stage in plan.stages() {
        line(&mut out, 2, &format!("Stage: {}", stage.name()));
        match &stage.work {
            StageWork::MapReduce(work) => {
                line(&mut out, 4, "Map Reduce");
                line(&mut out, 6, "Alias -> Map Operator Tree:");
                for (alias, tree) in &work.map {
                    line(&mut out, 8, alias);
                    render_operator(&mut out, tree, 10);
                }
                if let Some(reduce) = &work.reduce {
                    line(&mut out, 6, "Reduce Operator Tree:");
                    render_operator(&mut out, reduce, 8);
                }
            }
            StageWork::Fetch { limit } => {
                line(&mut out, 4, "Fetch Operator");
                let limit = limit.map_or_else(|| "-1".to_string(), |l| l.to_string());
                line(&mut out, 6, &format!("limit: {}", limit));
            }
        }
        out.push('\n');
    }
    out
}

fn line(out: &mut String, indent: usize, text: &str) {
    let _ = writeln!(out, "{:indent$}{}", "", text, indent = indent);
}

/// A single expression nests four spaces under its label.
fn expr(out: &mut String, indent: usize, label: &str, desc: &ExprDesc) {
    line(out, indent, label);
    line(out, indent + 4, &format!("expr: {}", desc.expr));
    line(out, indent + 4, &format!("type: {}", desc.type_name));
}

/// Expression lists nest six spaces under their label.
fn expr_list(out: &mut String, indent: usize, label: &str, descs: &[ExprDesc]) {
    line(out, indent, label);
    for desc in descs {
        line(out, indent + 6, &format!("expr: {}", desc.expr));
        line(out, indent + 6, &format!("type: {}", desc.type_name));
    }
}

fn render_operator(out: &mut String, op: &Operator, indent: usize) {
    line(out, indent, op.desc.name());
    let inner = indent + 2;

    match &op.desc {
        OperatorDesc::TableScan { alias } => line(out, inner, &format!("alias: {}", alias)),
        OperatorDesc::Filter { predicate } => expr(out, inner, "predicate:", predicate),
        OperatorDesc::Select { exprs, output } => {
            expr_list(out, inner, "expressions:", exprs);
            line(out, inner, &format!("outputColumnNames: {}", output.join(", ")));
        }
        OperatorDesc::GroupBy {
            mode,
            keys,
            aggregations,
            output,
            ..
        } => {
            if !aggregations.is_empty() {
                line(out, inner, "aggregations:");
                for aggregation in aggregations {
                    line(out, inner + 6, &format!("expr: {}", aggregation));
                }
            }
            line(out, inner, "bucketGroup: false");
            if !keys.is_empty() {
                expr_list(out, inner, "keys:", keys);
            }
            line(out, inner, &format!("mode: {}", mode));
            line(out, inner, &format!("outputColumnNames: {}", output.join(", ")));
        }
        OperatorDesc::ReduceSink {
            keys,
            sort_order,
            partition_cols,
            values,
            tag,
        } => {
            expr_list(out, inner, "key expressions:", keys);
            line(out, inner, &format!("sort order: {}", sort_order));
            if !partition_cols.is_empty() {
                expr_list(out, inner, "Map-reduce partition columns:", partition_cols);
            }
            line(out, inner, &format!("tag: {}", tag));
            if !values.is_empty() {
                expr_list(out, inner, "value expressions:", values);
            }
        }
        OperatorDesc::Join {
            conditions,
            exprs,
            output,
        } => {
            line(out, inner, "condition map:");
            for condition in conditions {
                line(
                    out,
                    inner + 5,
                    &format!(
                        "{} {} to {}",
                        condition.kind.label(),
                        condition.left,
                        condition.right
                    ),
                );
            }
            line(out, inner, "condition expressions:");
            for (tag, values) in exprs.iter().enumerate() {
                let values: Vec<String> = values.iter().map(|v| format!("{{{}}}", v)).collect();
                line(out, inner + 2, &format!("{} {}", tag, values.join(" ")));
            }
            line(out, inner, "handleSkewJoin: false");
            line(out, inner, &format!("outputColumnNames: {}", output.join(", ")));
        }
        OperatorDesc::Extract | OperatorDesc::Limit { .. } => {}
        OperatorDesc::FileOutput {
            destination,
            compressed,
        } => {
            line(out, inner, &format!("compressed: {}", compressed));
            line(out, inner, "GlobalTableId: 0");
            line(out, inner, "table:");
            line(
                out,
                inner + 4,
                &format!("input format: {}", destination.input_format()),
            );
            line(
                out,
                inner + 4,
                &format!("output format: {}", destination.output_format()),
            );
        }
    }

    for child in &op.children {
        render_operator(out, child, inner);
    }
}
