//! Query model accepted by the planner.
//!
//! Queries are supplied already parsed, as a tree of [`QueryBlock`]s. The model
//! is serde-serializable so the CLI can read queries from JSON files.

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        }
    }

    /// Comparison and logical operators produce booleans.
    pub fn is_predicate(&self) -> bool {
        !matches!(
            self,
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide
        )
    }
}

/// A scalar or aggregate expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Column {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qualifier: Option<String>,
        name: String,
    },
    Literal {
        value: Value,
    },
    Function {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Aggregate {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        distinct: bool,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not {
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
    },
    /// `*` in a select list or `count(*)`.
    Star,
    /// `GROUPING__ID`
    GroupingId,
}

/// Unqualified column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        qualifier: None,
        name: name.to_string(),
    }
}

/// Qualified column reference, `qualifier.name`.
pub fn qcol(qualifier: &str, name: &str) -> Expr {
    Expr::Column {
        qualifier: Some(qualifier.to_string()),
        name: name.to_string(),
    }
}

pub fn lit(value: Value) -> Expr {
    Expr::Literal { value }
}

pub fn count_star() -> Expr {
    Expr::Aggregate {
        name: "count".to_string(),
        args: Vec::new(),
        distinct: false,
    }
}

pub fn agg(name: &str, arg: Expr) -> Expr {
    Expr::Aggregate {
        name: name.to_string(),
        args: vec![arg],
        distinct: false,
    }
}

pub fn agg_distinct(name: &str, arg: Expr) -> Expr {
    Expr::Aggregate {
        name: name.to_string(),
        args: vec![arg],
        distinct: true,
    }
}

pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.to_string(),
        args,
    }
}

impl Expr {
    fn binary(self, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn eq(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn not_eq(self, right: Expr) -> Expr {
        self.binary(BinaryOp::NotEq, right)
    }

    pub fn lt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn lt_eq(self, right: Expr) -> Expr {
        self.binary(BinaryOp::LtEq, right)
    }

    pub fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn gt_eq(self, right: Expr) -> Expr {
        self.binary(BinaryOp::GtEq, right)
    }

    pub fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Or, right)
    }

    pub fn plus(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Plus, right)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate { .. })
    }

    /// Whether an aggregate call appears anywhere in the expression.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= e.is_aggregate());
        found
    }

    /// Visit this expression and every sub-expression, parents first.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Function { args, .. } | Expr::Aggregate { args, .. } => {
                for arg in args {
                    arg.visit(f);
                }
            }
            Expr::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Not { expr } | Expr::IsNull { expr } => expr.visit(f),
            Expr::Column { .. } | Expr::Literal { .. } | Expr::Star | Expr::GroupingId => {}
        }
    }

    /// Column references in the expression, in visiting order.
    pub fn columns(&self) -> Vec<(Option<String>, String)> {
        let mut out = Vec::new();
        self.visit(&mut |e| {
            if let Expr::Column { qualifier, name } = e {
                out.push((qualifier.clone(), name.clone()));
            }
        });
        out
    }

    /// Split a conjunction into its conjuncts.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let mut out = left.conjuncts();
                out.extend(right.conjuncts());
                out
            }
            other => vec![other],
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column {
                qualifier: Some(q),
                name,
            } => write!(f, "{}.{}", q, name),
            Expr::Column {
                qualifier: None,
                name,
            } => write!(f, "{}", name),
            Expr::Literal { value } => match value {
                Value::String(s) => write!(f, "'{}'", s),
                other => write!(f, "{}", other),
            },
            Expr::Function { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            Expr::Aggregate {
                name,
                args,
                distinct,
            } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                let distinct = if *distinct { "DISTINCT " } else { "" };
                write!(f, "{}({}{})", name, distinct, args.join(", "))
            }
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Not { expr } => write!(f, "not {}", expr),
            Expr::IsNull { expr } => write!(f, "{} is null", expr),
            Expr::Star => write!(f, "*"),
            Expr::GroupingId => write!(f, "GROUPING__ID"),
        }
    }
}

/// One select-list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: Expr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: &str) -> Self {
        Self {
            expr,
            alias: Some(alias.to_string()),
        }
    }
}

impl From<Expr> for SelectItem {
    fn from(expr: Expr) -> Self {
        SelectItem::new(expr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    #[default]
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
}

impl JoinKind {
    /// Condition-map label, e.g. `Inner Join`.
    pub fn label(&self) -> &'static str {
        match self {
            JoinKind::Inner => "Inner Join",
            JoinKind::LeftOuter => "Left Outer Join",
            JoinKind::RightOuter => "Right Outer Join",
            JoinKind::FullOuter => "Outer Join",
        }
    }
}

/// Source of rows for a query block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FromClause {
    Table {
        /// `table` or `db.table`
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    Subquery {
        query: Box<QueryBlock>,
        alias: String,
    },
    Join {
        left: Box<FromClause>,
        right: Box<FromClause>,
        #[serde(default)]
        join_kind: JoinKind,
        on: Expr,
    },
}

impl FromClause {
    pub fn table(name: &str) -> Self {
        FromClause::Table {
            name: name.to_string(),
            alias: None,
        }
    }

    pub fn table_as(name: &str, alias: &str) -> Self {
        FromClause::Table {
            name: name.to_string(),
            alias: Some(alias.to_string()),
        }
    }

    pub fn subquery(query: QueryBlock, alias: &str) -> Self {
        FromClause::Subquery {
            query: Box::new(query),
            alias: alias.to_string(),
        }
    }

    pub fn join(left: FromClause, right: FromClause, join_kind: JoinKind, on: Expr) -> Self {
        FromClause::Join {
            left: Box::new(left),
            right: Box::new(right),
            join_kind,
            on,
        }
    }
}

/// GROUP BY modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "sets", rename_all = "snake_case")]
pub enum GroupingModifier {
    #[default]
    None,
    Cube,
    Rollup,
    GroupingSets(Vec<Vec<Expr>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GroupByClause {
    pub keys: Vec<Expr>,
    #[serde(default)]
    pub modifier: GroupingModifier,
}

impl GroupByClause {
    pub fn new(keys: Vec<Expr>) -> Self {
        Self {
            keys,
            modifier: GroupingModifier::None,
        }
    }

    pub fn with_cube(mut self) -> Self {
        self.modifier = GroupingModifier::Cube;
        self
    }

    pub fn with_rollup(mut self) -> Self {
        self.modifier = GroupingModifier::Rollup;
        self
    }

    pub fn with_grouping_sets(mut self, sets: Vec<Vec<Expr>>) -> Self {
        self.modifier = GroupingModifier::GroupingSets(sets);
        self
    }

    pub fn has_grouping_sets(&self) -> bool {
        self.modifier != GroupingModifier::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expr: Expr,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

impl OrderByItem {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: true,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: false,
        }
    }
}

/// One SELECT ... FROM ... block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBlock {
    pub from: FromClause,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,
    pub select: Vec<SelectItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupByClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderByItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl QueryBlock {
    pub fn new(from: FromClause, select: Vec<SelectItem>) -> Self {
        Self {
            from,
            filter: None,
            select,
            group_by: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn group_by(mut self, group_by: GroupByClause) -> Self {
        self.group_by = Some(group_by);
        self
    }

    pub fn order_by(mut self, items: Vec<OrderByItem>) -> Self {
        self.order_by = items;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether the block aggregates, by GROUP BY or by aggregate calls.
    pub fn is_aggregation(&self) -> bool {
        self.group_by.is_some()
            || self.select.iter().any(|s| s.expr.contains_aggregate())
            || self.order_by.iter().any(|o| o.expr.contains_aggregate())
    }
}
