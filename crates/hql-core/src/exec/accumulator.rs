//! Aggregate accumulators with mergeable partial state.

use crate::types::{HiveDecimal, Value};
use crate::{Error, Result};
use indexmap::IndexSet;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Extra fractional digits avg keeps over its decimal input.
const AVG_SCALE_INCREASE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Avg => "avg",
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(AggregateFunction::Count),
            "sum" => Ok(AggregateFunction::Sum),
            "min" => Ok(AggregateFunction::Min),
            "max" => Ok(AggregateFunction::Max),
            "avg" => Ok(AggregateFunction::Avg),
            other => Err(Error::Execution(format!(
                "Unsupported aggregate function: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Intermediate state exchanged between partial and final aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialState {
    Count(i64),
    /// `None` until a non-null input was seen.
    Sum(Option<Value>),
    Min(Option<Value>),
    Max(Option<Value>),
    Avg { count: i64, sum: Option<Value> },
    /// Distinct inputs of a DISTINCT aggregate, in first-seen order.
    Distinct(Vec<Value>),
}

/// One aggregate call over a group.
#[derive(Debug, Clone)]
pub struct Accumulator {
    function: AggregateFunction,
    distinct: bool,
    count: i64,
    value: Option<Value>,
    seen: IndexSet<Value>,
}

impl Accumulator {
    pub fn new(function: AggregateFunction, distinct: bool) -> Self {
        Self {
            function,
            distinct,
            count: 0,
            value: None,
            seen: IndexSet::new(),
        }
    }

    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Add one raw input row. `count()` takes no arguments.
    pub fn update(&mut self, args: &[Value]) -> Result<()> {
        if self.distinct {
            match args.first() {
                Some(v) if !v.is_null() => {
                    self.seen.insert(v.clone());
                }
                Some(_) => {}
                None => {
                    return Err(Error::Execution(format!(
                        "{}(DISTINCT) requires an argument",
                        self.function
                    )))
                }
            }
            return Ok(());
        }

        if self.function == AggregateFunction::Count {
            if args.iter().all(|v| !v.is_null()) {
                self.count += 1;
            }
            return Ok(());
        }

        let input = match args {
            [input] => input,
            _ => {
                return Err(Error::Execution(format!(
                    "{} takes exactly one argument, got {}",
                    self.function,
                    args.len()
                )))
            }
        };
        self.add_input(input);
        Ok(())
    }

    fn add_input(&mut self, input: &Value) {
        if input.is_null() {
            return;
        }
        match self.function {
            AggregateFunction::Count => self.count += 1,
            AggregateFunction::Sum => self.value = add(self.value.take(), sum_input(input)),
            AggregateFunction::Avg => {
                self.count += 1;
                self.value = add(self.value.take(), avg_input(input));
            }
            AggregateFunction::Min => self.value = extreme(self.value.take(), input, Ordering::Less),
            AggregateFunction::Max => {
                self.value = extreme(self.value.take(), input, Ordering::Greater)
            }
        }
    }

    /// Fold in a partial state produced by [`Accumulator::partial`].
    pub fn merge(&mut self, partial: &PartialState) -> Result<()> {
        match (self.function, partial) {
            (_, PartialState::Distinct(values)) if self.distinct => {
                self.seen.extend(values.iter().cloned());
            }
            (AggregateFunction::Count, PartialState::Count(count)) => self.count += count,
            (AggregateFunction::Sum, PartialState::Sum(sum)) => {
                if let Some(sum) = sum {
                    self.value = add(self.value.take(), Some(sum.clone()));
                }
            }
            (AggregateFunction::Min, PartialState::Min(Some(v))) => {
                self.value = extreme(self.value.take(), v, Ordering::Less)
            }
            (AggregateFunction::Max, PartialState::Max(Some(v))) => {
                self.value = extreme(self.value.take(), v, Ordering::Greater)
            }
            (AggregateFunction::Min, PartialState::Min(None))
            | (AggregateFunction::Max, PartialState::Max(None)) => {}
            (AggregateFunction::Avg, PartialState::Avg { count, sum }) => {
                self.count += count;
                if let Some(sum) = sum {
                    self.value = add(self.value.take(), Some(sum.clone()));
                }
            }
            (function, other) => {
                return Err(Error::Execution(format!(
                    "Cannot merge {:?} into {}{}",
                    other,
                    function,
                    if self.distinct { " DISTINCT" } else { "" }
                )))
            }
        }
        Ok(())
    }

    pub fn partial(&self) -> PartialState {
        if self.distinct {
            return PartialState::Distinct(self.seen.iter().cloned().collect());
        }
        match self.function {
            AggregateFunction::Count => PartialState::Count(self.count),
            AggregateFunction::Sum => PartialState::Sum(self.value.clone()),
            AggregateFunction::Min => PartialState::Min(self.value.clone()),
            AggregateFunction::Max => PartialState::Max(self.value.clone()),
            AggregateFunction::Avg => PartialState::Avg {
                count: self.count,
                sum: self.value.clone(),
            },
        }
    }

    /// Final value of the aggregate.
    pub fn evaluate(&self) -> Value {
        if self.distinct {
            let mut plain = Accumulator::new(self.function, false);
            for value in &self.seen {
                plain.add_input(value);
            }
            return plain.evaluate();
        }
        match self.function {
            AggregateFunction::Count => Value::Long(self.count),
            AggregateFunction::Sum | AggregateFunction::Min | AggregateFunction::Max => {
                self.value.clone().unwrap_or(Value::Null)
            }
            AggregateFunction::Avg => match &self.value {
                _ if self.count == 0 => Value::Null,
                Some(Value::Decimal(sum)) => sum
                    .checked_div_count(self.count, sum.scale() + AVG_SCALE_INCREASE)
                    .map_or(Value::Null, Value::Decimal),
                Some(sum) => sum
                    .as_f64()
                    .map_or(Value::Null, |s| Value::Double(s / self.count as f64)),
                None => Value::Null,
            },
        }
    }
}

/// Sum keeps bigint for integral input, decimal for decimals and double
/// otherwise. Unparseable strings count as NULL.
fn sum_input(input: &Value) -> Option<Value> {
    match input {
        Value::Decimal(_) => Some(input.clone()),
        v => match v.as_i64() {
            Some(i) => Some(Value::Long(i)),
            None => v.as_f64().map(Value::Double),
        },
    }
}

/// Avg sums integral input as double.
fn avg_input(input: &Value) -> Option<Value> {
    match input {
        Value::Decimal(_) => Some(input.clone()),
        v => v.as_f64().map(Value::Double),
    }
}

fn add(acc: Option<Value>, input: Option<Value>) -> Option<Value> {
    let input = match input {
        Some(v) => v,
        None => return acc,
    };
    let acc = match acc {
        Some(v) => v,
        None => return Some(input),
    };
    match (&acc, &input) {
        (Value::Long(a), Value::Long(b)) => Some(Value::Long(a.wrapping_add(*b))),
        // Decimal overflow yields NULL.
        (Value::Decimal(a), Value::Decimal(b)) => {
            Some(a.checked_add(b).map_or(Value::Null, Value::Decimal))
        }
        (Value::Null, _) | (_, Value::Null) => Some(Value::Null),
        (Value::Decimal(a), other) | (other, Value::Decimal(a)) if other.as_i64().is_some() => {
            let b = HiveDecimal::from_i64(other.as_i64().unwrap_or_default());
            Some(a.checked_add(&b).map_or(Value::Null, Value::Decimal))
        }
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Some(Value::Double(x + y)),
            _ => Some(acc),
        },
    }
}

fn extreme(current: Option<Value>, input: &Value, wanted: Ordering) -> Option<Value> {
    match current {
        None => Some(input.clone()),
        Some(current) if input.compare(&current) == Some(wanted) => Some(input.clone()),
        Some(current) => Some(current),
    }
}
