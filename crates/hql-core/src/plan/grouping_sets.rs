//! Grouping-set bitmasks for CUBE, ROLLUP and GROUPING SETS.
//!
//! A grouping set is a `u32` mask over the GROUP BY keys: bit `i` is set when
//! key `i` is part of the set. Keys absent from a set are NULL in its output
//! rows.

use super::query::{Expr, GroupByClause, GroupingModifier};
use crate::{PlanError, Result};

/// Largest number of GROUP BY keys a mask can address.
pub const MAX_GROUPING_KEYS: usize = 32;

/// Largest number of grouping sets one GROUP BY may expand to (a 12-key CUBE).
pub const MAX_GROUPING_SETS: u64 = 1 << 12;

/// All subsets of `key_count` keys, in ascending mask order.
pub fn cube_masks(key_count: usize) -> Vec<u32> {
    (0..(1u64 << key_count)).map(|mask| mask as u32).collect()
}

/// The `key_count + 1` prefixes of the key list, shortest first.
pub fn rollup_masks(key_count: usize) -> Vec<u32> {
    (0..=key_count)
        .map(|i| ((1u64 << i) - 1) as u32)
        .collect()
}

/// Masks for an explicit GROUPING SETS list. Duplicates are dropped, keeping
/// the first occurrence.
pub fn explicit_masks(keys: &[Expr], sets: &[Vec<Expr>]) -> Result<Vec<u32>> {
    if sets.is_empty() {
        return Err(PlanError::GroupingSetsEmpty.into());
    }

    let mut masks = Vec::with_capacity(sets.len());
    for set in sets {
        let mut mask = 0u32;
        for expr in set {
            let position = keys
                .iter()
                .position(|key| key == expr)
                .ok_or_else(|| PlanError::GroupingSetExprNotInGroupBy(expr.to_string()))?;
            mask |= 1 << position;
        }
        if !masks.contains(&mask) {
            masks.push(mask);
        }
    }
    Ok(masks)
}

/// Expand the clause's modifier. `None` when the clause has no grouping sets.
pub fn expand(clause: &GroupByClause) -> Result<Option<Vec<u32>>> {
    if clause.modifier == GroupingModifier::None {
        return Ok(None);
    }
    if clause.keys.len() > MAX_GROUPING_KEYS {
        return Err(PlanError::TooManyGroupingKeys {
            max: MAX_GROUPING_KEYS,
            actual: clause.keys.len(),
        }
        .into());
    }

    let masks = match &clause.modifier {
        GroupingModifier::None => return Ok(None),
        GroupingModifier::Cube => {
            let set_count = 1u64 << clause.keys.len();
            if set_count > MAX_GROUPING_SETS {
                return Err(PlanError::TooManyGroupingSets {
                    max: MAX_GROUPING_SETS,
                    actual: set_count,
                }
                .into());
            }
            cube_masks(clause.keys.len())
        }
        GroupingModifier::Rollup => rollup_masks(clause.keys.len()),
        GroupingModifier::GroupingSets(sets) => explicit_masks(&clause.keys, sets)?,
    };
    Ok(Some(masks))
}

/// Reject aggregate arguments that are also group keys.
///
/// Keys and arguments are compared after resolution, so callers pass whatever
/// identifies a resolved column.
pub fn check_aggregate_args<T: PartialEq>(keys: &[T], aggregate_args: &[T]) -> Result<()> {
    if aggregate_args.iter().any(|arg| keys.contains(arg)) {
        return Err(PlanError::GroupingSetsAggrExpressionInvalid.into());
    }
    Ok(())
}

/// Key positions present in a mask, ascending.
pub fn present_keys(mask: u32, key_count: usize) -> impl Iterator<Item = usize> {
    (0..key_count).filter(move |i| mask & (1 << i) != 0)
}
