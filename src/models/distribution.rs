//! Allocation result distribution.
//!
//! The inverse of aggregation: a distributor splits the result of a
//! combined task back across the parent tasks it was built from. Every
//! strategy assigns each parent exactly one result, and for the additive
//! aspects ([`AspectType::is_additive`]) the parts always add up to the
//! combined value. Other aspects are copied to every parent unchanged.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::{AllocationResult, AspectKind, AspectValue, TaskId, AUXILIARY_QUERY_COUNT};
use crate::error::{Error, Result};

/// One allocation result per task.
pub type TaskScoreTable = BTreeMap<TaskId, AllocationResult>;

/// Strategy splitting a combined result across parent tasks.
pub trait AllocationResultDistributor: fmt::Debug + Send + Sync {
    /// Splits `combined` across `parents`. `parents` holds no duplicates.
    fn calculate(&self, parents: &[TaskId], combined: &AllocationResult) -> Result<TaskScoreTable>;
}

/// Splits `total` into `weights.len()` parts proportional to `weights`.
///
/// Floating kinds give the last part the residual so the parts sum to
/// `total`. Integer kinds use largest remainders: every part gets its
/// floored share, then the leftover units go one each to the parts with
/// the largest fractional remainders (earlier parts win ties). Integer
/// parts therefore share the sign of `total`.
fn split(total: f64, weights: &[f64], kind: AspectKind) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if matches!(kind, AspectKind::Int | AspectKind::Long) {
        return split_units(total, weights, sum);
    }

    let mut parts = Vec::with_capacity(weights.len());
    let mut assigned = 0.0;
    for (i, w) in weights.iter().enumerate() {
        let part = if i + 1 == weights.len() {
            total - assigned
        } else {
            total * w / sum
        };
        assigned += part;
        parts.push(part);
    }
    parts
}

fn split_units(total: f64, weights: &[f64], sum: f64) -> Vec<f64> {
    let magnitude = total.abs().round();
    let sign = if total < 0.0 { -1.0 } else { 1.0 };

    let raw: Vec<f64> = weights.iter().map(|w| magnitude * w / sum).collect();
    let mut parts: Vec<f64> = raw.iter().map(|r| r.floor()).collect();
    let leftover = (magnitude - parts.iter().sum::<f64>()).round().max(0.0) as usize;

    let mut by_remainder: Vec<usize> = (0..parts.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let (ra, rb) = (raw[a] - parts[a], raw[b] - parts[b]);
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &i in by_remainder.iter().take(leftover) {
        parts[i] += 1.0;
    }

    parts.iter().map(|p| sign * p).collect()
}

/// Shared body of the splitting strategies.
fn distribute(parents: &[TaskId], combined: &AllocationResult, weights: &[f64]) -> Result<TaskScoreTable> {
    if parents.is_empty() {
        return Ok(TaskScoreTable::new());
    }

    let mut per_parent: Vec<Vec<AspectValue>> = vec![Vec::with_capacity(combined.values().len()); parents.len()];
    for value in combined.values() {
        if value.aspect_type().is_additive() {
            let total = value.numeric_value()?;
            for (slot, part) in per_parent.iter_mut().zip(split(total, weights, value.kind())) {
                slot.push(value.with_value(part)?);
            }
        } else {
            for slot in &mut per_parent {
                slot.push(value.clone());
            }
        }
    }

    let mut table = TaskScoreTable::new();
    for (parent, values) in parents.iter().zip(per_parent) {
        let mut result = AllocationResult::new(combined.confidence_rating(), combined.is_success(), values);
        for q in 0..AUXILIARY_QUERY_COUNT {
            if let Some(data) = combined.auxiliary_query(q) {
                result.set_auxiliary_query(q, data)?;
            }
        }
        table.insert(parent.clone(), result);
    }
    Ok(table)
}

/// Splits additive aspects evenly across parents.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualSplitDistributor;

impl AllocationResultDistributor for EqualSplitDistributor {
    fn calculate(&self, parents: &[TaskId], combined: &AllocationResult) -> Result<TaskScoreTable> {
        distribute(parents, combined, &vec![1.0; parents.len()])
    }
}

/// Splits additive aspects in proportion to per-parent weights.
#[derive(Debug, Clone, Default)]
pub struct WeightedDistributor {
    weights: HashMap<TaskId, f64>,
}

impl WeightedDistributor {
    /// Creates a distributor with no weights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the weight of `parent`. Weights must be finite and
    /// non-negative.
    pub fn with_weight(mut self, parent: impl Into<TaskId>, weight: f64) -> Result<Self> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(Error::invalid_value(format!(
                "distribution weight must be finite and non-negative, got {weight}"
            )));
        }
        self.weights.insert(parent.into(), weight);
        Ok(self)
    }
}

impl AllocationResultDistributor for WeightedDistributor {
    fn calculate(&self, parents: &[TaskId], combined: &AllocationResult) -> Result<TaskScoreTable> {
        let weights = parents
            .iter()
            .map(|p| {
                self.weights
                    .get(p)
                    .copied()
                    .ok_or_else(|| Error::inconsistent(format!("no distribution weight for {p}")))
            })
            .collect::<Result<Vec<_>>>()?;
        if !parents.is_empty() && weights.iter().sum::<f64>() <= 0.0 {
            return Err(Error::invalid_value("distribution weights sum to zero"));
        }
        distribute(parents, combined, &weights)
    }
}
