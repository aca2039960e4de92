//! Allocation result aggregation.
//!
//! An aggregator rolls the results of a workflow's subtasks up into one
//! result for the parent task. Both strategies here return `None` when
//! there are no subtasks or any subtask has no result yet, and hand back
//! the parent's current result unchanged when the roll-up did not move.

use std::collections::BTreeMap;
use std::fmt;

use super::{AllocationResult, AspectType, AspectValue, SubTaskResult, AUXILIARY_QUERY_COUNT};

/// Confidence ratings closer than this count as unchanged.
pub const SIGNIFICANT_CONFIDENCE_RATING_DELTA: f64 = 0.0001;

/// Strategy rolling subtask results up into a parent result.
pub trait AllocationResultAggregator: fmt::Debug + Send + Sync {
    /// Aggregates `subtasks`. `current` is the parent's existing result.
    fn calculate(
        &self,
        subtasks: &[SubTaskResult],
        current: Option<&AllocationResult>,
    ) -> Option<AllocationResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Min,
    Max,
    Sum,
    Mean,
}

fn default_rule(aspect_type: AspectType) -> Option<Rule> {
    match aspect_type {
        AspectType::START_TIME | AspectType::READINESS => Some(Rule::Min),
        AspectType::END_TIME | AspectType::DANGER | AspectType::RISK => Some(Rule::Max),
        AspectType::COST
        | AspectType::QUANTITY
        | AspectType::INTERVAL
        | AspectType::TOTAL_QUANTITY
        | AspectType::TOTAL_SHIPMENTS => Some(Rule::Sum),
        AspectType::CUSTOMER_SATISFACTION => Some(Rule::Mean),
        _ => None,
    }
}

/// Collects the subtask results, or `None` if any is missing.
fn collect_results(subtasks: &[SubTaskResult]) -> Option<Vec<&AllocationResult>> {
    if subtasks.is_empty() {
        return None;
    }
    subtasks.iter().map(SubTaskResult::result).collect()
}

/// Success AND-ed, confidence averaged.
fn summarize(results: &[&AllocationResult]) -> (bool, f64) {
    let success = results.iter().all(|r| r.is_success());
    let rating = results.iter().map(|r| r.confidence_rating()).sum::<f64>() / results.len() as f64;
    (success, rating)
}

/// Auxiliary answers that all reporting subtasks agree on.
fn merge_auxiliary(results: &[&AllocationResult]) -> BTreeMap<usize, String> {
    let mut merged: BTreeMap<usize, Option<&str>> = BTreeMap::new();
    for r in results {
        for q in 0..AUXILIARY_QUERY_COUNT {
            if let Some(data) = r.auxiliary_query(q) {
                merged
                    .entry(q)
                    .and_modify(|seen| {
                        if *seen != Some(data) {
                            *seen = None;
                        }
                    })
                    .or_insert(Some(data));
            }
        }
    }
    merged
        .into_iter()
        .filter_map(|(q, data)| data.map(|d| (q, d.to_string())))
        .collect()
}

fn finish(
    values: Vec<AspectValue>,
    results: &[&AllocationResult],
    current: Option<&AllocationResult>,
) -> Option<AllocationResult> {
    let (success, rating) = summarize(results);
    if let Some(current) = current {
        let unchanged = current.is_success() == success
            && (current.confidence_rating() - rating).abs() <= SIGNIFICANT_CONFIDENCE_RATING_DELTA
            && current.values() == values.as_slice();
        if unchanged {
            tracing::trace!("aggregate unchanged");
            return Some(current.clone());
        }
    }

    let mut out = AllocationResult::new(rating, success, values);
    for (q, data) in merge_auxiliary(results) {
        // Keys come from the same bounded range.
        if out.set_auxiliary_query(q, data).is_err() {
            tracing::warn!(query = q, "dropping auxiliary query");
        }
    }
    tracing::trace!(aspects = out.values().len(), success, rating, "aggregate changed");
    Some(out)
}

/// Fixed per-aspect roll-up over the standard aspects.
///
/// | aspect | rule |
/// |---|---|
/// | START_TIME, READINESS | minimum |
/// | END_TIME, DANGER, RISK | maximum |
/// | COST, QUANTITY, INTERVAL, TOTAL_QUANTITY, TOTAL_SHIPMENTS | sum |
/// | CUSTOMER_SATISFACTION | mean of the reported values |
/// | DURATION | aggregated END_TIME minus START_TIME |
///
/// Other aspects are dropped. Values take each aspect's default kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAggregator;

impl AllocationResultAggregator for DefaultAggregator {
    fn calculate(
        &self,
        subtasks: &[SubTaskResult],
        current: Option<&AllocationResult>,
    ) -> Option<AllocationResult> {
        let results = collect_results(subtasks)?;

        let mut acc: [Option<(f64, usize)>; AspectType::N_CORE_ASPECTS] = [None; AspectType::N_CORE_ASPECTS];
        for r in &results {
            for v in r.values() {
                let at = v.aspect_type();
                let (Some(rule), Ok(x)) = (default_rule(at), v.numeric_value()) else {
                    continue;
                };
                let slot = &mut acc[at.code() as usize];
                *slot = Some(match (*slot, rule) {
                    (None, _) => (x, 1),
                    (Some((a, n)), Rule::Min) => (a.min(x), n + 1),
                    (Some((a, n)), Rule::Max) => (a.max(x), n + 1),
                    (Some((a, n)), Rule::Sum | Rule::Mean) => (a + x, n + 1),
                });
            }
        }

        let start = acc[AspectType::START_TIME.code() as usize].map(|(v, _)| v);
        let end = acc[AspectType::END_TIME.code() as usize].map(|(v, _)| v);
        if let (Some(s), Some(e)) = (start, end) {
            acc[AspectType::DURATION.code() as usize] = Some((e - s, 1));
        }

        let mut values = Vec::new();
        for (code, slot) in acc.iter().enumerate() {
            let Some((total, n)) = *slot else { continue };
            let at = AspectType(code as i32);
            let v = if default_rule(at) == Some(Rule::Mean) {
                total / n as f64
            } else {
                total
            };
            match AspectValue::for_aspect(at, v) {
                Ok(av) => values.push(av),
                Err(e) => tracing::warn!(aspect = %at, error = %e, "skipping aggregate"),
            }
        }
        finish(values, &results, current)
    }
}

/// Value-preserving roll-up: each aspect keeps the kind of the first value
/// reported for it.
///
/// START_TIME takes the minimum; END_TIME, DANGER and RISK the maximum;
/// locations keep the first value; everything else is summed, typed
/// quantities separately per asset. DURATION is recomputed from the
/// aggregated start and end, CUSTOMER_SATISFACTION averaged over subtasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AspectValueAggregator;

impl AspectValueAggregator {
    fn combine(sum: &AspectValue, next: &AspectValue) -> Option<AspectValue> {
        let (a, b) = match (sum.numeric_value(), next.numeric_value()) {
            (Ok(a), Ok(b)) => (a, b),
            _ => return None,
        };
        let v = match sum.aspect_type() {
            AspectType::START_TIME => a.min(b),
            AspectType::END_TIME | AspectType::DANGER | AspectType::RISK => a.max(b),
            _ => a + b,
        };
        sum.with_value(v).ok()
    }
}

impl AllocationResultAggregator for AspectValueAggregator {
    fn calculate(
        &self,
        subtasks: &[SubTaskResult],
        current: Option<&AllocationResult>,
    ) -> Option<AllocationResult> {
        let results = collect_results(subtasks)?;

        let mut values: Vec<AspectValue> = Vec::new();
        for r in &results {
            for v in r.values() {
                let existing = values
                    .iter_mut()
                    .find(|s| s.aspect_type() == v.aspect_type() && s.asset_type() == v.asset_type());
                match existing {
                    None => values.push(v.clone()),
                    Some(sum) => {
                        if let Some(next) = Self::combine(sum, v) {
                            *sum = next;
                        }
                    }
                }
            }
        }

        let find = |values: &[AspectValue], at: AspectType| {
            values
                .iter()
                .find(|v| v.aspect_type() == at)
                .and_then(|v| v.numeric_value().ok())
        };
        if let (Some(s), Some(e)) = (
            find(&values, AspectType::START_TIME),
            find(&values, AspectType::END_TIME),
        ) {
            let duration = e - s;
            match values.iter_mut().find(|v| v.aspect_type() == AspectType::DURATION) {
                Some(d) => {
                    if let Ok(nd) = d.with_value(duration) {
                        *d = nd;
                    }
                }
                None => {
                    if let Ok(nd) = AspectValue::for_aspect(AspectType::DURATION, duration) {
                        values.push(nd);
                    }
                }
            }
        }

        let count = results.len() as f64;
        if let Some(cs) = values
            .iter_mut()
            .find(|v| v.aspect_type() == AspectType::CUSTOMER_SATISFACTION)
        {
            let avg = cs.numeric_value().and_then(|total| cs.with_value(total / count));
            if let Ok(avg) = avg {
                *cs = avg;
            }
        }

        finish(values, &results, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetId, TaskId};

    fn sub(id: &str, result: Option<AllocationResult>) -> SubTaskResult {
        SubTaskResult::new(TaskId::new(id), true, result)
    }

    fn ar(pairs: &[(AspectType, f64)]) -> AllocationResult {
        AllocationResult::from_pairs(1.0, true, pairs).unwrap()
    }

    #[test]
    fn test_default_rules() {
        let subs = vec![
            sub(
                "A",
                Some(ar(&[
                    (AspectType::START_TIME, 10.0),
                    (AspectType::END_TIME, 20.0),
                    (AspectType::COST, 5.0),
                    (AspectType::DANGER, 0.2),
                    (AspectType::CUSTOMER_SATISFACTION, 1.0),
                    (AspectType::READINESS, 0.9),
                ])),
            ),
            sub(
                "B",
                Some(ar(&[
                    (AspectType::START_TIME, 15.0),
                    (AspectType::END_TIME, 40.0),
                    (AspectType::COST, 7.0),
                    (AspectType::DANGER, 0.5),
                    (AspectType::CUSTOMER_SATISFACTION, 0.5),
                    (AspectType::READINESS, 0.5),
                ])),
            ),
        ];
        let out = DefaultAggregator.calculate(&subs, None).unwrap();
        assert_eq!(out.value(AspectType::START_TIME), Some(10.0));
        assert_eq!(out.value(AspectType::END_TIME), Some(40.0));
        assert_eq!(out.value(AspectType::DURATION), Some(30.0));
        assert_eq!(out.value(AspectType::COST), Some(12.0));
        assert_eq!(out.value(AspectType::DANGER), Some(0.5));
        assert_eq!(out.value(AspectType::CUSTOMER_SATISFACTION), Some(0.75));
        assert_eq!(out.value(AspectType::READINESS), Some(0.5));
        assert!(out.is_success());
        assert_eq!(out.confidence_rating(), 1.0);
    }

    #[test]
    fn test_missing_result_yields_none() {
        let subs = vec![sub("A", Some(ar(&[(AspectType::COST, 1.0)]))), sub("B", None)];
        assert!(DefaultAggregator.calculate(&subs, None).is_none());
        assert!(AspectValueAggregator.calculate(&subs, None).is_none());
        assert!(DefaultAggregator.calculate(&[], None).is_none());
    }

    #[test]
    fn test_success_and_confidence() {
        let failed = AllocationResult::from_pairs(0.5, false, &[(AspectType::COST, 1.0)]).unwrap();
        let subs = vec![sub("A", Some(ar(&[(AspectType::COST, 1.0)]))), sub("B", Some(failed))];
        let out = DefaultAggregator.calculate(&subs, None).unwrap();
        assert!(!out.is_success());
        assert_eq!(out.confidence_rating(), 0.75);
    }

    #[test]
    fn test_unchanged_returns_current() {
        let subs = vec![sub("A", Some(ar(&[(AspectType::COST, 2.0)])))];
        let first = DefaultAggregator.calculate(&subs, None).unwrap();
        let again = DefaultAggregator.calculate(&subs, Some(&first)).unwrap();
        assert_eq!(again, first);

        let moved = vec![sub("A", Some(ar(&[(AspectType::COST, 3.0)])))];
        let next = DefaultAggregator.calculate(&moved, Some(&first)).unwrap();
        assert_eq!(next.value(AspectType::COST), Some(3.0));
    }

    #[test]
    fn test_auxiliary_conflicts_drop() {
        let a = ar(&[(AspectType::COST, 1.0)])
            .with_auxiliary_query(0, "x")
            .unwrap()
            .with_auxiliary_query(1, "same")
            .unwrap();
        let b = ar(&[(AspectType::COST, 1.0)])
            .with_auxiliary_query(0, "y")
            .unwrap()
            .with_auxiliary_query(1, "same")
            .unwrap();
        let out = DefaultAggregator
            .calculate(&[sub("A", Some(a)), sub("B", Some(b))], None)
            .unwrap();
        assert_eq!(out.auxiliary_query(0), None);
        assert_eq!(out.auxiliary_query(1), Some("same"));
    }

    #[test]
    fn test_aspect_value_aggregator_typed_quantities() {
        let tq = |asset: &str, q: f64| {
            AspectValue::typed_quantity(AspectType::TYPED_QUANTITY, AssetId::new(asset), q).unwrap()
        };
        let a = AllocationResult::new(1.0, true, vec![tq("fuel", 10.0), tq("water", 1.0)]);
        let b = AllocationResult::new(1.0, true, vec![tq("fuel", 5.0)]);
        let out = AspectValueAggregator
            .calculate(&[sub("A", Some(a)), sub("B", Some(b))], None)
            .unwrap();

        let fuel = out
            .values()
            .iter()
            .find(|v| v.asset_type() == Some(&AssetId::new("fuel")))
            .unwrap();
        assert_eq!(fuel.numeric_value().unwrap(), 15.0);
        assert_eq!(out.values().len(), 2);
    }

    #[test]
    fn test_aspect_value_aggregator_preserves_kind() {
        let a = AllocationResult::new(
            1.0,
            true,
            vec![
                AspectValue::double(AspectType::START_TIME, 10.0).unwrap(),
                AspectValue::double(AspectType::END_TIME, 30.0).unwrap(),
                AspectValue::double(AspectType::CUSTOMER_SATISFACTION, 1.0).unwrap(),
            ],
        );
        let b = AllocationResult::new(
            1.0,
            true,
            vec![
                AspectValue::double(AspectType::START_TIME, 5.0).unwrap(),
                AspectValue::double(AspectType::END_TIME, 20.0).unwrap(),
                AspectValue::double(AspectType::CUSTOMER_SATISFACTION, 0.0).unwrap(),
            ],
        );
        let out = AspectValueAggregator
            .calculate(&[sub("A", Some(a)), sub("B", Some(b))], None)
            .unwrap();
        let start = out.aspect_value(AspectType::START_TIME).unwrap();
        assert_eq!(start.kind(), crate::models::AspectKind::Double);
        assert_eq!(start.numeric_value().unwrap(), 5.0);
        assert_eq!(out.value(AspectType::END_TIME), Some(30.0));
        assert_eq!(out.value(AspectType::DURATION), Some(25.0));
        assert_eq!(out.value(AspectType::CUSTOMER_SATISFACTION), Some(0.5));
    }
}
