//! Allocation results.
//!
//! An [`AllocationResult`] reports the consequences of allocating a task:
//! one [`AspectValue`] per measured aspect, a confidence rating and a
//! success flag. Auxiliary query answers ride along as strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aspect_value::slices_nearly_equal;
use super::{AspectType, AspectValue};
use crate::error::{Error, Result};

/// Number of auxiliary query slots.
pub const AUXILIARY_QUERY_COUNT: usize = 5;

/// The reported outcome of an allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    confidence_rating: f64,
    success: bool,
    values: Vec<AspectValue>,
    auxiliary: BTreeMap<usize, String>,
}

impl AllocationResult {
    /// Creates a result from aspect values. Later duplicates of an aspect
    /// type replace earlier ones; typed quantities are distinct per asset.
    pub fn new(confidence_rating: f64, success: bool, values: Vec<AspectValue>) -> Self {
        let mut deduped: Vec<AspectValue> = Vec::with_capacity(values.len());
        for v in values {
            match deduped
                .iter_mut()
                .find(|d| d.aspect_type() == v.aspect_type() && d.asset_type() == v.asset_type())
            {
                Some(slot) => *slot = v,
                None => deduped.push(v),
            }
        }
        Self {
            confidence_rating,
            success,
            values: deduped,
            auxiliary: BTreeMap::new(),
        }
    }

    /// Creates a result from parallel aspect codes and raw values, using
    /// each aspect's default kind.
    pub fn from_pairs(confidence_rating: f64, success: bool, pairs: &[(AspectType, f64)]) -> Result<Self> {
        let values = pairs
            .iter()
            .map(|(at, v)| AspectValue::for_aspect(*at, *v))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(confidence_rating, success, values))
    }

    /// Attaches an auxiliary query answer.
    pub fn with_auxiliary_query(mut self, query: usize, data: impl Into<String>) -> Result<Self> {
        self.set_auxiliary_query(query, data)?;
        Ok(self)
    }

    /// Sets an auxiliary query answer.
    pub fn set_auxiliary_query(&mut self, query: usize, data: impl Into<String>) -> Result<()> {
        if query >= AUXILIARY_QUERY_COUNT {
            return Err(Error::invalid_value(format!(
                "auxiliary query {query} out of range"
            )));
        }
        self.auxiliary.insert(query, data.into());
        Ok(())
    }

    /// The answer to an auxiliary query, if any.
    pub fn auxiliary_query(&self, query: usize) -> Option<&str> {
        self.auxiliary.get(&query).map(String::as_str)
    }

    /// Confidence in the result, `0.0..=1.0`.
    pub fn confidence_rating(&self) -> f64 {
        self.confidence_rating
    }

    /// Whether the allocation succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// All aspect values.
    pub fn values(&self) -> &[AspectValue] {
        &self.values
    }

    /// The aspect types present.
    pub fn aspect_types(&self) -> Vec<AspectType> {
        self.values.iter().map(AspectValue::aspect_type).collect()
    }

    /// Whether `aspect_type` is reported.
    pub fn is_defined(&self, aspect_type: AspectType) -> bool {
        self.aspect_value(aspect_type).is_some()
    }

    /// The value reported for `aspect_type`.
    pub fn aspect_value(&self, aspect_type: AspectType) -> Option<&AspectValue> {
        self.values.iter().find(|v| v.aspect_type() == aspect_type)
    }

    /// The numeric value reported for `aspect_type`; `None` if absent or a
    /// location.
    pub fn value(&self, aspect_type: AspectType) -> Option<f64> {
        self.aspect_value(aspect_type)
            .and_then(|v| v.numeric_value().ok())
    }

    /// Whether two results agree up to floating tolerance.
    pub fn is_equal(&self, other: &AllocationResult) -> bool {
        self.success == other.success
            && (self.confidence_rating - other.confidence_rating).abs() < 1e-9
            && slices_nearly_equal(&self.values, &other.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AllocationResult {
        AllocationResult::from_pairs(
            0.9,
            true,
            &[
                (AspectType::START_TIME, 100.0),
                (AspectType::END_TIME, 200.0),
                (AspectType::COST, 42.5),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_values() {
        let ar = sample();
        assert_eq!(ar.value(AspectType::START_TIME), Some(100.0));
        assert_eq!(ar.value(AspectType::COST), Some(42.5));
        assert_eq!(ar.value(AspectType::QUANTITY), None);
        assert!(ar.is_defined(AspectType::END_TIME));
        assert_eq!(
            ar.aspect_types(),
            vec![AspectType::START_TIME, AspectType::END_TIME, AspectType::COST]
        );
        assert!(ar.is_success());
        assert_eq!(ar.confidence_rating(), 0.9);
    }

    #[test]
    fn test_duplicate_aspects_replaced() {
        let ar = AllocationResult::from_pairs(
            1.0,
            true,
            &[(AspectType::COST, 1.0), (AspectType::COST, 2.0)],
        )
        .unwrap();
        assert_eq!(ar.values().len(), 1);
        assert_eq!(ar.value(AspectType::COST), Some(2.0));
    }

    #[test]
    fn test_auxiliary_queries() {
        let ar = sample().with_auxiliary_query(1, "port-7").unwrap();
        assert_eq!(ar.auxiliary_query(1), Some("port-7"));
        assert_eq!(ar.auxiliary_query(0), None);
        assert!(sample().with_auxiliary_query(AUXILIARY_QUERY_COUNT, "x").is_err());
    }

    #[test]
    fn test_is_equal() {
        assert!(sample().is_equal(&sample()));
        let failed = AllocationResult::new(0.9, false, sample().values().to_vec());
        assert!(!sample().is_equal(&failed));
    }

    #[test]
    fn test_invalid_value_rejected() {
        let r = AllocationResult::from_pairs(1.0, true, &[(AspectType::COST, f64::NAN)]);
        assert!(r.is_err());
    }
}
