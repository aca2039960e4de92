//! Aspect type codes.
//!
//! An aspect type names *what* is measured (start time, cost, quantity …).
//! Codes `0..N_CORE_ASPECTS` are built in; further codes may be registered
//! on a [`Registry`](crate::Registry).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Enumerated "what is measured" code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AspectType(pub i32);

impl AspectType {
    /// Undefined aspect; never valid for value construction.
    pub const UNDEFINED: Self = Self(-1);
    /// Start time of a task (ms).
    pub const START_TIME: Self = Self(0);
    /// End time of a task (ms).
    pub const END_TIME: Self = Self(1);
    /// Duration of a task (ms).
    pub const DURATION: Self = Self(2);
    /// Cost of allocating a task.
    pub const COST: Self = Self(3);
    /// Probability of loss of the assets involved.
    pub const DANGER: Self = Self(4);
    /// Probability of mission failure.
    pub const RISK: Self = Self(5);
    /// Quantity associated with the allocation.
    pub const QUANTITY: Self = Self(6);
    /// Time between deliveries of a repetitive task (ms).
    pub const INTERVAL: Self = Self(7);
    /// Total quantity over the span of a repetitive task.
    pub const TOTAL_QUANTITY: Self = Self(8);
    /// Total number of shipments over the span of a repetitive task.
    pub const TOTAL_SHIPMENTS: Self = Self(9);
    /// Customer satisfaction.
    pub const CUSTOMER_SATISFACTION: Self = Self(10);
    /// Asset/quantity pair.
    pub const TYPED_QUANTITY: Self = Self(11);
    /// Extent to which a task has been satisfactorily completed.
    pub const READINESS: Self = Self(12);
    /// Point of debarkation.
    pub const POD: Self = Self(13);
    /// Time at which a task should arrive at the POD (ms).
    pub const POD_DATE: Self = Self(14);

    /// Number of built-in aspect codes.
    pub const N_CORE_ASPECTS: usize = 15;

    const NAMES: [&'static str; Self::N_CORE_ASPECTS] = [
        "START_TIME",
        "END_TIME",
        "DURATION",
        "COST",
        "DANGER",
        "RISK",
        "QUANTITY",
        "INTERVAL",
        "TOTAL_QUANTITY",
        "TOTAL_SHIPMENTS",
        "CUSTOMER_SATISFACTION",
        "TYPED_QUANTITY",
        "READINESS",
        "POD",
        "POD_DATE",
    ];

    /// The raw code.
    #[inline]
    pub fn code(self) -> i32 {
        self.0
    }

    /// Whether this is one of the built-in codes.
    #[inline]
    pub fn is_core(self) -> bool {
        self.0 >= 0 && (self.0 as usize) < Self::N_CORE_ASPECTS
    }

    /// Built-in name, if this is a core code.
    pub fn core_name(self) -> Option<&'static str> {
        if self.is_core() {
            Some(Self::NAMES[self.0 as usize])
        } else {
            None
        }
    }

    /// Looks up a built-in code by name.
    pub fn from_core_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| Self(i as i32))
    }

    /// Whether values of this aspect are millisecond timestamps or spans.
    pub fn is_time(self) -> bool {
        matches!(
            self,
            Self::START_TIME | Self::END_TIME | Self::DURATION | Self::INTERVAL | Self::POD_DATE
        )
    }

    /// Whether the aspect sums across parts of a whole (cost, quantity …).
    ///
    /// Distributors split additive aspects among parent tasks and copy
    /// the rest.
    pub fn is_additive(self) -> bool {
        matches!(
            self,
            Self::COST
                | Self::QUANTITY
                | Self::TOTAL_QUANTITY
                | Self::TOTAL_SHIPMENTS
                | Self::TYPED_QUANTITY
        )
    }

    /// The variant built for this aspect when no explicit kind is requested.
    pub fn default_kind(self) -> AspectKind {
        if self.is_time() {
            AspectKind::Long
        } else if self == Self::POD {
            AspectKind::Location
        } else if self.is_core() {
            AspectKind::Float
        } else {
            AspectKind::Double
        }
    }
}

impl fmt::Display for AspectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.core_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<i32> for AspectType {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

/// Payload variant of an [`AspectValue`](super::AspectValue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectKind {
    /// 32-bit integer.
    Int,
    /// 64-bit integer; times are longs.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Location handle, never a number.
    Location,
    /// Asset type plus float quantity.
    TypedQuantity,
}

impl AspectKind {
    /// Whether the kind carries a plain number.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(AspectType::START_TIME.to_string(), "START_TIME");
        assert_eq!(AspectType::POD_DATE.to_string(), "POD_DATE");
        assert_eq!(AspectType(42).to_string(), "42");
        assert_eq!(AspectType::UNDEFINED.to_string(), "-1");
        assert_eq!(AspectType::from_core_name("COST"), Some(AspectType::COST));
        assert_eq!(AspectType::from_core_name("NOPE"), None);
    }

    #[test]
    fn test_default_kinds() {
        assert_eq!(AspectType::START_TIME.default_kind(), AspectKind::Long);
        assert_eq!(AspectType::INTERVAL.default_kind(), AspectKind::Long);
        assert_eq!(AspectType::COST.default_kind(), AspectKind::Float);
        assert_eq!(AspectType::POD.default_kind(), AspectKind::Location);
        assert_eq!(AspectType(77).default_kind(), AspectKind::Double);
    }

    #[test]
    fn test_additive() {
        assert!(AspectType::QUANTITY.is_additive());
        assert!(AspectType::COST.is_additive());
        assert!(!AspectType::START_TIME.is_additive());
        assert!(!AspectType::RISK.is_additive());
    }
}
