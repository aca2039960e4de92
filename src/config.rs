//! Core configuration.
//!
//! A small set of switches that change behavior at the edges of the core.
//! Every field has a default, so an empty document deserializes to
//! [`CoreConfig::default`].

use serde::{Deserialize, Serialize};

/// Default gap (ms) bridged when merging like-valued quantity elements.
pub const DEFAULT_QUANTITY_MERGE_GAP_MS: i64 = 1000;

/// Tunables for the planning core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Accept a numeric zero where a location aspect is expected, substituting
    /// a placeholder location and warning once. Off by default; only for
    /// callers that still depend on the historical behavior.
    pub legacy_location_zero_fallback: bool,
    /// Largest gap (ms) between two equal-valued quantity elements that
    /// [`combine_like_quantity_elements`](crate::models::combine_like_quantity_elements)
    /// still merges into one.
    pub quantity_merge_gap_ms: i64,
    /// Reject schedule elements whose kind differs from the schedule's
    /// declared element kind.
    pub strict_element_kinds: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            legacy_location_zero_fallback: false,
            quantity_merge_gap_ms: DEFAULT_QUANTITY_MERGE_GAP_MS,
            strict_element_kinds: true,
        }
    }
}

impl CoreConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables the legacy zero-as-location fallback.
    pub fn with_legacy_location_fallback(mut self, enabled: bool) -> Self {
        self.legacy_location_zero_fallback = enabled;
        self
    }

    /// Sets the merge gap for like quantity elements.
    pub fn with_quantity_merge_gap(mut self, gap_ms: i64) -> Self {
        self.quantity_merge_gap_ms = gap_ms;
        self
    }

    /// Sets whether schedules reject elements of the wrong kind.
    pub fn with_strict_element_kinds(mut self, strict: bool) -> Self {
        self.strict_element_kinds = strict;
        self
    }
}
