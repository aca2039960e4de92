//! Half-open time intervals.
//!
//! Every interval in the core is `[start, end)`: the start instant is
//! included and the end instant is not. Two spans that merely touch
//! (`a.end == b.start`) therefore *abut* but do not *overlap*; all schedule
//! queries rely on this.
//!
//! # Time Model
//! Times are milliseconds relative to an epoch chosen by the consumer.

use serde::{Deserialize, Serialize};

/// Anything with a half-open `[start_ms, end_ms)` extent.
pub trait TimeSpan {
    /// Inclusive start (ms).
    fn start_ms(&self) -> i64;

    /// Exclusive end (ms).
    fn end_ms(&self) -> i64;

    /// Length of the span (ms).
    #[inline]
    fn duration_ms(&self) -> i64 {
        self.end_ms() - self.start_ms()
    }

    /// Whether `time_ms` falls in `[start, end)`.
    #[inline]
    fn includes(&self, time_ms: i64) -> bool {
        time_ms >= self.start_ms() && time_ms < self.end_ms()
    }

    /// Whether the two spans share at least one instant.
    #[inline]
    fn overlaps_span<S: TimeSpan + ?Sized>(&self, other: &S) -> bool {
        self.start_ms() < other.end_ms() && other.start_ms() < self.end_ms()
    }

    /// Whether the spans touch with a zero-width gap and do not overlap.
    #[inline]
    fn abuts_span<S: TimeSpan + ?Sized>(&self, other: &S) -> bool {
        (self.end_ms() == other.start_ms() || other.end_ms() == self.start_ms())
            && !self.overlaps_span(other)
    }

    /// Whether `other` lies entirely inside this span.
    #[inline]
    fn encloses_span<S: TimeSpan + ?Sized>(&self, other: &S) -> bool {
        other.start_ms() >= self.start_ms() && other.end_ms() <= self.end_ms()
    }
}

/// Whether `time_ms` falls in `span`.
#[inline]
pub fn included<S: TimeSpan + ?Sized>(span: &S, time_ms: i64) -> bool {
    span.includes(time_ms)
}

/// Whether `a` and `b` share at least one instant.
#[inline]
pub fn overlaps<A: TimeSpan + ?Sized, B: TimeSpan + ?Sized>(a: &A, b: &B) -> bool {
    a.overlaps_span(b)
}

/// Whether `a` and `b` touch exactly without overlapping.
#[inline]
pub fn abuts<A: TimeSpan + ?Sized, B: TimeSpan + ?Sized>(a: &A, b: &B) -> bool {
    a.abuts_span(b)
}

/// A plain time interval `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    /// Interval start (ms, inclusive).
    pub start_ms: i64,
    /// Interval end (ms, exclusive).
    pub end_ms: i64,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// The smallest window covering both.
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.start_ms.min(other.start_ms),
            self.end_ms.max(other.end_ms),
        )
    }

    /// The shared part of two windows, if they overlap.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if self.overlaps_span(other) {
            Some(Self::new(
                self.start_ms.max(other.start_ms),
                self.end_ms.min(other.end_ms),
            ))
        } else {
            None
        }
    }
}

impl TimeSpan for TimeWindow {
    #[inline]
    fn start_ms(&self) -> i64 {
        self.start_ms
    }

    #[inline]
    fn end_ms(&self) -> i64 {
        self.end_ms
    }
}
