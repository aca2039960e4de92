//! Scoring preferences.
//!
//! A [`Preference`] tells the allocator how good each candidate value of
//! one aspect would be. Scores run from [`BEST`] (0.0) to [`WORST`] (1.0);
//! values on the disallowed side of a bound always score [`WORST`].

use serde::{Deserialize, Serialize};

use super::AspectType;

/// Score of an ideal value.
pub const BEST: f64 = 0.0;

/// Score of an unacceptable value.
pub const WORST: f64 = 1.0;

/// Shape of a preference curve around a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScoringFunction {
    /// Only `point` is acceptable.
    StrictlyAt { point: f64 },
    /// `point` is best; the score grows by `slope` per unit away on
    /// either side.
    PreferredAt { point: f64, slope: f64 },
    /// Anything at or below `point` is acceptable, best at `point`.
    Below { point: f64, slope: f64 },
    /// Anything at or above `point` is acceptable, best at `point`.
    Above { point: f64, slope: f64 },
}

impl ScoringFunction {
    /// The point the curve is centred on.
    pub fn point(&self) -> f64 {
        match *self {
            Self::StrictlyAt { point }
            | Self::PreferredAt { point, .. }
            | Self::Below { point, .. }
            | Self::Above { point, .. } => point,
        }
    }

    /// Scores `value`.
    pub fn score(&self, value: f64) -> f64 {
        match *self {
            Self::StrictlyAt { point } => {
                if value == point {
                    BEST
                } else {
                    WORST
                }
            }
            Self::PreferredAt { point, slope } => ramp(slope, (point - value).abs()),
            Self::Below { point, slope } => {
                if value <= point {
                    ramp(slope, point - value)
                } else {
                    WORST
                }
            }
            Self::Above { point, slope } => {
                if value >= point {
                    ramp(slope, value - point)
                } else {
                    WORST
                }
            }
        }
    }

    /// Whether `value` is on the permitted side of the curve.
    pub fn is_acceptable(&self, value: f64) -> bool {
        match *self {
            Self::StrictlyAt { point } => value == point,
            Self::PreferredAt { .. } => value.is_finite(),
            Self::Below { point, .. } => value <= point,
            Self::Above { point, .. } => value >= point,
        }
    }
}

#[inline]
fn ramp(slope: f64, distance: f64) -> f64 {
    (slope * distance).min(WORST)
}

/// A weighted scoring function for one aspect of a task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    /// The aspect being scored.
    pub aspect_type: AspectType,
    /// The curve.
    pub scoring: ScoringFunction,
    /// Relative weight among a task's preferences.
    pub weight: f64,
}

impl Preference {
    /// Creates a preference with weight 1.0.
    pub fn new(aspect_type: AspectType, scoring: ScoringFunction) -> Self {
        Self {
            aspect_type,
            scoring,
            weight: 1.0,
        }
    }

    /// Sets the weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// The value this preference is centred on.
    pub fn preferred_value(&self) -> f64 {
        self.scoring.point()
    }

    /// Weighted score of `value`.
    pub fn score(&self, value: f64) -> f64 {
        self.weight * self.scoring.score(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict() {
        let f = ScoringFunction::StrictlyAt { point: 10.0 };
        assert_eq!(f.score(10.0), BEST);
        assert_eq!(f.score(10.5), WORST);
        assert!(f.is_acceptable(10.0));
        assert!(!f.is_acceptable(9.0));
    }

    #[test]
    fn test_preferred_at() {
        let f = ScoringFunction::PreferredAt { point: 10.0, slope: 0.1 };
        assert_eq!(f.score(10.0), BEST);
        assert!((f.score(12.0) - 0.2).abs() < 1e-12);
        assert!((f.score(8.0) - 0.2).abs() < 1e-12);
        assert_eq!(f.score(100.0), WORST);
    }

    #[test]
    fn test_below_and_above() {
        let below = ScoringFunction::Below { point: 95.0, slope: 0.0 };
        assert_eq!(below.score(90.0), BEST);
        assert_eq!(below.score(95.0), BEST);
        assert_eq!(below.score(96.0), WORST);

        let above = ScoringFunction::Above { point: 95.0, slope: 0.5 };
        assert_eq!(above.score(94.0), WORST);
        assert_eq!(above.score(95.0), BEST);
        assert!((above.score(96.0) - 0.5).abs() < 1e-12);
        assert_eq!(above.score(200.0), WORST);
        assert!(above.is_acceptable(200.0));
        assert!(!below.is_acceptable(96.0));
    }

    #[test]
    fn test_preference_weight() {
        let p = Preference::new(AspectType::COST, ScoringFunction::PreferredAt { point: 0.0, slope: 0.1 })
            .with_weight(2.0);
        assert_eq!(p.preferred_value(), 0.0);
        assert!((p.score(1.0) - 0.2).abs() < 1e-12);
    }
}
