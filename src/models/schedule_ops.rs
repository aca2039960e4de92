//! Quantity schedule utilities.
//!
//! Operations over schedules whose elements carry a
//! [`Quantity`](super::ElementPayload::Quantity) payload: the quantity-over-time
//! curve they describe can be flattened, merged, added and subtracted.
//! Any other payload fails with [`Error::InvalidOperation`].

use super::{ElementKind, Schedule, ScheduleElement, TimeSpan};
use crate::config::CoreConfig;
use crate::error::{Error, Result};

fn quantity_of(element: &ScheduleElement) -> Result<f64> {
    element.quantity_value().ok_or_else(|| {
        Error::invalid_operation(format!(
            "expected a quantity element, got {:?} at [{}, {})",
            element.kind(),
            element.start_ms(),
            element.end_ms()
        ))
    })
}

fn quantity_schedule_like(template: &Schedule, elements: Vec<ScheduleElement>) -> Schedule {
    let mut out = Schedule::typed(template.schedule_type(), ElementKind::Quantity);
    out.set_elements(elements);
    out
}

/// Sum of the quantities of `elements`.
pub fn sum_elements(elements: &[ScheduleElement]) -> Result<f64> {
    elements.iter().map(quantity_of).sum()
}

/// The smallest set of non-overlapping elements with the same
/// quantity-over-time curve as `schedule`.
///
/// Where elements overlap their quantities add up. Zero-length elements
/// contribute nothing.
pub fn compute_non_overlapping(schedule: &Schedule) -> Result<Schedule> {
    let elements = schedule.as_slice();
    let mut values = Vec::with_capacity(elements.len());
    let mut boundaries = Vec::with_capacity(elements.len() * 2);
    for e in elements {
        values.push(quantity_of(e)?);
        boundaries.push(e.start_ms());
        boundaries.push(e.end_ms());
    }
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut out = Vec::new();
    for pair in boundaries.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        // Every element endpoint is a boundary, so an element either covers
        // the whole segment or none of it.
        let mut covered = false;
        let mut total = 0.0;
        for (e, v) in elements.iter().zip(&values) {
            if e.start_ms() <= from && e.end_ms() >= to {
                covered = true;
                total += v;
            }
        }
        if covered {
            out.push(ScheduleElement::quantity(from, to, total));
        }
    }
    Ok(quantity_schedule_like(schedule, out))
}

/// Alias of [`compute_non_overlapping`].
pub fn simplify(schedule: &Schedule) -> Result<Schedule> {
    compute_non_overlapping(schedule)
}

/// Merges consecutive equal-valued elements separated by at most
/// `config.quantity_merge_gap_ms`.
pub fn combine_like_quantity_elements(schedule: &Schedule, config: &CoreConfig) -> Result<Schedule> {
    let gap = config.quantity_merge_gap_ms;
    let mut out: Vec<ScheduleElement> = Vec::new();
    let mut run: Option<(i64, i64, f64)> = None;

    for e in schedule.elements() {
        let v = quantity_of(&e)?;
        run = match run {
            Some((start, end, value)) if value == v && e.start_ms() <= end + gap => {
                Some((start, end.max(e.end_ms()), value))
            }
            Some((start, end, value)) => {
                out.push(ScheduleElement::quantity(start, end, value));
                Some((e.start_ms(), e.end_ms(), v))
            }
            None => Some((e.start_ms(), e.end_ms(), v)),
        };
    }
    if let Some((start, end, value)) = run {
        out.push(ScheduleElement::quantity(start, end, value));
    }
    Ok(quantity_schedule_like(schedule, out))
}

/// Pointwise sum of two quantity schedules.
pub fn add_schedules(a: &Schedule, b: &Schedule) -> Result<Schedule> {
    let combined = Schedule::from_elements(a.as_slice().iter().chain(b.as_slice()).cloned());
    compute_non_overlapping(&combined).map(|s| quantity_schedule_like(a, s.elements()))
}

/// Pointwise difference `a - b` of two quantity schedules.
pub fn subtract_schedules(a: &Schedule, b: &Schedule) -> Result<Schedule> {
    let mut combined = Schedule::from_elements(a.as_slice().iter().cloned());
    for e in b.as_slice() {
        let v = quantity_of(e)?;
        combined.add_element(ScheduleElement::quantity(e.start_ms(), e.end_ms(), -v));
    }
    compute_non_overlapping(&combined).map(|s| quantity_schedule_like(a, s.elements()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScheduleType;

    fn q(start: i64, end: i64, v: f64) -> ScheduleElement {
        ScheduleElement::quantity(start, end, v)
    }

    fn triples(s: &Schedule) -> Vec<(i64, i64, f64)> {
        s.elements()
            .iter()
            .map(|e| (e.start_ms(), e.end_ms(), e.quantity_value().unwrap()))
            .collect()
    }

    #[test]
    fn test_sum_elements() {
        assert_eq!(sum_elements(&[q(0, 1, 2.0), q(1, 2, 3.5)]).unwrap(), 5.5);
        assert_eq!(sum_elements(&[]).unwrap(), 0.0);
        assert!(sum_elements(&[ScheduleElement::new(0, 1)]).is_err());
    }

    #[test]
    fn test_non_overlapping_splits_overlaps() {
        let s = Schedule::from_elements([q(0, 10, 2.0), q(5, 15, 3.0)]);
        let flat = compute_non_overlapping(&s).unwrap();
        assert_eq!(
            triples(&flat),
            vec![(0, 5, 2.0), (5, 10, 5.0), (10, 15, 3.0)]
        );
        assert_eq!(flat.element_kind(), Some(ElementKind::Quantity));
    }

    #[test]
    fn test_non_overlapping_keeps_gaps() {
        let s = Schedule::from_elements([q(20, 30, 1.0), q(0, 10, 4.0)]);
        let flat = simplify(&s).unwrap();
        assert_eq!(triples(&flat), vec![(0, 10, 4.0), (20, 30, 1.0)]);
    }

    #[test]
    fn test_non_overlapping_nested() {
        let s = Schedule::from_elements([q(0, 20, 1.0), q(5, 10, 1.0)]);
        let flat = compute_non_overlapping(&s).unwrap();
        assert_eq!(
            triples(&flat),
            vec![(0, 5, 1.0), (5, 10, 2.0), (10, 20, 1.0)]
        );
    }

    #[test]
    fn test_rejects_non_quantity() {
        let s = Schedule::from_elements([ScheduleElement::new(0, 5)]);
        assert!(matches!(compute_non_overlapping(&s), Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_combine_like_elements() {
        let s = Schedule::from_elements([
            q(0, 1000, 5.0),
            q(1500, 3000, 5.0),
            q(3000, 4000, 6.0),
            q(10_000, 11_000, 6.0),
        ]);
        let combined = combine_like_quantity_elements(&s, &CoreConfig::default()).unwrap();
        assert_eq!(
            triples(&combined),
            vec![(0, 3000, 5.0), (3000, 4000, 6.0), (10_000, 11_000, 6.0)]
        );

        let tight = CoreConfig::default().with_quantity_merge_gap(0);
        let combined = combine_like_quantity_elements(&s, &tight).unwrap();
        assert_eq!(combined.len(), 4);
    }

    #[test]
    fn test_add_and_subtract() {
        let mut a = Schedule::typed(ScheduleType::AssignedAvailability, ElementKind::Quantity);
        a.add_element(q(0, 10, 3.0));
        let b = Schedule::from_elements([q(5, 10, 1.0)]);

        let sum = add_schedules(&a, &b).unwrap();
        assert_eq!(triples(&sum), vec![(0, 5, 3.0), (5, 10, 4.0)]);
        assert_eq!(sum.schedule_type(), ScheduleType::AssignedAvailability);

        let diff = subtract_schedules(&a, &b).unwrap();
        assert_eq!(triples(&diff), vec![(0, 5, 3.0), (5, 10, 2.0)]);

        let zero = subtract_schedules(&a, &a).unwrap();
        assert_eq!(triples(&zero), vec![(0, 10, 0.0)]);
    }
}
