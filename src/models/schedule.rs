//! Schedule model.
//!
//! A [`Schedule`] is an ordered collection of [`ScheduleElement`]s, each a
//! half-open time interval with an optional payload (location, assignee,
//! role, quantity). Schedules are attached to assets and tasks and answer
//! interval-algebra queries for policy code.
//!
//! # Query ordering
//! Callers may add elements in any order. Every query returns an owned
//! snapshot sorted by start time ascending, then end time ascending, then
//! insertion order, so results are deterministic and unaffected by later
//! mutation of the schedule.

use serde::{Deserialize, Serialize};

use super::{AssetId, Location, Role, TimeSpan, TimeWindow};
use crate::config::CoreConfig;
use crate::error::{Error, Result};

/// Data carried by a schedule element besides its interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum ElementPayload {
    /// Just an interval.
    #[default]
    None,
    /// The asset is at a location.
    Location(Location),
    /// The asset moves between two locations.
    LocationRange { from: Location, to: Location },
    /// An asset is assigned, optionally in a role.
    Assignee { asset: AssetId, role: Option<Role> },
    /// A role is played over the interval.
    Role(Role),
    /// A quantity (rate, count, capacity) holds over the interval.
    Quantity(f64),
}

/// Runtime kind of an element, derived from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Plain,
    Location,
    LocationRange,
    Assignee,
    Role,
    Quantity,
}

impl ElementPayload {
    /// The kind of this payload.
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::None => ElementKind::Plain,
            Self::Location(_) => ElementKind::Location,
            Self::LocationRange { .. } => ElementKind::LocationRange,
            Self::Assignee { .. } => ElementKind::Assignee,
            Self::Role(_) => ElementKind::Role,
            Self::Quantity(_) => ElementKind::Quantity,
        }
    }
}

/// A half-open interval `[start_ms, end_ms)` with a payload.
///
/// `start_ms <= end_ms` is the caller's responsibility; the element does
/// not validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleElement {
    start_ms: i64,
    end_ms: i64,
    payload: ElementPayload,
}

impl ScheduleElement {
    /// Creates an element without payload.
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self {
            start_ms,
            end_ms,
            payload: ElementPayload::None,
        }
    }

    /// A location element.
    pub fn at_location(start_ms: i64, end_ms: i64, location: Location) -> Self {
        Self::new(start_ms, end_ms).with_payload(ElementPayload::Location(location))
    }

    /// A quantity element.
    pub fn quantity(start_ms: i64, end_ms: i64, value: f64) -> Self {
        Self::new(start_ms, end_ms).with_payload(ElementPayload::Quantity(value))
    }

    /// A role element.
    pub fn role(start_ms: i64, end_ms: i64, role: Role) -> Self {
        Self::new(start_ms, end_ms).with_payload(ElementPayload::Role(role))
    }

    /// An assignment of `asset`, optionally in `role`.
    pub fn assignee(start_ms: i64, end_ms: i64, asset: AssetId, role: Option<Role>) -> Self {
        Self::new(start_ms, end_ms).with_payload(ElementPayload::Assignee { asset, role })
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: ElementPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the start time.
    pub fn with_start(mut self, start_ms: i64) -> Self {
        self.start_ms = start_ms;
        self
    }

    /// Sets the end time.
    pub fn with_end(mut self, end_ms: i64) -> Self {
        self.end_ms = end_ms;
        self
    }

    /// Sets the start time in place, before the element is published.
    pub fn set_start_ms(&mut self, start_ms: i64) {
        self.start_ms = start_ms;
    }

    /// Sets the end time in place, before the element is published.
    pub fn set_end_ms(&mut self, end_ms: i64) {
        self.end_ms = end_ms;
    }

    /// The payload.
    pub fn payload(&self) -> &ElementPayload {
        &self.payload
    }

    /// The element kind.
    pub fn kind(&self) -> ElementKind {
        self.payload.kind()
    }

    /// The quantity, for quantity elements.
    pub fn quantity_value(&self) -> Option<f64> {
        match self.payload {
            ElementPayload::Quantity(v) => Some(v),
            _ => None,
        }
    }

    /// The role, for role and assignee elements.
    pub fn role_value(&self) -> Option<&Role> {
        match &self.payload {
            ElementPayload::Role(r) => Some(r),
            ElementPayload::Assignee { role, .. } => role.as_ref(),
            _ => None,
        }
    }

    /// The interval as a window.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_ms, self.end_ms)
    }
}

impl TimeSpan for ScheduleElement {
    #[inline]
    fn start_ms(&self) -> i64 {
        self.start_ms
    }

    #[inline]
    fn end_ms(&self) -> i64 {
        self.end_ms
    }
}

/// What a schedule describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScheduleType {
    AssignedRelationship,
    AssignedAvailability,
    Relationship,
    Role,
    #[default]
    Other,
}

impl ScheduleType {
    /// The conventional string tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssignedRelationship => "Assigned_Relationship",
            Self::AssignedAvailability => "Assigned_Availability",
            Self::Relationship => "Relationship",
            Self::Role => "Role",
            Self::Other => "Other",
        }
    }
}

/// An ordered collection of schedule elements.
///
/// Not internally synchronized: the owning transaction guarantees a single
/// writer. Queries copy, so a snapshot stays valid while the schedule changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    schedule_type: ScheduleType,
    /// `None` accepts elements of any kind.
    element_kind: Option<ElementKind>,
    strict_element_kinds: bool,
    elements: Vec<ScheduleElement>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            schedule_type: ScheduleType::Other,
            element_kind: None,
            strict_element_kinds: true,
            elements: Vec::new(),
        }
    }
}

fn sorted(mut elements: Vec<ScheduleElement>) -> Vec<ScheduleElement> {
    // Stable: equal (start, end) keep insertion order.
    elements.sort_by_key(|e| (e.start_ms, e.end_ms));
    elements
}

impl Schedule {
    /// Creates an empty schedule of type `Other` accepting any element kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty schedule of a given type holding one element kind.
    pub fn typed(schedule_type: ScheduleType, element_kind: ElementKind) -> Self {
        Self {
            schedule_type,
            element_kind: Some(element_kind),
            ..Self::default()
        }
    }

    /// Creates a mixed schedule holding `elements`.
    pub fn from_elements(elements: impl IntoIterator<Item = ScheduleElement>) -> Self {
        Self {
            elements: elements.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Applies the element-kind strictness of `config`.
    pub fn with_config(mut self, config: &CoreConfig) -> Self {
        self.strict_element_kinds = config.strict_element_kinds;
        self
    }

    /// The schedule type.
    pub fn schedule_type(&self) -> ScheduleType {
        self.schedule_type
    }

    /// The declared element kind; `None` means mixed.
    pub fn element_kind(&self) -> Option<ElementKind> {
        self.element_kind
    }

    /// Changes the schedule type. Only allowed while empty.
    pub fn set_schedule_type(&mut self, schedule_type: ScheduleType) -> Result<()> {
        if !self.elements.is_empty() {
            return Err(Error::invalid_operation(
                "cannot change the type of a non-empty schedule",
            ));
        }
        self.schedule_type = schedule_type;
        Ok(())
    }

    /// Changes the declared element kind. Existing elements must match.
    pub fn set_element_kind(&mut self, element_kind: Option<ElementKind>) -> Result<()> {
        if let Some(kind) = element_kind {
            if let Some(bad) = self.elements.iter().find(|e| e.kind() != kind) {
                return Err(Error::invalid_operation(format!(
                    "schedule holds a {:?} element, cannot restrict to {kind:?}",
                    bad.kind()
                )));
            }
        }
        self.element_kind = element_kind;
        Ok(())
    }

    /// Whether `element` matches the declared kind.
    pub fn is_appropriate(&self, element: &ScheduleElement) -> bool {
        self.element_kind.map_or(true, |k| k == element.kind())
    }

    /// Adds an element. Returns `false` (and logs) if it is of the wrong
    /// kind and the schedule is strict.
    pub fn add_element(&mut self, element: ScheduleElement) -> bool {
        if self.strict_element_kinds && !self.is_appropriate(&element) {
            tracing::warn!(
                schedule_type = self.schedule_type.as_str(),
                expected = ?self.element_kind,
                actual = ?element.kind(),
                "rejected schedule element of the wrong kind"
            );
            return false;
        }
        self.elements.push(element);
        true
    }

    /// Removes the first element equal to `element`.
    pub fn remove_element(&mut self, element: &ScheduleElement) -> bool {
        match self.elements.iter().position(|e| e == element) {
            Some(i) => {
                self.elements.remove(i);
                true
            }
            None => false,
        }
    }

    /// Removes all elements.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Replaces the contents with a single element.
    pub fn set_element(&mut self, element: ScheduleElement) -> bool {
        self.clear();
        self.add_element(element)
    }

    /// Replaces the contents. Returns how many elements were accepted.
    pub fn set_elements(&mut self, elements: impl IntoIterator<Item = ScheduleElement>) -> usize {
        self.clear();
        elements
            .into_iter()
            .map(|e| self.add_element(e))
            .filter(|added| *added)
            .count()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the schedule has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in insertion order.
    pub fn as_slice(&self) -> &[ScheduleElement] {
        &self.elements
    }

    /// A sorted copy of all elements.
    pub fn elements(&self) -> Vec<ScheduleElement> {
        sorted(self.elements.clone())
    }

    /// A sorted copy of the elements matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&ScheduleElement) -> bool) -> Vec<ScheduleElement> {
        sorted(self.elements.iter().filter(|e| predicate(e)).cloned().collect())
    }

    /// Elements whose interval includes `time_ms`.
    pub fn elements_at(&self, time_ms: i64) -> Vec<ScheduleElement> {
        self.filter(|e| e.includes(time_ms))
    }

    /// Elements intersecting `[start_ms, end_ms)`, partial overlaps included.
    pub fn elements_overlapping(&self, start_ms: i64, end_ms: i64) -> Vec<ScheduleElement> {
        let span = TimeWindow::new(start_ms, end_ms);
        self.filter(|e| e.overlaps_span(&span))
    }

    /// Elements fully contained in `[start_ms, end_ms)`.
    pub fn elements_within(&self, start_ms: i64, end_ms: i64) -> Vec<ScheduleElement> {
        let span = TimeWindow::new(start_ms, end_ms);
        self.filter(|e| span.encloses_span(e))
    }

    /// Elements playing `role`, directly or as an assignee's role.
    pub fn elements_with_role(&self, role: &Role) -> Vec<ScheduleElement> {
        self.filter(|e| e.role_value() == Some(role))
    }

    /// Elements playing `role` at `time_ms`.
    pub fn elements_with_role_at(&self, role: &Role, time_ms: i64) -> Vec<ScheduleElement> {
        self.filter(|e| e.role_value() == Some(role) && e.includes(time_ms))
    }

    /// Elements assigning `asset`.
    pub fn elements_for_assignee(&self, asset: &AssetId) -> Vec<ScheduleElement> {
        self.filter(|e| matches!(e.payload(), ElementPayload::Assignee { asset: a, .. } if a == asset))
    }

    /// Overall span: earliest start to latest end. `None` when empty.
    pub fn span(&self) -> Option<TimeWindow> {
        let start = self.start_time()?;
        let end = self.end_time()?;
        Some(TimeWindow::new(start, end))
    }

    /// Earliest start. `None` when empty.
    pub fn start_time(&self) -> Option<i64> {
        self.elements.iter().map(|e| e.start_ms).min()
    }

    /// Latest end. `None` when empty.
    pub fn end_time(&self) -> Option<i64> {
        self.elements.iter().map(|e| e.end_ms).max()
    }
}

impl Extend<ScheduleElement> for Schedule {
    fn extend<I: IntoIterator<Item = ScheduleElement>>(&mut self, iter: I) {
        for e in iter {
            self.add_element(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schedule() -> Schedule {
        Schedule::from_elements([
            ScheduleElement::new(0, 5),
            ScheduleElement::new(5, 10),
            ScheduleElement::new(3, 8),
        ])
    }

    fn windows(elements: &[ScheduleElement]) -> Vec<(i64, i64)> {
        elements.iter().map(|e| (e.start_ms(), e.end_ms())).collect()
    }

    #[test]
    fn test_elements_at_sorted_by_start() {
        let s = sample_schedule();
        assert_eq!(windows(&s.elements_at(4)), vec![(0, 5), (3, 8)]);
        // End is exclusive.
        assert_eq!(windows(&s.elements_at(5)), vec![(3, 8), (5, 10)]);
        assert!(s.elements_at(10).is_empty());
    }

    #[test]
    fn test_elements_overlapping_includes_partial() {
        let s = sample_schedule();
        assert_eq!(windows(&s.elements_overlapping(4, 6)), vec![(0, 5), (3, 8), (5, 10)]);
        // Touching the query window is not overlapping it.
        assert_eq!(windows(&s.elements_overlapping(10, 20)), vec![]);
        assert_eq!(windows(&s.elements_overlapping(8, 9)), vec![(5, 10)]);
    }

    #[test]
    fn test_elements_within() {
        let s = sample_schedule();
        assert_eq!(windows(&s.elements_within(0, 8)), vec![(0, 5), (3, 8)]);
        assert_eq!(windows(&s.elements_within(4, 6)), vec![]);
        assert_eq!(s.elements_within(0, 10).len(), 3);
    }

    #[test]
    fn test_tie_break_end_then_insertion() {
        let s = Schedule::from_elements([
            ScheduleElement::quantity(0, 9, 1.0),
            ScheduleElement::quantity(0, 4, 2.0),
            ScheduleElement::quantity(0, 9, 3.0),
        ]);
        let values: Vec<f64> = s
            .elements_at(1)
            .iter()
            .filter_map(ScheduleElement::quantity_value)
            .collect();
        assert_eq!(values, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_empty_schedule() {
        let s = Schedule::new();
        assert!(s.is_empty());
        assert!(s.elements_at(0).is_empty());
        assert!(s.elements_overlapping(0, 100).is_empty());
        assert!(s.elements_within(0, 100).is_empty());
        assert_eq!(s.span(), None);
        assert_eq!(s.start_time(), None);
    }

    #[test]
    fn test_span() {
        let s = sample_schedule();
        assert_eq!(s.span(), Some(TimeWindow::new(0, 10)));
    }

    #[test]
    fn test_snapshot_survives_mutation() {
        let mut s = sample_schedule();
        let snapshot = s.elements_at(4);
        s.clear();
        assert_eq!(snapshot.len(), 2);
        assert!(s.elements_at(4).is_empty());
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let mut s = Schedule::typed(ScheduleType::Other, ElementKind::Quantity);
        assert!(s.add_element(ScheduleElement::quantity(0, 1, 1.0)));
        assert!(!s.add_element(ScheduleElement::new(0, 1)));
        assert_eq!(s.len(), 1);

        let mut lax = Schedule::typed(ScheduleType::Other, ElementKind::Quantity)
            .with_config(&CoreConfig::default().with_strict_element_kinds(false));
        assert!(lax.add_element(ScheduleElement::new(0, 1)));
    }

    #[test]
    fn test_schedule_type_only_changes_while_empty() {
        let mut s = Schedule::new();
        assert!(s.set_schedule_type(ScheduleType::Role).is_ok());
        s.add_element(ScheduleElement::new(0, 1));
        assert!(matches!(
            s.set_schedule_type(ScheduleType::Other),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(s.schedule_type(), ScheduleType::Role);
    }

    #[test]
    fn test_set_element_kind_checks_contents() {
        let mut s = sample_schedule();
        assert!(s.set_element_kind(Some(ElementKind::Plain)).is_ok());
        assert!(s.set_element_kind(Some(ElementKind::Role)).is_err());
        assert!(s.set_element_kind(None).is_ok());
    }

    #[test]
    fn test_set_and_remove() {
        let mut s = sample_schedule();
        let e = ScheduleElement::new(5, 10);
        assert!(s.remove_element(&e));
        assert!(!s.remove_element(&e));
        assert_eq!(s.len(), 2);

        assert!(s.set_element(ScheduleElement::new(1, 2)));
        assert_eq!(s.len(), 1);

        assert_eq!(s.set_elements(sample_schedule().elements()), 3);
    }

    #[test]
    fn test_role_queries() {
        let supplier = Role::new("Supplier");
        let customer = Role::new("Customer");
        let truck = AssetId::new("truck-1");
        let s = Schedule::from_elements([
            ScheduleElement::role(0, 10, supplier.clone()),
            ScheduleElement::role(10, 20, customer.clone()),
            ScheduleElement::assignee(5, 15, truck.clone(), Some(supplier.clone())),
        ]);
        assert_eq!(s.elements_with_role(&supplier).len(), 2);
        assert_eq!(s.elements_with_role_at(&supplier, 12).len(), 1);
        assert_eq!(s.elements_with_role_at(&customer, 9).len(), 0);
        assert_eq!(s.elements_for_assignee(&truck).len(), 1);
    }

    #[test]
    fn test_builder_setters() {
        let mut e = ScheduleElement::new(0, 0).with_start(10).with_end(20);
        assert_eq!(e.window(), TimeWindow::new(10, 20));
        e.set_end_ms(30);
        assert_eq!(e.duration_ms(), 20);
        assert_eq!(e.kind(), ElementKind::Plain);
    }
}
