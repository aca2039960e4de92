//! Inter-task constraints.
//!
//! A [`Constraint`] relates one aspect of a *constrained* task to one aspect
//! of a *constraining* task (or to a fixed absolute value): the constrained
//! value must lie before, at, or after the constraining value plus an
//! offset. Each side is viewed through a [`ConstraintEvent`]; the
//! constrained side can be written through a [`SettableConstraintEvent`],
//! which installs a scoring preference on the task.
//!
//! # Example
//! ```
//! use u_plancore::models::{AspectType, Constraint, ConstraintOrder, Task};
//!
//! let c = Constraint::absolute(100.0, "T1", AspectType::END_TIME, ConstraintOrder::Before)
//!     .with_offset(-5.0);
//! let tasks = vec![Task::new("T1")];
//! assert_eq!(c.compute_valid_constrained_value(&tasks).unwrap(), 95.0);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AspectType, Preference, ScoringFunction, TaskHandle, TaskHandleMut, TaskId, TaskLookup};
use crate::error::{Error, Result};

/// Marks a value that is not known yet.
pub const NOVALUE: f64 = f64::NAN;

/// Which side of the target the constrained value must lie on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintOrder {
    /// Constrained value `<=` target.
    Before = -1,
    /// Constrained value `==` target.
    Coincident = 0,
    /// Constrained value `>=` target.
    After = 1,
}

impl ConstraintOrder {
    /// Non-temporal alias of [`Before`](Self::Before).
    pub const LESS_THAN: Self = Self::Before;
    /// Non-temporal alias of [`Coincident`](Self::Coincident).
    pub const EQUAL_TO: Self = Self::Coincident;
    /// Non-temporal alias of [`After`](Self::After).
    pub const GREATER_THAN: Self = Self::After;

    /// The integer code (-1, 0, 1).
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Parses an integer code.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            -1 => Ok(Self::Before),
            0 => Ok(Self::Coincident),
            1 => Ok(Self::After),
            other => Err(Error::invalid_value(format!(
                "constraint order must be -1, 0 or 1, got {other}"
            ))),
        }
    }

    /// Whether `constrained` lies on the permitted side of `target`.
    ///
    /// Exact comparison; NaN on either side is never admitted.
    pub fn admits(self, constrained: f64, target: f64) -> bool {
        match self {
            Self::Before => constrained <= target,
            Self::Coincident => constrained == target,
            Self::After => constrained >= target,
        }
    }
}

impl fmt::Display for ConstraintOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Before => "BEFORE",
            Self::Coincident => "COINCIDENT",
            Self::After => "AFTER",
        })
    }
}

/// The value the constrained side should adopt: `constraining_value + offset`.
///
/// The order never shifts the target; it only decides which side of it is
/// admissible (see [`ConstraintOrder::admits`]). NaN propagates.
#[inline]
pub fn compute_valid_constrained_value(constraining_value: f64, offset: f64) -> f64 {
    constraining_value + offset
}

/// What constrains a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraining {
    /// Another task's aspect.
    Task(TaskId),
    /// A fixed external bound.
    Absolute(f64),
}

/// A relation between two aspect values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// The constraining side.
    pub constraining: Constraining,
    /// Aspect read on the constraining side.
    pub constraining_aspect: AspectType,
    /// The task whose value is constrained.
    pub constrained_task: TaskId,
    /// Aspect constrained.
    pub constrained_aspect: AspectType,
    /// Added to the constraining value before comparison.
    pub offset: f64,
    /// Relation between the constrained value and the target.
    pub order: ConstraintOrder,
}

impl Constraint {
    /// A constraint between two tasks' aspects.
    pub fn between(
        constraining_task: impl Into<TaskId>,
        constraining_aspect: AspectType,
        constrained_task: impl Into<TaskId>,
        constrained_aspect: AspectType,
        order: ConstraintOrder,
    ) -> Self {
        Self {
            constraining: Constraining::Task(constraining_task.into()),
            constraining_aspect,
            constrained_task: constrained_task.into(),
            constrained_aspect,
            offset: 0.0,
            order,
        }
    }

    /// A constraint against a fixed value. Both aspects are `aspect_type`.
    pub fn absolute(
        value: f64,
        constrained_task: impl Into<TaskId>,
        aspect_type: AspectType,
        order: ConstraintOrder,
    ) -> Self {
        Self {
            constraining: Constraining::Absolute(value),
            constraining_aspect: aspect_type,
            constrained_task: constrained_task.into(),
            constrained_aspect: aspect_type,
            offset: 0.0,
            order,
        }
    }

    /// Sets the offset.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Whether the constraining side is a fixed value.
    pub fn is_absolute(&self) -> bool {
        matches!(self.constraining, Constraining::Absolute(_))
    }

    /// The constraining task, unless absolute.
    pub fn constraining_task(&self) -> Option<&TaskId> {
        match &self.constraining {
            Constraining::Task(id) => Some(id),
            Constraining::Absolute(_) => None,
        }
    }

    /// Whether `task` is on either side.
    pub fn involves(&self, task: &TaskId) -> bool {
        &self.constrained_task == task || self.constraining_task() == Some(task)
    }

    /// Whether the two aspects may be related: equal aspects always, and
    /// differing aspects only when one of them is a start or end time.
    pub fn has_compatible_aspects(&self) -> bool {
        let temporal = |at: AspectType| at == AspectType::START_TIME || at == AspectType::END_TIME;
        self.constraining_aspect == self.constrained_aspect
            || temporal(self.constraining_aspect)
            || temporal(self.constrained_aspect)
    }

    /// View of the constraining side.
    pub fn constraining_event<'a, L>(&self, lookup: &'a L) -> Result<ConstraintEvent<'a, L::Task>>
    where
        L: TaskLookup + ?Sized,
    {
        let source = match &self.constraining {
            Constraining::Task(id) => EventSource::Task(resolve(lookup, id)?),
            Constraining::Absolute(v) => EventSource::Absolute(*v),
        };
        Ok(ConstraintEvent {
            source,
            aspect_type: self.constraining_aspect,
            constraining: true,
        })
    }

    /// View of the constrained side.
    pub fn constrained_event<'a, L>(&self, lookup: &'a L) -> Result<ConstraintEvent<'a, L::Task>>
    where
        L: TaskLookup + ?Sized,
    {
        Ok(ConstraintEvent {
            source: EventSource::Task(resolve(lookup, &self.constrained_task)?),
            aspect_type: self.constrained_aspect,
            constraining: false,
        })
    }

    /// Writable view of the constrained side. `task` must be the
    /// constrained task.
    pub fn constrained_event_mut<'a, T: TaskHandleMut>(
        &self,
        task: &'a mut T,
    ) -> Result<SettableConstraintEvent<'a, T>> {
        if task.id() != &self.constrained_task {
            return Err(Error::invalid_operation(format!(
                "{} is not the constrained task {}",
                task.id(),
                self.constrained_task
            )));
        }
        Ok(SettableConstraintEvent {
            task,
            aspect_type: self.constrained_aspect,
            constraining: false,
        })
    }

    /// Writable view of the constraining side; it refuses writes.
    pub fn constraining_event_mut<'a, T: TaskHandleMut>(
        &self,
        task: &'a mut T,
    ) -> Result<SettableConstraintEvent<'a, T>> {
        if self.constraining_task() != Some(task.id()) {
            return Err(Error::invalid_operation(format!(
                "{} is not the constraining task",
                task.id()
            )));
        }
        Ok(SettableConstraintEvent {
            task,
            aspect_type: self.constraining_aspect,
            constraining: true,
        })
    }

    /// The value the constrained side should adopt. NaN while the
    /// constraining side has no value.
    pub fn compute_valid_constrained_value<L>(&self, lookup: &L) -> Result<f64>
    where
        L: TaskLookup + ?Sized,
    {
        let constraining = self.constraining_event(lookup)?.value();
        Ok(compute_valid_constrained_value(constraining, self.offset))
    }

    /// Whether the constrained task's *result* breaks the constraint.
    ///
    /// `false` while either side has no value.
    pub fn is_violated<L>(&self, lookup: &L) -> Result<bool>
    where
        L: TaskLookup + ?Sized,
    {
        let target = self.compute_valid_constrained_value(lookup)?;
        let actual = self.constrained_event(lookup)?.result_value();
        if target.is_nan() || actual.is_nan() {
            return Ok(false);
        }
        Ok(!self.order.admits(actual, target))
    }

    /// Whether the constrained task's *preference* does not (yet) honour
    /// the constraint.
    ///
    /// `false` while the constraining side has no value, `true` while only
    /// the constrained side has none.
    pub fn is_pending_or_violated<L>(&self, lookup: &L) -> Result<bool>
    where
        L: TaskLookup + ?Sized,
    {
        let target = self.compute_valid_constrained_value(lookup)?;
        if target.is_nan() {
            return Ok(false);
        }
        let preferred = self.constrained_event(lookup)?.value();
        if preferred.is_nan() {
            return Ok(true);
        }
        Ok(!self.order.admits(preferred, target))
    }

    /// Full diagnosis of the constraint.
    ///
    /// A reported result takes precedence over the preference; without a
    /// result a preference on the wrong side is already a violation.
    pub fn diagnose<L>(&self, lookup: &L) -> Result<ConstraintDiagnostic>
    where
        L: TaskLookup + ?Sized,
    {
        let target = self.compute_valid_constrained_value(lookup)?;
        let constrained = self.constrained_event(lookup)?;
        let result = constrained.result_value();
        let observed = if result.is_nan() { constrained.value() } else { result };

        let status = if target.is_nan() {
            ConstraintStatus::Undetermined
        } else if observed.is_nan() {
            ConstraintStatus::Pending
        } else if !self.order.admits(observed, target) {
            ConstraintStatus::Violated
        } else if result.is_nan() {
            ConstraintStatus::Pending
        } else {
            ConstraintStatus::Satisfied
        };
        Ok(ConstraintDiagnostic {
            status,
            target,
            observed,
        })
    }
}

fn resolve<'a, L>(lookup: &'a L, id: &TaskId) -> Result<&'a L::Task>
where
    L: TaskLookup + ?Sized,
{
    lookup.task(id).ok_or_else(|| Error::UnknownTask(id.clone()))
}

/// Outcome of [`Constraint::diagnose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintStatus {
    /// The constraining side has no value yet.
    Undetermined,
    /// The constrained side has no result yet and its preference is
    /// admissible or missing.
    Pending,
    /// The result honours the constraint.
    Satisfied,
    /// The result, or without one the preference, breaks the constraint.
    Violated,
}

/// A constraint's status plus the value that would satisfy it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDiagnostic {
    /// Status.
    pub status: ConstraintStatus,
    /// Value [`compute_valid_constrained_value`] yields; NaN if undetermined.
    pub target: f64,
    /// Constrained value that was judged; NaN if none.
    pub observed: f64,
}

impl ConstraintDiagnostic {
    /// Whether the constraint is violated.
    pub fn is_violated(&self) -> bool {
        self.status == ConstraintStatus::Violated
    }
}

#[derive(Debug)]
enum EventSource<'a, T> {
    Task(&'a T),
    Absolute(f64),
}

/// Read-only view of one side of a constraint.
#[derive(Debug)]
pub struct ConstraintEvent<'a, T> {
    source: EventSource<'a, T>,
    aspect_type: AspectType,
    constraining: bool,
}

impl<'a, T: TaskHandle> ConstraintEvent<'a, T> {
    /// The side's current value.
    ///
    /// Constraining side: the task's result, falling back to its
    /// preference until a result exists. Constrained side: the task's
    /// preference. Absolute side: the fixed value. [`NOVALUE`] otherwise.
    pub fn value(&self) -> f64 {
        match self.source {
            EventSource::Absolute(v) => v,
            EventSource::Task(task) if self.constraining => task
                .result_value(self.aspect_type)
                .or_else(|| task.preferred_value(self.aspect_type))
                .unwrap_or(NOVALUE),
            EventSource::Task(task) => task.preferred_value(self.aspect_type).unwrap_or(NOVALUE),
        }
    }

    /// The task's allocation-result value, whichever the side.
    /// Absolute sides report their fixed value.
    pub fn result_value(&self) -> f64 {
        match self.source {
            EventSource::Absolute(v) => v,
            EventSource::Task(task) => task.result_value(self.aspect_type).unwrap_or(NOVALUE),
        }
    }

    /// Aspect type of this side.
    pub fn aspect_type(&self) -> AspectType {
        self.aspect_type
    }

    /// The task, unless absolute.
    pub fn task(&self) -> Option<&'a T> {
        match self.source {
            EventSource::Task(task) => Some(task),
            EventSource::Absolute(_) => None,
        }
    }

    /// Whether this is the constraining side.
    pub fn is_constraining(&self) -> bool {
        self.constraining
    }

    /// Whether this side is a fixed value.
    pub fn is_absolute(&self) -> bool {
        matches!(self.source, EventSource::Absolute(_))
    }
}

/// Writable view of one side of a constraint.
#[derive(Debug)]
pub struct SettableConstraintEvent<'a, T> {
    task: &'a mut T,
    aspect_type: AspectType,
    constraining: bool,
}

impl<'a, T: TaskHandleMut> SettableConstraintEvent<'a, T> {
    /// See [`ConstraintEvent::value`].
    pub fn value(&self) -> f64 {
        if self.constraining {
            self.task
                .result_value(self.aspect_type)
                .or_else(|| self.task.preferred_value(self.aspect_type))
                .unwrap_or(NOVALUE)
        } else {
            self.task.preferred_value(self.aspect_type).unwrap_or(NOVALUE)
        }
    }

    /// See [`ConstraintEvent::result_value`].
    pub fn result_value(&self) -> f64 {
        self.task.result_value(self.aspect_type).unwrap_or(NOVALUE)
    }

    /// Aspect type of this side.
    pub fn aspect_type(&self) -> AspectType {
        self.aspect_type
    }

    /// The task.
    pub fn task(&self) -> &T {
        &*self.task
    }

    /// Whether this is the constraining side.
    pub fn is_constraining(&self) -> bool {
        self.constraining
    }

    /// Always `false`: absolute sides cannot be written.
    pub fn is_absolute(&self) -> bool {
        false
    }

    /// Installs a preference on the task biased toward `value`.
    ///
    /// `Before` prefers values at or below, `After` at or above,
    /// `Coincident` exactly `value` (or near it when `slope > 0`). The
    /// score grows by `slope` per unit away on the permitted side; the
    /// other side always scores worst. An existing preference's weight is
    /// kept.
    pub fn set_value(&mut self, value: f64, order: ConstraintOrder, slope: f64) -> Result<()> {
        if self.constraining {
            return Err(Error::invalid_operation(format!(
                "cannot set {} on the constraining task {}",
                self.aspect_type,
                self.task.id()
            )));
        }
        if !value.is_finite() {
            return Err(Error::invalid_value(format!(
                "constrained value for {} must be finite, got {value}",
                self.aspect_type
            )));
        }
        if !(slope >= 0.0 && slope.is_finite()) {
            return Err(Error::invalid_value(format!(
                "slope must be finite and non-negative, got {slope}"
            )));
        }

        let scoring = match order {
            ConstraintOrder::Before => ScoringFunction::Below { point: value, slope },
            ConstraintOrder::After => ScoringFunction::Above { point: value, slope },
            ConstraintOrder::Coincident if slope == 0.0 => ScoringFunction::StrictlyAt { point: value },
            ConstraintOrder::Coincident => ScoringFunction::PreferredAt { point: value, slope },
        };
        let weight = self
            .task
            .preference(self.aspect_type)
            .map_or(1.0, |p| p.weight);

        tracing::trace!(
            task = %self.task.id(),
            aspect = %self.aspect_type,
            value,
            %order,
            "installing constrained preference"
        );
        self.task
            .set_preference(Preference::new(self.aspect_type, scoring).with_weight(weight));
        Ok(())
    }

    /// Shorthand for `set_value(value, Coincident, 0.0)`.
    pub fn set_value_at(&mut self, value: f64) -> Result<()> {
        self.set_value(value, ConstraintOrder::Coincident, 0.0)
    }
}
