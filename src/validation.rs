//! Structural validation for workflows, constraints and compositions.
//!
//! Checks integrity before a planner starts reasoning over the structures.
//! Detects:
//! - Duplicate task references
//! - Constraints naming tasks outside their workflow
//! - Self constraints and incompatible aspect pairs
//! - Contradictory ordering cycles (difference constraints)
//! - Compositions whose combined task disagrees with its aggregations
//!
//! All checks collect every issue instead of stopping at the first.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 24.4 (Difference Constraints)

use crate::models::{
    AspectType, Composition, Constraining, Constraint, ConstraintOrder, TaskId, TaskLookup,
    Workflow,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// The same task is referenced twice where it must be unique.
    DuplicateId,
    /// A reference to a task the lookup or workflow does not know.
    UnknownTask,
    /// A constraint whose constraining and constrained task are the same.
    SelfConstraint,
    /// A constraint between aspects that cannot be compared.
    IncompatibleAspects,
    /// The ordering constraints form a cycle no values can satisfy.
    CyclicDependency,
    /// The combined task's parents differ from the aggregated parents.
    ParentMismatch,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a set of constraints against the tasks they name.
///
/// Checks:
/// 1. Every task a constraint names resolves through `lookup`
/// 2. No constraint ties a task to itself
/// 3. Every constraint compares compatible aspects
/// 4. No ordering cycle contradicts itself
pub fn validate_constraints<L: TaskLookup + ?Sized>(
    constraints: &[Constraint],
    lookup: &L,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut reported = HashSet::new();

    for c in constraints {
        let named = std::iter::once(&c.constrained_task).chain(c.constraining_task());
        for task in named {
            if !lookup.contains_task(task) && reported.insert(task) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownTask,
                    format!("Constraint references unknown task '{task}'"),
                ));
            }
        }
        if c.constraining_task() == Some(&c.constrained_task) {
            errors.push(ValidationError::new(
                ValidationErrorKind::SelfConstraint,
                format!("Task '{}' constrains itself", c.constrained_task),
            ));
        }
        if !c.has_compatible_aspects() {
            errors.push(ValidationError::new(
                ValidationErrorKind::IncompatibleAspects,
                format!(
                    "Constraint on '{}' compares aspect {} with aspect {}",
                    c.constrained_task, c.constrained_aspect, c.constraining_aspect
                ),
            ));
        }
    }

    if let Some(cycle_err) = detect_cycles(constraints) {
        errors.push(cycle_err);
    }

    finish(errors)
}

/// Validates a workflow against the task lookup that backs it.
///
/// Checks:
/// 1. No subtask is listed twice
/// 2. Every subtask resolves through `lookup`
/// 3. Every task a constraint names is a subtask of the workflow
/// 4. The constraints pass [`validate_constraints`], minus the
///    unknown-task check already covered by 3
pub fn validate_workflow<L: TaskLookup + ?Sized>(workflow: &Workflow, lookup: &L) -> ValidationResult {
    let mut errors = Vec::new();

    let mut members = HashSet::new();
    for task in workflow.tasks() {
        if !members.insert(task) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Subtask '{task}' listed twice"),
            ));
        }
        if !lookup.contains_task(task) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownTask,
                format!("Subtask '{task}' is not known"),
            ));
        }
    }

    for c in workflow.constraints() {
        let named = std::iter::once(&c.constrained_task).chain(c.constraining_task());
        for task in named {
            if !members.contains(task) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownTask,
                    format!(
                        "Constraint references '{task}' outside workflow '{}'",
                        workflow.parent_task()
                    ),
                ));
            }
        }
    }

    if let Err(more) = validate_constraints(workflow.constraints(), lookup) {
        errors.extend(
            more.into_iter()
                .filter(|e| e.kind != ValidationErrorKind::UnknownTask),
        );
    }

    finish(errors)
}

/// Validates a composition against the task lookup that backs it.
///
/// Checks:
/// 1. Every aggregated parent resolves through `lookup`
/// 2. The combined task, when present, is not one of its own parents
/// 3. The combined task's parents match the aggregated parents
pub fn validate_composition<L: TaskLookup + ?Sized>(
    composition: &Composition,
    lookup: &L,
) -> ValidationResult {
    let mut errors = Vec::new();

    for aggregation in composition.aggregations() {
        if !lookup.contains_task(&aggregation.parent) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownTask,
                format!("Aggregated parent '{}' is not known", aggregation.parent),
            ));
        }
    }

    if let Some(combined) = composition.combined_task() {
        let aggregated: BTreeSet<&TaskId> =
            composition.aggregations().iter().map(|a| &a.parent).collect();
        let parents: BTreeSet<&TaskId> = combined.parents().iter().collect();

        if parents.contains(&combined.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::SelfConstraint,
                format!("Combined task '{}' lists itself as a parent", combined.id),
            ));
        }
        if parents.len() != combined.parents().len() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Combined task '{}' lists a parent twice", combined.id),
            ));
        }
        for missing in aggregated.difference(&parents) {
            errors.push(ValidationError::new(
                ValidationErrorKind::ParentMismatch,
                format!("Combined task '{}' does not serve '{missing}'", combined.id),
            ));
        }
        for extra in parents.difference(&aggregated) {
            errors.push(ValidationError::new(
                ValidationErrorKind::ParentMismatch,
                format!("Combined task '{}' serves unaggregated '{extra}'", combined.id),
            ));
        }
    }

    finish(errors)
}

/// A variable of the ordering system: one task's aspect, or the origin
/// that absolute bounds are measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Point<'a> {
    Origin,
    Aspect(&'a TaskId, AspectType),
}

impl fmt::Display for Point<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Origin => f.write_str("a fixed bound"),
            Point::Aspect(task, aspect) => write!(f, "task '{task}' {aspect}"),
        }
    }
}

/// Relaxation slack below which a distance counts as unchanged.
const RELAXATION_EPSILON: f64 = 1e-9;

/// Detects ordering cycles that no assignment of values can satisfy.
///
/// Every constraint is a difference constraint on `(task, aspect)` points:
/// `Before` reads `x <= y + offset`, `After` reads `x >= y + offset` and
/// `Coincident` is both. Absolute bounds are measured from a shared origin,
/// and every task's start time lies at or before its end time. A cycle is
/// contradictory exactly when its weights sum below zero, so `A <= B` with
/// `B <= A` passes while `A <= B - 1` with `B <= A` does not.
///
/// # Algorithm
/// Bellman-Ford from a virtual source joined to every point. A relaxation
/// still possible after `n` rounds lies on a negative cycle.
///
/// # Reference
/// Cormen et al. (2009), "Introduction to Algorithms", Ch. 24.4 (Difference Constraints)
fn detect_cycles(constraints: &[Constraint]) -> Option<ValidationError> {
    let mut index: HashMap<Point<'_>, usize> = HashMap::new();
    let mut points: Vec<Point<'_>> = Vec::new();
    // (u, v, w): x_v - x_u <= w
    let mut edges: Vec<(usize, usize, f64)> = Vec::new();

    let mut point = |p| {
        *index.entry(p).or_insert_with(|| {
            points.push(p);
            points.len() - 1
        })
    };

    let mut timed = BTreeSet::new();
    for c in constraints {
        let (from, base) = match &c.constraining {
            Constraining::Task(task) => (Point::Aspect(task, c.constraining_aspect), 0.0),
            Constraining::Absolute(value) => (Point::Origin, *value),
        };
        let bound = base + c.offset;
        if !bound.is_finite() {
            continue;
        }
        let g = point(from);
        let x = point(Point::Aspect(&c.constrained_task, c.constrained_aspect));
        match c.order {
            ConstraintOrder::Before => edges.push((g, x, bound)),
            ConstraintOrder::After => edges.push((x, g, -bound)),
            ConstraintOrder::Coincident => {
                edges.push((g, x, bound));
                edges.push((x, g, -bound));
            }
        }
        timed.insert(&c.constrained_task);
        if let Constraining::Task(task) = &c.constraining {
            timed.insert(task);
        }
    }

    // start <= end within each task
    for task in timed {
        let start = index.get(&Point::Aspect(task, AspectType::START_TIME));
        let end = index.get(&Point::Aspect(task, AspectType::END_TIME));
        if let (Some(&start), Some(&end)) = (start, end) {
            edges.push((end, start, 0.0));
        }
    }

    let mut dist = vec![0.0_f64; points.len()];
    for _ in 0..points.len() {
        let mut relaxed = false;
        for &(u, v, w) in &edges {
            if dist[u] + w < dist[v] - RELAXATION_EPSILON {
                dist[v] = dist[u] + w;
                relaxed = true;
            }
        }
        if !relaxed {
            return None;
        }
    }

    edges
        .iter()
        .find(|&&(u, v, w)| dist[u] + w < dist[v] - RELAXATION_EPSILON)
        .map(|&(u, v, _)| {
            let culprit = match points[v] {
                Point::Origin => points[u],
                aspect => aspect,
            };
            ValidationError::new(
                ValidationErrorKind::CyclicDependency,
                format!("Contradictory ordering cycle involving {culprit}"),
            )
        })
}
