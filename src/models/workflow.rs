//! Workflows: a parent task's subtasks and the constraints among them.
//!
//! A [`Workflow`] rolls subtask results up into the parent's result
//! through an [`AllocationResultAggregator`], remembers which subtasks
//! changed since a plugin last looked, and checks its constraints.
//! Tasks are referenced by id and resolved through a [`TaskLookup`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{
    AllocationResult, AllocationResultAggregator, Constraint, DefaultAggregator, TaskHandle,
    TaskId, TaskLookup,
};
use crate::error::{Error, Result};

/// A subtask's result as seen by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTaskResult {
    task: TaskId,
    changed: bool,
    result: Option<AllocationResult>,
}

impl SubTaskResult {
    /// Creates a snapshot.
    pub fn new(task: TaskId, changed: bool, result: Option<AllocationResult>) -> Self {
        Self {
            task,
            changed,
            result,
        }
    }

    /// The subtask.
    pub fn task(&self) -> &TaskId {
        &self.task
    }

    /// Whether the result changed since the last read.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// The subtask's estimated result, if any.
    pub fn result(&self) -> Option<&AllocationResult> {
        self.result.as_ref()
    }
}

/// Per-subtask snapshots plus the aggregate they produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskResults {
    /// One entry per subtask, in workflow order.
    pub results: Vec<SubTaskResult>,
    /// The last aggregated result.
    pub aggregate: Option<AllocationResult>,
}

impl SubtaskResults {
    /// The entries that changed.
    pub fn changed(&self) -> impl Iterator<Item = &SubTaskResult> {
        self.results.iter().filter(|r| r.is_changed())
    }
}

/// A parent task's decomposition.
#[derive(Debug)]
pub struct Workflow {
    parent: TaskId,
    subtasks: Vec<TaskId>,
    constraints: Vec<Constraint>,
    aggregator: Box<dyn AllocationResultAggregator>,
    cached_result: Option<AllocationResult>,
    changed: BTreeSet<TaskId>,
    propagating_to_subtasks: bool,
}

impl Workflow {
    /// Creates an empty workflow using the [`DefaultAggregator`].
    pub fn new(parent: impl Into<TaskId>) -> Self {
        Self {
            parent: parent.into(),
            subtasks: Vec::new(),
            constraints: Vec::new(),
            aggregator: Box::new(DefaultAggregator),
            cached_result: None,
            changed: BTreeSet::new(),
            propagating_to_subtasks: true,
        }
    }

    /// Sets the aggregator.
    pub fn with_aggregator(mut self, aggregator: impl AllocationResultAggregator + 'static) -> Self {
        self.set_aggregator(Box::new(aggregator));
        self
    }

    /// Replaces the aggregator.
    pub fn set_aggregator(&mut self, aggregator: Box<dyn AllocationResultAggregator>) {
        self.aggregator = aggregator;
    }

    /// The parent task.
    pub fn parent_task(&self) -> &TaskId {
        &self.parent
    }

    /// Whether rescinding the parent rescinds the subtasks.
    pub fn is_propagating_to_subtasks(&self) -> bool {
        self.propagating_to_subtasks
    }

    /// Sets whether rescinding the parent rescinds the subtasks.
    pub fn set_propagating_to_subtasks(&mut self, propagating: bool) {
        self.propagating_to_subtasks = propagating;
    }

    // ================================
    // Subtasks
    // ================================

    /// Subtask ids in insertion order.
    pub fn tasks(&self) -> &[TaskId] {
        &self.subtasks
    }

    /// Appends a subtask. Clears the changed set.
    pub fn add_task(&mut self, task: impl Into<TaskId>) {
        self.subtasks.push(task.into());
        self.changed.clear();
    }

    /// Replaces all subtasks. Clears the changed set.
    pub fn set_tasks(&mut self, tasks: impl IntoIterator<Item = TaskId>) {
        self.subtasks = tasks.into_iter().collect();
        self.changed.clear();
    }

    /// Removes a subtask; `false` if it was not part of the workflow.
    pub fn remove_task(&mut self, task: &TaskId) -> bool {
        self.changed.remove(task);
        match self.subtasks.iter().position(|t| t == task) {
            Some(i) => {
                self.subtasks.remove(i);
                true
            }
            None => {
                tracing::warn!(workflow = %self.parent, %task, "task not in workflow");
                false
            }
        }
    }

    /// Removes all subtasks, returning them.
    pub fn clear_tasks(&mut self) -> Vec<TaskId> {
        self.changed.clear();
        std::mem::take(&mut self.subtasks)
    }

    // ================================
    // Constraints
    // ================================

    /// All constraints in insertion order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Adds a constraint. Differing aspects must involve a start or end
    /// time.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        if !constraint.has_compatible_aspects() {
            return Err(Error::invalid_value(format!(
                "incompatible constraint aspects {} and {}",
                constraint.constraining_aspect, constraint.constrained_aspect
            )));
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Replaces all constraints. Nothing changes if any is rejected.
    pub fn set_constraints(&mut self, constraints: impl IntoIterator<Item = Constraint>) -> Result<()> {
        let previous = std::mem::take(&mut self.constraints);
        for c in constraints {
            if let Err(e) = self.add_constraint(c) {
                self.constraints = previous;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Removes a constraint; `false` if absent.
    pub fn remove_constraint(&mut self, constraint: &Constraint) -> bool {
        match self.constraints.iter().position(|c| c == constraint) {
            Some(i) => {
                self.constraints.remove(i);
                true
            }
            None => false,
        }
    }

    /// Constraints with `task` on either side.
    pub fn task_constraints(&self, task: &TaskId) -> Vec<&Constraint> {
        self.constraints.iter().filter(|c| c.involves(task)).collect()
    }

    /// Constraints of `constrained` by `constraining`.
    pub fn pair_constraints(&self, constrained: &TaskId, constraining: &TaskId) -> Vec<&Constraint> {
        self.constraints
            .iter()
            .filter(|c| &c.constrained_task == constrained && c.constraining_task() == Some(constraining))
            .collect()
    }

    /// Whether any constraint's result breaks it.
    pub fn constraint_violation<L>(&self, lookup: &L) -> Result<bool>
    where
        L: TaskLookup + ?Sized,
    {
        for c in &self.constraints {
            if c.is_violated(lookup)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Constraints whose results break them, in insertion order.
    pub fn violated_constraints<L>(&self, lookup: &L) -> Result<Vec<&Constraint>>
    where
        L: TaskLookup + ?Sized,
    {
        let mut out = Vec::new();
        for c in &self.constraints {
            if c.is_violated(lookup)? {
                out.push(c);
            }
        }
        Ok(out)
    }

    /// The first constraint whose constraining side is known and whose
    /// constrained side is unknown or on the wrong side.
    pub fn next_pending_constraint<L>(&self, lookup: &L) -> Result<Option<&Constraint>>
    where
        L: TaskLookup + ?Sized,
    {
        for c in &self.constraints {
            if c.is_pending_or_violated(lookup)? {
                return Ok(Some(c));
            }
        }
        Ok(None)
    }

    // ================================
    // Results
    // ================================

    fn snapshot<L>(&self, lookup: &L) -> Result<Vec<SubTaskResult>>
    where
        L: TaskLookup + ?Sized,
    {
        self.subtasks
            .iter()
            .map(|id| {
                let task = lookup.task(id).ok_or_else(|| Error::UnknownTask(id.clone()))?;
                Ok(SubTaskResult::new(
                    id.clone(),
                    self.changed.contains(id),
                    task.estimated_result().cloned(),
                ))
            })
            .collect()
    }

    /// Re-aggregates the subtask results and records `changed` subtasks.
    ///
    /// `None` when the workflow has no subtasks or some subtask has no
    /// result yet.
    pub fn aggregate_allocation_results<L>(
        &mut self,
        lookup: &L,
        changed: impl IntoIterator<Item = TaskId>,
    ) -> Result<Option<AllocationResult>>
    where
        L: TaskLookup + ?Sized,
    {
        let snapshot = self.snapshot(lookup)?;
        let result = if snapshot.is_empty() {
            None
        } else {
            self.aggregator.calculate(&snapshot, self.cached_result.as_ref())
        };
        self.cached_result = result.clone();
        self.changed.extend(changed);
        Ok(result)
    }

    /// The result of the last aggregation.
    pub fn allocation_result(&self) -> Option<&AllocationResult> {
        self.cached_result.as_ref()
    }

    /// Per-subtask results with their changed flags. Clears the changed
    /// set, so a second call reports nothing as changed.
    pub fn subtask_results<L>(&mut self, lookup: &L) -> Result<SubtaskResults>
    where
        L: TaskLookup + ?Sized,
    {
        let results = self.snapshot(lookup)?;
        self.changed.clear();
        Ok(SubtaskResults {
            results,
            aggregate: self.cached_result.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectType, AspectValueAggregator, ConstraintOrder, Preference, ScoringFunction, Task};

    fn done(id: &str, start: f64, end: f64) -> Task {
        Task::new(id).with_estimated_result(
            AllocationResult::from_pairs(
                1.0,
                true,
                &[(AspectType::START_TIME, start), (AspectType::END_TIME, end)],
            )
            .unwrap(),
        )
    }

    fn workflow() -> Workflow {
        let mut wf = Workflow::new("P");
        wf.add_task("A");
        wf.add_task("B");
        wf
    }

    #[test]
    fn test_aggregate() {
        let tasks = vec![done("A", 0.0, 10.0), done("B", 10.0, 30.0)];
        let mut wf = workflow();
        let r = wf
            .aggregate_allocation_results(&tasks, [TaskId::new("A")])
            .unwrap()
            .unwrap();
        assert_eq!(r.value(AspectType::START_TIME), Some(0.0));
        assert_eq!(r.value(AspectType::END_TIME), Some(30.0));
        assert_eq!(r.value(AspectType::DURATION), Some(30.0));
        assert_eq!(wf.allocation_result(), Some(&r));
    }

    #[test]
    fn test_aggregate_pending_subtask() {
        let tasks = vec![done("A", 0.0, 10.0), Task::new("B")];
        let mut wf = workflow();
        assert!(wf.aggregate_allocation_results(&tasks, []).unwrap().is_none());
        assert!(Workflow::new("P")
            .aggregate_allocation_results(&tasks, [])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unknown_subtask() {
        let tasks = vec![done("A", 0.0, 10.0)];
        let mut wf = workflow();
        assert_eq!(
            wf.aggregate_allocation_results(&tasks, []).unwrap_err(),
            Error::UnknownTask(TaskId::new("B"))
        );
    }

    #[test]
    fn test_subtask_results_drain_changed() {
        let tasks = vec![done("A", 0.0, 10.0), done("B", 10.0, 30.0)];
        let mut wf = workflow().with_aggregator(AspectValueAggregator);
        wf.aggregate_allocation_results(&tasks, [TaskId::new("B")]).unwrap();

        let first = wf.subtask_results(&tasks).unwrap();
        let changed: Vec<&TaskId> = first.changed().map(SubTaskResult::task).collect();
        assert_eq!(changed, vec![&TaskId::new("B")]);
        assert!(first.aggregate.is_some());
        assert!(first.results.iter().all(|r| r.result().is_some()));

        let second = wf.subtask_results(&tasks).unwrap();
        assert_eq!(second.changed().count(), 0);
    }

    #[test]
    fn test_task_membership_resets_changed() {
        crate::test_support::init_tracing();
        let tasks = vec![done("A", 0.0, 10.0), done("B", 10.0, 30.0), done("C", 0.0, 1.0)];
        let mut wf = workflow();
        wf.aggregate_allocation_results(&tasks, [TaskId::new("A")]).unwrap();
        wf.add_task("C");
        assert_eq!(wf.subtask_results(&tasks).unwrap().changed().count(), 0);

        assert!(wf.remove_task(&TaskId::new("C")));
        assert!(!wf.remove_task(&TaskId::new("C")));
        assert_eq!(wf.tasks().len(), 2);
        assert_eq!(wf.clear_tasks().len(), 2);
        assert!(wf.tasks().is_empty());
    }

    #[test]
    fn test_constraints() {
        let mut wf = workflow();
        let ab = Constraint::between("A", AspectType::END_TIME, "B", AspectType::START_TIME, ConstraintOrder::After);
        wf.add_constraint(ab.clone()).unwrap();
        assert!(wf
            .add_constraint(Constraint::between(
                "A",
                AspectType::COST,
                "B",
                AspectType::QUANTITY,
                ConstraintOrder::Before
            ))
            .is_err());

        assert_eq!(wf.task_constraints(&TaskId::new("A")).len(), 1);
        assert_eq!(wf.pair_constraints(&TaskId::new("B"), &TaskId::new("A")).len(), 1);
        assert!(wf.pair_constraints(&TaskId::new("A"), &TaskId::new("B")).is_empty());

        let ok = vec![done("A", 0.0, 10.0), done("B", 10.0, 20.0)];
        assert!(!wf.constraint_violation(&ok).unwrap());

        let overlap = vec![done("A", 0.0, 10.0), done("B", 5.0, 20.0)];
        assert!(wf.constraint_violation(&overlap).unwrap());
        assert_eq!(wf.violated_constraints(&overlap).unwrap(), vec![&ab]);

        assert!(wf.remove_constraint(&ab));
        assert!(wf.constraints().is_empty());
    }

    #[test]
    fn test_next_pending_constraint() {
        let mut wf = workflow();
        wf.set_constraints([Constraint::between(
            "A",
            AspectType::END_TIME,
            "B",
            AspectType::START_TIME,
            ConstraintOrder::After,
        )])
        .unwrap();

        let tasks = vec![done("A", 0.0, 10.0), Task::new("B")];
        assert!(wf.next_pending_constraint(&tasks).unwrap().is_some());

        let tasks = vec![
            done("A", 0.0, 10.0),
            Task::new("B").with_preference(Preference::new(
                AspectType::START_TIME,
                ScoringFunction::Above { point: 10.0, slope: 0.0 },
            )),
        ];
        assert!(wf.next_pending_constraint(&tasks).unwrap().is_none());
    }
}
