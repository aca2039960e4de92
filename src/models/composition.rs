//! Compositions: several parent tasks combined into one synthetic task.
//!
//! Each parent joins through an [`Aggregation`]; the synthetic task is an
//! [`MpTask`] (multi-parent task). Once the combined task has a result,
//! the composition's distributor splits it back across the parents.
//!
//! # Lifecycle
//! `Open` (collecting aggregations) → `Active` (combined task set) →
//! `Dissolved` (everything rescinded). A non-propagating rescind prunes
//! one parent and leaves the composition `Active` while parents remain.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{
    AllocationResult, AllocationResultDistributor, AspectType, EqualSplitDistributor, Preference,
    TaskHandle, TaskHandleMut, TaskId, TaskScoreTable, Verb,
};
use crate::error::{Error, Result};

/// A parent task's membership in a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// The parent task.
    pub parent: TaskId,
    /// The parent's share of the combined result, once distributed.
    pub estimated_result: Option<AllocationResult>,
}

impl Aggregation {
    /// Creates an aggregation for `parent`.
    pub fn new(parent: impl Into<TaskId>) -> Self {
        Self {
            parent: parent.into(),
            estimated_result: None,
        }
    }
}

/// The combined task of a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpTask {
    /// Unique task identifier.
    pub id: TaskId,
    /// What the task asks for.
    pub verb: Option<Verb>,
    parents: Vec<TaskId>,
    preferences: Vec<Preference>,
    estimated_result: Option<AllocationResult>,
}

impl MpTask {
    /// Creates a combined task with no parents.
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            verb: None,
            parents: Vec::new(),
            preferences: Vec::new(),
            estimated_result: None,
        }
    }

    /// Sets the parents.
    pub fn with_parents(mut self, parents: impl IntoIterator<Item = TaskId>) -> Self {
        self.parents = parents.into_iter().collect();
        self
    }

    /// Sets the verb.
    pub fn with_verb(mut self, verb: Verb) -> Self {
        self.verb = Some(verb);
        self
    }

    /// Parent tasks in join order.
    pub fn parents(&self) -> &[TaskId] {
        &self.parents
    }

    /// Removes a parent; `false` if absent.
    pub fn remove_parent(&mut self, parent: &TaskId) -> bool {
        let before = self.parents.len();
        self.parents.retain(|p| p != parent);
        self.parents.len() != before
    }

    /// Sets or clears the estimated result.
    pub fn set_estimated_result(&mut self, result: Option<AllocationResult>) {
        self.estimated_result = result;
    }
}

impl TaskHandle for MpTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn preference(&self, aspect_type: AspectType) -> Option<&Preference> {
        self.preferences.iter().find(|p| p.aspect_type == aspect_type)
    }

    fn estimated_result(&self) -> Option<&AllocationResult> {
        self.estimated_result.as_ref()
    }
}

impl TaskHandleMut for MpTask {
    fn set_preference(&mut self, preference: Preference) {
        self.preferences.retain(|p| p.aspect_type != preference.aspect_type);
        self.preferences.push(preference);
    }
}

/// Lifecycle state of a [`Composition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompositionState {
    /// Collecting aggregations; no combined task yet.
    Open,
    /// Combined task set; results flow.
    Active,
    /// Everything rescinded.
    Dissolved,
}

/// What a [`Composition::rescind`] took down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescindOutcome {
    /// Parents whose aggregations were removed.
    pub rescinded_aggregations: Vec<TaskId>,
    /// The combined task, if it was rescinded too.
    pub rescinded_combined_task: Option<TaskId>,
}

/// Parent tasks combined into one [`MpTask`].
#[derive(Debug)]
pub struct Composition {
    aggregations: Vec<Aggregation>,
    combined_task: Option<MpTask>,
    distributor: Box<dyn AllocationResultDistributor>,
    propagating: bool,
    dissolved: bool,
}

impl Default for Composition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition {
    /// Creates an open, propagating composition with the
    /// [`EqualSplitDistributor`].
    pub fn new() -> Self {
        Self {
            aggregations: Vec::new(),
            combined_task: None,
            distributor: Box::new(EqualSplitDistributor),
            propagating: true,
            dissolved: false,
        }
    }

    /// Sets the distributor.
    pub fn with_distributor(mut self, distributor: impl AllocationResultDistributor + 'static) -> Self {
        self.set_distributor(Box::new(distributor));
        self
    }

    /// Sets whether rescinding one aggregation rescinds everything.
    pub fn with_propagating(mut self, propagating: bool) -> Self {
        self.propagating = propagating;
        self
    }

    /// Replaces the distributor.
    pub fn set_distributor(&mut self, distributor: Box<dyn AllocationResultDistributor>) {
        self.distributor = distributor;
    }

    /// The distributor.
    pub fn distributor(&self) -> &dyn AllocationResultDistributor {
        self.distributor.as_ref()
    }

    /// Whether rescinding one aggregation rescinds everything.
    pub fn is_propagating(&self) -> bool {
        self.propagating
    }

    /// Sets whether rescinding one aggregation rescinds everything.
    pub fn set_propagating(&mut self, propagating: bool) {
        self.propagating = propagating;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CompositionState {
        if self.dissolved {
            CompositionState::Dissolved
        } else if self.combined_task.is_some() {
            CompositionState::Active
        } else {
            CompositionState::Open
        }
    }

    fn ensure_live(&self, operation: &str) -> Result<()> {
        if self.dissolved {
            return Err(Error::invalid_operation(format!(
                "{operation} on a dissolved composition"
            )));
        }
        Ok(())
    }

    // ================================
    // Membership
    // ================================

    /// The aggregations in join order.
    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    /// The aggregation of `parent`.
    pub fn aggregation(&self, parent: &TaskId) -> Option<&Aggregation> {
        self.aggregations.iter().find(|a| &a.parent == parent)
    }

    /// Parent tasks, derived from the aggregations.
    pub fn parent_tasks(&self) -> Vec<TaskId> {
        self.aggregations.iter().map(|a| a.parent.clone()).collect()
    }

    /// Adds an aggregation. An active combined task gains the parent too.
    pub fn add_aggregation(&mut self, aggregation: Aggregation) -> Result<()> {
        self.ensure_live("add_aggregation")?;
        if self.aggregation(&aggregation.parent).is_some() {
            return Err(Error::inconsistent(format!(
                "{} already aggregated",
                aggregation.parent
            )));
        }
        if let Some(mp) = self.combined_task.as_mut() {
            if !mp.parents.contains(&aggregation.parent) {
                mp.parents.push(aggregation.parent.clone());
            }
        }
        self.aggregations.push(aggregation);
        Ok(())
    }

    /// Replaces all aggregations. An active combined task's parents follow.
    pub fn set_aggregations(&mut self, aggregations: impl IntoIterator<Item = Aggregation>) -> Result<()> {
        self.ensure_live("set_aggregations")?;
        let aggregations: Vec<Aggregation> = aggregations.into_iter().collect();
        let mut seen = BTreeSet::new();
        for a in &aggregations {
            if !seen.insert(&a.parent) {
                return Err(Error::inconsistent(format!("{} aggregated twice", a.parent)));
            }
        }
        self.aggregations = aggregations;
        let parents = self.parent_tasks();
        if let Some(mp) = self.combined_task.as_mut() {
            mp.parents = parents;
        }
        self.dissolve_if_orphaned();
        Ok(())
    }

    /// Removes and returns all aggregations. An active composition
    /// dissolves with them.
    pub fn clear_aggregations(&mut self) -> Vec<Aggregation> {
        let cleared = std::mem::take(&mut self.aggregations);
        if let Some(mp) = self.combined_task.as_mut() {
            mp.parents.clear();
        }
        self.dissolve_if_orphaned();
        cleared
    }

    /// A combined task never outlives its parents: once the last one is
    /// gone the combined task is dropped and the composition dissolves.
    fn dissolve_if_orphaned(&mut self) -> Option<TaskId> {
        let orphaned = self
            .combined_task
            .as_ref()
            .is_some_and(|mp| mp.parents.is_empty() || self.aggregations.is_empty());
        if !orphaned {
            return None;
        }
        self.dissolved = true;
        self.combined_task.take().map(|mp| mp.id)
    }

    // ================================
    // Combined task
    // ================================

    /// Installs the combined task and activates the composition.
    ///
    /// At least one parent must be aggregated. A task without parents
    /// adopts the aggregated parents; otherwise its parents must match them
    /// exactly.
    pub fn set_combined_task(&mut self, mut task: MpTask) -> Result<()> {
        self.ensure_live("set_combined_task")?;
        if self.aggregations.is_empty() {
            return Err(Error::inconsistent(format!(
                "combined task {} has no aggregated parents",
                task.id
            )));
        }
        if task.parents.is_empty() {
            task.parents = self.parent_tasks();
        } else {
            let mine: BTreeSet<&TaskId> = self.aggregations.iter().map(|a| &a.parent).collect();
            let theirs: BTreeSet<&TaskId> = task.parents.iter().collect();
            if mine != theirs || theirs.len() != task.parents.len() {
                return Err(Error::inconsistent(format!(
                    "combined task {} parents do not match the aggregations",
                    task.id
                )));
            }
        }
        self.combined_task = Some(task);
        Ok(())
    }

    /// The combined task.
    pub fn combined_task(&self) -> Option<&MpTask> {
        self.combined_task.as_ref()
    }

    /// The combined task, mutably (to record its result).
    pub fn combined_task_mut(&mut self) -> Option<&mut MpTask> {
        self.combined_task.as_mut()
    }

    // ================================
    // Distribution
    // ================================

    /// Splits the combined task's result across the parents.
    ///
    /// The table holds exactly one entry per parent.
    pub fn calculate_distribution(&self) -> Result<TaskScoreTable> {
        let mp = match (self.state(), self.combined_task.as_ref()) {
            (CompositionState::Active, Some(mp)) => mp,
            (state, _) => {
                return Err(Error::invalid_operation(format!(
                    "distribution needs an active composition, state is {state:?}"
                )))
            }
        };
        let combined = mp.estimated_result().ok_or_else(|| {
            Error::invalid_operation(format!("combined task {} has no result", mp.id))
        })?;

        let parents = self.parent_tasks();
        let table = self.distributor.calculate(&parents, combined)?;
        if table.len() != parents.len() || !parents.iter().all(|p| table.contains_key(p)) {
            return Err(Error::inconsistent(format!(
                "distributor returned {} results for {} parents",
                table.len(),
                parents.len()
            )));
        }
        Ok(table)
    }

    /// Computes the distribution and records each parent's share on its
    /// aggregation.
    pub fn distribute(&mut self) -> Result<TaskScoreTable> {
        let table = self.calculate_distribution()?;
        for a in &mut self.aggregations {
            a.estimated_result = table.get(&a.parent).cloned();
        }
        Ok(table)
    }

    // ================================
    // Rescind
    // ================================

    /// Rescinds the aggregation of `parent`.
    ///
    /// Propagating: every aggregation and the combined task go, and the
    /// composition dissolves. Otherwise only `parent` is pruned; the
    /// composition dissolves when no parent remains.
    pub fn rescind(&mut self, parent: &TaskId) -> Result<RescindOutcome> {
        self.ensure_live("rescind")?;
        let Some(index) = self.aggregations.iter().position(|a| &a.parent == parent) else {
            return Err(Error::inconsistent(format!("{parent} is not aggregated")));
        };

        let mut outcome = RescindOutcome::default();
        if self.propagating {
            outcome.rescinded_aggregations = self.aggregations.drain(..).map(|a| a.parent).collect();
            outcome.rescinded_combined_task = self.combined_task.take().map(|mp| mp.id);
            self.dissolved = true;
        } else {
            outcome.rescinded_aggregations.push(self.aggregations.remove(index).parent);
            if let Some(mp) = self.combined_task.as_mut() {
                mp.remove_parent(parent);
                outcome.rescinded_combined_task = self.dissolve_if_orphaned();
            } else if self.aggregations.is_empty() {
                self.dissolved = true;
            }
        }

        tracing::debug!(
            %parent,
            propagating = self.propagating,
            aggregations = outcome.rescinded_aggregations.len(),
            combined = outcome.rescinded_combined_task.is_some(),
            "rescinded aggregation"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeightedDistributor;

    fn id(s: &str) -> TaskId {
        TaskId::new(s)
    }

    fn active(propagating: bool) -> Composition {
        let mut c = Composition::new().with_propagating(propagating);
        c.set_aggregations([Aggregation::new("T1"), Aggregation::new("T2")])
            .unwrap();
        let mut mp = MpTask::new("MP");
        mp.set_estimated_result(Some(
            AllocationResult::from_pairs(1.0, true, &[(AspectType::QUANTITY, 100.0)]).unwrap(),
        ));
        c.set_combined_task(mp).unwrap();
        c
    }

    #[test]
    fn test_lifecycle() {
        let mut c = Composition::new();
        assert_eq!(c.state(), CompositionState::Open);
        c.add_aggregation(Aggregation::new("T1")).unwrap();
        c.set_combined_task(MpTask::new("MP")).unwrap();
        assert_eq!(c.state(), CompositionState::Active);
        assert_eq!(c.combined_task().unwrap().parents(), &[id("T1")]);

        c.add_aggregation(Aggregation::new("T2")).unwrap();
        assert_eq!(c.parent_tasks(), vec![id("T1"), id("T2")]);
        assert_eq!(c.combined_task().unwrap().parents(), &[id("T1"), id("T2")]);
    }

    #[test]
    fn test_equal_split_distribution() {
        let c = active(true);
        let table = c.calculate_distribution().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[&id("T1")].value(AspectType::QUANTITY), Some(50.0));
        assert_eq!(table[&id("T2")].value(AspectType::QUANTITY), Some(50.0));
    }

    #[test]
    fn test_distribute_records_shares() {
        let mut c = active(true).with_distributor(
            WeightedDistributor::new()
                .with_weight("T1", 1.0)
                .unwrap()
                .with_weight("T2", 4.0)
                .unwrap(),
        );
        c.distribute().unwrap();
        let t2 = c.aggregation(&id("T2")).unwrap();
        assert_eq!(
            t2.estimated_result.as_ref().unwrap().value(AspectType::QUANTITY),
            Some(80.0)
        );
    }

    #[test]
    fn test_distribution_needs_result() {
        let mut c = Composition::new();
        c.add_aggregation(Aggregation::new("T1")).unwrap();
        assert!(matches!(c.calculate_distribution(), Err(Error::InvalidOperation(_))));
        c.set_combined_task(MpTask::new("MP")).unwrap();
        assert!(matches!(c.calculate_distribution(), Err(Error::InvalidOperation(_))));
    }

    #[derive(Debug)]
    struct Forgetful;

    impl AllocationResultDistributor for Forgetful {
        fn calculate(&self, parents: &[TaskId], combined: &AllocationResult) -> Result<TaskScoreTable> {
            Ok(TaskScoreTable::from([(parents[0].clone(), combined.clone())]))
        }
    }

    #[test]
    fn test_incomplete_distribution_rejected() {
        let c = active(true).with_distributor(Forgetful);
        assert!(matches!(
            c.calculate_distribution(),
            Err(Error::InconsistentComposition(_))
        ));
    }

    #[test]
    fn test_membership_errors() {
        let mut c = Composition::new();
        c.add_aggregation(Aggregation::new("T1")).unwrap();
        assert!(c.add_aggregation(Aggregation::new("T1")).is_err());
        assert!(c
            .set_aggregations([Aggregation::new("A"), Aggregation::new("A")])
            .is_err());
        assert_eq!(c.parent_tasks(), vec![id("T1")]);
        assert!(matches!(
            c.set_combined_task(MpTask::new("MP").with_parents([id("T9")])),
            Err(Error::InconsistentComposition(_))
        ));
    }

    #[test]
    fn test_propagating_rescind_dissolves() {
        crate::test_support::init_tracing();
        let mut c = active(true);
        let outcome = c.rescind(&id("T1")).unwrap();
        assert_eq!(outcome.rescinded_aggregations, vec![id("T1"), id("T2")]);
        assert_eq!(outcome.rescinded_combined_task, Some(id("MP")));
        assert_eq!(c.state(), CompositionState::Dissolved);
        assert!(c.parent_tasks().is_empty());
        assert!(c.combined_task().is_none());
        assert!(c.rescind(&id("T2")).is_err());
        assert!(c.add_aggregation(Aggregation::new("T3")).is_err());
    }

    #[test]
    fn test_non_propagating_rescind_prunes() {
        crate::test_support::init_tracing();
        let mut c = active(false);
        let outcome = c.rescind(&id("T1")).unwrap();
        assert_eq!(outcome.rescinded_aggregations, vec![id("T1")]);
        assert_eq!(outcome.rescinded_combined_task, None);
        assert_eq!(c.state(), CompositionState::Active);
        assert_eq!(c.parent_tasks(), vec![id("T2")]);
        assert_eq!(c.combined_task().unwrap().parents(), &[id("T2")]);

        let table = c.calculate_distribution().unwrap();
        assert_eq!(table[&id("T2")].value(AspectType::QUANTITY), Some(100.0));

        let last = c.rescind(&id("T2")).unwrap();
        assert_eq!(last.rescinded_combined_task, Some(id("MP")));
        assert_eq!(c.state(), CompositionState::Dissolved);
    }

    #[test]
    fn test_clearing_active_composition_dissolves() {
        let mut c = active(false);
        let cleared = c.clear_aggregations();
        assert_eq!(cleared.len(), 2);
        assert_eq!(c.state(), CompositionState::Dissolved);
        assert!(c.combined_task().is_none());
        assert!(c.add_aggregation(Aggregation::new("T3")).is_err());
    }

    #[test]
    fn test_emptying_aggregations_dissolves() {
        let mut c = active(true);
        c.set_aggregations(Vec::<Aggregation>::new()).unwrap();
        assert_eq!(c.state(), CompositionState::Dissolved);
        assert!(c.combined_task().is_none());
    }

    #[test]
    fn test_clearing_open_composition_stays_open() {
        let mut c = Composition::new();
        c.add_aggregation(Aggregation::new("T1")).unwrap();
        c.clear_aggregations();
        assert_eq!(c.state(), CompositionState::Open);
        assert!(matches!(
            c.set_combined_task(MpTask::new("MP")),
            Err(Error::InconsistentComposition(_))
        ));
        assert_eq!(c.state(), CompositionState::Open);
    }

    #[test]
    fn test_rescind_unknown_parent() {
        let mut c = active(false);
        assert!(matches!(
            c.rescind(&id("T9")),
            Err(Error::InconsistentComposition(_))
        ));
    }
}
