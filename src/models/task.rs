//! Task handles.
//!
//! The planning core never owns the task graph. It reads tasks through
//! [`TaskHandle`] (id, preferences, estimated result), writes preferences
//! through [`TaskHandleMut`], and resolves ids through [`TaskLookup`].
//! [`Task`] is a plain in-memory implementation used by tests and by
//! callers without a blackboard of their own.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::{AllocationResult, AspectType, Preference, TaskId, Verb};

/// Read-only view of a task.
pub trait TaskHandle {
    /// The task's identity.
    fn id(&self) -> &TaskId;

    /// The preference installed for `aspect_type`, if any.
    fn preference(&self, aspect_type: AspectType) -> Option<&Preference>;

    /// The most recent allocation result estimated for the task's plan
    /// element, if any.
    fn estimated_result(&self) -> Option<&AllocationResult>;

    /// The value the task prefers for `aspect_type`.
    fn preferred_value(&self, aspect_type: AspectType) -> Option<f64> {
        self.preference(aspect_type).map(Preference::preferred_value)
    }

    /// The estimated result's value for `aspect_type`.
    fn result_value(&self, aspect_type: AspectType) -> Option<f64> {
        self.estimated_result().and_then(|r| r.value(aspect_type))
    }
}

/// Mutable view of a task.
pub trait TaskHandleMut: TaskHandle {
    /// Installs `preference`, replacing any preference for the same aspect.
    fn set_preference(&mut self, preference: Preference);
}

/// Resolves task ids.
pub trait TaskLookup {
    /// The task type served.
    type Task: TaskHandle;

    /// The task with `id`, if known.
    fn task(&self, id: &TaskId) -> Option<&Self::Task>;

    /// Whether `id` resolves.
    fn contains_task(&self, id: &TaskId) -> bool {
        self.task(id).is_some()
    }
}

impl<T: TaskHandle> TaskLookup for HashMap<TaskId, T> {
    type Task = T;

    fn task(&self, id: &TaskId) -> Option<&T> {
        self.get(id)
    }
}

impl<T: TaskHandle> TaskLookup for BTreeMap<TaskId, T> {
    type Task = T;

    fn task(&self, id: &TaskId) -> Option<&T> {
        self.get(id)
    }
}

impl<T: TaskHandle> TaskLookup for [T] {
    type Task = T;

    fn task(&self, id: &TaskId) -> Option<&T> {
        self.iter().find(|t| t.id() == id)
    }
}

impl<T: TaskHandle> TaskLookup for Vec<T> {
    type Task = T;

    fn task(&self, id: &TaskId) -> Option<&T> {
        self.as_slice().task(id)
    }
}

/// A plain task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// What the task asks for, when interned through a registry.
    pub verb: Option<Verb>,
    /// At most one preference per aspect type.
    pub preferences: Vec<Preference>,
    /// Estimated allocation result of the task's plan element.
    pub estimated_result: Option<AllocationResult>,
    /// Domain-specific key-value metadata.
    pub attributes: HashMap<String, String>,
}

impl Task {
    /// Creates a new task with the given ID.
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            verb: None,
            preferences: Vec::new(),
            estimated_result: None,
            attributes: HashMap::new(),
        }
    }

    /// Sets the verb.
    pub fn with_verb(mut self, verb: Verb) -> Self {
        self.verb = Some(verb);
        self
    }

    /// Installs a preference.
    pub fn with_preference(mut self, preference: Preference) -> Self {
        self.set_preference(preference);
        self
    }

    /// Sets the estimated result.
    pub fn with_estimated_result(mut self, result: AllocationResult) -> Self {
        self.estimated_result = Some(result);
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Replaces or clears the estimated result.
    pub fn set_estimated_result(&mut self, result: Option<AllocationResult>) {
        self.estimated_result = result;
    }

    /// Weighted score of `result` against this task's preferences.
    ///
    /// Aspects the result does not report are skipped; `None` if none of
    /// the preferences apply.
    pub fn score(&self, result: &AllocationResult) -> Option<f64> {
        let mut applied = false;
        let mut total = 0.0;
        for p in &self.preferences {
            if let Some(v) = result.value(p.aspect_type) {
                applied = true;
                total += p.score(v);
            }
        }
        applied.then_some(total)
    }
}

impl TaskHandle for Task {
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

impl TaskHandleMut for Task {
    fn set_preference(&mut self, preference: Preference) {
        match self
            .preferences
            .iter_mut()
            .find(|p| p.aspect_type == preference.aspect_type)
        {
            Some(slot) => *slot = preference,
            None => self.preferences.push(preference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoringFunction;

    fn at(aspect_type: AspectType, point: f64) -> Preference {
        Preference::new(aspect_type, ScoringFunction::StrictlyAt { point })
    }

    #[test]
    fn test_task_builder() {
        let result = AllocationResult::from_pairs(1.0, true, &[(AspectType::END_TIME, 50.0)]).unwrap();
        let task = Task::new("T1")
            .with_preference(at(AspectType::END_TIME, 40.0))
            .with_estimated_result(result)
            .with_attribute("customer", "ACME");

        assert_eq!(task.id().as_str(), "T1");
        assert_eq!(task.preferred_value(AspectType::END_TIME), Some(40.0));
        assert_eq!(task.preferred_value(AspectType::START_TIME), None);
        assert_eq!(task.result_value(AspectType::END_TIME), Some(50.0));
        assert_eq!(task.attributes.get("customer"), Some(&"ACME".to_string()));
    }

    #[test]
    fn test_set_preference_replaces() {
        let mut task = Task::new("T1").with_preference(at(AspectType::COST, 1.0));
        task.set_preference(at(AspectType::COST, 2.0));
        assert_eq!(task.preferences.len(), 1);
        assert_eq!(task.preferred_value(AspectType::COST), Some(2.0));
    }

    #[test]
    fn test_score() {
        let task = Task::new("T1")
            .with_preference(at(AspectType::START_TIME, 10.0))
            .with_preference(at(AspectType::COST, 5.0));
        let ok = AllocationResult::from_pairs(1.0, true, &[(AspectType::START_TIME, 10.0)]).unwrap();
        let bad = AllocationResult::from_pairs(
            1.0,
            true,
            &[(AspectType::START_TIME, 10.0), (AspectType::COST, 6.0)],
        )
        .unwrap();
        assert_eq!(task.score(&ok), Some(0.0));
        assert_eq!(task.score(&bad), Some(1.0));
        assert_eq!(Task::new("T2").score(&ok), None);
    }

    #[test]
    fn test_lookup_impls() {
        let tasks = vec![Task::new("A"), Task::new("B")];
        assert!(tasks.contains_task(&TaskId::new("B")));
        assert!(!tasks.contains_task(&TaskId::new("C")));

        let map: HashMap<TaskId, Task> = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        assert_eq!(map.task(&TaskId::new("A")).map(|t| t.id.as_str()), Some("A"));
    }
}
