//! Planning domain models.
//!
//! Plain data types for reasoning about tasks in time: what is measured
//! ([`AspectType`], [`AspectValue`]), when things happen ([`Schedule`]),
//! how tasks relate ([`Constraint`]), and how tasks are combined and split
//! ([`Composition`], [`Workflow`]).
//!
//! # Domain Mappings
//!
//! | u-plancore | Logistics | Manufacturing | Healthcare |
//! |------------|-----------|---------------|------------|
//! | Task | Shipment | Job/Order | Patient Case |
//! | Workflow | Route legs | Operations | Care pathway |
//! | Composition | Consolidated load | Batch | Shared OR slot |
//! | Schedule | Availability | Shift plan | Room plan |

mod aggregation;
mod allocation;
mod aspect;
mod aspect_value;
mod composition;
mod constraint;
mod distribution;
mod identity;
mod preference;
mod schedule;
mod schedule_ops;
mod task;
mod time_span;
mod workflow;

pub use aggregation::{
    AllocationResultAggregator, AspectValueAggregator, DefaultAggregator,
    SIGNIFICANT_CONFIDENCE_RATING_DELTA,
};
pub use allocation::{AllocationResult, AUXILIARY_QUERY_COUNT};
pub use aspect::{AspectKind, AspectType};
pub use aspect_value::{
    pooled_zero, slices_equal, slices_nearly_equal, AspectValue, RawValue, ZERO_POOL_SIZE,
};
pub use composition::{Aggregation, Composition, CompositionState, MpTask, RescindOutcome};
pub use constraint::{
    compute_valid_constrained_value, Constraining, Constraint, ConstraintDiagnostic,
    ConstraintEvent, ConstraintOrder, ConstraintStatus, SettableConstraintEvent, NOVALUE,
};
pub use distribution::{
    AllocationResultDistributor, EqualSplitDistributor, TaskScoreTable, WeightedDistributor,
};
pub use identity::{AssetId, Location, Role, TaskId, Verb};
pub use preference::{Preference, ScoringFunction, BEST, WORST};
pub use schedule::{ElementKind, ElementPayload, Schedule, ScheduleElement, ScheduleType};
pub use schedule_ops::{
    add_schedules, combine_like_quantity_elements, compute_non_overlapping, simplify,
    subtract_schedules, sum_elements,
};
pub use task::{Task, TaskHandle, TaskHandleMut, TaskLookup};
pub use time_span::{abuts, included, overlaps, TimeSpan, TimeWindow};
pub use workflow::{SubTaskResult, SubtaskResults, Workflow};
