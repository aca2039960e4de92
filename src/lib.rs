//! Temporal and constraint reasoning core for task planning.
//!
//! Provides the value, schedule, constraint and composition types a
//! planning engine reasons with. The crate is synchronous and does no I/O;
//! the planning layer above owns the task graph, persistence and
//! scheduling of work.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `AspectValue`, `Schedule`, `Constraint`,
//!   `AllocationResult`, `Workflow`, `Composition` and their strategies
//! - **`registry`**: Aspect types and interned verbs, roles and
//!   relationship types
//! - **`validation`**: Structural checks (unknown tasks, precedence cycles,
//!   composition consistency)
//! - **`config`**: `CoreConfig` switches
//!
//! # Time Model
//!
//! Times are `i64` milliseconds from a consumer-chosen epoch. Every
//! interval is half-open, `[start, end)`.
//!
//! # Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod validation;

pub use config::CoreConfig;
pub use error::{Error, Result};
pub use registry::Registry;
