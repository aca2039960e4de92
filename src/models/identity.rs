//! Opaque identity handles.
//!
//! Tasks, assets and locations are owned by the surrounding blackboard. The
//! core only needs to compare and hash them, so each is a thin newtype.
//! Verbs and roles are interned through the [`Registry`](crate::Registry)
//! and share their backing string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a task on the blackboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a task id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identity of an asset (or an asset type, for typed quantities).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(String);

impl AssetId {
    /// Creates an asset id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A geographic location handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location(String);

impl Location {
    const PLACEHOLDER: &'static str = "<unknown-location>";

    /// Creates a location handle.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The location substituted by the legacy zero fallback.
    pub fn placeholder() -> Self {
        Self(Self::PLACEHOLDER.to_string())
    }

    /// Whether this is the placeholder location.
    pub fn is_placeholder(&self) -> bool {
        self.0 == Self::PLACEHOLDER
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An interned task verb (e.g. `Transport`, `Supply`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Verb(Arc<str>);

impl Verb {
    pub(crate) fn from_shared(name: Arc<str>) -> Self {
        Self(name)
    }

    /// The verb name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether two verbs share one interned string.
    pub fn is_interned_with(&self, other: &Verb) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An interned role an asset plays in a relationship (e.g. `Supplier`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role(Arc<str>);

impl Role {
    pub(crate) fn from_shared(name: Arc<str>) -> Self {
        Self(name)
    }

    /// Creates a role without interning it. Prefer
    /// [`Registry::role`](crate::Registry::role).
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The role name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the role name ends with `suffix` (e.g. `"Provider"`).
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_compare_by_value() {
        assert_eq!(TaskId::new("T1"), TaskId::from("T1"));
        assert!(TaskId::new("T1") < TaskId::new("T2"));
        assert_eq!(AssetId::new("truck").to_string(), "truck");
    }

    #[test]
    fn test_placeholder_location() {
        let p = Location::placeholder();
        assert!(p.is_placeholder());
        assert!(!Location::new("FtHood").is_placeholder());
    }

    #[test]
    fn test_role_suffix() {
        let r = Role::new("AmmunitionProvider");
        assert!(r.has_suffix("Provider"));
        assert!(!r.has_suffix("Customer"));
    }
}
