//! Registry of aspect types and interned symbols.
//!
//! One [`Registry`] is built per process (or per test) and passed by
//! reference to whatever needs it. It knows every aspect type (the built-in
//! codes plus registered extensions) and interns verbs, roles and
//! relationship types so equal names share one allocation.
//!
//! # Concurrency
//! Lookups of built-in aspect codes read an immutable table and never
//! lock. Everything else sits behind a `parking_lot::RwLock` per table:
//! reads proceed concurrently, inserts are rare and short.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::config::CoreConfig;
use crate::error::{Error, Result};
use crate::models::{AspectKind, AspectType, AspectValue, RawValue, Role, Verb};

/// Prefix of a role's default converse name.
pub const DEFAULT_CONVERSE_PREFIX: &str = "ConverseOf";

/// Name and payload kind of one aspect type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AspectTypeInfo {
    /// The code.
    pub code: AspectType,
    /// Upper-case name, e.g. `START_TIME`.
    pub name: Arc<str>,
    /// Kind of values built for this aspect.
    pub kind: AspectKind,
}

static CORE_ASPECTS: LazyLock<Vec<AspectTypeInfo>> = LazyLock::new(|| {
    (0..AspectType::N_CORE_ASPECTS as i32)
        .map(AspectType)
        .filter_map(|at| {
            at.core_name().map(|name| AspectTypeInfo {
                code: at,
                name: Arc::from(name),
                kind: at.default_kind(),
            })
        })
        .collect()
});

/// A kind of relationship between two assets, naming the suffixes of the
/// two roles it creates (e.g. `Supplier`: `Provider` / `Customer`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipType {
    name: Arc<str>,
    first_suffix: Arc<str>,
    second_suffix: Arc<str>,
}

impl RelationshipType {
    /// The relationship name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Suffix of the first role.
    pub fn first_suffix(&self) -> &str {
        &self.first_suffix
    }

    /// Suffix of the second role.
    pub fn second_suffix(&self) -> &str {
        &self.second_suffix
    }
}

#[derive(Debug, Default)]
struct RoleTable {
    /// Role name to converse name.
    converse: HashMap<Arc<str>, Arc<str>>,
}

impl RoleTable {
    fn shared(&self, name: &str) -> Option<Arc<str>> {
        self.converse.get_key_value(name).map(|(k, _)| Arc::clone(k))
    }

    fn insert_pair(&mut self, role: &str, converse: &str) -> Result<(Role, Role)> {
        let role_conflict = self.converse.get(role).is_some_and(|c| &**c != converse);
        let converse_conflict = self.converse.get(converse).is_some_and(|c| &**c != role);
        if role_conflict || converse_conflict {
            return Err(Error::invalid_value(format!(
                "cannot create role pair {role}/{converse}: a role already has another converse"
            )));
        }

        let role_name = self.shared(role).unwrap_or_else(|| Arc::from(role));
        let converse_name = self.shared(converse).unwrap_or_else(|| Arc::from(converse));
        self.converse.insert(Arc::clone(&role_name), Arc::clone(&converse_name));
        self.converse.insert(Arc::clone(&converse_name), Arc::clone(&role_name));
        Ok((Role::from_shared(role_name), Role::from_shared(converse_name)))
    }
}

/// Aspect types and interned symbols.
#[derive(Debug, Default)]
pub struct Registry {
    config: CoreConfig,
    aspects: RwLock<HashMap<AspectType, AspectTypeInfo>>,
    verbs: RwLock<HashMap<Arc<str>, Verb>>,
    roles: RwLock<RoleTable>,
    relationship_types: RwLock<HashMap<Arc<str>, RelationshipType>>,
}

impl Registry {
    /// Creates a registry holding only the built-in aspect types.
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The configuration values are built with.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ================================
    // Aspect types
    // ================================

    /// Registers an extension aspect type.
    ///
    /// Fails with [`Error::InvalidValue`] for negative or built-in codes,
    /// and for codes or names already registered.
    pub fn register_aspect_type(&self, code: i32, name: &str, kind: AspectKind) -> Result<AspectType> {
        let at = AspectType(code);
        if code < 0 || at.is_core() {
            return Err(Error::invalid_value(format!(
                "aspect code {code} is reserved"
            )));
        }
        if name.is_empty() || AspectType::from_core_name(name).is_some() {
            return Err(Error::invalid_value(format!("aspect name {name:?} is reserved")));
        }

        let mut aspects = self.aspects.write();
        if aspects.contains_key(&at) {
            return Err(Error::invalid_value(format!("aspect code {code} already registered")));
        }
        if aspects.values().any(|info| &*info.name == name) {
            return Err(Error::invalid_value(format!("aspect name {name} already registered")));
        }
        aspects.insert(
            at,
            AspectTypeInfo {
                code: at,
                name: Arc::from(name),
                kind,
            },
        );
        tracing::debug!(code, name, ?kind, "registered aspect type");
        Ok(at)
    }

    /// Name and kind of `aspect_type`.
    pub fn aspect_type_info(&self, aspect_type: AspectType) -> Result<AspectTypeInfo> {
        if aspect_type.is_core() {
            if let Some(info) = CORE_ASPECTS.get(aspect_type.code() as usize) {
                return Ok(info.clone());
            }
        }
        self.aspects
            .read()
            .get(&aspect_type)
            .cloned()
            .ok_or(Error::UnknownAspectType(aspect_type.code()))
    }

    /// Looks an aspect type up by name.
    pub fn aspect_type_by_name(&self, name: &str) -> Option<AspectType> {
        AspectType::from_core_name(name).or_else(|| {
            self.aspects
                .read()
                .values()
                .find(|info| &*info.name == name)
                .map(|info| info.code)
        })
    }

    /// Kind of values built for `aspect_type`.
    pub fn aspect_kind(&self, aspect_type: AspectType) -> Result<AspectKind> {
        self.aspect_type_info(aspect_type).map(|info| info.kind)
    }

    /// Whether `aspect_type` is built in or registered.
    pub fn is_known(&self, aspect_type: AspectType) -> bool {
        self.aspect_type_info(aspect_type).is_ok()
    }

    /// Builds a value of the aspect's registered kind, honouring this
    /// registry's configuration.
    pub fn new_aspect_value(&self, aspect_type: AspectType, raw: impl Into<RawValue>) -> Result<AspectValue> {
        let kind = self.aspect_kind(aspect_type)?;
        AspectValue::create_with(kind, aspect_type, raw, &self.config)
    }

    // ================================
    // Verbs
    // ================================

    /// The interned verb `name`.
    pub fn verb(&self, name: &str) -> Verb {
        if let Some(v) = self.verbs.read().get(name) {
            return v.clone();
        }
        let mut verbs = self.verbs.write();
        verbs
            .entry(Arc::from(name))
            .or_insert_with_key(|key| Verb::from_shared(Arc::clone(key)))
            .clone()
    }

    /// Number of interned verbs.
    pub fn verb_count(&self) -> usize {
        self.verbs.read().len()
    }

    // ================================
    // Roles
    // ================================

    /// The interned role `name`, created with its default converse
    /// (`ConverseOf<name>`) if new.
    pub fn role(&self, name: &str) -> Role {
        if let Some(shared) = self.roles.read().shared(name) {
            return Role::from_shared(shared);
        }
        let mut roles = self.roles.write();
        if let Some(shared) = roles.shared(name) {
            return Role::from_shared(shared);
        }
        let converse = format!("{DEFAULT_CONVERSE_PREFIX}{name}");
        match roles.insert_pair(name, &converse) {
            Ok((role, _)) => role,
            // The converse name is taken by a role paired elsewhere.
            Err(_) => {
                tracing::warn!(role = name, "default converse unavailable, role is its own converse");
                let shared: Arc<str> = Arc::from(name);
                roles.converse.insert(Arc::clone(&shared), Arc::clone(&shared));
                Role::from_shared(shared)
            }
        }
    }

    /// Creates `role` and `converse` as each other's converse.
    ///
    /// Re-creating an existing pair returns it; pairing either name with a
    /// different converse fails with [`Error::InvalidValue`].
    pub fn create_role_pair(&self, role: &str, converse: &str) -> Result<(Role, Role)> {
        let pair = self.roles.write().insert_pair(role, converse)?;
        tracing::debug!(role, converse, "registered role pair");
        Ok(pair)
    }

    /// The converse of `role`, if `role` is known.
    pub fn converse(&self, role: &Role) -> Option<Role> {
        self.roles
            .read()
            .converse
            .get(role.as_str())
            .map(|c| Role::from_shared(Arc::clone(c)))
    }

    // ================================
    // Relationship types
    // ================================

    /// Registers (or returns the existing) relationship type `name`.
    ///
    /// Fails with [`Error::InvalidValue`] when `name` exists with other
    /// suffixes.
    pub fn relationship_type(&self, name: &str, first_suffix: &str, second_suffix: &str) -> Result<RelationshipType> {
        let mut types = self.relationship_types.write();
        if let Some(existing) = types.get(name) {
            if existing.first_suffix() == first_suffix && existing.second_suffix() == second_suffix {
                return Ok(existing.clone());
            }
            return Err(Error::invalid_value(format!(
                "relationship type {name} already registered as {}/{}",
                existing.first_suffix(),
                existing.second_suffix()
            )));
        }
        let created = RelationshipType {
            name: Arc::from(name),
            first_suffix: Arc::from(first_suffix),
            second_suffix: Arc::from(second_suffix),
        };
        types.insert(Arc::clone(&created.name), created.clone());
        tracing::debug!(name, first_suffix, second_suffix, "registered relationship type");
        Ok(created)
    }

    /// The relationship type `name`, if registered.
    pub fn relationship_type_by_name(&self, name: &str) -> Option<RelationshipType> {
        self.relationship_types.read().get(name).cloned()
    }

    /// Creates the role pair `root + first_suffix` / `root + second_suffix`.
    pub fn create_roles_for(&self, root: &str, relationship: &RelationshipType) -> Result<(Role, Role)> {
        self.create_role_pair(
            &format!("{root}{}", relationship.first_suffix()),
            &format!("{root}{}", relationship.second_suffix()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_aspects_known() {
        let r = Registry::default();
        let info = r.aspect_type_info(AspectType::START_TIME).unwrap();
        assert_eq!(&*info.name, "START_TIME");
        assert_eq!(info.kind, AspectKind::Long);
        assert_eq!(r.aspect_type_by_name("COST"), Some(AspectType::COST));
        assert_eq!(
            r.aspect_type_info(AspectType(99)).unwrap_err(),
            Error::UnknownAspectType(99)
        );
    }

    #[test]
    fn test_register_aspect_type() {
        crate::test_support::init_tracing();
        let r = Registry::default();
        let fuel = r.register_aspect_type(100, "FUEL_BURN", AspectKind::Double).unwrap();
        assert_eq!(r.aspect_type_by_name("FUEL_BURN"), Some(fuel));
        assert_eq!(r.aspect_kind(fuel).unwrap(), AspectKind::Double);

        let v = r.new_aspect_value(fuel, 12.5).unwrap();
        assert_eq!(v.kind(), AspectKind::Double);
        assert_eq!(v.numeric_value().unwrap(), 12.5);

        assert!(matches!(
            r.register_aspect_type(100, "OTHER", AspectKind::Int),
            Err(Error::InvalidValue(_))
        ));
        assert!(r.register_aspect_type(101, "FUEL_BURN", AspectKind::Int).is_err());
        assert!(r.register_aspect_type(3, "COST2", AspectKind::Int).is_err());
        assert!(r.register_aspect_type(102, "COST", AspectKind::Int).is_err());
    }

    #[test]
    fn test_registries_are_independent() {
        let a = Registry::default();
        let b = Registry::default();
        a.register_aspect_type(200, "X", AspectKind::Int).unwrap();
        assert!(!b.is_known(AspectType(200)));
        b.register_aspect_type(200, "X", AspectKind::Int).unwrap();
    }

    #[test]
    fn test_new_aspect_value_uses_config() {
        let strict = Registry::default();
        assert!(strict.new_aspect_value(AspectType::POD, 0.0).is_err());

        let legacy = Registry::new(CoreConfig::default().with_legacy_location_fallback(true));
        let v = legacy.new_aspect_value(AspectType::POD, 0.0).unwrap();
        assert!(v.location().unwrap().is_placeholder());
    }

    #[test]
    fn test_verbs_interned() {
        let r = Registry::default();
        let a = r.verb("Transport");
        let b = r.verb("Transport");
        assert!(a.is_interned_with(&b));
        assert_eq!(r.verb_count(), 1);
        assert_eq!(a.as_str(), "Transport");
    }

    #[test]
    fn test_roles_and_converse() {
        crate::test_support::init_tracing();
        let r = Registry::default();
        let (provider, customer) = r.create_role_pair("AmmoProvider", "AmmoCustomer").unwrap();
        assert_eq!(r.converse(&provider), Some(customer.clone()));
        assert_eq!(r.converse(&customer), Some(provider.clone()));
        assert!(r.create_role_pair("AmmoProvider", "AmmoCustomer").is_ok());
        assert!(r.create_role_pair("AmmoProvider", "Somebody").is_err());

        let plain = r.role("Assigned");
        assert_eq!(r.converse(&plain).unwrap().as_str(), "ConverseOfAssigned");
        assert_eq!(r.role("AmmoProvider"), provider);
        assert_eq!(r.converse(&Role::new("Unknown")), None);
    }

    #[test]
    fn test_relationship_types() {
        let r = Registry::default();
        let supplier = r.relationship_type("Supplier", "Provider", "Customer").unwrap();
        assert_eq!(r.relationship_type("Supplier", "Provider", "Customer").unwrap(), supplier);
        assert!(r.relationship_type("Supplier", "Giver", "Taker").is_err());
        assert_eq!(r.relationship_type_by_name("Supplier"), Some(supplier.clone()));

        let (p, c) = r.create_roles_for("Fuel", &supplier).unwrap();
        assert_eq!(p.as_str(), "FuelProvider");
        assert_eq!(c.as_str(), "FuelCustomer");
        assert_eq!(r.converse(&p), Some(c));
    }

    #[test]
    fn test_concurrent_interning() {
        let r = Arc::new(Registry::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || (0..50).map(|i| r.verb(&format!("V{}", i % 5))).count())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 50);
        }
        assert_eq!(r.verb_count(), 5);
    }
}
