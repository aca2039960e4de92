//! Aspect values.
//!
//! An [`AspectValue`] is an immutable, strongly typed measurement tagged with
//! an [`AspectType`]. It is the atomic unit compared and combined by
//! allocation results, preferences and constraints.
//!
//! # Construction
//!
//! Values are built with a variant-selecting factory. The requested
//! [`AspectKind`] decides the payload; the [`RawValue`] is coerced into it or
//! rejected:
//!
//! ```
//! use u_plancore::models::{AspectKind, AspectType, AspectValue, RawValue};
//!
//! let cost = AspectValue::create(AspectKind::Int, AspectType::COST, RawValue::Double(2.5)).unwrap();
//! assert_eq!(cost.int_value().unwrap(), 3); // half away from zero
//!
//! assert!(AspectValue::create(AspectKind::Double, AspectType::COST, RawValue::Double(f64::NAN)).is_err());
//! ```
//!
//! # Equality
//!
//! Equality is per variant: an `Int` 3 and a `Float` 3.0 of the same aspect
//! type are different values. Pooled zeros are shared by value only; nothing
//! relies on reference identity.

use crate::config::CoreConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{LazyLock, Once};

use super::{AspectKind, AspectType, AssetId, Location};

/// Number of pooled zero values, indexed by aspect code.
pub const ZERO_POOL_SIZE: usize = 20;

/// Relative tolerance used by [`AspectValue::nearly_equals`].
const NEARLY_EQUAL_EPSILON: f64 = 1e-7;

/// An immutable measurement tagged with its aspect type.
///
/// Deserialized values pass through [`AspectValue::create`], so they obey
/// the same rules as constructed ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "AspectValueRepr", into = "AspectValueRepr")]
pub enum AspectValue {
    /// 32-bit integer value.
    Int { aspect_type: AspectType, value: i32 },
    /// 64-bit integer value (times are longs).
    Long { aspect_type: AspectType, value: i64 },
    /// 32-bit float value.
    Float { aspect_type: AspectType, value: f32 },
    /// 64-bit float value.
    Double { aspect_type: AspectType, value: f64 },
    /// A location; has no numeric value.
    Location {
        aspect_type: AspectType,
        location: Location,
    },
    /// A quantity of a particular asset type.
    TypedQuantity {
        aspect_type: AspectType,
        asset_type: AssetId,
        quantity: f32,
    },
}

/// Wire shape of [`AspectValue`]; same variants, unchecked.
#[derive(Serialize, Deserialize)]
#[serde(rename = "AspectValue")]
enum AspectValueRepr {
    Int { aspect_type: AspectType, value: i32 },
    Long { aspect_type: AspectType, value: i64 },
    Float { aspect_type: AspectType, value: f32 },
    Double { aspect_type: AspectType, value: f64 },
    Location {
        aspect_type: AspectType,
        location: Location,
    },
    TypedQuantity {
        aspect_type: AspectType,
        asset_type: AssetId,
        quantity: f32,
    },
}

impl TryFrom<AspectValueRepr> for AspectValue {
    type Error = Error;

    fn try_from(repr: AspectValueRepr) -> Result<Self> {
        use AspectValueRepr as R;
        match repr {
            R::Int { aspect_type, value } => Self::create(AspectKind::Int, aspect_type, value),
            R::Long { aspect_type, value } => Self::create(AspectKind::Long, aspect_type, value),
            R::Float { aspect_type, value } => Self::create(AspectKind::Float, aspect_type, value),
            R::Double { aspect_type, value } => Self::create(AspectKind::Double, aspect_type, value),
            R::Location {
                aspect_type,
                location,
            } => Self::create(AspectKind::Location, aspect_type, location),
            R::TypedQuantity {
                aspect_type,
                asset_type,
                quantity,
            } => Self::create(
                AspectKind::TypedQuantity,
                aspect_type,
                RawValue::TypedQuantity {
                    asset_type,
                    quantity: f64::from(quantity),
                },
            ),
        }
    }
}

impl From<AspectValue> for AspectValueRepr {
    fn from(value: AspectValue) -> Self {
        match value {
            AspectValue::Int { aspect_type, value } => Self::Int { aspect_type, value },
            AspectValue::Long { aspect_type, value } => Self::Long { aspect_type, value },
            AspectValue::Float { aspect_type, value } => Self::Float { aspect_type, value },
            AspectValue::Double { aspect_type, value } => Self::Double { aspect_type, value },
            AspectValue::Location {
                aspect_type,
                location,
            } => Self::Location {
                aspect_type,
                location,
            },
            AspectValue::TypedQuantity {
                aspect_type,
                asset_type,
                quantity,
            } => Self::TypedQuantity {
                aspect_type,
                asset_type,
                quantity,
            },
        }
    }
}

/// Input accepted by the [`AspectValue`] factories.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// An existing value; its payload is coerced into the requested kind.
    Aspect(AspectValue),
    Location(Location),
    TypedQuantity { asset_type: AssetId, quantity: f64 },
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for RawValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<Location> for RawValue {
    fn from(v: Location) -> Self {
        Self::Location(v)
    }
}

impl From<AspectValue> for RawValue {
    fn from(v: AspectValue) -> Self {
        Self::Aspect(v)
    }
}

/// A raw number before coercion, keeping integers exact.
#[derive(Clone, Copy)]
enum Numeric {
    Integer(i64),
    Real(f64),
}

impl Numeric {
    fn of(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Int(v) => Some(Self::Integer(i64::from(*v))),
            RawValue::Long(v) => Some(Self::Integer(*v)),
            RawValue::Float(v) => Some(Self::Real(f64::from(*v))),
            RawValue::Double(v) => Some(Self::Real(*v)),
            RawValue::TypedQuantity { quantity, .. } => Some(Self::Real(*quantity)),
            RawValue::Aspect(av) => match av {
                AspectValue::Int { value, .. } => Some(Self::Integer(i64::from(*value))),
                AspectValue::Long { value, .. } => Some(Self::Integer(*value)),
                AspectValue::Float { value, .. } => Some(Self::Real(f64::from(*value))),
                AspectValue::Double { value, .. } => Some(Self::Real(*value)),
                AspectValue::TypedQuantity { quantity, .. } => {
                    Some(Self::Real(f64::from(*quantity)))
                }
                AspectValue::Location { .. } => None,
            },
            RawValue::Location(_) => None,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Self::Integer(v) => v == 0,
            Self::Real(v) => v == 0.0,
        }
    }

    fn finite(self, aspect_type: AspectType) -> Result<Self> {
        match self {
            Self::Real(v) if !v.is_finite() => Err(Error::invalid_value(format!(
                "non-finite value {v} for aspect {aspect_type}"
            ))),
            other => Ok(other),
        }
    }

    fn to_i64(self) -> i64 {
        match self {
            Self::Integer(v) => v,
            // f64::round is half away from zero; `as` saturates.
            Self::Real(v) => v.round() as i64,
        }
    }

    fn to_i32(self) -> i32 {
        match self {
            Self::Integer(v) => v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            Self::Real(v) => v.round() as i32,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Self::Integer(v) => v as f64,
            Self::Real(v) => v,
        }
    }
}

#[inline]
fn normalize_f32(v: f32) -> f32 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

#[inline]
fn normalize_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

fn narrow_f32(v: f64, aspect_type: AspectType) -> Result<f32> {
    let narrowed = v as f32;
    if narrowed.is_finite() {
        Ok(normalize_f32(narrowed))
    } else {
        Err(Error::invalid_value(format!(
            "value {v} overflows a float for aspect {aspect_type}"
        )))
    }
}

static LEGACY_LOCATION_WARNING: Once = Once::new();

impl AspectValue {
    // ================================
    // Factories
    // ================================

    /// Builds a value of the requested `kind` from `raw`.
    ///
    /// Fails with [`Error::InvalidValue`] when `raw` cannot become that kind:
    /// a location from a number, a number from a location, a typed quantity
    /// without an asset type, or a non-finite number.
    pub fn create(kind: AspectKind, aspect_type: AspectType, raw: impl Into<RawValue>) -> Result<Self> {
        Self::create_with(kind, aspect_type, raw, &CoreConfig::default())
    }

    /// Same as [`create`](Self::create), honoring `config`.
    ///
    /// With `legacy_location_zero_fallback` set, a numeric zero requested as a
    /// location yields [`Location::placeholder`] and logs a warning once per
    /// process instead of failing.
    pub fn create_with(
        kind: AspectKind,
        aspect_type: AspectType,
        raw: impl Into<RawValue>,
        config: &CoreConfig,
    ) -> Result<Self> {
        if aspect_type == AspectType::UNDEFINED {
            return Err(Error::invalid_value("cannot create a value for an undefined aspect"));
        }
        let raw = raw.into();
        match kind {
            AspectKind::Location => Self::create_location(aspect_type, raw, config),
            AspectKind::TypedQuantity => Self::create_typed_quantity(aspect_type, raw),
            numeric_kind => {
                let n = Numeric::of(&raw)
                    .ok_or_else(|| {
                        Error::invalid_value(format!(
                            "{raw:?} has no numeric value for aspect {aspect_type}"
                        ))
                    })?
                    .finite(aspect_type)?;
                Ok(match numeric_kind {
                    AspectKind::Int => Self::Int {
                        aspect_type,
                        value: n.to_i32(),
                    },
                    AspectKind::Long => Self::Long {
                        aspect_type,
                        value: n.to_i64(),
                    },
                    AspectKind::Float => Self::Float {
                        aspect_type,
                        value: narrow_f32(n.to_f64(), aspect_type)?,
                    },
                    _ => Self::Double {
                        aspect_type,
                        value: normalize_f64(n.to_f64()),
                    },
                })
            }
        }
    }

    fn create_location(aspect_type: AspectType, raw: RawValue, config: &CoreConfig) -> Result<Self> {
        let location = match raw {
            RawValue::Location(location) => location,
            RawValue::Aspect(AspectValue::Location { location, .. }) => location,
            other => match Numeric::of(&other) {
                Some(n) if n.is_zero() && config.legacy_location_zero_fallback => {
                    LEGACY_LOCATION_WARNING.call_once(|| {
                        tracing::warn!(
                            aspect = %aspect_type,
                            "numeric zero used as a location; substituting a placeholder"
                        );
                    });
                    Location::placeholder()
                }
                _ => {
                    return Err(Error::invalid_value(format!(
                        "cannot create a location aspect {aspect_type} from {other:?}"
                    )))
                }
            },
        };
        Ok(Self::Location {
            aspect_type,
            location,
        })
    }

    fn create_typed_quantity(aspect_type: AspectType, raw: RawValue) -> Result<Self> {
        let (asset_type, quantity) = match raw {
            RawValue::TypedQuantity {
                asset_type,
                quantity,
            } => (asset_type, quantity),
            RawValue::Aspect(AspectValue::TypedQuantity {
                asset_type,
                quantity,
                ..
            }) => (asset_type, f64::from(quantity)),
            other => {
                return Err(Error::invalid_value(format!(
                    "typed quantity {aspect_type} needs an asset type, got {other:?}"
                )))
            }
        };
        Numeric::Real(quantity).finite(aspect_type)?;
        Ok(Self::TypedQuantity {
            aspect_type,
            asset_type,
            quantity: narrow_f32(quantity, aspect_type)?,
        })
    }

    /// Builds a value of the aspect's [default kind](AspectType::default_kind).
    pub fn for_aspect(aspect_type: AspectType, raw: impl Into<RawValue>) -> Result<Self> {
        Self::create(aspect_type.default_kind(), aspect_type, raw)
    }

    /// A millisecond time value (`Long`).
    pub fn time(aspect_type: AspectType, ms: i64) -> Result<Self> {
        Self::create(AspectKind::Long, aspect_type, ms)
    }

    /// A `Double` value.
    pub fn double(aspect_type: AspectType, value: f64) -> Result<Self> {
        Self::create(AspectKind::Double, aspect_type, value)
    }

    /// A `Float` value.
    pub fn float(aspect_type: AspectType, value: f32) -> Result<Self> {
        Self::create(AspectKind::Float, aspect_type, value)
    }

    /// A typed quantity.
    pub fn typed_quantity(aspect_type: AspectType, asset_type: AssetId, quantity: f64) -> Result<Self> {
        Self::create(
            AspectKind::TypedQuantity,
            aspect_type,
            RawValue::TypedQuantity {
                asset_type,
                quantity,
            },
        )
    }

    /// A location value.
    pub fn location_value(aspect_type: AspectType, location: Location) -> Result<Self> {
        Self::create(AspectKind::Location, aspect_type, location)
    }

    /// A value of the same variant and aspect type holding `value`.
    ///
    /// Returns a clone when the value is unchanged.
    pub fn with_value(&self, value: f64) -> Result<Self> {
        if self.numeric_value()? == value {
            return Ok(self.clone());
        }
        match self {
            Self::TypedQuantity {
                aspect_type,
                asset_type,
                ..
            } => Self::typed_quantity(*aspect_type, asset_type.clone(), value),
            other => Self::create(other.kind(), other.aspect_type(), value),
        }
    }

    // ================================
    // Accessors
    // ================================

    /// The aspect type.
    pub fn aspect_type(&self) -> AspectType {
        match self {
            Self::Int { aspect_type, .. }
            | Self::Long { aspect_type, .. }
            | Self::Float { aspect_type, .. }
            | Self::Double { aspect_type, .. }
            | Self::Location { aspect_type, .. }
            | Self::TypedQuantity { aspect_type, .. } => *aspect_type,
        }
    }

    /// The payload variant.
    pub fn kind(&self) -> AspectKind {
        match self {
            Self::Int { .. } => AspectKind::Int,
            Self::Long { .. } => AspectKind::Long,
            Self::Float { .. } => AspectKind::Float,
            Self::Double { .. } => AspectKind::Double,
            Self::Location { .. } => AspectKind::Location,
            Self::TypedQuantity { .. } => AspectKind::TypedQuantity,
        }
    }

    /// The value as a double. Locations have none.
    pub fn numeric_value(&self) -> Result<f64> {
        match self {
            Self::Int { value, .. } => Ok(f64::from(*value)),
            Self::Long { value, .. } => Ok(*value as f64),
            Self::Float { value, .. } => Ok(f64::from(*value)),
            Self::Double { value, .. } => Ok(*value),
            Self::TypedQuantity { quantity, .. } => Ok(f64::from(*quantity)),
            Self::Location { aspect_type, .. } => Err(Error::invalid_operation(format!(
                "location aspect {aspect_type} has no numeric value"
            ))),
        }
    }

    /// The value as a long, rounding half away from zero.
    pub fn long_value(&self) -> Result<i64> {
        match self {
            Self::Int { value, .. } => Ok(i64::from(*value)),
            Self::Long { value, .. } => Ok(*value),
            _ => self.numeric_value().map(|v| Numeric::Real(v).to_i64()),
        }
    }

    /// The value as an int, rounding half away from zero and saturating.
    pub fn int_value(&self) -> Result<i32> {
        match self {
            Self::Int { value, .. } => Ok(*value),
            Self::Long { value, .. } => Ok(Numeric::Integer(*value).to_i32()),
            _ => self.numeric_value().map(|v| Numeric::Real(v).to_i32()),
        }
    }

    /// The value as a float.
    pub fn float_value(&self) -> Result<f32> {
        match self {
            Self::Float { value, .. } => Ok(*value),
            Self::TypedQuantity { quantity, .. } => Ok(*quantity),
            _ => self.numeric_value().map(|v| v as f32),
        }
    }

    /// The location payload, if this is a location value.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Location { location, .. } => Some(location),
            _ => None,
        }
    }

    /// The asset type, if this is a typed quantity.
    pub fn asset_type(&self) -> Option<&AssetId> {
        match self {
            Self::TypedQuantity { asset_type, .. } => Some(asset_type),
            _ => None,
        }
    }

    // ================================
    // Comparisons
    // ================================

    /// Same aspect type and numerically equal within a small relative
    /// tolerance, across variants. Locations compare by handle.
    pub fn nearly_equals(&self, other: &AspectValue) -> bool {
        if self.aspect_type() != other.aspect_type() {
            return false;
        }
        match (self.numeric_value(), other.numeric_value()) {
            (Ok(a), Ok(b)) => nearly_equal(a, b),
            _ => self.location().is_some() && self.location() == other.location(),
        }
    }

    /// `self < other` numerically.
    pub fn is_less_than(&self, other: &AspectValue) -> Result<bool> {
        Ok(self.numeric_value()? < other.numeric_value()?)
    }

    /// `self > other` numerically.
    pub fn is_greater_than(&self, other: &AspectValue) -> Result<bool> {
        Ok(self.numeric_value()? > other.numeric_value()?)
    }

    /// `self - other` numerically.
    pub fn minus(&self, other: &AspectValue) -> Result<f64> {
        Ok(self.numeric_value()? - other.numeric_value()?)
    }

    /// `low <= self <= high` numerically.
    pub fn is_between(&self, low: &AspectValue, high: &AspectValue) -> Result<bool> {
        Ok(!(self.is_less_than(low)? || self.is_greater_than(high)?))
    }

    fn hash_payload<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Int { value, .. } => value.hash(state),
            Self::Long { value, .. } => value.hash(state),
            Self::Float { value, .. } => value.to_bits().hash(state),
            Self::Double { value, .. } => value.to_bits().hash(state),
            Self::Location { location, .. } => location.hash(state),
            Self::TypedQuantity {
                asset_type,
                quantity,
                ..
            } => {
                asset_type.hash(state);
                quantity.to_bits().hash(state);
            }
        }
    }
}

fn nearly_equal(a: f64, b: f64) -> bool {
    let diff = (a - b).abs();
    diff <= NEARLY_EQUAL_EPSILON || diff <= NEARLY_EQUAL_EPSILON * a.abs().max(b.abs())
}

impl PartialEq for AspectValue {
    fn eq(&self, other: &Self) -> bool {
        use AspectValue::*;
        match (self, other) {
            (Int { aspect_type: a, value: x }, Int { aspect_type: b, value: y }) => a == b && x == y,
            (Long { aspect_type: a, value: x }, Long { aspect_type: b, value: y }) => a == b && x == y,
            (Float { aspect_type: a, value: x }, Float { aspect_type: b, value: y }) => a == b && x == y,
            (Double { aspect_type: a, value: x }, Double { aspect_type: b, value: y }) => {
                a == b && x == y
            }
            (
                Location {
                    aspect_type: a,
                    location: x,
                },
                Location {
                    aspect_type: b,
                    location: y,
                },
            ) => a == b && x == y,
            (
                TypedQuantity {
                    aspect_type: a,
                    asset_type: ax,
                    quantity: x,
                },
                TypedQuantity {
                    aspect_type: b,
                    asset_type: ay,
                    quantity: y,
                },
            ) => a == b && ax == ay && x == y,
            _ => false,
        }
    }
}

// Numbers are finite and zero is normalized, so `==` is reflexive and
// agrees with bit-level hashing.
impl Eq for AspectValue {}

impl Hash for AspectValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.aspect_type().hash(state);
        self.hash_payload(state);
    }
}

impl fmt::Display for AspectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int { value, .. } => write!(f, "{value}")?,
            Self::Long { value, .. } => write!(f, "{value}")?,
            Self::Float { value, .. } => write!(f, "{value}")?,
            Self::Double { value, .. } => write!(f, "{value}")?,
            Self::Location { location, .. } => write!(f, "{location}")?,
            Self::TypedQuantity {
                asset_type,
                quantity,
                ..
            } => write!(f, "{quantity} x {asset_type}")?,
        }
        write!(f, "[{}]", self.aspect_type())
    }
}

/// Compares two value arrays keyed by aspect type, ignoring order.
///
/// Arrays with repeated aspect types are ambiguous; the first value of a
/// given type in `b` is the one compared.
pub fn slices_equal(a: &[AspectValue], b: &[AspectValue]) -> bool {
    slices_match(a, b, |x, y| x == y)
}

/// Like [`slices_equal`] using [`AspectValue::nearly_equals`].
pub fn slices_nearly_equal(a: &[AspectValue], b: &[AspectValue]) -> bool {
    slices_match(a, b, AspectValue::nearly_equals)
}

fn slices_match(
    a: &[AspectValue],
    b: &[AspectValue],
    same: impl Fn(&AspectValue, &AspectValue) -> bool,
) -> bool {
    a.len() == b.len()
        && a.iter().all(|x| {
            b.iter()
                .find(|y| y.aspect_type() == x.aspect_type())
                .is_some_and(|y| same(x, y))
        })
}

// ================================
// Pooled zeros
// ================================

static ZERO_POOL: LazyLock<[Option<AspectValue>; ZERO_POOL_SIZE]> = LazyLock::new(|| {
    std::array::from_fn(|code| {
        let aspect_type = AspectType(code as i32);
        match aspect_type.default_kind() {
            AspectKind::Location | AspectKind::TypedQuantity => None,
            kind => AspectValue::create(kind, aspect_type, 0i64).ok(),
        }
    })
});

/// The zero value of `aspect_type`'s default kind.
///
/// Served from a fixed table of [`ZERO_POOL_SIZE`] entries built once.
/// Codes outside the table, and location aspects, fail with
/// [`Error::InvalidValue`].
pub fn pooled_zero(aspect_type: AspectType) -> Result<AspectValue> {
    let code = aspect_type.code();
    if code < 0 || code as usize >= ZERO_POOL_SIZE {
        return Err(Error::invalid_value(format!(
            "aspect code {code} is outside the zero pool"
        )));
    }
    ZERO_POOL[code as usize]
        .clone()
        .ok_or_else(|| Error::invalid_value(format!("aspect {aspect_type} has no numeric zero")))
}
