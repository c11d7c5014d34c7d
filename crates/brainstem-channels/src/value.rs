use std::fmt;

use glam::{Quat, Vec3};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use brainstem_core::{BrainError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Float,
    Int,
    Bool,
    Vector,
    Quaternion,
    Handle,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Float => "float",
            ChannelKind::Int => "int",
            ChannelKind::Bool => "bool",
            ChannelKind::Vector => "vector",
            ChannelKind::Quaternion => "quaternion",
            ChannelKind::Handle => "handle",
        };
        f.write_str(name)
    }
}

/// Opaque reference to a host-side entity (a target, a weapon, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ChannelValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vector(Vec3),
    Quaternion(Quat),
    Handle(Option<EntityHandle>),
}

impl ChannelValue {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelValue::Float(_) => ChannelKind::Float,
            ChannelValue::Int(_) => ChannelKind::Int,
            ChannelValue::Bool(_) => ChannelKind::Bool,
            ChannelValue::Vector(_) => ChannelKind::Vector,
            ChannelValue::Quaternion(_) => ChannelKind::Quaternion,
            ChannelValue::Handle(_) => ChannelKind::Handle,
        }
    }

    /// The zero value of each kind; quaternions default to identity.
    pub fn zero(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Float => ChannelValue::Float(0.0),
            ChannelKind::Int => ChannelValue::Int(0),
            ChannelKind::Bool => ChannelValue::Bool(false),
            ChannelKind::Vector => ChannelValue::Vector(Vec3::ZERO),
            ChannelKind::Quaternion => ChannelValue::Quaternion(Quat::IDENTITY),
            ChannelKind::Handle => ChannelValue::Handle(None),
        }
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelValue::Float(v) => write!(f, "{}", v),
            ChannelValue::Int(v) => write!(f, "{}", v),
            ChannelValue::Bool(v) => write!(f, "{}", v),
            ChannelValue::Vector(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            ChannelValue::Quaternion(q) => write!(f, "({}, {}, {}, {})", q.x, q.y, q.z, q.w),
            ChannelValue::Handle(Some(h)) => write!(f, "#{}", h.0),
            ChannelValue::Handle(None) => f.write_str("none"),
        }
    }
}

/// Rust types that can live in a channel.
pub trait ChannelType: Copy {
    const KIND: ChannelKind;

    fn into_value(self) -> ChannelValue;
    fn from_value(value: ChannelValue) -> Option<Self>;
}

macro_rules! channel_type {
    ($ty:ty, $variant:ident) => {
        impl ChannelType for $ty {
            const KIND: ChannelKind = ChannelKind::$variant;

            fn into_value(self) -> ChannelValue {
                ChannelValue::$variant(self)
            }

            fn from_value(value: ChannelValue) -> Option<Self> {
                match value {
                    ChannelValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

channel_type!(f32, Float);
channel_type!(i32, Int);
channel_type!(bool, Bool);
channel_type!(Vec3, Vector);
channel_type!(Quat, Quaternion);
channel_type!(Option<EntityHandle>, Handle);

/// Write-time policy applied to every value stored in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Constraint {
    #[default]
    None,
    FloatRange { min: f32, max: f32 },
    IntRange { min: i32, max: i32 },
    MaxLength(f32),
}

impl Constraint {
    pub fn check(&self, kind: ChannelKind) -> Result<()> {
        match (self, kind) {
            (Constraint::None, _) => Ok(()),
            (Constraint::FloatRange { min, max }, ChannelKind::Float) => {
                if min.is_nan() || max.is_nan() || min > max {
                    Err(BrainError::InvalidConfig(format!(
                        "float range [{}, {}] is empty",
                        min, max
                    )))
                } else {
                    Ok(())
                }
            }
            (Constraint::IntRange { min, max }, ChannelKind::Int) => {
                if min > max {
                    Err(BrainError::InvalidConfig(format!(
                        "int range [{}, {}] is empty",
                        min, max
                    )))
                } else {
                    Ok(())
                }
            }
            (Constraint::MaxLength(len), ChannelKind::Vector) => {
                if !len.is_finite() || *len < 0.0 {
                    Err(BrainError::InvalidConfig(format!(
                        "vector max length {} must be finite and non-negative",
                        len
                    )))
                } else {
                    Ok(())
                }
            }
            (constraint, kind) => Err(BrainError::InvalidConfig(format!(
                "{:?} cannot constrain a {} channel",
                constraint, kind
            ))),
        }
    }

    pub fn apply(&self, value: ChannelValue) -> ChannelValue {
        match (self, value) {
            (Constraint::FloatRange { min, max }, ChannelValue::Float(v)) => {
                ChannelValue::Float(v.clamp(*min, *max))
            }
            (Constraint::IntRange { min, max }, ChannelValue::Int(v)) => {
                ChannelValue::Int(v.clamp(*min, *max))
            }
            (Constraint::MaxLength(len), ChannelValue::Vector(v)) => {
                ChannelValue::Vector(v.clamp_length_max(*len))
            }
            (_, value) => value,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::None => f.write_str("-"),
            Constraint::FloatRange { min, max } => write!(f, "[{}, {}]", min, max),
            Constraint::IntRange { min, max } => {
                let lo = if *min == i32::MIN { "..".to_string() } else { min.to_string() };
                let hi = if *max == i32::MAX { "..".to_string() } else { max.to_string() };
                write!(f, "[{}, {}]", lo, hi)
            }
            Constraint::MaxLength(len) => write!(f, "|v| <= {}", len),
        }
    }
}
