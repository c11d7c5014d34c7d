//! Declarative channel definitions, loadable from YAML or JSON

use glam::{EulerRot, Quat, Vec3};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use brainstem_core::{BrainError, Result};

use super::value::{ChannelKind, ChannelValue, Constraint};

#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub channels: Vec<ChannelSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChannelSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ChannelKind,

    /// Reset to the default at the end of every tick.
    #[serde(default)]
    pub clears: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<f32>,
}

/// Default literal as written in a config file.
///
/// Quaternion defaults accept either `[x, y, z, w]` or Euler angles in
/// degrees as `[x, y, z]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Number(f64),
    Triple([f32; 3]),
    Quad([f32; 4]),
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            clears: false,
            default: None,
            min: None,
            max: None,
            max_length: None,
        }
    }

    pub fn clears(mut self, clears: bool) -> Self {
        self.clears = clears;
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_max_length(mut self, max_length: f32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn default_value(&self) -> Result<ChannelValue> {
        let Some(default) = &self.default else {
            return Ok(ChannelValue::zero(self.kind));
        };

        let value = match (self.kind, default) {
            (ChannelKind::Float, DefaultValue::Number(n)) => ChannelValue::Float(*n as f32),
            (ChannelKind::Int, DefaultValue::Number(n)) => {
                if n.fract() != 0.0 || *n < i32::MIN as f64 || *n > i32::MAX as f64 {
                    return Err(self.invalid(format!("default {} is not a valid int", n)));
                }
                ChannelValue::Int(*n as i32)
            }
            (ChannelKind::Bool, DefaultValue::Bool(b)) => ChannelValue::Bool(*b),
            (ChannelKind::Vector, DefaultValue::Triple(v)) => {
                ChannelValue::Vector(Vec3::from_array(*v))
            }
            (ChannelKind::Quaternion, DefaultValue::Quad(q)) => {
                ChannelValue::Quaternion(Quat::from_array(*q).normalize())
            }
            (ChannelKind::Quaternion, DefaultValue::Triple([x, y, z])) => {
                ChannelValue::Quaternion(Quat::from_euler(
                    EulerRot::YXZ,
                    y.to_radians(),
                    x.to_radians(),
                    z.to_radians(),
                ))
            }
            (kind, default) => {
                return Err(self.invalid(format!(
                    "default {:?} does not fit a {} channel",
                    default, kind
                )));
            }
        };
        Ok(value)
    }

    /// Rejects keys the channel kind does not use and int bounds that are
    /// not whole `i32` values.
    pub fn constraint(&self) -> Result<Constraint> {
        let has_range = self.min.is_some() || self.max.is_some();
        match self.kind {
            ChannelKind::Float => {
                self.reject_max_length()?;
                match (self.min, self.max) {
                    (None, None) => Ok(Constraint::None),
                    (min, max) => Ok(Constraint::FloatRange {
                        min: min.map(|m| m as f32).unwrap_or(f32::NEG_INFINITY),
                        max: max.map(|m| m as f32).unwrap_or(f32::INFINITY),
                    }),
                }
            }
            ChannelKind::Int => {
                self.reject_max_length()?;
                match (self.min, self.max) {
                    (None, None) => Ok(Constraint::None),
                    (min, max) => Ok(Constraint::IntRange {
                        min: min.map(|m| self.int_bound("min", m)).transpose()?.unwrap_or(i32::MIN),
                        max: max.map(|m| self.int_bound("max", m)).transpose()?.unwrap_or(i32::MAX),
                    }),
                }
            }
            ChannelKind::Vector => {
                if has_range {
                    return Err(self.invalid("vector channels take max_length, not min/max".into()));
                }
                Ok(self.max_length.map(Constraint::MaxLength).unwrap_or_default())
            }
            kind => {
                if has_range || self.max_length.is_some() {
                    Err(self.invalid(format!("{} channels take no range or max_length", kind)))
                } else {
                    Ok(Constraint::None)
                }
            }
        }
    }

    fn reject_max_length(&self) -> Result<()> {
        match self.max_length {
            Some(_) => Err(self.invalid(format!(
                "{} channels take min/max, not max_length",
                self.kind
            ))),
            None => Ok(()),
        }
    }

    fn int_bound(&self, label: &str, bound: f64) -> Result<i32> {
        if bound.fract() != 0.0 || bound < i32::MIN as f64 || bound > i32::MAX as f64 {
            return Err(self.invalid(format!("{} {} is not a valid int", label, bound)));
        }
        Ok(bound as i32)
    }

    fn invalid(&self, message: String) -> BrainError {
        BrainError::InvalidConfig(format!("channel '{}': {}", self.name, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_config_deserialize() {
        let yaml = r#"
channels:
  - name: movement
    type: vector
    clears: true
    max_length: 1.0
  - name: rotation
    type: quaternion
    default: [0.0, 90.0, 0.0]
  - name: jump
    type: bool
  - name: attack
    type: int
    clears: true
    min: 0
    max: 3
"#;
        let config: ChannelsConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.channels.len(), 4);
        assert_eq!(config.channels[0].kind, ChannelKind::Vector);
        assert_eq!(config.channels[0].constraint().unwrap(), Constraint::MaxLength(1.0));
        assert_eq!(
            config.channels[3].constraint().unwrap(),
            Constraint::IntRange { min: 0, max: 3 }
        );
        assert_eq!(config.channels[2].default_value().unwrap(), ChannelValue::Bool(false));
    }

    #[test]
    fn test_quaternion_euler_default() {
        let spec = ChannelSpec::new("rotation", ChannelKind::Quaternion)
            .with_default(DefaultValue::Triple([0.0, 90.0, 0.0]));
        match spec.default_value().unwrap() {
            ChannelValue::Quaternion(q) => {
                let expected = Quat::from_rotation_y(90f32.to_radians());
                assert!(q.abs_diff_eq(expected, 1e-5));
            }
            other => panic!("Expected quaternion, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_default() {
        let spec = ChannelSpec::new("speed", ChannelKind::Float).with_default(DefaultValue::Bool(true));
        assert!(matches!(spec.default_value(), Err(BrainError::InvalidConfig(_))));

        let spec = ChannelSpec::new("count", ChannelKind::Int).with_default(DefaultValue::Number(1.5));
        assert!(spec.default_value().is_err());
    }

    #[test]
    fn test_open_ended_range() {
        let spec = ChannelSpec {
            min: Some(0.0),
            ..ChannelSpec::new("speed", ChannelKind::Float)
        };
        assert_eq!(
            spec.constraint().unwrap(),
            Constraint::FloatRange {
                min: 0.0,
                max: f32::INFINITY
            }
        );
    }

    #[test]
    fn test_int_bounds_must_be_whole() {
        let spec = ChannelSpec::new("ammo", ChannelKind::Int).with_range(0.0, 2.5);
        let err = spec.constraint().unwrap_err();
        assert!(err.to_string().contains("max 2.5 is not a valid int"));

        let spec = ChannelSpec::new("ammo", ChannelKind::Int).with_range(-1.0e12, 10.0);
        assert!(matches!(spec.constraint(), Err(BrainError::InvalidConfig(_))));

        let spec = ChannelSpec {
            max: Some(f64::NAN),
            ..ChannelSpec::new("ammo", ChannelKind::Int)
        };
        assert!(spec.constraint().is_err());

        let spec = ChannelSpec {
            max: Some(30.0),
            ..ChannelSpec::new("ammo", ChannelKind::Int)
        };
        assert_eq!(
            spec.constraint().unwrap(),
            Constraint::IntRange {
                min: i32::MIN,
                max: 30
            }
        );
    }

    #[test]
    fn test_keys_outside_kind_rejected() {
        let spec = ChannelSpec::new("movement", ChannelKind::Vector).with_range(0.0, 1.0);
        assert!(matches!(spec.constraint(), Err(BrainError::InvalidConfig(_))));

        let spec = ChannelSpec::new("speed", ChannelKind::Float).with_max_length(2.0);
        assert!(spec.constraint().is_err());

        let spec = ChannelSpec::new("ammo", ChannelKind::Int).with_max_length(2.0);
        assert!(spec.constraint().is_err());
    }

    #[test]
    fn test_range_on_bool_rejected() {
        let spec = ChannelSpec::new("jump", ChannelKind::Bool).with_range(0.0, 1.0);
        assert!(spec.constraint().is_err());
    }
}
