use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;

use glam::{Quat, Vec3};
use tracing::{debug, trace};

use brainstem_core::{BrainError, Result};

use super::spec::ChannelSpec;
use super::value::{ChannelKind, ChannelType, ChannelValue, Constraint, EntityHandle};

#[derive(Debug, Clone)]
struct Channel {
    name: String,
    value: ChannelValue,
    default: ChannelValue,
    clears: bool,
    constraint: Constraint,
}

impl Channel {
    fn kind(&self) -> ChannelKind {
        self.default.kind()
    }

    fn store(&mut self, value: ChannelValue) -> Result<()> {
        if value.kind() != self.kind() {
            return Err(BrainError::ChannelTypeMismatch {
                name: self.name.clone(),
                expected: self.kind().to_string(),
                actual: value.kind().to_string(),
            });
        }
        self.value = self.constraint.apply(value);
        Ok(())
    }

    fn clear(&mut self) {
        if self.clears {
            self.value = self.default;
        }
    }
}

/// Typed token for a registered channel.
#[derive(Debug)]
pub struct ChannelKey<T> {
    index: usize,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ChannelKey<T> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> ChannelKey<T> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Named, typed blackboard owned by a single entity.
///
/// Writers fill channels during a tick, readers consume them, then
/// [`ChannelRegistry::end_tick`] resets every channel registered with
/// `clears = true`.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    index: HashMap<String, usize>,
    ticks: u64,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: &[ChannelSpec]) -> Result<Self> {
        let mut registry = Self::new();
        for spec in specs {
            registry.register_spec(spec)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: &str, default: ChannelValue, clears: bool) -> Result<()> {
        self.register_constrained(name, default, clears, Constraint::None)
            .map(|_| ())
    }

    pub fn register_spec(&mut self, spec: &ChannelSpec) -> Result<()> {
        let default = spec.default_value()?;
        let constraint = spec.constraint()?;
        self.register_constrained(&spec.name, default, spec.clears, constraint)
            .map(|_| ())
    }

    /// Registers a channel; the default is itself passed through `constraint`.
    pub fn register_constrained(
        &mut self,
        name: &str,
        default: ChannelValue,
        clears: bool,
        constraint: Constraint,
    ) -> Result<usize> {
        if self.ticks > 0 {
            return Err(BrainError::RegistrationClosed(name.to_string()));
        }
        if self.index.contains_key(name) {
            return Err(BrainError::DuplicateRegistration(name.to_string()));
        }
        constraint.check(default.kind()).map_err(|e| match e {
            BrainError::InvalidConfig(msg) => {
                BrainError::InvalidConfig(format!("channel '{}': {}", name, msg))
            }
            other => other,
        })?;

        let default = constraint.apply(default);
        let idx = self.channels.len();
        self.channels.push(Channel {
            name: name.to_string(),
            value: default,
            default,
            clears,
            constraint,
        });
        self.index.insert(name.to_string(), idx);
        debug!(channel = name, kind = %default.kind(), clears, "Registered channel");
        Ok(idx)
    }

    fn register_typed<T: ChannelType>(
        &mut self,
        name: &str,
        default: T,
        clears: bool,
        constraint: Constraint,
    ) -> Result<ChannelKey<T>> {
        let index = self.register_constrained(name, default.into_value(), clears, constraint)?;
        Ok(ChannelKey {
            index,
            name: name.to_string(),
            _marker: PhantomData,
        })
    }

    pub fn register_float(
        &mut self,
        name: &str,
        default: f32,
        clears: bool,
        range: Option<(f32, f32)>,
    ) -> Result<ChannelKey<f32>> {
        let constraint = range
            .map(|(min, max)| Constraint::FloatRange { min, max })
            .unwrap_or_default();
        self.register_typed(name, default, clears, constraint)
    }

    pub fn register_int(
        &mut self,
        name: &str,
        default: i32,
        clears: bool,
        range: Option<(i32, i32)>,
    ) -> Result<ChannelKey<i32>> {
        let constraint = range
            .map(|(min, max)| Constraint::IntRange { min, max })
            .unwrap_or_default();
        self.register_typed(name, default, clears, constraint)
    }

    pub fn register_bool(&mut self, name: &str, default: bool, clears: bool) -> Result<ChannelKey<bool>> {
        self.register_typed(name, default, clears, Constraint::None)
    }

    pub fn register_vector(
        &mut self,
        name: &str,
        default: Vec3,
        clears: bool,
        max_length: Option<f32>,
    ) -> Result<ChannelKey<Vec3>> {
        let constraint = max_length.map(Constraint::MaxLength).unwrap_or_default();
        self.register_typed(name, default, clears, constraint)
    }

    pub fn register_quaternion(
        &mut self,
        name: &str,
        default: Quat,
        clears: bool,
    ) -> Result<ChannelKey<Quat>> {
        self.register_typed(name, default, clears, Constraint::None)
    }

    pub fn register_handle(
        &mut self,
        name: &str,
        default: Option<EntityHandle>,
        clears: bool,
    ) -> Result<ChannelKey<Option<EntityHandle>>> {
        self.register_typed(name, default, clears, Constraint::None)
    }

    /// Looks up a typed key for an already registered channel.
    pub fn key<T: ChannelType>(&self, name: &str) -> Result<ChannelKey<T>> {
        let channel = self.channel(name)?;
        if channel.kind() != T::KIND {
            return Err(BrainError::ChannelTypeMismatch {
                name: name.to_string(),
                expected: channel.kind().to_string(),
                actual: T::KIND.to_string(),
            });
        }
        Ok(ChannelKey {
            index: self.index[name],
            name: name.to_string(),
            _marker: PhantomData,
        })
    }

    fn channel(&self, name: &str) -> Result<&Channel> {
        self.index
            .get(name)
            .map(|&idx| &self.channels[idx])
            .ok_or_else(|| BrainError::UnknownChannel(name.to_string()))
    }

    fn channel_mut(&mut self, name: &str) -> Result<&mut Channel> {
        match self.index.get(name) {
            Some(&idx) => Ok(&mut self.channels[idx]),
            None => Err(BrainError::UnknownChannel(name.to_string())),
        }
    }

    fn keyed<T>(&self, key: &ChannelKey<T>) -> Result<&Channel> {
        match self.channels.get(key.index) {
            Some(channel) if channel.name == key.name => Ok(channel),
            _ => self.channel(&key.name),
        }
    }

    pub fn set(&mut self, name: &str, value: ChannelValue) -> Result<()> {
        self.channel_mut(name)?.store(value)
    }

    pub fn get(&self, name: &str) -> Result<ChannelValue> {
        self.channel(name).map(|c| c.value)
    }

    pub fn read<T: ChannelType>(&self, key: &ChannelKey<T>) -> Result<T> {
        let channel = self.keyed(key)?;
        T::from_value(channel.value).ok_or_else(|| BrainError::ChannelTypeMismatch {
            name: key.name.clone(),
            expected: channel.kind().to_string(),
            actual: T::KIND.to_string(),
        })
    }

    pub fn write<T: ChannelType>(&mut self, key: &ChannelKey<T>, value: T) -> Result<()> {
        let name = self.keyed(key)?.name.clone();
        self.set(&name, value.into_value())
    }

    fn get_as<T: ChannelType>(&self, name: &str) -> Result<T> {
        let value = self.get(name)?;
        T::from_value(value).ok_or_else(|| BrainError::ChannelTypeMismatch {
            name: name.to_string(),
            expected: value.kind().to_string(),
            actual: T::KIND.to_string(),
        })
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> Result<()> {
        self.set(name, ChannelValue::Float(value))
    }

    pub fn get_float(&self, name: &str) -> Result<f32> {
        self.get_as(name)
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.set(name, ChannelValue::Int(value))
    }

    pub fn get_int(&self, name: &str) -> Result<i32> {
        self.get_as(name)
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<()> {
        self.set(name, ChannelValue::Bool(value))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        self.get_as(name)
    }

    pub fn set_vector(&mut self, name: &str, value: Vec3) -> Result<()> {
        self.set(name, ChannelValue::Vector(value))
    }

    pub fn get_vector(&self, name: &str) -> Result<Vec3> {
        self.get_as(name)
    }

    pub fn set_quaternion(&mut self, name: &str, value: Quat) -> Result<()> {
        self.set(name, ChannelValue::Quaternion(value))
    }

    pub fn get_quaternion(&self, name: &str) -> Result<Quat> {
        self.get_as(name)
    }

    pub fn set_handle(&mut self, name: &str, value: Option<EntityHandle>) -> Result<()> {
        self.set(name, ChannelValue::Handle(value))
    }

    pub fn get_handle(&self, name: &str) -> Result<Option<EntityHandle>> {
        self.get_as(name)
    }

    pub fn default_of(&self, name: &str) -> Result<ChannelValue> {
        self.channel(name).map(|c| c.default)
    }

    pub fn kind(&self, name: &str) -> Result<ChannelKind> {
        self.channel(name).map(Channel::kind)
    }

    pub fn clears(&self, name: &str) -> Result<bool> {
        self.channel(name).map(|c| c.clears)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Channel names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Runs once per tick after every reader. Closes registration.
    pub fn end_tick(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
        }
        self.ticks += 1;
        trace!(tick = self.ticks, "Channels cleared");
    }

    /// Restores every channel to its default, whatever its clear policy.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.value = channel.default;
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, ChannelValue> {
        self.channels
            .iter()
            .map(|c| (c.name.clone(), c.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn character_channels() -> ChannelRegistry {
        let mut channels = ChannelRegistry::new();
        channels
            .register("movement", ChannelValue::Vector(Vec3::ZERO), true)
            .unwrap();
        channels
            .register("rotation", ChannelValue::Quaternion(Quat::IDENTITY), false)
            .unwrap();
        channels.register("jump", ChannelValue::Bool(false), false).unwrap();
        channels.register("attack", ChannelValue::Int(0), true).unwrap();
        channels
    }

    #[test]
    fn test_default_until_written() {
        let channels = character_channels();
        assert_eq!(channels.get("attack").unwrap(), ChannelValue::Int(0));
        assert_eq!(channels.get_vector("movement").unwrap(), Vec3::ZERO);
        assert_eq!(channels.len(), 4);
    }

    #[test]
    fn test_clear_policy() {
        let mut channels = character_channels();
        channels.set_int("attack", 2).unwrap();
        channels.set_bool("jump", true).unwrap();
        channels.set_vector("movement", Vec3::X).unwrap();

        channels.end_tick();
        assert_eq!(channels.get_int("attack").unwrap(), 0);
        assert_eq!(channels.get_vector("movement").unwrap(), Vec3::ZERO);
        assert!(channels.get_bool("jump").unwrap());

        channels.end_tick();
        channels.end_tick();
        assert!(channels.get_bool("jump").unwrap());
        assert_eq!(channels.tick_count(), 3);
    }

    #[test]
    fn test_unknown_channel() {
        let mut channels = character_channels();
        assert!(matches!(channels.get("speed"), Err(BrainError::UnknownChannel(n)) if n == "speed"));
        assert!(matches!(
            channels.set_float("speed", 1.0),
            Err(BrainError::UnknownChannel(_))
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut channels = character_channels();
        let result = channels.register("jump", ChannelValue::Bool(true), true);
        assert!(matches!(result, Err(BrainError::DuplicateRegistration(n)) if n == "jump"));
        assert!(!channels.get_bool("jump").unwrap());
    }

    #[test]
    fn test_registration_closed_after_tick() {
        let mut channels = character_channels();
        channels.end_tick();
        let result = channels.register("late", ChannelValue::Int(0), false);
        assert!(matches!(result, Err(BrainError::RegistrationClosed(_))));
    }

    #[test]
    fn test_type_mismatch() {
        let mut channels = character_channels();
        let result = channels.set_float("attack", 1.0);
        assert!(matches!(result, Err(BrainError::ChannelTypeMismatch { .. })));
        assert!(channels.get_float("attack").is_err());
        assert!(channels.key::<f32>("attack").is_err());
    }

    #[test]
    fn test_typed_keys() {
        let mut channels = ChannelRegistry::new();
        let speed = channels.register_float("speed", 0.0, true, Some((0.0, 10.0))).unwrap();
        let target = channels.register_handle("target", None, false).unwrap();

        channels.write(&speed, 25.0).unwrap();
        assert_eq!(channels.read(&speed).unwrap(), 10.0);

        channels.write(&target, Some(EntityHandle(42))).unwrap();
        assert_eq!(channels.read(&target).unwrap(), Some(EntityHandle(42)));

        let looked_up = channels.key::<f32>("speed").unwrap();
        assert_eq!(looked_up.name(), "speed");
        assert_eq!(channels.read(&looked_up).unwrap(), 10.0);
    }

    #[test]
    fn test_key_from_other_registry() {
        let mut a = ChannelRegistry::new();
        let key = a.register_bool("only_in_a", false, false).unwrap();
        let b = character_channels();
        assert!(matches!(b.read(&key), Err(BrainError::UnknownChannel(_))));
    }

    #[test]
    fn test_default_is_constrained() {
        let mut channels = ChannelRegistry::new();
        channels.register_int("ammo", 50, false, Some((0, 30))).unwrap();
        assert_eq!(channels.get_int("ammo").unwrap(), 30);
    }

    #[test]
    fn test_empty_range_rejected() {
        let mut channels = ChannelRegistry::new();
        let result = channels.register_float("speed", 0.0, false, Some((1.0, 0.0)));
        assert!(matches!(result, Err(BrainError::InvalidConfig(_))));
        assert!(!channels.contains("speed"));
    }

    #[test]
    fn test_from_specs_and_reset() {
        let yaml = r#"
- name: movement
  type: vector
  clears: true
  max_length: 1.0
- name: stance
  type: int
  default: 1
"#;
        let specs: Vec<ChannelSpec> = serde_yaml::from_str(yaml).unwrap();
        let mut channels = ChannelRegistry::from_specs(&specs).unwrap();
        assert_eq!(channels.names().collect::<Vec<_>>(), vec!["movement", "stance"]);

        channels.set_int("stance", 4).unwrap();
        channels.end_tick();
        assert_eq!(channels.get_int("stance").unwrap(), 4);
        channels.reset();
        assert_eq!(channels.get_int("stance").unwrap(), 1);
    }

    #[test]
    fn test_snapshot() {
        let mut channels = character_channels();
        channels.set_int("attack", 1).unwrap();
        let snapshot = channels.snapshot();
        assert_eq!(snapshot.get("attack"), Some(&ChannelValue::Int(1)));
        assert_eq!(snapshot.len(), 4);
    }

    proptest! {
        /// Any write to a ranged float reads back clamped.
        #[test]
        fn float_writes_are_clamped(min in -1000.0f32..1000.0, span in 0.0f32..1000.0, v in -1.0e6f32..1.0e6) {
            let max = min + span;
            let mut channels = ChannelRegistry::new();
            channels.register_float("f", min, false, Some((min, max))).unwrap();
            channels.set_float("f", v).unwrap();
            prop_assert_eq!(channels.get_float("f").unwrap(), v.clamp(min, max));
        }

        /// Any write to a ranged int reads back clamped.
        #[test]
        fn int_writes_are_clamped(min in -1000i32..1000, span in 0i32..1000, v in any::<i32>()) {
            let max = min + span;
            let mut channels = ChannelRegistry::new();
            channels.register_int("i", min, false, Some((min, max))).unwrap();
            channels.set_int("i", v).unwrap();
            prop_assert_eq!(channels.get_int("i").unwrap(), v.clamp(min, max));
        }

        /// Vectors never exceed the max length and short vectors pass unchanged.
        #[test]
        fn vector_max_length(
            x in -100.0f32..100.0,
            y in -100.0f32..100.0,
            z in -100.0f32..100.0,
            limit in 0.1f32..50.0,
        ) {
            let input = Vec3::new(x, y, z);
            let mut channels = ChannelRegistry::new();
            channels.register_vector("v", Vec3::ZERO, false, Some(limit)).unwrap();
            channels.set_vector("v", input).unwrap();
            let stored = channels.get_vector("v").unwrap();

            prop_assert!(stored.length() <= limit * (1.0 + 1e-5));
            if input.length_squared() <= limit * limit {
                prop_assert_eq!(stored, input);
            } else {
                prop_assert!((stored.length() - limit).abs() <= limit * 1e-5);
                prop_assert!(stored.normalize().abs_diff_eq(input.normalize(), 1e-4));
            }
        }

        /// Cleared channels always read their default after end_tick.
        #[test]
        fn cleared_channels_reset(writes in proptest::collection::vec(-50i32..50, 0..8)) {
            let mut channels = ChannelRegistry::new();
            channels.register_int("cleared", 7, true, None).unwrap();
            channels.register_int("kept", 7, false, None).unwrap();
            for v in &writes {
                channels.set_int("cleared", *v).unwrap();
                channels.set_int("kept", *v).unwrap();
            }
            channels.end_tick();
            prop_assert_eq!(channels.get_int("cleared").unwrap(), 7);
            prop_assert_eq!(channels.get_int("kept").unwrap(), writes.last().copied().unwrap_or(7));
        }
    }
}
