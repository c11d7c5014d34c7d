use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use brainstem_channels::ChannelRegistry;
use brainstem_core::{BrainError, Result, Timestamp};

use super::spec::BrainSpec;
use super::{BrainContext, Controller, Motor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Slot<B: ?Sized> {
    enabled: bool,
    inner: Box<B>,
}

/// Per-entity update loop: active controller, then motors, then channel
/// clearing.
pub struct Brain<S> {
    id: AgentId,
    name: String,
    context: BrainContext<S>,
    controllers: Vec<Slot<dyn Controller<S>>>,
    motors: Vec<Slot<dyn Motor<S>>>,
    active: Option<usize>,
    default_controller: usize,
    started: bool,
}

impl<S> Brain<S> {
    pub fn new(name: impl Into<String>, channels: ChannelRegistry, state: S) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            context: BrainContext::new(channels, state),
            controllers: Vec::new(),
            motors: Vec::new(),
            active: None,
            default_controller: 0,
            started: false,
        }
    }

    /// Builds the channel registry described by `spec`. The state machine,
    /// if any, still needs host bindings and is added as a controller.
    pub fn from_spec(spec: &BrainSpec, state: S) -> Result<Self> {
        spec.validate()?;
        let channels = spec.build_channels()?;
        Ok(Self::new(spec.name.clone(), channels, state))
    }

    pub fn with_controller(mut self, controller: impl Controller<S> + 'static) -> Self {
        self.add_controller(Box::new(controller));
        self
    }

    pub fn with_motor(mut self, motor: impl Motor<S> + 'static) -> Self {
        self.add_motor(Box::new(motor));
        self
    }

    /// Controller enabled when the brain starts.
    pub fn with_default_controller(mut self, index: usize) -> Self {
        self.default_controller = index;
        self
    }

    pub fn add_controller(&mut self, controller: Box<dyn Controller<S>>) -> usize {
        self.controllers.push(Slot {
            enabled: true,
            inner: controller,
        });
        self.controllers.len() - 1
    }

    /// Motors can be added at any time; they run from the next tick.
    pub fn add_motor(&mut self, motor: Box<dyn Motor<S>>) -> usize {
        self.motors.push(Slot {
            enabled: true,
            inner: motor,
        });
        self.motors.len() - 1
    }

    /// Initializes every controller and enables the default one. Called by
    /// the first [`Brain::tick`] if the host has not called it.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        for slot in &mut self.controllers {
            if let Err(err) = slot.inner.initialize(&mut self.context) {
                warn!(
                    brain = %self.name,
                    controller = slot.inner.name(),
                    error = %err,
                    "Controller failed to initialize; disabling it"
                );
                slot.enabled = false;
            }
        }

        match self.controllers.get(self.default_controller) {
            Some(slot) if slot.enabled => self.activate(Some(self.default_controller)),
            Some(slot) => warn!(
                brain = %self.name,
                controller = slot.inner.name(),
                "Default controller is disabled; no controller active"
            ),
            None if !self.controllers.is_empty() => warn!(
                brain = %self.name,
                index = self.default_controller,
                "Default controller index out of range; no controller active"
            ),
            None => {}
        }
    }

    /// Switches the active controller, calling the disable hook on the old
    /// one and the enable hook on the new one. `None` leaves the brain
    /// without input.
    pub fn set_active_controller(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(i) = index {
            if i >= self.controllers.len() {
                return Err(BrainError::InvalidConfig(format!(
                    "controller index {} out of range ({} controllers)",
                    i,
                    self.controllers.len()
                )));
            }
        }
        self.activate(index);
        Ok(())
    }

    fn activate(&mut self, index: Option<usize>) {
        if index == self.active {
            return;
        }

        if let Some(old) = self.active {
            let slot = &mut self.controllers[old];
            if let Err(err) = slot.inner.on_disable(&mut self.context) {
                warn!(
                    brain = %self.name,
                    controller = slot.inner.name(),
                    error = %err,
                    "Controller disable hook failed"
                );
            }
        }

        self.active = index;

        if let Some(new) = index {
            let slot = &mut self.controllers[new];
            if let Err(err) = slot.inner.on_enable(&mut self.context) {
                warn!(
                    brain = %self.name,
                    controller = slot.inner.name(),
                    error = %err,
                    "Controller enable hook failed; disabling it"
                );
                slot.enabled = false;
            }
            info!(
                brain = %self.name,
                controller = slot.inner.name(),
                index = new,
                "Active controller switched"
            );
        } else {
            info!(brain = %self.name, "Active controller cleared");
        }
    }

    /// Runs one tick at game time `now`. Behaviours that fail are logged and
    /// disabled; the rest of the tick still runs and channels still clear.
    pub fn tick(&mut self, now: Timestamp) {
        self.context.now = now;
        if !self.started {
            self.start();
        }

        if let Some(index) = self.active {
            let slot = &mut self.controllers[index];
            if slot.enabled {
                if let Err(err) = slot.inner.get_input(&mut self.context) {
                    warn!(
                        brain = %self.name,
                        controller = slot.inner.name(),
                        error = %err,
                        "Controller failed; disabling it"
                    );
                    slot.enabled = false;
                }
            }
        }

        for slot in &mut self.motors {
            if !slot.enabled {
                continue;
            }
            let result = slot
                .inner
                .take_input(&mut self.context)
                .and_then(|()| slot.inner.update_after_input(&mut self.context));
            if let Err(err) = result {
                warn!(
                    brain = %self.name,
                    motor = slot.inner.name(),
                    error = %err,
                    "Motor failed; disabling it"
                );
                slot.enabled = false;
            }
        }

        self.context.channels.end_tick();
        debug!(brain = %self.name, at = %now, "Brain tick complete");
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &BrainContext<S> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut BrainContext<S> {
        &mut self.context
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.context.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelRegistry {
        &mut self.context.channels
    }

    pub fn state(&self) -> &S {
        &self.context.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.context.state
    }

    pub fn active_controller_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_controller_name(&self) -> Option<&str> {
        self.active.map(|i| self.controllers[i].inner.name())
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn motor_count(&self) -> usize {
        self.motors.len()
    }

    pub fn is_controller_enabled(&self, index: usize) -> bool {
        self.controllers.get(index).is_some_and(|s| s.enabled)
    }

    pub fn is_motor_enabled(&self, index: usize) -> bool {
        self.motors.get(index).is_some_and(|s| s.enabled)
    }

    /// Re-enables or pauses a motor, e.g. after the host fixed what made it fail.
    pub fn set_motor_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        let slot = self.motors.get_mut(index).ok_or_else(|| {
            BrainError::InvalidConfig(format!("motor index {} out of range", index))
        })?;
        slot.enabled = enabled;
        Ok(())
    }

    pub fn set_controller_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        let slot = self.controllers.get_mut(index).ok_or_else(|| {
            BrainError::InvalidConfig(format!("controller index {} out of range", index))
        })?;
        slot.enabled = enabled;
        Ok(())
    }
}

impl<S> fmt::Debug for Brain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Brain")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("controllers", &self.controllers.len())
            .field("motors", &self.motors.len())
            .field("active", &self.active)
            .finish()
    }
}
