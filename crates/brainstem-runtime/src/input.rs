use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use brainstem_core::{BrainError, Result};

use super::{BrainContext, Controller};

pub type AxisHandler<S> = Box<dyn Fn(&mut BrainContext<S>, f32) -> Result<()> + Send + Sync>;
pub type ButtonHandler<S> = Box<dyn Fn(&mut BrainContext<S>) -> Result<()> + Send + Sync>;

/// Edge and level state of one button for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ButtonState {
    /// Pressed this frame.
    pub down: bool,
    pub held: bool,
    /// Released this frame.
    pub up: bool,
}

/// Host input device, polled by name once per tick.
pub trait InputSource {
    /// Unknown axes read as zero.
    fn axis(&self, name: &str) -> f32;

    fn button(&self, name: &str) -> ButtonState;
}

impl<T: InputSource> InputSource for Arc<RwLock<T>> {
    fn axis(&self, name: &str) -> f32 {
        self.read().axis(name)
    }

    fn button(&self, name: &str) -> ButtonState {
        self.read().button(name)
    }
}

/// Input state the host fills from its device layer each frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSnapshot {
    axes: HashMap<String, f32>,
    buttons: HashMap<String, ButtonState>,
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn set_axis(&mut self, name: impl Into<String>, value: f32) {
        self.axes.insert(name.into(), value);
    }

    pub fn press(&mut self, name: impl Into<String>) {
        let button = self.buttons.entry(name.into()).or_default();
        button.down = !button.held;
        button.held = true;
    }

    pub fn release(&mut self, name: impl Into<String>) {
        let button = self.buttons.entry(name.into()).or_default();
        button.up = button.held;
        button.held = false;
    }

    /// Drops the one-frame edges; held buttons stay held.
    pub fn end_frame(&mut self) {
        for button in self.buttons.values_mut() {
            button.down = false;
            button.up = false;
        }
    }
}

impl InputSource for InputSnapshot {
    fn axis(&self, name: &str) -> f32 {
        self.axes.get(name).copied().unwrap_or(0.0)
    }

    fn button(&self, name: &str) -> ButtonState {
        self.buttons.get(name).copied().unwrap_or_default()
    }
}

/// Explicit table of input handlers, keyed by axis or button name.
///
/// Each name may be bound once per table (axes, down, held, up).
pub struct InputBindings<S> {
    axes: Vec<(String, AxisHandler<S>)>,
    button_down: Vec<(String, ButtonHandler<S>)>,
    button_held: Vec<(String, ButtonHandler<S>)>,
    button_up: Vec<(String, ButtonHandler<S>)>,
}

impl<S> Default for InputBindings<S> {
    fn default() -> Self {
        Self {
            axes: Vec::new(),
            button_down: Vec::new(),
            button_held: Vec::new(),
            button_up: Vec::new(),
        }
    }
}

impl<S> InputBindings<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut BrainContext<S>, f32) -> Result<()> + Send + Sync + 'static,
    {
        insert_unique(&mut self.axes, "axis", name, Box::new(handler))
    }

    pub fn button_down<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut BrainContext<S>) -> Result<()> + Send + Sync + 'static,
    {
        insert_unique(&mut self.button_down, "button down", name, Box::new(handler))
    }

    pub fn button_held<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut BrainContext<S>) -> Result<()> + Send + Sync + 'static,
    {
        insert_unique(&mut self.button_held, "button", name, Box::new(handler))
    }

    pub fn button_up<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut BrainContext<S>) -> Result<()> + Send + Sync + 'static,
    {
        insert_unique(&mut self.button_up, "button up", name, Box::new(handler))
    }

    pub fn len(&self) -> usize {
        self.axes.len() + self.button_down.len() + self.button_held.len() + self.button_up.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every handler whose input fired: axes first, then button down,
    /// held and up, each in registration order.
    pub fn dispatch(
        &self,
        source: &dyn InputSource,
        suffix: &str,
        ctx: &mut BrainContext<S>,
    ) -> Result<()> {
        for (name, handler) in &self.axes {
            handler(ctx, source.axis(&device_name(name, suffix)))?;
        }
        for (name, handler) in &self.button_down {
            if source.button(&device_name(name, suffix)).down {
                handler(ctx)?;
            }
        }
        for (name, handler) in &self.button_held {
            if source.button(&device_name(name, suffix)).held {
                handler(ctx)?;
            }
        }
        for (name, handler) in &self.button_up {
            if source.button(&device_name(name, suffix)).up {
                handler(ctx)?;
            }
        }
        Ok(())
    }
}

fn insert_unique<H>(table: &mut Vec<(String, H)>, what: &str, name: &str, handler: H) -> Result<()> {
    if table.iter().any(|(existing, _)| existing == name) {
        return Err(BrainError::DuplicateRegistration(format!("{} '{}'", what, name)));
    }
    table.push((name.to_string(), handler));
    Ok(())
}

fn device_name(name: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

impl<S> fmt::Debug for InputBindings<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBindings")
            .field("axes", &names_of(&self.axes))
            .field("button_down", &names_of(&self.button_down))
            .field("button_held", &names_of(&self.button_held))
            .field("button_up", &names_of(&self.button_up))
            .finish()
    }
}

fn names_of<H>(table: &[(String, H)]) -> Vec<&str> {
    table.iter().map(|(n, _)| n.as_str()).collect()
}

/// Controller that turns polled device input into channel writes.
///
/// `suffix` is appended to every device name, so two local players can share
/// one binding table ("Fire" polls "Fire_P2").
pub struct PlayerController<S, I> {
    name: String,
    bindings: InputBindings<S>,
    source: I,
    suffix: String,
}

impl<S, I: InputSource> PlayerController<S, I> {
    pub fn new(name: impl Into<String>, bindings: InputBindings<S>, source: I) -> Self {
        Self {
            name: name.into(),
            bindings,
            source,
            suffix: String::new(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn source(&self) -> &I {
        &self.source
    }
}

impl<S, I: InputSource> Controller<S> for PlayerController<S, I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, _ctx: &mut BrainContext<S>) -> Result<()> {
        debug!(
            controller = %self.name,
            bindings = self.bindings.len(),
            suffix = %self.suffix,
            "Player controller ready"
        );
        Ok(())
    }

    fn get_input(&mut self, ctx: &mut BrainContext<S>) -> Result<()> {
        self.bindings.dispatch(&self.source, &self.suffix, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainstem_channels::{ChannelRegistry, ChannelValue, Vec3};

    type Ctx = BrainContext<Vec<String>>;

    fn ctx() -> Ctx {
        let mut channels = ChannelRegistry::new();
        channels
            .register("movement", ChannelValue::Vector(Vec3::ZERO), true)
            .unwrap();
        channels
            .register("attack", ChannelValue::Bool(false), true)
            .unwrap();
        BrainContext::new(channels, Vec::new())
    }

    fn bindings() -> InputBindings<Vec<String>> {
        let mut bindings = InputBindings::new();
        bindings
            .axis("Horizontal", |ctx: &mut Ctx, value| {
                ctx.state.push(format!("axis:{}", value));
                ctx.channels.set_vector("movement", Vec3::new(value, 0.0, 0.0))
            })
            .unwrap();
        bindings
            .button_down("Fire", |ctx: &mut Ctx| {
                ctx.state.push("down:Fire".into());
                ctx.channels.set_bool("attack", true)
            })
            .unwrap();
        bindings
            .button_held("Fire", |ctx: &mut Ctx| {
                ctx.state.push("held:Fire".into());
                Ok(())
            })
            .unwrap();
        bindings
            .button_up("Fire", |ctx: &mut Ctx| {
                ctx.state.push("up:Fire".into());
                Ok(())
            })
            .unwrap();
        bindings
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut bindings = bindings();
        let err = bindings
            .button_down("Fire", |_: &mut Ctx| Ok(()))
            .unwrap_err();
        assert!(matches!(err, BrainError::DuplicateRegistration(_)));
        assert_eq!(bindings.len(), 4);
    }

    #[test]
    fn test_dispatch_order() {
        let input = InputSnapshot::shared();
        let mut controller = PlayerController::new("player", bindings(), input.clone());
        let mut ctx = ctx();

        input.write().set_axis("Horizontal", 0.5);
        input.write().press("Fire");
        controller.get_input(&mut ctx).unwrap();
        assert_eq!(ctx.state, vec!["axis:0.5", "down:Fire", "held:Fire"]);
        assert!(ctx.channels.get_bool("attack").unwrap());
        assert_eq!(ctx.channels.get_vector("movement").unwrap().x, 0.5);

        ctx.state.clear();
        input.write().end_frame();
        input.write().release("Fire");
        controller.get_input(&mut ctx).unwrap();
        assert_eq!(ctx.state, vec!["axis:0.5", "up:Fire"]);
    }

    #[test]
    fn test_suffix_selects_device() {
        let mut input = InputSnapshot::new();
        input.set_axis("Horizontal", 1.0);
        input.set_axis("Horizontal_P2", -1.0);
        let mut controller =
            PlayerController::new("player2", bindings(), input).with_suffix("_P2");
        let mut ctx = ctx();

        controller.get_input(&mut ctx).unwrap();
        assert_eq!(ctx.state, vec!["axis:-1"]);
        assert_eq!(controller.suffix(), "_P2");
    }

    #[test]
    fn test_snapshot_edges() {
        let mut input = InputSnapshot::new();
        input.press("Jump");
        assert_eq!(
            input.button("Jump"),
            ButtonState { down: true, held: true, up: false }
        );
        input.end_frame();
        input.press("Jump");
        assert!(!input.button("Jump").down);
        input.release("Jump");
        assert!(input.button("Jump").up);
        assert_eq!(input.button("Unbound"), ButtonState::default());
        assert_eq!(input.axis("Unbound"), 0.0);
    }
}
