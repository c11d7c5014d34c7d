use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use brainstem_core::Result;

/// Enter, during, exit and on-taken callbacks.
pub type StateCallback<C> = Arc<dyn Fn(&mut C) -> Result<()> + Send + Sync>;

/// Transition guard. Reads the context, never drives the machine.
pub type Condition<C> = Arc<dyn Fn(&C) -> Result<bool> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateHook {
    Enter,
    During,
    Exit,
}

impl fmt::Display for StateHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateHook::Enter => f.write_str("enter"),
            StateHook::During => f.write_str("during"),
            StateHook::Exit => f.write_str("exit"),
        }
    }
}

/// Host callbacks keyed by state name and (from, to) pair.
///
/// Binding the same slot twice keeps the last callback.
pub struct Bindings<C> {
    pub(crate) hooks: HashMap<(String, StateHook), StateCallback<C>>,
    pub(crate) conditions: HashMap<(String, String), Condition<C>>,
    pub(crate) notifies: HashMap<(String, String), StateCallback<C>>,
}

impl<C> Default for Bindings<C> {
    fn default() -> Self {
        Self {
            hooks: HashMap::new(),
            conditions: HashMap::new(),
            notifies: HashMap::new(),
        }
    }
}

impl<C> Bindings<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook<F>(mut self, state: &str, hook: StateHook, f: F) -> Self
    where
        F: Fn(&mut C) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.insert((state.to_string(), hook), Arc::new(f));
        self
    }

    pub fn on_enter<F>(self, state: &str, f: F) -> Self
    where
        F: Fn(&mut C) -> Result<()> + Send + Sync + 'static,
    {
        self.hook(state, StateHook::Enter, f)
    }

    pub fn on_during<F>(self, state: &str, f: F) -> Self
    where
        F: Fn(&mut C) -> Result<()> + Send + Sync + 'static,
    {
        self.hook(state, StateHook::During, f)
    }

    pub fn on_exit<F>(self, state: &str, f: F) -> Self
    where
        F: Fn(&mut C) -> Result<()> + Send + Sync + 'static,
    {
        self.hook(state, StateHook::Exit, f)
    }

    pub fn condition<F>(mut self, from: &str, to: &str, f: F) -> Self
    where
        F: Fn(&C) -> Result<bool> + Send + Sync + 'static,
    {
        self.conditions
            .insert((from.to_string(), to.to_string()), Arc::new(f));
        self
    }

    pub fn on_taken<F>(mut self, from: &str, to: &str, f: F) -> Self
    where
        F: Fn(&mut C) -> Result<()> + Send + Sync + 'static,
    {
        self.notifies
            .insert((from.to_string(), to.to_string()), Arc::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty() && self.conditions.is_empty() && self.notifies.is_empty()
    }
}

impl<C> fmt::Debug for Bindings<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("hooks", &self.hooks.len())
            .field("conditions", &self.conditions.len())
            .field("notifies", &self.notifies.len())
            .finish()
    }
}
