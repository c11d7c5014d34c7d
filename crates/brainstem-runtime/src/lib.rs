//! Per-entity brain loop, input dispatch and timers for brainstem

mod brain;
mod context;
mod controller;
mod coordinator;
mod input;
mod motor;
mod timer;

pub mod spec;

pub use brain::{AgentId, Brain};
pub use context::BrainContext;
pub use controller::Controller;
pub use coordinator::SharedCoordinator;
pub use input::{
    AxisHandler, ButtonHandler, ButtonState, InputBindings, InputSnapshot, InputSource,
    PlayerController,
};
pub use motor::Motor;
pub use spec::BrainSpec;
pub use timer::{CooldownTimer, ExpirationTimer, Magazine};

pub use brainstem_core::{BrainError, Result, Timestamp};
