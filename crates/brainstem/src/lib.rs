//! Channel blackboards and hierarchical state machines for game entity control

pub mod brain {
    pub use brainstem_runtime::{
        AgentId, Brain, BrainContext, Controller, Motor, SharedCoordinator,
    };
}

pub mod channels {
    pub use brainstem_channels::{
        ChannelKey, ChannelKind, ChannelRegistry, ChannelSpec, ChannelType, ChannelValue,
        ChannelsConfig, Constraint, DefaultValue, EntityHandle, Quat, Vec3,
    };
}

pub mod error {
    pub use brainstem_core::{BrainError, Result};
}

pub mod input {
    pub use brainstem_runtime::{
        AxisHandler, ButtonHandler, ButtonState, InputBindings, InputSnapshot, InputSource,
        PlayerController,
    };
}

pub mod spec {
    pub use brainstem_runtime::spec::BrainSpec;
}

pub mod state {
    pub use brainstem_core::{
        StateMachineSnapshot, StateTransitionEvent, TransitionReason, TransitionRecord,
    };
    pub use brainstem_state::{
        Bindings, Condition, GraphDefinition, StateCallback, StateDefinition, StateHook,
        StateMachine, TransitionDefinition, TransitionMode,
    };
}

pub mod time {
    pub use brainstem_core::Timestamp;
    pub use brainstem_runtime::{CooldownTimer, ExpirationTimer, Magazine};
}

pub use brain::{Brain, BrainContext};
pub use channels::ChannelRegistry;
pub use error::{BrainError, Result};
pub use spec::BrainSpec;
pub use state::StateMachine;
pub use time::Timestamp;
