//! Hierarchical state machine for brainstem

mod bindings;
mod config;
mod evaluator;
mod machine;

pub use bindings::{Bindings, Condition, StateCallback, StateHook};
pub use brainstem_core::{StateMachineSnapshot, StateTransitionEvent, TransitionReason};
pub use config::{GraphDefinition, StateDefinition, TransitionDefinition, TransitionMode};
pub use machine::StateMachine;
