//! Core types and errors for the brainstem framework

pub mod error;
pub mod types;

pub use error::{BrainError, Result};
pub use types::{
    StateMachineSnapshot, StateTransitionEvent, Timestamp, TransitionReason, TransitionRecord,
};
