//! Typed per-tick channel blackboard for brainstem

mod registry;
mod spec;
mod value;

pub use glam::{Quat, Vec3};
pub use registry::{ChannelKey, ChannelRegistry};
pub use spec::{ChannelSpec, ChannelsConfig, DefaultValue};
pub use value::{ChannelKind, ChannelType, ChannelValue, Constraint, EntityHandle};
