use brainstem_channels::ChannelRegistry;
use brainstem_core::Timestamp;

/// Everything a controller, motor or state callback sees during a tick.
///
/// `S` is host-owned entity state (transform handles, weapon refs, ...).
#[derive(Debug)]
pub struct BrainContext<S> {
    pub channels: ChannelRegistry,
    pub now: Timestamp,
    pub state: S,
}

impl<S> BrainContext<S> {
    pub fn new(channels: ChannelRegistry, state: S) -> Self {
        Self {
            channels,
            now: Timestamp::ZERO,
            state,
        }
    }
}

impl<S: Default> From<ChannelRegistry> for BrainContext<S> {
    fn from(channels: ChannelRegistry) -> Self {
        Self::new(channels, S::default())
    }
}
