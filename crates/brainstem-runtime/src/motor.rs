use brainstem_core::Result;

use super::BrainContext;

/// Reads channels and acts on the entity.
pub trait Motor<S> {
    fn name(&self) -> &str;

    fn take_input(&mut self, ctx: &mut BrainContext<S>) -> Result<()>;

    /// Runs after `take_input` in the same tick, before channels clear.
    fn update_after_input(&mut self, _ctx: &mut BrainContext<S>) -> Result<()> {
        Ok(())
    }
}
