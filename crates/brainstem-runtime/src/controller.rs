use brainstem_core::Result;
use brainstem_state::StateMachine;

use super::BrainContext;

/// Writes channels once per tick. A brain has at most one active controller.
pub trait Controller<S> {
    fn name(&self) -> &str;

    /// Called once when the brain starts, before any controller is enabled.
    fn initialize(&mut self, _ctx: &mut BrainContext<S>) -> Result<()> {
        Ok(())
    }

    fn get_input(&mut self, ctx: &mut BrainContext<S>) -> Result<()>;

    fn on_enable(&mut self, _ctx: &mut BrainContext<S>) -> Result<()> {
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &mut BrainContext<S>) -> Result<()> {
        Ok(())
    }
}

/// An AI state machine drives the entity by stepping once per tick.
impl<S> Controller<S> for StateMachine<BrainContext<S>> {
    fn name(&self) -> &str {
        "state_machine"
    }

    fn get_input(&mut self, ctx: &mut BrainContext<S>) -> Result<()> {
        let now = ctx.now;
        self.step(now, ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainstem_channels::ChannelRegistry;
    use brainstem_core::Timestamp;
    use brainstem_state::{
        Bindings, GraphDefinition, StateDefinition, TransitionDefinition, TransitionMode,
    };

    #[test]
    fn test_state_machine_steps_with_context_time() {
        let graph = GraphDefinition::new()
            .with_state(StateDefinition::new("Idle"))
            .with_state(StateDefinition::new("Alert"))
            .with_transition(
                TransitionDefinition::new("Idle", "Alert")
                    .with_mode(TransitionMode::TimeOnly)
                    .after(1.0),
            );
        let mut machine: StateMachine<BrainContext<()>> =
            StateMachine::new(graph, Bindings::new()).unwrap();
        let mut ctx = BrainContext::new(ChannelRegistry::new(), ());

        ctx.now = Timestamp::from_secs(0.0);
        machine.get_input(&mut ctx).unwrap();
        assert_eq!(machine.active_state_name(), Some("Idle"));

        ctx.now = Timestamp::from_secs(1.0);
        machine.get_input(&mut ctx).unwrap();
        assert_eq!(machine.active_state_name(), Some("Alert"));
        assert_eq!(Controller::<()>::name(&machine), "state_machine");
    }
}
