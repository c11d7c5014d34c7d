use std::time::Duration;

use brainstem_core::Timestamp;

use super::config::TransitionMode;

impl TransitionMode {
    pub fn uses_condition(&self) -> bool {
        !matches!(self, TransitionMode::TimeOnly)
    }

    pub fn uses_time(&self) -> bool {
        !matches!(self, TransitionMode::ConditionOnly)
    }

    /// Decides passability. The condition is only invoked when the mode
    /// needs it: never for `TimeOnly`, after the time check for the
    /// combined modes.
    pub fn is_satisfied(&self, time_elapsed: bool, condition: impl FnOnce() -> bool) -> bool {
        match self {
            TransitionMode::ConditionOnly => condition(),
            TransitionMode::TimeOnly => time_elapsed,
            TransitionMode::TimeAndCondition => time_elapsed && condition(),
            TransitionMode::TimeOrCondition => time_elapsed || condition(),
        }
    }
}

/// True once `min_elapsed` has passed since `entered`. A state that was
/// never entered has no elapsed time.
pub(crate) fn time_elapsed(entered: Option<Timestamp>, now: Timestamp, min_elapsed: Duration) -> bool {
    entered
        .map(|at| now.elapsed_since(at) >= min_elapsed)
        .unwrap_or(false)
}
