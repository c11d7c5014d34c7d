use std::fmt;
use std::ops::Add;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Game-clock time in seconds, supplied by the host on every tick.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(f64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0.0);

    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Time elapsed since `earlier`, saturating at zero.
    pub fn elapsed_since(&self, earlier: Timestamp) -> Duration {
        let diff = self.0 - earlier.0;
        if diff.is_nan() || diff <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(diff).unwrap_or(Duration::MAX)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs.as_secs_f64())
    }
}

impl From<f64> for Timestamp {
    fn from(secs: f64) -> Self {
        Self(secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// A guarded transition became passable during a step.
    Transition,
    /// The host jumped to a state by name.
    Forced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransitionEvent {
    /// Active leaf before the switch; `None` when the machine was uninitialized.
    pub from: Option<String>,
    pub to: String,
    pub reason: TransitionReason,
    pub at: Timestamp,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub last_taken: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateMachineSnapshot {
    #[serde(default)]
    pub active_path: Vec<String>,
    #[serde(default)]
    pub cached_states: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
    #[serde(default)]
    pub history: Vec<StateTransitionEvent>,
    #[serde(default)]
    pub faulted_callbacks: Vec<String>,
}

impl StateMachineSnapshot {
    pub fn active_state(&self) -> Option<&str> {
        self.active_path.last().map(String::as_str)
    }
}
