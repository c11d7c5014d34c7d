use std::collections::{HashMap, HashSet};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use brainstem_core::{BrainError, Result};

/// State graph descriptor, produced offline and consumed at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct GraphDefinition {
    /// Root-level state entered first; defaults to the first root-level state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_state: Option<String>,

    /// Re-enter the remembered child of a level instead of its default.
    #[serde(default)]
    pub resume_history: bool,

    #[serde(default)]
    pub states: Vec<StateDefinition>,

    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct StateDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Entered when this state is entered without a deeper target.
    /// Defaults to the first child in declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_child: Option<String>,

    #[serde(default)]
    pub has_enter: bool,

    #[serde(default)]
    pub has_during: bool,

    #[serde(default)]
    pub has_exit: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    #[default]
    ConditionOnly,
    TimeOnly,
    TimeAndCondition,
    TimeOrCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransitionDefinition {
    pub from: String,
    pub to: String,

    #[serde(default)]
    pub mode: TransitionMode,

    /// Seconds the `from` state must have been active.
    #[serde(default)]
    pub min_elapsed: f64,

    #[serde(default)]
    pub has_notify: bool,
}

impl StateDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_default_child(mut self, child: impl Into<String>) -> Self {
        self.default_child = Some(child.into());
        self
    }

    pub fn with_enter(mut self) -> Self {
        self.has_enter = true;
        self
    }

    pub fn with_during(mut self) -> Self {
        self.has_during = true;
        self
    }

    pub fn with_exit(mut self) -> Self {
        self.has_exit = true;
        self
    }
}

impl TransitionDefinition {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            mode: TransitionMode::ConditionOnly,
            min_elapsed: 0.0,
            has_notify: false,
        }
    }

    pub fn with_mode(mut self, mode: TransitionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn after(mut self, seconds: f64) -> Self {
        self.min_elapsed = seconds;
        self
    }

    pub fn with_notify(mut self) -> Self {
        self.has_notify = true;
        self
    }
}

impl GraphDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn with_state(mut self, state: StateDefinition) -> Self {
        self.states.push(state);
        self
    }

    pub fn with_transition(mut self, transition: TransitionDefinition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn with_default_state(mut self, name: impl Into<String>) -> Self {
        self.default_state = Some(name.into());
        self
    }

    pub fn with_resume_history(mut self, resume: bool) -> Self {
        self.resume_history = resume;
        self
    }

    pub fn get_state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Direct children of `parent` (root-level states for `None`), in order.
    pub fn children(&self, parent: Option<&str>) -> Vec<&StateDefinition> {
        self.states
            .iter()
            .filter(|s| s.parent.as_deref() == parent)
            .collect()
    }

    pub fn has_children(&self, name: &str) -> bool {
        self.states.iter().any(|s| s.parent.as_deref() == Some(name))
    }

    /// Default state of a level: `None` for the root, a state name for a sub-level.
    pub fn default_of(&self, parent: Option<&str>) -> Option<&str> {
        let explicit = match parent {
            None => self.default_state.as_deref(),
            Some(name) => self.get_state(name).and_then(|s| s.default_child.as_deref()),
        };
        explicit.or_else(|| self.children(parent).first().map(|s| s.name.as_str()))
    }

    pub fn transitions_from(&self, name: &str) -> Vec<&TransitionDefinition> {
        self.transitions.iter().filter(|t| t.from == name).collect()
    }

    /// True when `ancestor == descendant` or `ancestor` is reachable by
    /// following `descendant`'s parent links.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut current = Some(descendant);
        let mut steps = 0;
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.states.len() {
                return false;
            }
            current = self.get_state(name).and_then(|s| s.parent.as_deref());
        }
        false
    }

    /// Number of ancestors above `name`.
    pub fn depth(&self, name: &str) -> usize {
        let mut depth = 0;
        let mut current = self.get_state(name).and_then(|s| s.parent.as_deref());
        while let Some(parent) = current {
            depth += 1;
            if depth > self.states.len() {
                break;
            }
            current = self.get_state(parent).and_then(|s| s.parent.as_deref());
        }
        depth
    }

    pub fn validate(&self) -> Result<()> {
        if self.states.is_empty() {
            return Err(invalid("graph has no states".into()));
        }

        let mut seen = HashSet::new();
        for state in &self.states {
            if state.name.trim().is_empty() {
                return Err(invalid("state name cannot be empty".into()));
            }
            if !seen.insert(state.name.as_str()) {
                return Err(invalid(format!("duplicate state '{}'", state.name)));
            }
        }

        let parents: HashMap<&str, Option<&str>> = self
            .states
            .iter()
            .map(|s| (s.name.as_str(), s.parent.as_deref()))
            .collect();

        for state in &self.states {
            if let Some(parent) = state.parent.as_deref() {
                if !parents.contains_key(parent) {
                    return Err(invalid(format!(
                        "state '{}' has unknown parent '{}'",
                        state.name, parent
                    )));
                }
            }
        }

        for state in &self.states {
            let mut visited = HashSet::new();
            let mut current = Some(state.name.as_str());
            while let Some(name) = current {
                if !visited.insert(name) {
                    return Err(invalid(format!(
                        "parent links of state '{}' form a cycle",
                        state.name
                    )));
                }
                current = parents.get(name).copied().flatten();
            }
        }

        if let Some(default) = self.default_state.as_deref() {
            match parents.get(default) {
                None => {
                    return Err(invalid(format!("default state '{}' does not exist", default)));
                }
                Some(Some(parent)) => {
                    return Err(invalid(format!(
                        "default state '{}' is nested under '{}'; it must be root-level",
                        default, parent
                    )));
                }
                Some(None) => {}
            }
        }

        for state in &self.states {
            if let Some(child) = state.default_child.as_deref() {
                if !self.has_children(&state.name) {
                    return Err(invalid(format!(
                        "state '{}' declares default child '{}' but has no children",
                        state.name, child
                    )));
                }
                if parents.get(child).copied().flatten() != Some(state.name.as_str()) {
                    return Err(invalid(format!(
                        "default child '{}' of state '{}' is not one of its children",
                        child, state.name
                    )));
                }
            }
        }

        let mut pairs = HashSet::new();
        for t in &self.transitions {
            let (Some(from_parent), Some(to_parent)) =
                (parents.get(t.from.as_str()), parents.get(t.to.as_str()))
            else {
                return Err(invalid(format!(
                    "transition '{}' -> '{}' references an unknown state",
                    t.from, t.to
                )));
            };
            if self.is_ancestor(&t.from, &t.to) || self.is_ancestor(&t.to, &t.from) {
                return Err(invalid(format!(
                    "transition '{}' -> '{}' connects a state to itself or to its own ancestor/descendant",
                    t.from, t.to
                )));
            }
            if from_parent != to_parent {
                return Err(invalid(format!(
                    "transition '{}' -> '{}' crosses hierarchy levels; endpoints must be siblings",
                    t.from, t.to
                )));
            }
            if !pairs.insert((t.from.as_str(), t.to.as_str())) {
                return Err(invalid(format!(
                    "duplicate transition '{}' -> '{}'",
                    t.from, t.to
                )));
            }
            if let Err(err) = Duration::try_from_secs_f64(t.min_elapsed) {
                return Err(invalid(format!(
                    "transition '{}' -> '{}' has invalid min_elapsed {}: {}",
                    t.from, t.to, t.min_elapsed, err
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> BrainError {
    BrainError::InvalidGraph(message)
}
