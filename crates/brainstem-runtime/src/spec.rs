//! Brain description files (YAML or JSON)

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use brainstem_channels::{ChannelRegistry, ChannelSpec};
use brainstem_core::{BrainError, Result};
use brainstem_state::{Bindings, GraphDefinition, StateMachine};

/// Static description of one entity kind: its channels and, optionally, its
/// AI state graph. Host callbacks are bound in code.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BrainSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub channels: Vec<ChannelSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<GraphDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl BrainSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            channels: Vec::new(),
            machine: None,
            metadata: None,
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let spec: BrainSpec = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let spec: BrainSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        debug!(path = %path.display(), json = is_json, "Loading brain spec");
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BrainError::InvalidConfig(
                "Brain name cannot be empty".to_string(),
            ));
        }

        ChannelRegistry::from_specs(&self.channels)?;

        if let Some(ref machine) = self.machine {
            machine.validate()?;
        }

        Ok(())
    }

    pub fn has_machine(&self) -> bool {
        self.machine.is_some()
    }

    pub fn build_channels(&self) -> Result<ChannelRegistry> {
        ChannelRegistry::from_specs(&self.channels)
    }

    pub fn build_machine<C>(&self, bindings: Bindings<C>) -> Result<StateMachine<C>> {
        let graph = self.machine.clone().ok_or_else(|| {
            BrainError::InvalidConfig(format!("Brain '{}' has no state machine", self.name))
        })?;
        StateMachine::new(graph, bindings)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn json_schema() -> Result<serde_json::Value> {
        Ok(serde_json::to_value(schemars::schema_for!(BrainSpec))?)
    }
}
