#[derive(thiserror::Error, Debug)]
pub enum BrainError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    #[error("Channel '{0}' is already registered")]
    DuplicateRegistration(String),
    #[error("Cannot register channel '{0}' after the first tick")]
    RegistrationClosed(String),
    #[error("Channel '{name}' holds {expected} values, got {actual}")]
    ChannelTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid state graph: {0}")]
    InvalidGraph(String),
    #[error("Unknown state: {0}")]
    UnknownState(String),
    #[error("No transition from '{from}' to '{to}'")]
    UnknownTransition { from: String, to: String },
    #[error("Error in transition hierarchy: {0}")]
    TransitionHierarchy(String),
    #[error("State '{0}' is already active")]
    RedundantTransition(String),
    #[error("Callback failed: {0}")]
    Callback(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BrainError {
    pub fn callback(message: impl Into<String>) -> Self {
        BrainError::Callback(message.into())
    }

    /// Setup-time errors describe a static configuration bug.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BrainError::DuplicateRegistration(_)
                | BrainError::RegistrationClosed(_)
                | BrainError::InvalidConfig(_)
                | BrainError::InvalidGraph(_)
                | BrainError::Yaml(_)
                | BrainError::Json(_)
        )
    }

    /// Hierarchy violations during a switch; the graph builder is at fault.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            BrainError::TransitionHierarchy(_) | BrainError::RedundantTransition(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BrainError>;
