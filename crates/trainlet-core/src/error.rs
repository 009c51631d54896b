//! Error types for trainlet

use thiserror::Error;

/// Main error type for trainlet
#[derive(Error, Debug)]
pub enum TrainletError {
    /// A job spec field is missing or out of range
    #[error("Configuration error: {field}: {reason}")]
    Configuration { field: String, reason: String },

    /// A module (or the virtualenv) could not be activated
    #[error("Environment error: failed to activate {module}: {reason}")]
    Environment { module: String, reason: String },

    /// The job file could not be read or parsed
    #[error("Job file error: {0}")]
    ConfigFile(String),

    /// Scheduler submission error
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Delegated process could not be started or awaited
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for trainlet operations
pub type TrainletResult<T> = Result<T, TrainletError>;

impl TrainletError {
    /// Build a configuration error for `field`
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TrainletError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Build an environment error naming the module that failed
    pub fn environment(module: impl Into<String>, reason: impl Into<String>) -> Self {
        TrainletError::Environment {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Offending field for configuration errors
    pub fn field(&self) -> Option<&str> {
        match self {
            TrainletError::Configuration { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Offending module for environment errors
    pub fn module(&self) -> Option<&str> {
        match self {
            TrainletError::Environment { module, .. } => Some(module),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TrainletError {
    fn from(err: serde_json::Error) -> Self {
        TrainletError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for TrainletError {
    fn from(err: toml::de::Error) -> Self {
        TrainletError::ConfigFile(err.to_string())
    }
}
