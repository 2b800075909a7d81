use thiserror::Error;

use crate::config::ConfigError;

/// Raised while building a concept store or rule catalogue. Always fatal: a store that
/// fails to load is never handed to the reasoning pipeline.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("malformed concept id `{id}` (expected `namespace:name` with [A-Za-z0-9_-] segments)")]
    MalformedConceptId { id: String },
    #[error("confidence {value} for `{id}` is outside 0.0..=1.0")]
    ConfidenceOutOfRange { id: String, value: f64 },
    #[error("concept `{id}` is not registered")]
    UnknownConcept { id: String },
    #[error("concept `{id}` is registered twice")]
    DuplicateConcept { id: String },
    #[error("concept `{concept}` declares operation `{operation}` but no handler is registered")]
    UnboundOperation { concept: String, operation: String },
    #[error("invalid rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },
    #[error("could not parse catalogue `{origin}`: {reason}")]
    Catalogue { origin: String, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("operation `{operation}` is not available on `{concept}`")]
    Unavailable { concept: String, operation: String },
    #[error("unknown concept `{0}`")]
    UnknownConcept(String),
    #[error("operation `{operation}` failed: {message}")]
    Failed { operation: String, message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("reviewer `{reviewer}` could not analyze the situation: {message}")]
    Analysis { reviewer: String, message: String },
    #[error("reviewer `{reviewer}` panicked: {message}")]
    Panicked { reviewer: String, message: String },
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("could not read `{path}`: {message}")]
    Io { path: String, message: String },
}

impl ApplicationError {
    /// Stable class string for structured command output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_validation",
            Self::Configuration(_) => "catalogue_load",
            Self::Io { .. } => "io",
        }
    }
}
