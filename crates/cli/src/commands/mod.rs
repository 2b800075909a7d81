pub mod classify;
pub mod concepts;
pub mod config;
pub mod deliberate;
pub mod doctor;

use std::path::Path;
use std::sync::Arc;

use arbiter_agent::{builtin_registry, load_store};
use arbiter_core::config::{AppConfig, LoadOptions};
use arbiter_core::{ApplicationError, ConceptStore, RuleCatalogue};
use serde::Serialize;

pub const EXIT_CONFIGURATION: u8 = 2;
pub const EXIT_VETO: u8 = 3;
pub const EXIT_IO: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_error(command: &str, error: &ApplicationError) -> Self {
        let exit_code = match error {
            ApplicationError::Io { .. } => EXIT_IO,
            _ => EXIT_CONFIGURATION,
        };
        Self::failure(command, error.error_class(), error.to_string(), exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loaded configuration plus the catalogues it points at.
pub struct Environment {
    pub config: AppConfig,
    pub rules: RuleCatalogue,
    pub store: Arc<ConceptStore>,
}

impl Environment {
    /// `read` operations are confined to the current directory.
    pub fn load(options: &LoadOptions) -> Result<Self, ApplicationError> {
        let config = AppConfig::load(options.clone())?;
        let rules = RuleCatalogue::builtin_with(config.catalogue.rules_path.as_deref())?;
        let registry = builtin_registry(Path::new("."));
        let store = load_store(config.catalogue.concepts_path.as_deref(), &registry)?;
        Ok(Self { config, rules, store: Arc::new(store) })
    }
}
