//! Built-in operation handlers and the default concept catalogue that binds them.

use std::fs;
use std::path::{Component, Path, PathBuf};

use arbiter_core::domain::concept::Operation;
use arbiter_core::{
    ConceptCatalogue, ConceptStore, ConfigurationError, OperationError, OperationRegistry,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

const DEFAULT_CONCEPTS: &str = include_str!("../catalogue/default_concepts.toml");

/// Upper bound on what `read` returns, in bytes.
pub const MAX_READ_BYTES: u64 = 64 * 1024;

#[derive(Clone, Debug, Default)]
pub struct EchoOperation;

impl Operation for EchoOperation {
    fn name(&self) -> &str {
        "echo"
    }

    fn invoke(&self, args: &Value) -> Result<Value, OperationError> {
        Ok(json!({ "text": text_argument(args) }))
    }
}

#[derive(Clone, Debug, Default)]
pub struct CountOperation;

impl Operation for CountOperation {
    fn name(&self) -> &str {
        "count"
    }

    fn invoke(&self, args: &Value) -> Result<Value, OperationError> {
        let text = text_argument(args);
        Ok(json!({
            "words": text.split_whitespace().count(),
            "characters": text.chars().count(),
        }))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ClockOperation;

impl Operation for ClockOperation {
    fn name(&self) -> &str {
        "clock"
    }

    fn invoke(&self, _args: &Value) -> Result<Value, OperationError> {
        Ok(json!({ "utc": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true) }))
    }
}

/// Reads a UTF-8 file relative to `root`. Absolute paths and `..` segments are refused.
#[derive(Clone, Debug)]
pub struct ReadOperation {
    root: PathBuf,
}

impl ReadOperation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, OperationError> {
        let candidate = Path::new(relative);
        let escapes = candidate
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if relative.trim().is_empty() || escapes {
            return Err(failed(format!("path `{relative}` is outside the readable root")));
        }
        Ok(self.root.join(candidate))
    }
}

impl Operation for ReadOperation {
    fn name(&self) -> &str {
        "read"
    }

    fn invoke(&self, args: &Value) -> Result<Value, OperationError> {
        let relative = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| failed("a `path` argument is required".to_string()))?;
        let path = self.resolve(relative)?;

        let metadata = fs::metadata(&path).map_err(|error| failed(format!("{relative}: {error}")))?;
        if metadata.len() > MAX_READ_BYTES {
            return Err(failed(format!(
                "{relative} is {} bytes, above the {MAX_READ_BYTES} byte limit",
                metadata.len()
            )));
        }
        let contents =
            fs::read_to_string(&path).map_err(|error| failed(format!("{relative}: {error}")))?;
        Ok(json!({ "path": relative, "contents": contents }))
    }
}

fn failed(message: String) -> OperationError {
    OperationError::Failed { operation: "read".to_string(), message }
}

fn text_argument(args: &Value) -> String {
    match args {
        Value::String(text) => text.clone(),
        other => other.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
    }
}

/// `echo`, `count`, `clock` and a `read` confined to `read_root`.
pub fn builtin_registry(read_root: &Path) -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    registry.register(EchoOperation);
    registry.register(CountOperation);
    registry.register(ClockOperation);
    registry.register(ReadOperation::new(read_root));
    registry
}

pub fn default_catalogue() -> Result<ConceptCatalogue, ConfigurationError> {
    ConceptCatalogue::from_toml(DEFAULT_CONCEPTS, "builtin-concepts")
}

/// Loads `path` when given, the built-in catalogue otherwise.
pub fn load_store(
    path: Option<&Path>,
    registry: &OperationRegistry,
) -> Result<ConceptStore, ConfigurationError> {
    let catalogue = match path {
        Some(path) => ConceptCatalogue::load(path)?,
        None => default_catalogue()?,
    };
    ConceptStore::from_catalogue(&catalogue, registry)
}
