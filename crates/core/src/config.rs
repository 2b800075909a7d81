use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppConfig {
    pub catalogue: CatalogueConfig,
    pub reasoning: ReasoningConfig,
    pub council: CouncilConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CatalogueConfig {
    pub concepts_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReasoningConfig {
    pub clarification_confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CouncilConfig {
    pub contradiction_history: usize,
    pub knowledge_gap_threshold: f64,
    pub alignment_threshold: f64,
    pub tone_window_secs: u64,
    pub tone_stress_threshold: usize,
    pub tone_window_capacity: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub concepts_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const MAX_CONTRADICTION_HISTORY: usize = 20;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalogue: CatalogueConfig::default(),
            reasoning: ReasoningConfig { clarification_confidence: 0.35 },
            council: CouncilConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            contradiction_history: MAX_CONTRADICTION_HISTORY,
            knowledge_gap_threshold: 0.6,
            alignment_threshold: 0.6,
            tone_window_secs: 3600,
            tone_stress_threshold: 20,
            tone_window_capacity: 256,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("arbiter.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(catalogue) = patch.catalogue {
            if let Some(concepts_path) = catalogue.concepts_path {
                self.catalogue.concepts_path = Some(concepts_path);
            }
            if let Some(rules_path) = catalogue.rules_path {
                self.catalogue.rules_path = Some(rules_path);
            }
        }

        if let Some(reasoning) = patch.reasoning {
            if let Some(clarification_confidence) = reasoning.clarification_confidence {
                self.reasoning.clarification_confidence = clarification_confidence;
            }
        }

        if let Some(council) = patch.council {
            if let Some(contradiction_history) = council.contradiction_history {
                self.council.contradiction_history = contradiction_history;
            }
            if let Some(knowledge_gap_threshold) = council.knowledge_gap_threshold {
                self.council.knowledge_gap_threshold = knowledge_gap_threshold;
            }
            if let Some(alignment_threshold) = council.alignment_threshold {
                self.council.alignment_threshold = alignment_threshold;
            }
            if let Some(tone_window_secs) = council.tone_window_secs {
                self.council.tone_window_secs = tone_window_secs;
            }
            if let Some(tone_stress_threshold) = council.tone_stress_threshold {
                self.council.tone_stress_threshold = tone_stress_threshold;
            }
            if let Some(tone_window_capacity) = council.tone_window_capacity {
                self.council.tone_window_capacity = tone_window_capacity;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ARBITER_CATALOGUE_CONCEPTS_PATH") {
            self.catalogue.concepts_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("ARBITER_CATALOGUE_RULES_PATH") {
            self.catalogue.rules_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("ARBITER_REASONING_CLARIFICATION_CONFIDENCE") {
            self.reasoning.clarification_confidence =
                parse_f64("ARBITER_REASONING_CLARIFICATION_CONFIDENCE", &value)?;
        }

        if let Some(value) = read_env("ARBITER_COUNCIL_CONTRADICTION_HISTORY") {
            self.council.contradiction_history =
                parse_usize("ARBITER_COUNCIL_CONTRADICTION_HISTORY", &value)?;
        }
        if let Some(value) = read_env("ARBITER_COUNCIL_KNOWLEDGE_GAP_THRESHOLD") {
            self.council.knowledge_gap_threshold =
                parse_f64("ARBITER_COUNCIL_KNOWLEDGE_GAP_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("ARBITER_COUNCIL_ALIGNMENT_THRESHOLD") {
            self.council.alignment_threshold =
                parse_f64("ARBITER_COUNCIL_ALIGNMENT_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("ARBITER_COUNCIL_TONE_WINDOW_SECS") {
            self.council.tone_window_secs = parse_u64("ARBITER_COUNCIL_TONE_WINDOW_SECS", &value)?;
        }
        if let Some(value) = read_env("ARBITER_COUNCIL_TONE_STRESS_THRESHOLD") {
            self.council.tone_stress_threshold =
                parse_usize("ARBITER_COUNCIL_TONE_STRESS_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("ARBITER_COUNCIL_TONE_WINDOW_CAPACITY") {
            self.council.tone_window_capacity =
                parse_usize("ARBITER_COUNCIL_TONE_WINDOW_CAPACITY", &value)?;
        }

        let log_level = read_env("ARBITER_LOGGING_LEVEL").or_else(|| read_env("ARBITER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ARBITER_LOGGING_FORMAT").or_else(|| read_env("ARBITER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(concepts_path) = overrides.concepts_path {
            self.catalogue.concepts_path = Some(concepts_path);
        }
        if let Some(rules_path) = overrides.rules_path {
            self.catalogue.rules_path = Some(rules_path);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_catalogue(&self.catalogue)?;
        validate_reasoning(&self.reasoning)?;
        validate_council(&self.council)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("arbiter.toml"), PathBuf::from("config/arbiter.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_catalogue(catalogue: &CatalogueConfig) -> Result<(), ConfigError> {
    let paths = [
        ("catalogue.concepts_path", &catalogue.concepts_path),
        ("catalogue.rules_path", &catalogue.rules_path),
    ];
    for (key, path) in paths {
        if let Some(path) = path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{key} must not be empty; remove the key to use the built-in catalogue"
                )));
            }
        }
    }
    Ok(())
}

fn validate_reasoning(reasoning: &ReasoningConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&reasoning.clarification_confidence) {
        return Err(ConfigError::Validation(
            "reasoning.clarification_confidence must be in range 0.0..=1.0".to_string(),
        ));
    }
    Ok(())
}

fn validate_council(council: &CouncilConfig) -> Result<(), ConfigError> {
    if council.contradiction_history == 0 || council.contradiction_history > MAX_CONTRADICTION_HISTORY
    {
        return Err(ConfigError::Validation(format!(
            "council.contradiction_history must be in range 1..={MAX_CONTRADICTION_HISTORY}"
        )));
    }

    let thresholds = [
        ("council.knowledge_gap_threshold", council.knowledge_gap_threshold),
        ("council.alignment_threshold", council.alignment_threshold),
    ];
    for (key, value) in thresholds {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!("{key} must be in range 0.0..=1.0")));
        }
    }

    if council.tone_window_secs == 0 {
        return Err(ConfigError::Validation(
            "council.tone_window_secs must be greater than zero".to_string(),
        ));
    }
    if council.tone_stress_threshold == 0 {
        return Err(ConfigError::Validation(
            "council.tone_stress_threshold must be greater than zero".to_string(),
        ));
    }
    if council.tone_window_capacity < council.tone_stress_threshold {
        return Err(ConfigError::Validation(
            "council.tone_window_capacity must be at least council.tone_stress_threshold"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    catalogue: Option<CataloguePatch>,
    reasoning: Option<ReasoningPatch>,
    council: Option<CouncilPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CataloguePatch {
    concepts_path: Option<PathBuf>,
    rules_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ReasoningPatch {
    clarification_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CouncilPatch {
    contradiction_history: Option<usize>,
    knowledge_gap_threshold: Option<f64>,
    alignment_threshold: Option<f64>,
    tone_window_secs: Option<u64>,
    tone_stress_threshold: Option<usize>,
    tone_window_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_without_a_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/arbiter.toml")),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.council.contradiction_history == 20, "history defaults to 20")?;
        ensure(config.council.knowledge_gap_threshold == 0.6, "gap threshold defaults to 0.6")?;
        ensure(config.catalogue.rules_path.is_none(), "built-in rules are used by default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_ARBITER_RULES_DIR", "/etc/arbiter");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("arbiter.toml");
            fs::write(
                &path,
                r#"
[catalogue]
rules_path = "${TEST_ARBITER_RULES_DIR}/rules.toml"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.catalogue.rules_path == Some(PathBuf::from("/etc/arbiter/rules.toml")),
                "rules path should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_ARBITER_RULES_DIR"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ARBITER_LOG_LEVEL", "warn");
        env::set_var("ARBITER_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["ARBITER_LOG_LEVEL", "ARBITER_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ARBITER_COUNCIL_CONTRADICTION_HISTORY", "12");
        env::set_var("ARBITER_CATALOGUE_RULES_PATH", "/from/env.toml");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("arbiter.toml");
            fs::write(
                &path,
                r#"
[catalogue]
rules_path = "/from/file.toml"
concepts_path = "/from/file-concepts.toml"

[council]
contradiction_history = 5
alignment_threshold = 0.5

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    rules_path: Some(PathBuf::from("/from/override.toml")),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.catalogue.rules_path == Some(PathBuf::from("/from/override.toml")),
                "override rules path should win",
            )?;
            ensure(
                config.catalogue.concepts_path
                    == Some(PathBuf::from("/from/file-concepts.toml")),
                "file concepts path should survive when nothing overrides it",
            )?;
            ensure(config.council.contradiction_history == 12, "env history should win over file")?;
            ensure(config.council.alignment_threshold == 0.5, "file threshold should win over default")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")
        })();

        clear_vars(&["ARBITER_COUNCIL_CONTRADICTION_HISTORY", "ARBITER_CATALOGUE_RULES_PATH"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ARBITER_COUNCIL_CONTRADICTION_HISTORY", "50");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("council.contradiction_history")
            );
            ensure(has_message, "validation failure should mention council.contradiction_history")
        })();

        clear_vars(&["ARBITER_COUNCIL_CONTRADICTION_HISTORY"]);
        result
    }

    #[test]
    fn malformed_env_override_names_the_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ARBITER_COUNCIL_ALIGNMENT_THRESHOLD", "high");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default()).err();
            ensure(
                matches!(
                    error,
                    Some(ConfigError::InvalidEnvOverride { ref key, .. })
                        if key == "ARBITER_COUNCIL_ALIGNMENT_THRESHOLD"
                ),
                "invalid float override should be rejected",
            )
        })();

        clear_vars(&["ARBITER_COUNCIL_ALIGNMENT_THRESHOLD"]);
        result
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/arbiter.toml")),
            require_file: true,
            ..LoadOptions::default()
        })
        .err();
        ensure(
            matches!(error, Some(ConfigError::MissingConfigFile(_))),
            "missing required file should be reported",
        )
    }
}
