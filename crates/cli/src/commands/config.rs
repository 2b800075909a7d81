use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use arbiter_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let path_or_builtin = |path: Option<&Path>| {
        path.map(|path| path.display().to_string()).unwrap_or_else(|| "<builtin>".to_string())
    };
    let council = &config.council;

    vec![
        Field {
            key: "catalogue.concepts_path",
            value: path_or_builtin(config.catalogue.concepts_path.as_deref()),
            env_keys: &["ARBITER_CATALOGUE_CONCEPTS_PATH"],
        },
        Field {
            key: "catalogue.rules_path",
            value: path_or_builtin(config.catalogue.rules_path.as_deref()),
            env_keys: &["ARBITER_CATALOGUE_RULES_PATH"],
        },
        Field {
            key: "reasoning.clarification_confidence",
            value: config.reasoning.clarification_confidence.to_string(),
            env_keys: &["ARBITER_REASONING_CLARIFICATION_CONFIDENCE"],
        },
        Field {
            key: "council.contradiction_history",
            value: council.contradiction_history.to_string(),
            env_keys: &["ARBITER_COUNCIL_CONTRADICTION_HISTORY"],
        },
        Field {
            key: "council.knowledge_gap_threshold",
            value: council.knowledge_gap_threshold.to_string(),
            env_keys: &["ARBITER_COUNCIL_KNOWLEDGE_GAP_THRESHOLD"],
        },
        Field {
            key: "council.alignment_threshold",
            value: council.alignment_threshold.to_string(),
            env_keys: &["ARBITER_COUNCIL_ALIGNMENT_THRESHOLD"],
        },
        Field {
            key: "council.tone_window_secs",
            value: council.tone_window_secs.to_string(),
            env_keys: &["ARBITER_COUNCIL_TONE_WINDOW_SECS"],
        },
        Field {
            key: "council.tone_stress_threshold",
            value: council.tone_stress_threshold.to_string(),
            env_keys: &["ARBITER_COUNCIL_TONE_STRESS_THRESHOLD"],
        },
        Field {
            key: "council.tone_window_capacity",
            value: council.tone_window_capacity.to_string(),
            env_keys: &["ARBITER_COUNCIL_TONE_WINDOW_CAPACITY"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["ARBITER_LOGGING_LEVEL", "ARBITER_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["ARBITER_LOGGING_FORMAT", "ARBITER_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    ["arbiter.toml", "config/arbiter.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
