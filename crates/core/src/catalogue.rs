//! Rule catalogue: the pattern tables reviewers and the classifier match against.
//!
//! The catalogue is plain data. The built-in copy is embedded from
//! `rules/default_rules.toml`; deployments append their own entries with
//! [`RuleCatalogue::extend`] without touching reviewer code.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::errors::ConfigurationError;

const BUILTIN_RULES: &str = include_str!("../rules/default_rules.toml");

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RuleCatalogue {
    #[serde(default)]
    pub antonyms: Vec<(String, String)>,
    #[serde(default)]
    pub classification: ClassificationMarkers,
    #[serde(default)]
    pub guardian: Vec<GuardianPattern>,
    #[serde(default)]
    pub tone: ToneMarkers,
    #[serde(default)]
    pub alignment: Vec<AlignmentPenalty>,
    #[serde(default)]
    pub optimization: OptimizationSignatures,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ClassificationMarkers {
    #[serde(default)]
    pub greetings: Vec<String>,
    #[serde(default)]
    pub farewells: Vec<String>,
    #[serde(default)]
    pub thanks: Vec<String>,
    #[serde(default)]
    pub identity: Vec<String>,
    #[serde(default)]
    pub capability: Vec<String>,
    #[serde(default)]
    pub knowledge: Vec<String>,
    #[serde(default)]
    pub command_prefixes: Vec<String>,
}

/// Matches when at least one trigger and at least one qualifier occur in the text.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GuardianPattern {
    pub id: String,
    pub principle: String,
    pub triggers: Vec<String>,
    pub qualifiers: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ToneMarkers {
    #[serde(default)]
    pub condescension: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentCategory {
    Autonomy,
    Secrecy,
}

impl AlignmentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Autonomy => "autonomy",
            Self::Secrecy => "secrecy",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AlignmentPenalty {
    pub phrase: String,
    pub category: AlignmentCategory,
    pub penalty: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OptimizationSignatures {
    #[serde(default)]
    pub loop_keywords: Vec<String>,
    #[serde(default = "default_nesting_limit")]
    pub nesting_limit: usize,
    #[serde(default)]
    pub index_loop: Vec<String>,
    #[serde(default)]
    pub expensive_calls: Vec<String>,
}

impl Default for OptimizationSignatures {
    fn default() -> Self {
        Self {
            loop_keywords: Vec::new(),
            nesting_limit: default_nesting_limit(),
            index_loop: Vec::new(),
            expensive_calls: Vec::new(),
        }
    }
}

fn default_nesting_limit() -> usize {
    3
}

impl RuleCatalogue {
    pub fn builtin() -> Result<Self, ConfigurationError> {
        Self::from_toml(BUILTIN_RULES, "builtin")
    }

    pub fn from_toml(raw: &str, origin: &str) -> Result<Self, ConfigurationError> {
        let catalogue: Self = toml::from_str(raw).map_err(|error| ConfigurationError::Catalogue {
            origin: origin.to_string(),
            reason: error.to_string(),
        })?;
        catalogue.validate()?;
        Ok(catalogue)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let origin = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|error| ConfigurationError::Catalogue {
            origin: origin.clone(),
            reason: error.to_string(),
        })?;
        Self::from_toml(&raw, &origin)
    }

    /// Built-in rules followed by the file at `path`, when one is given.
    pub fn builtin_with(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut catalogue = Self::builtin()?;
        if let Some(path) = path {
            catalogue.extend(Self::load(path)?);
        }
        Ok(catalogue)
    }

    /// Appends every list from `other`. Scalar settings such as the nesting limit keep the
    /// receiver's value.
    pub fn extend(&mut self, other: RuleCatalogue) {
        self.antonyms.extend(other.antonyms);

        let markers = &mut self.classification;
        markers.greetings.extend(other.classification.greetings);
        markers.farewells.extend(other.classification.farewells);
        markers.thanks.extend(other.classification.thanks);
        markers.identity.extend(other.classification.identity);
        markers.capability.extend(other.classification.capability);
        markers.knowledge.extend(other.classification.knowledge);
        markers.command_prefixes.extend(other.classification.command_prefixes);

        self.guardian.extend(other.guardian);
        self.tone.condescension.extend(other.tone.condescension);
        self.alignment.extend(other.alignment);

        self.optimization.loop_keywords.extend(other.optimization.loop_keywords);
        self.optimization.index_loop.extend(other.optimization.index_loop);
        self.optimization.expensive_calls.extend(other.optimization.expensive_calls);
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (left, right) in &self.antonyms {
            if left.trim().is_empty() || right.trim().is_empty() || left == right {
                return Err(invalid(&format!("antonym {left}/{right}"), "pair must name two labels"));
            }
        }

        for pattern in &self.guardian {
            if pattern.id.trim().is_empty() || pattern.principle.trim().is_empty() {
                return Err(invalid(&pattern.id, "guardian pattern needs an id and a principle"));
            }
            if pattern.triggers.is_empty() || pattern.qualifiers.is_empty() {
                return Err(invalid(&pattern.id, "guardian pattern needs triggers and qualifiers"));
            }
        }

        for entry in &self.alignment {
            if entry.phrase.trim().is_empty() {
                return Err(invalid("alignment", "penalty phrase must not be empty"));
            }
            if !(entry.penalty > 0.0 && entry.penalty <= 1.0) {
                return Err(invalid(&entry.phrase, "penalty must be in range (0, 1]"));
            }
        }

        if self.optimization.nesting_limit < 2 {
            return Err(invalid("optimization.nesting_limit", "must be at least 2"));
        }
        for pattern in self.optimization.index_loop.iter().chain(&self.optimization.expensive_calls)
        {
            Regex::new(pattern).map_err(|error| invalid(pattern, &error.to_string()))?;
        }

        Ok(())
    }
}

fn invalid(rule: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidRule { rule: rule.to_string(), reason: reason.to_string() }
}
