use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ConfigurationError, OperationError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConceptId(String);

impl ConceptId {
    /// Parses a namespaced id such as `action:read` or `object:file:text`.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let trimmed = raw.trim();
        let segments = trimmed.split(':').collect::<Vec<_>>();
        let well_formed = segments.len() >= 2
            && segments.iter().all(|segment| {
                !segment.is_empty()
                    && segment.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
            });

        if !well_formed {
            return Err(ConfigurationError::MalformedConceptId { id: raw.to_string() });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// Last segment of the id, used as an implicit lookup word.
    pub fn name(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or_default()
    }
}

impl TryFrom<String> for ConceptId {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConceptId> for String {
    fn from(value: ConceptId) -> Self {
        value.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bounded confidence value. Construction through [`Confidence::new`] rejects anything
/// outside `0.0..=1.0` (and NaN); [`Confidence::clamped`] is for computed scores.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);

    pub fn new(value: f64) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("confidence {value} is outside 0.0..=1.0"))
    }
}

impl From<Confidence> for f64 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

/// An executable capability bound to a concept.
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;
    fn invoke(&self, args: &Value) -> Result<Value, OperationError>;
}

pub struct FnOperation<F> {
    name: String,
    handler: F,
}

impl<F> Operation for FnOperation<F>
where
    F: Fn(&Value) -> Result<Value, OperationError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, args: &Value) -> Result<Value, OperationError> {
        (self.handler)(args)
    }
}

/// Wraps a closure as a named [`Operation`].
pub fn operation<F>(name: impl Into<String>, handler: F) -> FnOperation<F>
where
    F: Fn(&Value) -> Result<Value, OperationError> + Send + Sync,
{
    FnOperation { name: name.into(), handler }
}

/// A grounded concept. Structure (operations, requirements, relations) is fixed once the
/// concept is built; only confidence may change afterwards, through the store.
pub struct Concept {
    id: ConceptId,
    confidence: Confidence,
    words: BTreeSet<String>,
    operations: BTreeMap<String, Arc<dyn Operation>>,
    requires: BTreeSet<String>,
    relations: BTreeMap<String, BTreeSet<ConceptId>>,
    properties: BTreeMap<String, Value>,
    usage: AtomicU64,
}

impl Concept {
    pub fn new(id: &str, confidence: f64) -> Result<Self, ConfigurationError> {
        let id = ConceptId::parse(id)?;
        let confidence = Confidence::new(confidence).ok_or_else(|| {
            ConfigurationError::ConfidenceOutOfRange { id: id.to_string(), value: confidence }
        })?;

        Ok(Self {
            id,
            confidence,
            words: BTreeSet::new(),
            operations: BTreeMap::new(),
            requires: BTreeSet::new(),
            relations: BTreeMap::new(),
            properties: BTreeMap::new(),
            usage: AtomicU64::new(0),
        })
    }

    pub fn with_word(mut self, word: impl AsRef<str>) -> Self {
        let word = word.as_ref().trim().to_lowercase();
        if !word.is_empty() {
            self.words.insert(word);
        }
        self
    }

    pub fn with_words<I, S>(self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        words.into_iter().fold(self, |concept, word| concept.with_word(word))
    }

    pub fn with_operation<O>(self, operation: O) -> Self
    where
        O: Operation + 'static,
    {
        self.with_shared_operation(Arc::new(operation))
    }

    pub fn with_shared_operation(mut self, operation: Arc<dyn Operation>) -> Self {
        self.operations.insert(operation.name().to_string(), operation);
        self
    }

    pub fn requiring(mut self, operation: impl Into<String>) -> Self {
        self.requires.insert(operation.into());
        self
    }

    pub fn with_relation(mut self, kind: impl Into<String>, target: ConceptId) -> Self {
        self.relations.entry(kind.into()).or_default().insert(target);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> &ConceptId {
        &self.id
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub(crate) fn set_confidence(&mut self, confidence: Confidence) {
        self.confidence = confidence;
    }

    pub fn is_directly_executable(&self) -> bool {
        !self.operations.is_empty()
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn requires(&self) -> &BTreeSet<String> {
        &self.requires
    }

    pub fn words(&self) -> &BTreeSet<String> {
        &self.words
    }

    pub fn relations(&self) -> &BTreeMap<String, BTreeSet<ConceptId>> {
        &self.relations
    }

    pub fn related(&self, kind: &str) -> impl Iterator<Item = &ConceptId> {
        self.relations.get(kind).into_iter().flatten()
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn usage_count(&self) -> u64 {
        self.usage.load(Ordering::Relaxed)
    }

    pub(crate) fn invoke(&self, name: &str, args: &Value) -> Result<Value, OperationError> {
        let operation = self.operations.get(name).ok_or_else(|| OperationError::Unavailable {
            concept: self.id.to_string(),
            operation: name.to_string(),
        })?;
        let output = operation.invoke(args)?;
        self.usage.fetch_add(1, Ordering::Relaxed);
        Ok(output)
    }
}

impl fmt::Debug for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Concept")
            .field("id", &self.id)
            .field("confidence", &self.confidence)
            .field("words", &self.words)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .field("requires", &self.requires)
            .field("relations", &self.relations)
            .field("usage", &self.usage_count())
            .finish()
    }
}
