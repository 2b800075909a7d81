//! Concept registry: the set of concepts the agent can ground requests in, together with
//! the operations it can prove it is able to run.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::concept::{Concept, ConceptId, Confidence, Operation};
use crate::errors::{ConfigurationError, OperationError};

/// Named operation handlers that catalogue entries bind to by name.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    handlers: BTreeMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<O>(&mut self, operation: O)
    where
        O: Operation + 'static,
    {
        self.handlers.insert(operation.name().to_string(), Arc::new(operation));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConceptCatalogue {
    #[serde(default)]
    pub concepts: Vec<ConceptDefinition>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConceptDefinition {
    pub id: String,
    pub confidence: f64,
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub relations: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl ConceptCatalogue {
    pub fn from_toml(raw: &str, origin: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(raw).map_err(|error| ConfigurationError::Catalogue {
            origin: origin.to_string(),
            reason: error.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let origin = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|error| ConfigurationError::Catalogue {
            origin: origin.clone(),
            reason: error.to_string(),
        })?;
        Self::from_toml(&raw, &origin)
    }
}

impl ConceptDefinition {
    pub fn build(&self, registry: &OperationRegistry) -> Result<Concept, ConfigurationError> {
        let mut concept = Concept::new(&self.id, self.confidence)?.with_words(&self.words);

        for name in &self.operations {
            let handler = registry.get(name).ok_or_else(|| ConfigurationError::UnboundOperation {
                concept: self.id.clone(),
                operation: name.clone(),
            })?;
            concept = concept.with_shared_operation(handler);
        }
        for name in &self.requires {
            concept = concept.requiring(name.clone());
        }
        for (kind, targets) in &self.relations {
            for target in targets {
                concept = concept.with_relation(kind.clone(), ConceptId::parse(target)?);
            }
        }
        for (key, value) in &self.properties {
            concept = concept.with_property(key.clone(), value.clone());
        }

        Ok(concept)
    }
}

#[derive(Debug, Default)]
pub struct ConceptStore {
    concepts: BTreeMap<ConceptId, Concept>,
    word_index: BTreeMap<String, ConceptId>,
    shadowed: Vec<ShadowedWord>,
}

/// A word two concepts claim. Lookups keep grounding it to the first registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowedWord {
    pub word: String,
    pub kept: ConceptId,
    pub ignored: ConceptId,
}

impl ConceptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a catalogue, aborting on the first invalid entry.
    pub fn from_catalogue(
        catalogue: &ConceptCatalogue,
        registry: &OperationRegistry,
    ) -> Result<Self, ConfigurationError> {
        let mut store = Self::new();
        for definition in &catalogue.concepts {
            store.register_definition(definition, registry)?;
        }
        info!(
            event_name = "concept.store.loaded",
            concepts = store.len(),
            operations = registry.len(),
            "concept store loaded"
        );
        Ok(store)
    }

    pub fn register_definition(
        &mut self,
        definition: &ConceptDefinition,
        registry: &OperationRegistry,
    ) -> Result<(), ConfigurationError> {
        self.register(definition.build(registry)?)
    }

    /// Id shape and confidence range are guaranteed by [`Concept::new`]; registration
    /// additionally rejects duplicate ids.
    pub fn register(&mut self, concept: Concept) -> Result<(), ConfigurationError> {
        if self.concepts.contains_key(concept.id()) {
            return Err(ConfigurationError::DuplicateConcept { id: concept.id().to_string() });
        }

        let id = concept.id().clone();
        let keys = concept
            .words()
            .iter()
            .cloned()
            .chain(std::iter::once(id.name().to_lowercase()))
            .collect::<Vec<_>>();
        for key in keys {
            match self.word_index.get(&key) {
                Some(kept) if kept != &id => {
                    warn!(
                        event_name = "concept.store.word_shadowed",
                        word = %key,
                        kept = %kept,
                        ignored = %id,
                        "word already grounds to another concept"
                    );
                    let shadow =
                        ShadowedWord { word: key, kept: kept.clone(), ignored: id.clone() };
                    self.shadowed.push(shadow);
                }
                Some(_) => {}
                None => {
                    self.word_index.insert(key, id.clone());
                }
            }
        }
        self.concepts.insert(id, concept);
        Ok(())
    }

    /// Finds the concept a surface word grounds to. A miss is data, not an error.
    pub fn lookup(&self, word: &str) -> Option<&Concept> {
        let key = word.trim().to_lowercase();
        self.word_index.get(&key).and_then(|id| self.concepts.get(id))
    }

    /// Words a later registration could not claim, in registration order.
    pub fn shadowed_words(&self) -> &[ShadowedWord] {
        &self.shadowed
    }

    pub fn get(&self, id: &ConceptId) -> Option<&Concept> {
        self.concepts.get(id)
    }

    /// Resolves ids to concepts, silently skipping ids the store does not know.
    pub fn resolve<'a, I>(&self, ids: I) -> Vec<&Concept>
    where
        I: IntoIterator<Item = &'a ConceptId>,
    {
        ids.into_iter().filter_map(|id| self.concepts.get(id)).collect()
    }

    pub fn execute(
        &self,
        concept: &ConceptId,
        operation: &str,
        args: &Value,
    ) -> Result<Value, OperationError> {
        let target = self
            .concepts
            .get(concept)
            .ok_or_else(|| OperationError::UnknownConcept(concept.to_string()))?;
        let output = target.invoke(operation, args)?;
        debug!(
            event_name = "concept.executed",
            concept = %concept,
            operation,
            usage = target.usage_count(),
            "operation executed"
        );
        Ok(output)
    }

    /// Confidence updates belong to the learning collaborator; out-of-range values are
    /// rejected and leave the stored value untouched.
    pub fn set_confidence(&mut self, id: &ConceptId, value: f64) -> Result<(), ConfigurationError> {
        let confidence = Confidence::new(value).ok_or_else(|| {
            ConfigurationError::ConfidenceOutOfRange { id: id.to_string(), value }
        })?;
        let concept = self
            .concepts
            .get_mut(id)
            .ok_or_else(|| ConfigurationError::UnknownConcept { id: id.to_string() })?;
        concept.set_confidence(confidence);
        Ok(())
    }

    pub fn usage(&self, id: &ConceptId) -> Option<u64> {
        self.concepts.get(id).map(Concept::usage_count)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}
