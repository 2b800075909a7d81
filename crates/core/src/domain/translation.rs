use serde::{Deserialize, Serialize};

use crate::domain::concept::{ConceptId, Confidence};

/// Grammatical shape detected by the translation collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentenceStructure {
    Question,
    Command,
    Statement,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognizedConcept {
    pub concept: ConceptId,
    pub confidence: Confidence,
}

/// What the translation collaborator hands to the reasoning motor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub raw_text: String,
    pub concepts: Vec<RecognizedConcept>,
    pub unknown_words: Vec<String>,
    pub confidence: Confidence,
    pub structure: SentenceStructure,
}

impl Translation {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            concepts: Vec::new(),
            unknown_words: Vec::new(),
            confidence: Confidence::ONE,
            structure: SentenceStructure::Statement,
        }
    }

    pub fn with_concept(mut self, concept: ConceptId, confidence: f64) -> Self {
        self.concepts.push(RecognizedConcept { concept, confidence: Confidence::clamped(confidence) });
        self
    }

    pub fn with_unknown_word(mut self, word: impl Into<String>) -> Self {
        self.unknown_words.push(word.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Confidence::clamped(confidence);
        self
    }

    pub fn with_structure(mut self, structure: SentenceStructure) -> Self {
        self.structure = structure;
        self
    }

    pub fn concept_ids(&self) -> impl Iterator<Item = &ConceptId> {
        self.concepts.iter().map(|recognized| &recognized.concept)
    }
}
