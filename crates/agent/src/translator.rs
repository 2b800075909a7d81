//! Lexicon translation: maps surface text onto concepts in a [`ConceptStore`].
//!
//! Tokens that are function words (stop-words and the words that make up classification
//! markers) carry no grounding and are skipped. Every remaining token either resolves through
//! the store's word index or is reported as unknown.

use std::collections::BTreeSet;

use arbiter_core::catalogue::ClassificationMarkers;
use arbiter_core::text::tokenize;
use arbiter_core::{ConceptId, ConceptStore, SentenceStructure, Translation};
use tracing::debug;

const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "am", "an", "and", "any", "are", "as", "at", "be", "but", "by", "can",
    "could", "did", "do", "does", "for", "from", "have", "how", "i", "if", "in", "is", "it",
    "its", "just", "me", "my", "of", "on", "or", "our", "please", "should", "so", "some",
    "that", "the", "their", "them", "then", "there", "these", "this", "those", "to", "us",
    "was", "we", "what", "when", "where", "which", "who", "why", "will", "with", "would", "you",
    "your",
];

const QUESTION_LEADERS: &[&str] = &[
    "what", "who", "whom", "whose", "why", "when", "where", "which", "how", "can", "could",
    "would", "will", "should", "shall", "may", "is", "are", "am", "was", "were", "do", "does",
    "did", "have", "has",
];

const POLITE_IMPERATIVES: &[&str] = &["please", "kindly"];

#[derive(Clone, Debug)]
pub struct LexiconTranslator {
    function_words: BTreeSet<String>,
}

impl Default for LexiconTranslator {
    fn default() -> Self {
        Self { function_words: STOP_WORDS.iter().map(|word| word.to_string()).collect() }
    }
}

impl LexiconTranslator {
    /// Stop-words plus every word used by a classification marker, so "tell me about rust"
    /// grounds on `rust` alone.
    pub fn with_markers(markers: &ClassificationMarkers) -> Self {
        let mut translator = Self::default();
        let phrases = markers
            .greetings
            .iter()
            .chain(&markers.farewells)
            .chain(&markers.thanks)
            .chain(&markers.identity)
            .chain(&markers.capability)
            .chain(&markers.knowledge)
            .chain(&markers.command_prefixes);
        for phrase in phrases {
            translator.function_words.extend(tokenize(phrase));
        }
        translator
    }

    pub fn is_function_word(&self, token: &str) -> bool {
        self.function_words.contains(token)
    }

    pub fn translate(&self, text: &str, store: &ConceptStore) -> Translation {
        let tokens = tokenize(text);
        let content =
            tokens.iter().filter(|token| !self.is_function_word(token)).collect::<Vec<_>>();

        let mut translation =
            Translation::new(text).with_structure(structure(text, &tokens, store));
        let mut seen: BTreeSet<ConceptId> = BTreeSet::new();
        let mut unknown: BTreeSet<&str> = BTreeSet::new();
        let mut recognized = 0usize;
        let mut unmatched = 0usize;

        let mut index = 0;
        while index < content.len() {
            let phrase = content
                .get(index + 1)
                .map(|next| format!("{} {next}", content[index]))
                .and_then(|phrase| store.lookup(&phrase));
            let (concept, width) = match phrase {
                Some(concept) => (Some(concept), 2),
                None => (store.lookup(content[index]), 1),
            };

            match concept {
                Some(concept) => {
                    recognized += 1;
                    if seen.insert(concept.id().clone()) {
                        translation = translation
                            .with_concept(concept.id().clone(), concept.confidence().value());
                    }
                }
                None => {
                    unmatched += 1;
                    if unknown.insert(content[index].as_str()) {
                        translation = translation.with_unknown_word(content[index].clone());
                    }
                }
            }
            index += width;
        }

        let confidence = if recognized + unmatched == 0 {
            1.0
        } else {
            recognized as f64 / (recognized + unmatched) as f64
        };
        let translation = translation.with_confidence(confidence);

        debug!(
            event_name = "translator.translated",
            concepts = translation.concepts.len(),
            unknown_words = translation.unknown_words.len(),
            confidence,
            structure = ?translation.structure,
            "text translated"
        );
        translation
    }
}

fn structure(text: &str, tokens: &[String], store: &ConceptStore) -> SentenceStructure {
    let Some(leading) = tokens.first() else {
        return SentenceStructure::Statement;
    };

    if text.trim_end().ends_with('?') || QUESTION_LEADERS.contains(&leading.as_str()) {
        return SentenceStructure::Question;
    }
    if POLITE_IMPERATIVES.contains(&leading.as_str()) {
        return SentenceStructure::Command;
    }
    match store.lookup(leading) {
        Some(concept) if !concept.requires().is_empty() => SentenceStructure::Command,
        _ => SentenceStructure::Statement,
    }
}

#[cfg(test)]
mod tests {
    use arbiter_core::{Concept, ConceptStore, RuleCatalogue, SentenceStructure};

    use super::LexiconTranslator;

    fn store() -> ConceptStore {
        let mut store = ConceptStore::new();
        store
            .register(Concept::new("action:read", 1.0).expect("valid").with_word("read").requiring("read"))
            .expect("read");
        store.register(Concept::new("object:file", 0.9).expect("valid").with_word("files")).expect("file");
        store
            .register(Concept::new("object:api_key", 0.7).expect("valid").with_word("api key"))
            .expect("api key");
        store
    }

    fn translator() -> LexiconTranslator {
        LexiconTranslator::with_markers(&RuleCatalogue::builtin().expect("builtin").classification)
    }

    #[test]
    fn recognised_words_become_concepts_and_the_rest_unknown() {
        let translation = translator().translate("read the file quickly", &store());

        let ids = translation.concept_ids().map(|id| id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["action:read", "object:file"]);
        assert_eq!(translation.unknown_words, ["quickly".to_string()]);
        assert!((translation.confidence.value() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(translation.structure, SentenceStructure::Command);
    }

    #[test]
    fn two_word_phrases_win_over_single_words() {
        let translation = translator().translate("rotate the API key", &store());
        let ids = translation.concept_ids().map(|id| id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["object:api_key"]);
        assert_eq!(translation.unknown_words, ["rotate".to_string()]);
    }

    #[test]
    fn marker_only_text_has_full_confidence() {
        let translation = translator().translate("Hello there, thank you!", &store());
        assert!(translation.concepts.is_empty());
        assert!(translation.unknown_words.is_empty());
        assert_eq!(translation.confidence.value(), 1.0);

        let empty = translator().translate("   ", &store());
        assert_eq!(empty.confidence.value(), 1.0);
        assert_eq!(empty.structure, SentenceStructure::Statement);
    }

    #[test]
    fn structure_follows_punctuation_and_leading_word() {
        let store = store();
        let translator = translator();
        assert_eq!(translator.translate("can you read it", &store).structure, SentenceStructure::Question);
        assert_eq!(translator.translate("the file is here?", &store).structure, SentenceStructure::Question);
        assert_eq!(translator.translate("please open it", &store).structure, SentenceStructure::Command);
        assert_eq!(translator.translate("files are nice", &store).structure, SentenceStructure::Statement);
    }

    #[test]
    fn repeated_words_are_listed_once() {
        let translation = translator().translate("zorp read zorp file", &store());
        assert_eq!(translation.unknown_words, ["zorp".to_string()]);
        assert_eq!(translation.concepts.len(), 2);
        assert_eq!(translation.confidence.value(), 0.5);
    }
}
