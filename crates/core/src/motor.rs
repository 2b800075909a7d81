//! Request classification and capability decisions.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::capability::{
    required_operations, CapabilityAssessment, CapabilityEvaluator,
    DeterministicCapabilityEvaluator, REASON_NO_CONCEPTS,
};
use crate::catalogue::ClassificationMarkers;
use crate::domain::concept::{Concept, ConceptId};
use crate::domain::decision::Decision;
use crate::domain::translation::{SentenceStructure, Translation};
use crate::errors::OperationError;
use crate::store::ConceptStore;
use crate::text::{first_match, normalize_text, starts_with_term};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialKind {
    Greeting,
    Farewell,
    Thanks,
    Identity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    Social(SocialKind),
    KnowledgeQuestion,
    CapabilityQuestion,
    ExecutionCommand,
    Unclassified,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MotorSettings {
    /// Capability or command requests with nothing recognised and a translation confidence
    /// below this ask for clarification instead of answering.
    pub clarification_confidence: f64,
}

impl Default for MotorSettings {
    fn default() -> Self {
        Self { clarification_confidence: 0.35 }
    }
}

pub struct ReasoningMotor<E = DeterministicCapabilityEvaluator> {
    markers: ClassificationMarkers,
    settings: MotorSettings,
    evaluator: E,
}

impl ReasoningMotor<DeterministicCapabilityEvaluator> {
    pub fn with_markers(markers: ClassificationMarkers, settings: MotorSettings) -> Self {
        Self::new(markers, settings, DeterministicCapabilityEvaluator)
    }
}

impl<E> ReasoningMotor<E>
where
    E: CapabilityEvaluator,
{
    pub fn new(markers: ClassificationMarkers, settings: MotorSettings, evaluator: E) -> Self {
        Self { markers, settings, evaluator }
    }

    /// Tie-break order: social markers, capability phrasing, knowledge phrasing, command
    /// structure, otherwise unclassified.
    pub fn classify(&self, text: &str, concepts: &[&Concept]) -> RequestClass {
        self.classify_structured(text, concepts, None)
    }

    fn classify_structured(
        &self,
        text: &str,
        concepts: &[&Concept],
        structure: Option<SentenceStructure>,
    ) -> RequestClass {
        let normalized = normalize_text(text);

        if let Some(kind) = self.social_kind(&normalized) {
            return RequestClass::Social(kind);
        }
        if self.markers.capability.iter().any(|marker| starts_with_term(&normalized, marker)) {
            return RequestClass::CapabilityQuestion;
        }
        if self.markers.knowledge.iter().any(|marker| starts_with_term(&normalized, marker)) {
            return RequestClass::KnowledgeQuestion;
        }
        if self.is_command(&normalized, concepts, structure) {
            return RequestClass::ExecutionCommand;
        }
        RequestClass::Unclassified
    }

    fn social_kind(&self, normalized: &str) -> Option<SocialKind> {
        let markers = &self.markers;
        // Identity questions contain greeting-like words ("hi, who are you"), so they go first.
        if first_match(normalized, &markers.identity).is_some() {
            return Some(SocialKind::Identity);
        }
        if first_match(normalized, &markers.thanks).is_some() {
            return Some(SocialKind::Thanks);
        }
        if markers.farewells.iter().any(|marker| starts_with_term(normalized, marker)) {
            return Some(SocialKind::Farewell);
        }
        if markers.greetings.iter().any(|marker| starts_with_term(normalized, marker)) {
            return Some(SocialKind::Greeting);
        }
        None
    }

    fn is_command(
        &self,
        normalized: &str,
        concepts: &[&Concept],
        structure: Option<SentenceStructure>,
    ) -> bool {
        if structure == Some(SentenceStructure::Command) {
            return true;
        }
        if self.markers.command_prefixes.iter().any(|marker| starts_with_term(normalized, marker)) {
            return true;
        }
        let leading = normalized.split(' ').next().unwrap_or_default();
        concepts.iter().any(|concept| {
            !concept.requires().is_empty()
                && (concept.id().name().eq_ignore_ascii_case(leading)
                    || concept.words().iter().any(|word| word == leading))
        })
    }

    /// Classifies a translated request, taking its detected sentence structure into account.
    pub fn classify_translation(
        &self,
        translation: &Translation,
        store: &ConceptStore,
    ) -> RequestClass {
        let concepts = store.resolve(translation.concept_ids());
        self.classify_structured(&translation.raw_text, &concepts, Some(translation.structure))
    }

    pub fn process(&self, translation: &Translation, store: &ConceptStore) -> Decision {
        let concepts = store.resolve(translation.concept_ids());
        let class =
            self.classify_structured(&translation.raw_text, &concepts, Some(translation.structure));
        debug!(
            event_name = "motor.classified",
            class = ?class,
            concepts = concepts.len(),
            "request classified"
        );

        let decision = match class {
            RequestClass::Social(kind) => social_decision(kind),
            RequestClass::KnowledgeQuestion => knowledge_decision(&concepts),
            RequestClass::CapabilityQuestion | RequestClass::ExecutionCommand => {
                let implied = required_operations(&concepts);
                let requested = implied.iter().map(String::as_str).collect::<Vec<_>>();
                let assessment = self.evaluator.evaluate(&concepts, &requested);
                self.capability_decision(class, &assessment, &concepts, translation)
            }
            RequestClass::Unclassified => {
                Decision::unrecognized(1.0 - translation.confidence.value())
                    .with_evidence("no social, capability, knowledge or command marker matched")
            }
        };

        decision.with_evidence(format!("classified as {class:?}"))
    }

    fn capability_decision(
        &self,
        class: RequestClass,
        assessment: &CapabilityAssessment,
        concepts: &[&Concept],
        translation: &Translation,
    ) -> Decision {
        let principal = concepts.iter().map(|concept| concept.id().clone()).collect::<Vec<_>>();
        let evidence = format!("capability: {}", assessment.reason);

        if assessment.reason == REASON_NO_CONCEPTS {
            let certainty = 1.0 - translation.confidence.value();
            if translation.confidence.value() < self.settings.clarification_confidence
                || !translation.unknown_words.is_empty()
            {
                return Decision::needs_clarification(certainty)
                    .with_evidence(evidence)
                    .with_evidence(format!("unknown words: {}", translation.unknown_words.join(", ")));
            }
            return Decision::negative(translation.confidence.value(), "no concepts")
                .with_evidence(evidence);
        }

        let decision = if assessment.executable {
            Decision::affirmative(assessment.certainty).with_executable(true)
        } else if assessment.is_partial() {
            Decision::partial(assessment.certainty)
        } else {
            Decision::negative(1.0 - assessment.certainty, assessment.reason.clone())
        };

        let decision = decision.with_concepts(principal).with_evidence(evidence);
        if class == RequestClass::CapabilityQuestion {
            decision.with_evidence("answering whether the operation can run; nothing executed")
        } else {
            decision
        }
    }

    /// Runs one operation and folds an unavailable operation into a negative decision.
    pub fn perform(
        &self,
        store: &ConceptStore,
        concept: &ConceptId,
        operation: &str,
        args: &Value,
    ) -> Result<(Decision, Value), Decision> {
        match store.execute(concept, operation, args) {
            Ok(output) => Ok((
                Decision::affirmative(1.0)
                    .with_executable(true)
                    .with_concepts([concept.clone()])
                    .with_evidence(format!("executed {operation} on {concept}")),
                output,
            )),
            Err(error @ OperationError::Unavailable { .. }) => Err(Decision::negative(
                1.0,
                error.to_string(),
            )
            .with_concepts([concept.clone()])),
            Err(error) => Err(Decision::negative(1.0, error.to_string())
                .with_concepts([concept.clone()])
                .with_evidence("operation raised an error while running")),
        }
    }
}

fn social_decision(kind: SocialKind) -> Decision {
    let decision = match kind {
        SocialKind::Thanks => Decision::thanks(1.0),
        SocialKind::Greeting | SocialKind::Farewell | SocialKind::Identity => Decision::greeting(1.0),
    };
    decision.with_evidence(format!("social marker: {kind:?}"))
}

/// Knowledge does not gate on executability: anything with non-zero grounding can be
/// explained.
fn knowledge_decision(concepts: &[&Concept]) -> Decision {
    if concepts.is_empty() {
        return Decision::needs_clarification(0.0).with_evidence("knowledge question names no concept");
    }

    let grounded = concepts
        .iter()
        .filter(|concept| concept.confidence().value() > 0.0)
        .collect::<Vec<_>>();
    if grounded.is_empty() {
        return Decision::negative(1.0, "no grounded concept to explain")
            .with_concepts(concepts.iter().map(|concept| concept.id().clone()));
    }

    let certainty = grounded.iter().map(|concept| concept.confidence().value()).fold(0.0, f64::max);
    Decision::affirmative(certainty)
        .with_concepts(grounded.iter().map(|concept| concept.id().clone()))
        .with_evidence(format!("{} grounded concept(s) can be explained", grounded.len()))
}
