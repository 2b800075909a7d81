use crate::domain::opinion::{Opinion, Priority, Stance};
use crate::reviewers::{Reviewer, Situation, KNOWLEDGE_GAP};

pub const VERDICT_INVESTIGATE: &str = "Investigate";

/// Flags requests the translator could not fully ground. A gap never blocks: the strongest
/// opinion this reviewer gives is a medium-priority suggestion.
#[derive(Clone, Debug)]
pub struct KnowledgeGapReviewer {
    confidence_threshold: f64,
}

impl KnowledgeGapReviewer {
    pub fn new(confidence_threshold: f64) -> Self {
        Self { confidence_threshold: confidence_threshold.clamp(0.0, 1.0) }
    }
}

impl Default for KnowledgeGapReviewer {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl Reviewer for KnowledgeGapReviewer {
    fn name(&self) -> &str {
        KNOWLEDGE_GAP
    }

    fn evaluate(&self, situation: &Situation) -> Opinion {
        let translation = &situation.translation;
        let confidence = translation.confidence.value();
        let low_confidence = confidence < self.confidence_threshold;
        let gaps = translation.unknown_words.len() + usize::from(low_confidence);

        if gaps == 0 {
            return Opinion::approval(
                KNOWLEDGE_GAP,
                "every word was grounded",
                situation.observed_at,
            );
        }

        let priority = if gaps > 2 { Priority::Medium } else { Priority::Low };
        let certainty = (0.3 + 0.15 * gaps as f64).min(0.9);
        let mut rationale = format!("{} unknown word(s)", translation.unknown_words.len());
        if low_confidence {
            rationale.push_str(&format!(
                ", translation confidence {confidence:.2} below {:.2}",
                self.confidence_threshold
            ));
        }

        Opinion::new(
            KNOWLEDGE_GAP,
            Stance::Suggestion,
            VERDICT_INVESTIGATE,
            rationale,
            priority,
            certainty,
            situation.observed_at,
        )
        .with_metadata("gap_count", gaps.to_string())
        .with_metadata("unknown_words", translation.unknown_words.join(","))
    }
}
