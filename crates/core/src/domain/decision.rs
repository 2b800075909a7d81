use serde::Serialize;

use crate::domain::concept::{ConceptId, Confidence};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Affirmative,
    Negative,
    Partial,
    NeedsClarification,
    Unrecognized,
    Greeting,
    Thanks,
}

impl DecisionKind {
    /// Verdict label a decision of this kind proposes to the council.
    pub fn verdict_label(self) -> &'static str {
        match self {
            Self::Affirmative => "approve",
            Self::Negative => "reject",
            Self::Partial => "proceed_partially",
            Self::NeedsClarification => "clarify",
            Self::Unrecognized => "defer",
            Self::Greeting => "greet",
            Self::Thanks => "acknowledge",
        }
    }
}

/// The motor's answer to one request. Built once through the constructors below and only
/// read afterwards; `rejection_reason` is present exactly when the kind is `Negative`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Decision {
    kind: DecisionKind,
    certainty: Confidence,
    concepts: Vec<ConceptId>,
    executable: bool,
    rejection_reason: Option<String>,
    evidence: Vec<String>,
}

impl Decision {
    fn base(kind: DecisionKind, certainty: f64) -> Self {
        Self {
            kind,
            certainty: Confidence::clamped(certainty),
            concepts: Vec::new(),
            executable: false,
            rejection_reason: None,
            evidence: Vec::new(),
        }
    }

    pub fn affirmative(certainty: f64) -> Self {
        Self::base(DecisionKind::Affirmative, certainty)
    }

    pub fn partial(certainty: f64) -> Self {
        Self::base(DecisionKind::Partial, certainty)
    }

    pub fn negative(certainty: f64, reason: impl Into<String>) -> Self {
        Self { rejection_reason: Some(reason.into()), ..Self::base(DecisionKind::Negative, certainty) }
    }

    pub fn needs_clarification(certainty: f64) -> Self {
        Self::base(DecisionKind::NeedsClarification, certainty)
    }

    pub fn unrecognized(certainty: f64) -> Self {
        Self::base(DecisionKind::Unrecognized, certainty)
    }

    pub fn greeting(certainty: f64) -> Self {
        Self::base(DecisionKind::Greeting, certainty)
    }

    pub fn thanks(certainty: f64) -> Self {
        Self::base(DecisionKind::Thanks, certainty)
    }

    pub fn with_concepts<I>(mut self, concepts: I) -> Self
    where
        I: IntoIterator<Item = ConceptId>,
    {
        self.concepts.extend(concepts);
        self
    }

    pub fn with_executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }

    pub fn with_evidence(mut self, step: impl Into<String>) -> Self {
        self.evidence.push(step.into());
        self
    }

    pub fn kind(&self) -> DecisionKind {
        self.kind
    }

    pub fn certainty(&self) -> f64 {
        self.certainty.value()
    }

    pub fn concepts(&self) -> &[ConceptId] {
        &self.concepts
    }

    pub fn is_executable(&self) -> bool {
        self.executable
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }

    pub fn verdict_label(&self) -> &'static str {
        self.kind.verdict_label()
    }
}

#[cfg(test)]
mod tests {
    use super::{Decision, DecisionKind};

    #[test]
    fn only_negative_decisions_carry_a_rejection_reason() {
        let negative = Decision::negative(0.9, "operation unavailable");
        assert_eq!(negative.kind(), DecisionKind::Negative);
        assert_eq!(negative.rejection_reason(), Some("operation unavailable"));

        for decision in [
            Decision::affirmative(1.0),
            Decision::partial(0.5),
            Decision::needs_clarification(0.2),
            Decision::unrecognized(0.7),
            Decision::greeting(1.0),
            Decision::thanks(1.0),
        ] {
            assert!(decision.rejection_reason().is_none(), "{:?}", decision.kind());
        }
    }

    #[test]
    fn certainty_is_clamped() {
        assert_eq!(Decision::affirmative(1.4).certainty(), 1.0);
        assert_eq!(Decision::unrecognized(-0.1).certainty(), 0.0);
    }

    #[test]
    fn evidence_keeps_insertion_order() {
        let decision = Decision::partial(0.5).with_evidence("first").with_evidence("second");
        assert_eq!(decision.evidence(), ["first".to_string(), "second".to_string()]);
    }
}
