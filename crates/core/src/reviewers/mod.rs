//! The reviewer panel consulted by the deliberation council.
//!
//! Every reviewer answers the same two questions about a [`Situation`]: a cheap
//! [`Reviewer::evaluate`] triage and a deeper [`Reviewer::analyze`] that the council only
//! runs when the triage is not neutral (and always for the guardian). Only the guardian
//! may veto; the council downgrades a veto from any other seat.

pub mod alignment;
pub mod contradiction;
pub mod guardian;
pub mod knowledge_gap;
pub mod optimization;
pub mod synthesizer;
pub mod tone;

use chrono::{DateTime, Utc};

use crate::domain::decision::Decision;
use crate::domain::opinion::Opinion;
use crate::domain::translation::Translation;
use crate::errors::ReviewError;

pub use alignment::AlignmentReviewer;
pub use contradiction::ContradictionReviewer;
pub use guardian::GuardianReviewer;
pub use knowledge_gap::KnowledgeGapReviewer;
pub use optimization::OptimizationReviewer;
pub use synthesizer::SynthesizerReviewer;
pub use tone::ToneReviewer;

pub const GUARDIAN: &str = "guardian";
pub const OPTIMIZATION: &str = "optimization";
pub const CONTRADICTION: &str = "contradiction";
pub const KNOWLEDGE_GAP: &str = "knowledge_gap";
pub const TONE: &str = "tone";
pub const ALIGNMENT: &str = "alignment";
pub const SYNTHESIZER: &str = "synthesizer";

/// Everything a reviewer may look at for one proposal.
#[derive(Clone, Debug, PartialEq)]
pub struct Situation {
    pub decision: Decision,
    pub translation: Translation,
    /// Topic the proposal belongs to; contradictions are only detected within one context.
    pub context: String,
    /// Overrides the verdict label derived from the decision kind.
    pub proposed_verdict: Option<String>,
    pub proposed_reply: Option<String>,
    pub code: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl Situation {
    pub fn new(
        decision: Decision,
        translation: Translation,
        context: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            decision,
            translation,
            context: context.into(),
            proposed_verdict: None,
            proposed_reply: None,
            code: None,
            observed_at,
        }
    }

    pub fn with_proposed_verdict(mut self, verdict: impl Into<String>) -> Self {
        self.proposed_verdict = Some(verdict.into());
        self
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.proposed_reply = Some(reply.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn request_text(&self) -> &str {
        &self.translation.raw_text
    }

    /// The verdict this proposal stands for: the explicit override, else the decision's label.
    pub fn proposed_label(&self) -> &str {
        self.proposed_verdict.as_deref().unwrap_or_else(|| self.decision.verdict_label())
    }
}

pub trait Reviewer: Send {
    fn name(&self) -> &str;

    /// Cheap triage. A neutral answer means the reviewer has nothing to say and
    /// [`Reviewer::analyze`] is skipped.
    fn evaluate(&self, situation: &Situation) -> Opinion;

    /// Deeper analysis seeded with the triage opinion. Reviewers without one keep the triage.
    fn analyze(&self, _situation: &Situation, triage: Opinion) -> Result<Opinion, ReviewError> {
        Ok(triage)
    }

    /// Triage followed by analysis, outside any council.
    fn review(&self, situation: &Situation) -> Result<Opinion, ReviewError> {
        let triage = self.evaluate(situation);
        self.analyze(situation, triage)
    }

    /// Called once per deliberation after the result is known, including on veto.
    fn observe(&mut self, _situation: &Situation) {}
}


#[cfg(test)]
mod tests {
    use super::fixtures::situation;

    #[test]
    fn proposed_label_defaults_to_decision_kind() {
        let plain = situation("read the file");
        assert_eq!(plain.proposed_label(), "approve");

        let explicit = situation("read the file").with_proposed_verdict("halt");
        assert_eq!(explicit.proposed_label(), "halt");
    }
}
