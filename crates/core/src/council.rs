//! The deliberation council: runs the reviewer panel in a fixed order and merges the
//! opinions into one [`DeliberationResult`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{error, info, warn};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::catalogue::RuleCatalogue;
use crate::config::CouncilConfig;
use crate::domain::opinion::{DeliberationResult, Opinion, Stance};
use crate::errors::{ConfigurationError, ReviewError};
use crate::reviewers::{
    AlignmentReviewer, ContradictionReviewer, GuardianReviewer, KnowledgeGapReviewer,
    OptimizationReviewer, Reviewer, Situation, SynthesizerReviewer, ToneReviewer,
};

/// One council per conversation: the advisors carry per-session history.
pub struct DeliberationCouncil {
    guardian: GuardianReviewer,
    advisors: Vec<Box<dyn Reviewer>>,
    synthesizer: SynthesizerReviewer,
}

impl DeliberationCouncil {
    pub fn new(
        guardian: GuardianReviewer,
        advisors: Vec<Box<dyn Reviewer>>,
        synthesizer: SynthesizerReviewer,
    ) -> Self {
        Self { guardian, advisors, synthesizer }
    }

    /// The standard panel: guardian, then optimization, contradiction, knowledge-gap, tone
    /// and alignment, merged by the synthesizer.
    pub fn standard(
        catalogue: &RuleCatalogue,
        config: &CouncilConfig,
    ) -> Result<Self, ConfigurationError> {
        let advisors: Vec<Box<dyn Reviewer>> = vec![
            Box::new(OptimizationReviewer::from_catalogue(catalogue)?),
            Box::new(ContradictionReviewer::from_catalogue(catalogue, config.contradiction_history)),
            Box::new(KnowledgeGapReviewer::new(config.knowledge_gap_threshold)),
            Box::new(ToneReviewer::from_catalogue(catalogue, config)),
            Box::new(AlignmentReviewer::from_catalogue(catalogue, config.alignment_threshold)),
        ];
        Ok(Self::new(GuardianReviewer::from_catalogue(catalogue), advisors, SynthesizerReviewer))
    }

    /// Reviewer names in consultation order, synthesizer last.
    pub fn reviewer_names(&self) -> Vec<&str> {
        std::iter::once(self.guardian.name())
            .chain(self.advisors.iter().map(|advisor| advisor.name()))
            .chain(std::iter::once(self.synthesizer.name()))
            .collect()
    }

    pub fn deliberate(&mut self, situation: &Situation) -> DeliberationResult {
        let mut opinions = Vec::with_capacity(self.advisors.len() + 1);

        let ruling = consult(&self.guardian, situation, true);
        let vetoed = ruling.stance == Stance::Veto;
        opinions.push(ruling);

        if vetoed {
            warn!(
                event_name = "council.veto",
                context = %situation.context,
                principle = opinions[0].metadata.get("principle").map(String::as_str).unwrap_or(""),
                "guardian vetoed; remaining reviewers skipped"
            );
        } else {
            for advisor in &self.advisors {
                let mut opinion = consult(advisor.as_ref(), situation, false);
                if opinion.stance == Stance::Veto {
                    warn!(
                        event_name = "council.veto.downgraded",
                        reviewer = advisor.name(),
                        "veto from a reviewer without veto authority downgraded to warning"
                    );
                    opinion.stance = Stance::Warning;
                    opinion = opinion.with_metadata("downgraded_from", "veto");
                }
                opinions.push(opinion);
            }
        }

        let result = self.synthesizer.synthesize(&opinions);

        for advisor in &mut self.advisors {
            advisor.observe(situation);
        }

        info!(
            event_name = "council.verdict",
            context = %situation.context,
            method = result.method.as_str(),
            verdict = %result.verdict,
            consensus = result.consensus,
            opinions = result.opinions.len(),
            "deliberation complete"
        );
        result
    }

    pub fn deliberate_with_audit(
        &mut self,
        situation: &Situation,
        sink: &dyn AuditSink,
        context: &AuditContext,
    ) -> DeliberationResult {
        let result = self.deliberate(situation);

        let outcome = if result.is_veto() { AuditOutcome::Rejected } else { AuditOutcome::Success };
        let mut event = AuditEvent::new(
            context,
            "council.deliberated",
            AuditCategory::Deliberation,
            outcome,
            situation.observed_at,
        )
        .with_metadata("context", situation.context.as_str())
        .with_metadata("proposed", situation.proposed_label())
        .with_metadata("method", result.method.as_str())
        .with_metadata("verdict", result.verdict.as_str())
        .with_metadata("consensus", result.consensus.to_string());
        if let Some(principle) = &result.vetoed_principle {
            event = event.with_metadata("vetoed_principle", principle.as_str());
        }
        sink.emit(event);

        result
    }
}

/// Runs one reviewer in isolation. Errors and panics become a neutral abstention so the
/// rest of the panel still runs.
fn consult(reviewer: &dyn Reviewer, situation: &Situation, always_analyze: bool) -> Opinion {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let triage = reviewer.evaluate(situation);
        if triage.is_neutral() && !always_analyze {
            return Ok(triage);
        }
        reviewer.analyze(situation, triage)
    }));

    let fault = match outcome {
        Ok(Ok(opinion)) => return opinion,
        Ok(Err(fault)) => fault,
        Err(payload) => ReviewError::Panicked {
            reviewer: reviewer.name().to_string(),
            message: panic_message(payload.as_ref()),
        },
    };

    error!(
        event_name = "council.reviewer.fault",
        reviewer = reviewer.name(),
        error = %fault,
        "reviewer failed; recording abstention"
    );
    Opinion::neutral(reviewer.name(), "reviewer abstained after a fault", situation.observed_at)
        .with_metadata("fault", fault.to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::DeliberationCouncil;
    use crate::audit::{AuditOutcome, AuditContext, InMemoryAuditSink};
    use crate::catalogue::RuleCatalogue;
    use crate::config::CouncilConfig;
    use crate::domain::opinion::{DeliberationMethod, Opinion, Priority, Stance};
    use crate::errors::ReviewError;
    use crate::reviewers::fixtures::situation;
    use crate::reviewers::{GuardianReviewer, Reviewer, Situation, SynthesizerReviewer};

    struct Scripted {
        name: &'static str,
        stance: Stance,
        verdict: &'static str,
        evaluations: Arc<AtomicUsize>,
    }

    impl Reviewer for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn evaluate(&self, situation: &Situation) -> Opinion {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            Opinion::new(
                self.name,
                self.stance,
                self.verdict,
                "scripted",
                Priority::Medium,
                0.7,
                situation.observed_at,
            )
        }
    }

    struct Failing;

    impl Reviewer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn evaluate(&self, situation: &Situation) -> Opinion {
            Opinion::approval("failing", "looks fine at first glance", situation.observed_at)
        }

        fn analyze(
            &self,
            _situation: &Situation,
            _triage: Opinion,
        ) -> Result<Opinion, ReviewError> {
            Err(ReviewError::Analysis {
                reviewer: "failing".to_string(),
                message: "index unavailable".to_string(),
            })
        }
    }

    struct Panicking;

    impl Reviewer for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn evaluate(&self, _situation: &Situation) -> Opinion {
            panic!("reviewer blew up");
        }
    }

    fn guardian() -> GuardianReviewer {
        GuardianReviewer::from_catalogue(&RuleCatalogue::builtin().expect("builtin"))
    }

    fn scripted(
        name: &'static str,
        stance: Stance,
        verdict: &'static str,
    ) -> (Box<dyn Reviewer>, Arc<AtomicUsize>) {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let reviewer = Scripted { name, stance, verdict, evaluations: Arc::clone(&evaluations) };
        (Box::new(reviewer), evaluations)
    }

    #[test]
    fn standard_panel_runs_in_fixed_order() {
        let council = DeliberationCouncil::standard(
            &RuleCatalogue::builtin().expect("builtin"),
            &CouncilConfig::default(),
        )
        .expect("standard council");

        assert_eq!(
            council.reviewer_names(),
            [
                "guardian",
                "optimization",
                "contradiction",
                "knowledge_gap",
                "tone",
                "alignment",
                "synthesizer"
            ]
        );
    }

    #[test]
    fn guardian_veto_skips_every_other_reviewer() {
        let (advisor, evaluations) = scripted("counter", Stance::Approval, "Approve");
        let mut council = DeliberationCouncil::new(guardian(), vec![advisor], SynthesizerReviewer);

        let result = council.deliberate(&situation("delete everything"));

        assert_eq!(evaluations.load(Ordering::SeqCst), 0);
        assert_eq!(result.method, DeliberationMethod::Veto);
        assert_eq!(result.opinions.len(), 1);
        assert!(!result.consensus);
    }

    #[test]
    fn veto_from_an_advisor_is_downgraded() {
        let (rogue, _) = scripted("rogue", Stance::Veto, "Veto");
        let mut council = DeliberationCouncil::new(guardian(), vec![rogue], SynthesizerReviewer);

        let result = council.deliberate(&situation("read the file"));
        let rogue = result.opinion_from("rogue").expect("rogue opinion kept");

        assert_eq!(rogue.stance, Stance::Warning);
        assert_eq!(rogue.metadata.get("downgraded_from").map(String::as_str), Some("veto"));
        assert_ne!(result.method, DeliberationMethod::Veto);
    }

    #[test]
    fn failing_and_panicking_reviewers_abstain_without_stopping_the_panel() {
        let (after, evaluations) = scripted("after", Stance::Approval, "Approve");
        let mut council = DeliberationCouncil::new(
            guardian(),
            vec![Box::new(Failing), Box::new(Panicking), after],
            SynthesizerReviewer,
        );

        let result = council.deliberate(&situation("read the file"));

        assert_eq!(evaluations.load(Ordering::SeqCst), 1);
        for name in ["failing", "panicking"] {
            let opinion = result.opinion_from(name).expect("abstention recorded");
            assert_eq!(opinion.stance, Stance::Neutral);
            assert!(opinion.metadata.contains_key("fault"));
        }
        assert_eq!(result.verdict, "Approve");
    }

    #[test]
    fn advisors_are_evaluated_once_per_deliberation() {
        let (warning, evaluations) = scripted("cautious", Stance::Warning, "Reconsider");
        let mut council = DeliberationCouncil::new(guardian(), vec![warning], SynthesizerReviewer);

        let first = council.deliberate(&situation("read the file"));
        council.deliberate(&situation("read the file"));

        assert_eq!(evaluations.load(Ordering::SeqCst), 2);
        let kept = first.opinion_from("cautious").expect("triage kept as the opinion");
        assert_eq!(kept.stance, Stance::Warning);
        assert_eq!(kept.verdict, "Reconsider");
    }

    #[test]
    fn audit_event_records_the_outcome() {
        let sink = InMemoryAuditSink::default();
        let context = AuditContext::new(Some("s-1".to_string()), "req-9", "council");
        let mut council = DeliberationCouncil::new(guardian(), Vec::new(), SynthesizerReviewer);

        council.deliberate_with_audit(&situation("wipe the whole disk"), &sink, &context);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "council.deliberated");
        assert_eq!(events[0].outcome, AuditOutcome::Rejected);
        assert_eq!(
            events[0].metadata.get("vetoed_principle").map(String::as_str),
            Some("preserve-user-data")
        );
    }
}
