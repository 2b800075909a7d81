use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbiter_core::config::CouncilConfig;
use arbiter_core::reviewers::{GuardianReviewer, SynthesizerReviewer, ToneReviewer};
use arbiter_core::{
    evaluate_capability, operation, Concept, ConceptId, ConceptStore, Decision, DecisionKind,
    DeliberationCouncil, DeliberationMethod, MotorSettings, Opinion, ReasoningMotor, Reviewer,
    RuleCatalogue, SentenceStructure, Situation, Stance, Translation,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_760_000_000 + seconds, 0).single().unwrap_or_default()
}

fn standard_council() -> DeliberationCouncil {
    DeliberationCouncil::standard(
        &RuleCatalogue::builtin().expect("builtin rules"),
        &CouncilConfig::default(),
    )
    .expect("standard council")
}

fn proposal(text: &str, context: &str) -> Situation {
    Situation::new(Decision::affirmative(1.0), Translation::new(text), context, at(0))
}

struct CountingReviewer {
    evaluations: Arc<AtomicUsize>,
}

impl Reviewer for CountingReviewer {
    fn name(&self) -> &str {
        "counting"
    }

    fn evaluate(&self, situation: &Situation) -> Opinion {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        Opinion::approval("counting", "counted", situation.observed_at)
    }
}

#[test]
fn delete_everything_is_vetoed_without_consensus() {
    let mut council = standard_council();
    let result = council.deliberate(&proposal("delete everything", "files"));

    assert_eq!(result.verdict, "Veto");
    assert_eq!(result.stance, Stance::Veto);
    assert_eq!(result.method, DeliberationMethod::Veto);
    assert!(!result.consensus);
    assert_eq!(result.vetoed_principle.as_deref(), Some("preserve-user-data"));
    assert_eq!(result.opinions.len(), 1);
}

#[test]
fn guardian_veto_short_circuits_evaluation() {
    let evaluations = Arc::new(AtomicUsize::new(0));
    let counting = CountingReviewer { evaluations: Arc::clone(&evaluations) };
    let catalogue = RuleCatalogue::builtin().expect("builtin rules");
    let mut council = DeliberationCouncil::new(
        GuardianReviewer::from_catalogue(&catalogue),
        vec![Box::new(counting)],
        SynthesizerReviewer,
    );

    council.deliberate(&proposal("wipe the entire database", "ops"));
    assert_eq!(evaluations.load(Ordering::SeqCst), 0);

    council.deliberate(&proposal("list the files", "ops"));
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);
}

#[test]
fn read_concept_with_read_operation_is_fully_executable() {
    let read = Concept::new("action:read", 1.0)
        .expect("valid concept")
        .with_operation(operation("read", |_: &Value| Ok(json!("ok"))));

    let assessment = evaluate_capability(&[&read], &["read"]);
    assert!(assessment.executable);
    assert_eq!(assessment.certainty, 1.0);

    let empty = evaluate_capability(&[], &["read"]);
    assert!(!empty.executable);
    assert_eq!(empty.certainty, 0.0);
    assert_eq!(empty.reason, "no concepts");
}

#[test]
fn approve_then_reject_in_same_context_warns() {
    let mut council = standard_council();

    let first = proposal("ship the cache change", "optimization").with_proposed_verdict("APPROVE");
    let first_result = council.deliberate(&first);
    assert_eq!(
        first_result.opinion_from("contradiction").map(|opinion| opinion.stance),
        Some(Stance::Approval)
    );

    let mut second =
        proposal("ship the cache change", "optimization").with_proposed_verdict("REJECT");
    second.observed_at = at(30);
    let second_result = council.deliberate(&second);

    let contradiction = second_result.opinion_from("contradiction").expect("contradiction opinion");
    assert_eq!(contradiction.stance, Stance::Warning);
}

#[test]
fn contradiction_history_is_fed_the_proposal_not_the_merged_verdict() {
    let mut council = standard_council();

    // A negative decision proposes "reject" even though the panel itself approves.
    let rejected = Situation::new(
        Decision::negative(0.9, "missing operations: send"),
        Translation::new("send the report"),
        "reports",
        at(0),
    );
    let merged = council.deliberate(&rejected);
    assert_eq!(merged.verdict, "Approve");

    let mut approved = proposal("send the report", "reports");
    approved.observed_at = at(10);
    let result = council.deliberate(&approved);
    assert_eq!(
        result.opinion_from("contradiction").map(|opinion| opinion.stance),
        Some(Stance::Warning)
    );
}

#[test]
fn repeated_deliberation_is_idempotent() {
    let mut council = standard_council();
    let situation = proposal("read the quarterly report", "reports")
        .with_reply("Obviously the report is in the shared folder.");

    let first = council.deliberate(&situation);
    let second = council.deliberate(&situation);
    assert_eq!(first, second);
}

#[test]
fn motor_and_council_agree_on_an_executable_read() {
    let mut store = ConceptStore::new();
    store
        .register(
            Concept::new("action:read", 1.0)
                .expect("valid")
                .with_word("read")
                .requiring("read")
                .with_operation(operation("read", |_: &Value| Ok(json!("contents")))),
        )
        .expect("register read");
    store.register(Concept::new("object:file", 0.9).expect("valid")).expect("register file");

    let catalogue = RuleCatalogue::builtin().expect("builtin rules");
    let motor = ReasoningMotor::with_markers(catalogue.classification.clone(), MotorSettings::default());
    let translation = Translation::new("read the file")
        .with_concept(ConceptId::parse("action:read").expect("id"), 1.0)
        .with_concept(ConceptId::parse("object:file").expect("id"), 0.9)
        .with_structure(SentenceStructure::Command);

    let decision = motor.process(&translation, &store);
    assert_eq!(decision.kind(), DecisionKind::Affirmative);
    assert!(decision.is_executable());

    let mut council = standard_council();
    let result = council.deliberate(&Situation::new(decision, translation, "files", at(0)));
    assert_eq!(result.verdict, "Approve");
    assert!(result.consensus);
    assert_eq!(result.method, DeliberationMethod::Unanimous);
}

#[test]
fn condescending_reply_surfaces_a_ranked_suggestion() {
    let mut council = standard_council();
    let situation = proposal("how do I open the file", "help")
        .with_reply("Obviously you just read the manual, as I already said.");

    let result = council.deliberate(&situation);
    assert_eq!(result.verdict, "Approve");
    assert_eq!(result.method, DeliberationMethod::WeightedVote);
    assert_eq!(result.suggestions.first().map(String::as_str), Some("Soften"));
}

#[test]
fn tone_window_is_private_to_each_council() {
    let catalogue = RuleCatalogue::builtin().expect("builtin rules");
    let config = CouncilConfig {
        tone_stress_threshold: 2,
        tone_window_capacity: 8,
        ..CouncilConfig::default()
    };
    let tone = ToneReviewer::from_catalogue(&catalogue, &config);
    let mut busy = DeliberationCouncil::new(
        GuardianReviewer::from_catalogue(&catalogue),
        vec![Box::new(tone.clone())],
        SynthesizerReviewer,
    );
    let mut quiet = DeliberationCouncil::new(
        GuardianReviewer::from_catalogue(&catalogue),
        vec![Box::new(tone)],
        SynthesizerReviewer,
    );

    busy.deliberate(&proposal("hello there", "chat"));
    let mut next = proposal("hello again", "chat");
    next.observed_at = at(5);

    let stressed = busy.deliberate(&next);
    assert_eq!(stressed.suggestions, vec!["Pause".to_string()]);

    let calm = quiet.deliberate(&next);
    assert!(calm.suggestions.is_empty());
}
