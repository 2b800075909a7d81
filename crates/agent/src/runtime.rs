//! One conversation: translate, reason, deliberate, gate, and only then act.

use std::sync::Arc;

use arbiter_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use arbiter_core::config::AppConfig;
use arbiter_core::text::normalize_text;
use arbiter_core::{
    required_operations, ConceptId, ConceptStore, ConfigurationError, Decision,
    DeliberationCouncil, DeliberationResult, MotorSettings, ReasoningMotor, RequestClass,
    RuleCatalogue, Situation, Translation,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::guardrails::{ActionGate, GateDecision};
use crate::translator::LexiconTranslator;

/// Context for turns that name no concept and have no caller-supplied context.
pub const DEFAULT_CONTEXT: &str = "conversation";

const TRAILING_PUNCTUATION: &[char] = &[',', ';', ':', '!', '?', '.', '"', '\''];
const QUOTES: &[char] = &['"', '\''];

/// Material the council reviews alongside the message itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attachments {
    pub reply: Option<String>,
    pub code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Execution {
    pub concept: ConceptId,
    pub operation: String,
    pub output: Option<Value>,
    pub error: Option<String>,
}

/// Translation and motor output for one message, before the council sees it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Interpretation {
    pub class: RequestClass,
    pub translation: Translation,
    pub decision: Decision,
}

/// Everything one message produced, for rendering and audit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Turn {
    pub context: String,
    pub class: RequestClass,
    pub translation: Translation,
    pub decision: Decision,
    pub deliberation: DeliberationResult,
    pub gate: GateDecision,
    pub executions: Vec<Execution>,
}

pub struct Session {
    id: String,
    context: Option<String>,
    motor: ReasoningMotor,
    council: DeliberationCouncil,
    store: Arc<ConceptStore>,
    translator: LexiconTranslator,
    gate: ActionGate,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Session {
    pub fn new(
        config: &AppConfig,
        rules: &RuleCatalogue,
        store: Arc<ConceptStore>,
    ) -> Result<Self, ConfigurationError> {
        let settings =
            MotorSettings { clarification_confidence: config.reasoning.clarification_confidence };
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            context: None,
            motor: ReasoningMotor::with_markers(rules.classification.clone(), settings),
            council: DeliberationCouncil::standard(rules, &config.council)?,
            store,
            translator: LexiconTranslator::with_markers(&rules.classification),
            gate: ActionGate::default(),
            audit: None,
        })
    }

    /// Pins every turn to one context. Without it each turn's context is derived from the
    /// concepts its decision names.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_gate(mut self, gate: ActionGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &ConceptStore {
        &self.store
    }

    /// Translates and classifies `message` without consulting the council.
    pub fn interpret(&self, message: &str) -> Interpretation {
        let translation = self.translator.translate(message, &self.store);
        let class = self.motor.classify_translation(&translation, &self.store);
        let decision = self.motor.process(&translation, &self.store);
        Interpretation { class, translation, decision }
    }

    pub fn handle(&mut self, message: &str) -> Turn {
        self.handle_at(message, Utc::now())
    }

    pub fn handle_at(&mut self, message: &str, at: DateTime<Utc>) -> Turn {
        self.handle_with(message, Attachments::default(), at)
    }

    pub fn handle_with(
        &mut self,
        message: &str,
        attachments: Attachments,
        at: DateTime<Utc>,
    ) -> Turn {
        let audit_context =
            AuditContext::new(Some(self.id.clone()), Uuid::new_v4().to_string(), "session");

        let Interpretation { class, translation, decision } = self.interpret(message);
        self.record_reasoning(class, &decision, &audit_context, at);

        let context = self.context_for(&decision);
        let mut situation =
            Situation::new(decision.clone(), translation.clone(), context.as_str(), at);
        situation.proposed_reply = attachments.reply;
        situation.code = attachments.code;
        let deliberation = match self.audit.as_deref() {
            Some(sink) => self.council.deliberate_with_audit(&situation, sink, &audit_context),
            None => self.council.deliberate(&situation),
        };

        let gate = self.gate.evaluate(class, &decision, &deliberation);
        if let Some(reason_code) = gate.reason_code() {
            warn!(
                event_name = "session.gate.blocked",
                session_id = %self.id,
                reason_code,
                "action gate blocked execution"
            );
        }

        let mut turn = Turn {
            context,
            class,
            translation,
            decision,
            deliberation,
            gate,
            executions: Vec::new(),
        };
        if class == RequestClass::ExecutionCommand
            && turn.decision.is_executable()
            && turn.gate.is_allowed()
        {
            self.execute(&mut turn, message, &audit_context, at);
        }

        info!(
            event_name = "session.turn",
            session_id = %self.id,
            context = %turn.context,
            class = ?turn.class,
            decision = turn.decision.verdict_label(),
            verdict = %turn.deliberation.verdict,
            executions = turn.executions.len(),
            "turn handled"
        );
        turn
    }

    fn context_for(&self, decision: &Decision) -> String {
        if let Some(context) = &self.context {
            return context.clone();
        }
        let mut ids = decision.concepts().iter().map(ConceptId::as_str).collect::<Vec<_>>();
        if ids.is_empty() {
            return DEFAULT_CONTEXT.to_string();
        }
        ids.sort_unstable();
        ids.dedup();
        ids.join("+")
    }

    /// Runs every required operation in name order; the first failure replaces the turn's
    /// decision and stops the run.
    fn execute(&self, turn: &mut Turn, message: &str, context: &AuditContext, at: DateTime<Utc>) {
        let concepts = self.store.resolve(turn.decision.concepts());
        let args = self.arguments(message);

        for operation in required_operations(&concepts) {
            let Some(provider) = concepts.iter().find(|concept| concept.has_operation(&operation))
            else {
                continue;
            };
            let concept = provider.id().clone();

            let (execution, failure) =
                match self.motor.perform(&self.store, &concept, &operation, &args) {
                    Ok((_, output)) => (
                        Execution { concept, operation, output: Some(output), error: None },
                        None,
                    ),
                    Err(decision) => {
                        let error = decision.rejection_reason().map(str::to_string);
                        (Execution { concept, operation, output: None, error }, Some(decision))
                    }
                };
            self.record_execution(&execution, context, at);
            turn.executions.push(execution);

            if let Some(decision) = failure {
                turn.decision = decision;
                break;
            }
        }
    }

    fn record_reasoning(
        &self,
        class: RequestClass,
        decision: &Decision,
        context: &AuditContext,
        at: DateTime<Utc>,
    ) {
        let Some(sink) = self.audit.as_deref() else {
            return;
        };
        let outcome = if decision.rejection_reason().is_some() {
            AuditOutcome::Rejected
        } else {
            AuditOutcome::Success
        };
        let mut event =
            AuditEvent::new(context, "request.reasoned", AuditCategory::Reasoning, outcome, at)
                .with_metadata("class", format!("{class:?}"))
                .with_metadata("decision", decision.verdict_label())
                .with_metadata("certainty", format!("{:.2}", decision.certainty()))
                .with_metadata("executable", decision.is_executable().to_string());
        if let Some(reason) = decision.rejection_reason() {
            event = event.with_metadata("rejection_reason", reason);
        }
        sink.emit(event);
    }

    fn record_execution(&self, execution: &Execution, context: &AuditContext, at: DateTime<Utc>) {
        let Some(sink) = self.audit.as_deref() else {
            return;
        };
        let outcome =
            if execution.error.is_some() { AuditOutcome::Failed } else { AuditOutcome::Success };
        let mut event =
            AuditEvent::new(context, "operation.executed", AuditCategory::Execution, outcome, at)
                .with_metadata("concept", execution.concept.as_str())
                .with_metadata("operation", execution.operation.as_str());
        if let Some(error) = &execution.error {
            event = event.with_metadata("error", error.as_str());
        }
        sink.emit(event);
    }

    /// `text` is the message after leading function words and the command verb; `path` is
    /// the first token that looks like a file path.
    fn arguments(&self, message: &str) -> Value {
        let words = message.split_whitespace().collect::<Vec<_>>();
        let leading = words
            .iter()
            .take_while(|word| self.translator.is_function_word(&normalize_text(word)))
            .count();
        let text = words.iter().skip(leading + 1).copied().collect::<Vec<_>>().join(" ");

        let path = words
            .iter()
            .map(|word| word.trim_end_matches(TRAILING_PUNCTUATION).trim_start_matches(QUOTES))
            .find(|word| {
                (word.contains('.') || word.contains('/'))
                    && word.chars().any(char::is_alphanumeric)
            });

        match path {
            Some(path) => json!({ "text": text, "path": path }),
            None => json!({ "text": text }),
        }
    }
}
