use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use arbiter_agent::{ActionGate, Attachments, Session, Turn};
use arbiter_core::audit::{AuditEvent, InMemoryAuditSink};
use arbiter_core::config::LoadOptions;
use arbiter_core::ApplicationError;
use chrono::Utc;
use serde::Serialize;

use crate::commands::{CommandResult, Environment, EXIT_VETO};

const COMMAND: &str = "deliberate";

#[derive(Clone, Debug, Default)]
pub struct DeliberateArgs {
    pub text: String,
    pub context: Option<String>,
    pub reply: Option<String>,
    pub code_file: Option<PathBuf>,
    /// Lets an allowed execution command run its operations; otherwise the gate degrades it.
    pub execute: bool,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct DeliberationReport<'a> {
    command: &'static str,
    status: &'static str,
    session_id: &'a str,
    #[serde(flatten)]
    turn: &'a Turn,
    audit: Vec<AuditEvent>,
}

pub fn run(options: &LoadOptions, args: &DeliberateArgs) -> CommandResult {
    let environment = match Environment::load(options) {
        Ok(environment) => environment,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };
    let code = match read_code(args) {
        Ok(code) => code,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };

    let mut session = match Session::new(&environment.config, &environment.rules, environment.store)
    {
        Ok(session) => session,
        Err(error) => return CommandResult::from_error(COMMAND, &error.into()),
    };
    let sink = Arc::new(InMemoryAuditSink::default());
    session = session
        .with_gate(ActionGate { execution_enabled: args.execute, ..ActionGate::default() })
        .with_audit(sink.clone());
    if let Some(context) = &args.context {
        session = session.with_context(context.as_str());
    }

    let attachments = Attachments { reply: args.reply.clone(), code };
    let turn = session.handle_with(&args.text, attachments, Utc::now());

    let vetoed = turn.deliberation.is_veto();
    let exit_code = if vetoed { EXIT_VETO } else { 0 };
    let report = DeliberationReport {
        command: COMMAND,
        status: if vetoed { "vetoed" } else { "ok" },
        session_id: session.id(),
        turn: &turn,
        audit: sink.events(),
    };

    let output = if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(output) => output,
            Err(error) => {
                return CommandResult::failure(COMMAND, "serialization", error.to_string(), 1)
            }
        }
    } else {
        render_human(&report)
    };
    CommandResult { exit_code, output }
}

fn read_code(args: &DeliberateArgs) -> Result<Option<String>, ApplicationError> {
    let Some(path) = &args.code_file else {
        return Ok(None);
    };
    fs::read_to_string(path).map(Some).map_err(|error| ApplicationError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    })
}

fn render_human(report: &DeliberationReport<'_>) -> String {
    let turn = report.turn;
    let deliberation = &turn.deliberation;
    let mut lines = vec![
        format!(
            "verdict: {} ({}, certainty {:.2}, consensus {})",
            deliberation.verdict,
            deliberation.method.as_str(),
            deliberation.certainty,
            if deliberation.consensus { "yes" } else { "no" }
        ),
        format!(
            "decision: {} (certainty {:.2}, executable {})",
            turn.decision.verdict_label(),
            turn.decision.certainty(),
            turn.decision.is_executable()
        ),
        format!("class: {:?} (context {})", turn.class, turn.context),
        match turn.gate.reason_code() {
            Some(reason_code) => format!("gate: blocked ({reason_code})"),
            None => "gate: allow".to_string(),
        },
    ];
    if let Some(principle) = &deliberation.vetoed_principle {
        lines.push(format!("vetoed principle: {principle}"));
    }
    if !deliberation.suggestions.is_empty() {
        lines.push(format!("suggestions: {}", deliberation.suggestions.join(", ")));
    }
    for opinion in &deliberation.opinions {
        lines.push(format!(
            "- {}: {:?} {} [{:?}, {:.2}]",
            opinion.reviewer, opinion.stance, opinion.verdict, opinion.priority, opinion.certainty
        ));
    }
    for execution in &turn.executions {
        let outcome = match (&execution.output, &execution.error) {
            (_, Some(error)) => format!("failed: {error}"),
            (Some(output), None) => output.to_string(),
            (None, None) => "no output".to_string(),
        };
        lines.push(format!("ran {} on {}: {outcome}", execution.operation, execution.concept));
    }
    lines.join("\n")
}
