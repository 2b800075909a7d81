use arbiter_agent::{Interpretation, Session};
use arbiter_core::config::LoadOptions;
use serde::Serialize;

use crate::commands::{CommandResult, Environment};

const COMMAND: &str = "classify";

#[derive(Debug, Serialize)]
struct Classification {
    command: &'static str,
    status: &'static str,
    #[serde(flatten)]
    interpretation: Interpretation,
}

/// Translation and motor output only; the council is not consulted.
pub fn run(options: &LoadOptions, text: &str) -> CommandResult {
    let environment = match Environment::load(options) {
        Ok(environment) => environment,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };
    let session = match Session::new(&environment.config, &environment.rules, environment.store)
    {
        Ok(session) => session,
        Err(error) => return CommandResult::from_error(COMMAND, &error.into()),
    };

    let report =
        Classification { command: COMMAND, status: "ok", interpretation: session.interpret(text) };
    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 1),
    }
}
