use arbiter_core::config::LoadOptions;
use arbiter_core::Concept;

use crate::commands::{CommandResult, Environment};

pub fn run(options: &LoadOptions) -> CommandResult {
    let environment = match Environment::load(options) {
        Ok(environment) => environment,
        Err(error) => return CommandResult::from_error("concepts", &error),
    };

    let mut lines = vec![format!("{} concepts loaded:", environment.store.len())];
    lines.extend(environment.store.iter().map(render_concept));
    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn render_concept(concept: &Concept) -> String {
    let join = |items: Vec<&str>| if items.is_empty() { "-".to_string() } else { items.join(",") };
    format!(
        "- {} confidence={:.2} words={} operations={} requires={}",
        concept.id(),
        concept.confidence().value(),
        join(concept.words().iter().map(String::as_str).collect()),
        join(concept.operation_names().collect()),
        join(concept.requires().iter().map(String::as_str).collect()),
    )
}
