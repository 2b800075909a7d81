pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use arbiter_core::config::{AppConfig, LoadOptions};
use clap::{Parser, Subcommand};

use crate::commands::deliberate::DeliberateArgs;

#[derive(Debug, Parser)]
#[command(
    name = "arbiter",
    about = "Arbiter operator CLI",
    long_about = "Classify requests, run them past the deliberation council, and inspect catalogues and configuration.",
    after_help = "Examples:\n  arbiter deliberate \"delete everything\"\n  arbiter classify \"can you read the file\"\n  arbiter doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to an arbiter.toml config file (must exist)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Deliberate on a request through a session; exits 3 on veto")]
    Deliberate {
        text: String,
        #[arg(long, help = "Conversation context used for contradiction tracking")]
        context: Option<String>,
        #[arg(long, help = "Proposed reply for the tone and alignment reviewers")]
        reply: Option<String>,
        #[arg(long, help = "Source file for the optimization reviewer")]
        code_file: Option<PathBuf>,
        #[arg(long, help = "Run the operations of an allowed command (reads stay in the cwd)")]
        execute: bool,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show the translation, request class and decision without deliberating")]
    Classify { text: String },
    #[command(about = "List the loaded concepts with their words and operations")]
    Concepts,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, rule and concept catalogues, and council assembly")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            ..LoadOptions::default()
        }
    }
}

/// Config used for logging only; commands load and report their own failures.
pub fn logging_config(cli: &Cli) -> AppConfig {
    AppConfig::load(cli.load_options()).unwrap_or_default()
}

pub fn execute(cli: Cli) -> commands::CommandResult {
    let options = cli.load_options();

    match cli.command {
        Command::Deliberate { text, context, reply, code_file, execute, json } => {
            let args = DeliberateArgs { text, context, reply, code_file, execute, json };
            commands::deliberate::run(&options, &args)
        }
        Command::Classify { text } => commands::classify::run(&options, &text),
        Command::Concepts => commands::concepts::run(&options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(&options, json) }
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let result = execute(cli);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
