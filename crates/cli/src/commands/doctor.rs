use std::path::Path;

use arbiter_agent::{builtin_registry, load_store};
use arbiter_core::config::{AppConfig, LoadOptions};
use arbiter_core::{DeliberationCouncil, RuleCatalogue};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> String {
    let report = build_report(options);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(pass("config_validation", "configuration loaded and validated"));
            let rules = check_rules(&config, &mut checks);
            checks.push(check_concepts(&config));
            match rules {
                Some(rules) => checks.push(check_council(&config, &rules)),
                None => checks.push(skipped("council_assembly", "rule catalogue did not load")),
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["rule_catalogue", "concept_catalogue", "council_assembly"] {
                checks.push(skipped(name, "configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_rules(config: &AppConfig, checks: &mut Vec<DoctorCheck>) -> Option<RuleCatalogue> {
    match RuleCatalogue::builtin_with(config.catalogue.rules_path.as_deref()) {
        Ok(rules) => {
            checks.push(pass(
                "rule_catalogue",
                format!(
                    "{} guardian patterns, {} alignment penalties, {} antonym pairs",
                    rules.guardian.len(),
                    rules.alignment.len(),
                    rules.antonyms.len()
                ),
            ));
            Some(rules)
        }
        Err(error) => {
            checks.push(fail("rule_catalogue", error.to_string()));
            None
        }
    }
}

fn check_concepts(config: &AppConfig) -> DoctorCheck {
    let registry = builtin_registry(Path::new("."));
    match load_store(config.catalogue.concepts_path.as_deref(), &registry) {
        Ok(store) => pass(
            "concept_catalogue",
            format!("{} concepts bound to {} operations", store.len(), registry.len()),
        ),
        Err(error) => fail("concept_catalogue", error.to_string()),
    }
}

fn check_council(config: &AppConfig, rules: &RuleCatalogue) -> DoctorCheck {
    match DeliberationCouncil::standard(rules, &config.council) {
        Ok(council) => pass("council_assembly", council.reviewer_names().join(" -> ")),
        Err(error) => fail("council_assembly", error.to_string()),
    }
}

fn pass(name: &'static str, details: impl Into<String>) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Pass, details: details.into() }
}

fn fail(name: &'static str, details: String) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Fail, details }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
