use std::collections::BTreeSet;

use regex::Regex;

use crate::catalogue::{OptimizationSignatures, RuleCatalogue};
use crate::domain::opinion::{Opinion, Priority, Stance};
use crate::errors::{ConfigurationError, ReviewError};
use crate::reviewers::{Reviewer, Situation, OPTIMIZATION};

pub const VERDICT_OPTIMIZE: &str = "Optimize";

/// Findings of one pass over a code snippet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeFindings {
    pub index_loops: usize,
    pub max_nesting: usize,
    pub invariant_calls: Vec<String>,
}

impl CodeFindings {
    /// One point per index loop and hoistable call, two per nesting level at or past
    /// the limit.
    pub fn severity(&self, nesting_limit: usize) -> usize {
        let nesting = if self.max_nesting >= nesting_limit {
            (self.max_nesting + 1 - nesting_limit) * 2
        } else {
            0
        };
        self.index_loops + nesting + self.invariant_calls.len()
    }
}

struct LoopFrame {
    indent: usize,
    variable: Option<String>,
}

pub struct OptimizationReviewer {
    loop_keywords: Vec<String>,
    nesting_limit: usize,
    index_loop: Vec<Regex>,
    expensive_calls: Vec<Regex>,
    loop_variable: Regex,
}

impl OptimizationReviewer {
    pub fn new(signatures: &OptimizationSignatures) -> Result<Self, ConfigurationError> {
        Ok(Self {
            loop_keywords: signatures.loop_keywords.clone(),
            nesting_limit: signatures.nesting_limit,
            index_loop: compile_all(&signatures.index_loop)?,
            expensive_calls: compile_all(&signatures.expensive_calls)?,
            loop_variable: compile(
                r"^for\s*\(?\s*(?:(?:int|let|var|const|auto|size_t|mut)\s+)*([A-Za-z_]\w*)",
            )?,
        })
    }

    pub fn from_catalogue(catalogue: &RuleCatalogue) -> Result<Self, ConfigurationError> {
        Self::new(&catalogue.optimization)
    }

    fn loop_keyword<'a>(&self, trimmed: &'a str) -> Option<&'a str> {
        let head = trimmed
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .next()
            .unwrap_or_default();
        self.loop_keywords.iter().any(|keyword| keyword == head).then_some(head)
    }

    pub fn inspect(&self, code: &str) -> CodeFindings {
        let mut findings = CodeFindings {
            index_loops: self
                .index_loop
                .iter()
                .map(|pattern| pattern.find_iter(code).count())
                .sum(),
            ..CodeFindings::default()
        };

        let mut frames: Vec<LoopFrame> = Vec::new();
        for line in code.lines() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed == "}" {
                continue;
            }
            let indent = indentation(line);
            while frames.last().is_some_and(|frame| frame.indent >= indent) {
                frames.pop();
            }

            if self.loop_keyword(trimmed).is_some() {
                let variable = self
                    .loop_variable
                    .captures(trimmed)
                    .and_then(|captures| captures.get(1))
                    .map(|found| found.as_str().to_string());
                frames.push(LoopFrame { indent, variable });
                findings.max_nesting = findings.max_nesting.max(frames.len());
                continue;
            }

            if frames.is_empty() {
                continue;
            }
            let variables =
                frames.iter().filter_map(|frame| frame.variable.as_deref()).collect::<BTreeSet<_>>();
            if variables.is_empty() {
                continue;
            }
            let mentions_loop_variable =
                identifiers(trimmed).any(|identifier| variables.contains(identifier));
            if !mentions_loop_variable
                && self.expensive_calls.iter().any(|pattern| pattern.is_match(trimmed))
            {
                findings.invariant_calls.push(trimmed.trim_end().to_string());
            }
        }

        findings
    }
}

impl Reviewer for OptimizationReviewer {
    fn name(&self) -> &str {
        OPTIMIZATION
    }

    fn evaluate(&self, situation: &Situation) -> Opinion {
        let Some(code) = situation.code.as_deref().filter(|code| !code.trim().is_empty()) else {
            return Opinion::neutral(OPTIMIZATION, "no code supplied", situation.observed_at);
        };

        let has_loop = code.lines().any(|line| self.loop_keyword(line.trim_start()).is_some());
        if has_loop {
            Opinion::new(
                OPTIMIZATION,
                Stance::Suggestion,
                VERDICT_OPTIMIZE,
                "code contains loops",
                Priority::Low,
                0.0,
                situation.observed_at,
            )
        } else {
            Opinion::approval(OPTIMIZATION, "code contains no loops", situation.observed_at)
        }
    }

    fn analyze(&self, situation: &Situation, _triage: Opinion) -> Result<Opinion, ReviewError> {
        let Some(code) = situation.code.as_deref() else {
            return Ok(Opinion::neutral(OPTIMIZATION, "no code supplied", situation.observed_at));
        };

        let findings = self.inspect(code);
        let severity = findings.severity(self.nesting_limit);
        if severity == 0 {
            return Ok(Opinion::approval(
                OPTIMIZATION,
                "no inefficiency signature found",
                situation.observed_at,
            ));
        }

        let priority = match severity {
            0..=2 => Priority::Low,
            3..=4 => Priority::Medium,
            _ => Priority::High,
        };
        let certainty = (0.4 + 0.1 * severity as f64).min(1.0);
        let rationale = format!(
            "{} index loop(s), nesting depth {}, {} loop-invariant call(s)",
            findings.index_loops,
            findings.max_nesting,
            findings.invariant_calls.len()
        );

        Ok(Opinion::new(
            OPTIMIZATION,
            Stance::Suggestion,
            VERDICT_OPTIMIZE,
            rationale,
            priority,
            certainty,
            situation.observed_at,
        )
        .with_metadata("severity", severity.to_string())
        .with_metadata("index_loops", findings.index_loops.to_string())
        .with_metadata("max_nesting", findings.max_nesting.to_string())
        .with_metadata("invariant_calls", findings.invariant_calls.len().to_string()))
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigurationError> {
    Regex::new(pattern).map_err(|error| ConfigurationError::InvalidRule {
        rule: pattern.to_string(),
        reason: error.to_string(),
    })
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigurationError> {
    patterns.iter().map(|pattern| compile(pattern)).collect()
}

fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn identifiers(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| !(c.is_alphanumeric() || c == '_')).filter(|token| !token.is_empty())
}
