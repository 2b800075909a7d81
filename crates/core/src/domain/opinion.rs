use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const VERDICT_APPROVE: &str = "Approve";
pub const VERDICT_VETO: &str = "Veto";
pub const VERDICT_ABSTAIN: &str = "Abstain";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    /// Unconditional rejection. Only the guardian may hold this stance.
    Veto,
    Warning,
    Approval,
    Suggestion,
    Neutral,
}

/// Priority tiers, ordered `Low < Medium < High < Critical`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Vote weight used by the synthesizer.
    pub fn weight(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub reviewer: String,
    pub stance: Stance,
    pub verdict: String,
    pub rationale: String,
    pub priority: Priority,
    pub certainty: f64,
    pub metadata: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Opinion {
    pub fn new(
        reviewer: impl Into<String>,
        stance: Stance,
        verdict: impl Into<String>,
        rationale: impl Into<String>,
        priority: Priority,
        certainty: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let certainty = if certainty.is_nan() { 0.0 } else { certainty.clamp(0.0, 1.0) };
        Self {
            reviewer: reviewer.into(),
            stance,
            verdict: verdict.into(),
            rationale: rationale.into(),
            priority,
            certainty,
            metadata: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn approval(
        reviewer: impl Into<String>,
        rationale: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(reviewer, Stance::Approval, VERDICT_APPROVE, rationale, Priority::Medium, 1.0, timestamp)
    }

    pub fn neutral(
        reviewer: impl Into<String>,
        rationale: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(reviewer, Stance::Neutral, VERDICT_ABSTAIN, rationale, Priority::Low, 0.0, timestamp)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_neutral(&self) -> bool {
        self.stance == Stance::Neutral
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliberationMethod {
    #[serde(rename = "veto")]
    Veto,
    #[serde(rename = "unanimous")]
    Unanimous,
    #[serde(rename = "weighted-vote")]
    WeightedVote,
    #[serde(rename = "no-objection")]
    NoObjection,
}

impl DeliberationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Veto => "veto",
            Self::Unanimous => "unanimous",
            Self::WeightedVote => "weighted-vote",
            Self::NoObjection => "no-objection",
        }
    }
}

/// Outcome of one deliberation, keeping every opinion for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliberationResult {
    pub verdict: String,
    pub stance: Stance,
    pub rationale: String,
    pub certainty: f64,
    pub opinions: Vec<Opinion>,
    pub consensus: bool,
    pub method: DeliberationMethod,
    pub vetoed_principle: Option<String>,
    /// Suggestion verdicts, strongest first.
    pub suggestions: Vec<String>,
}

impl DeliberationResult {
    pub fn is_veto(&self) -> bool {
        self.method == DeliberationMethod::Veto
    }

    pub fn opinion_from(&self, reviewer: &str) -> Option<&Opinion> {
        self.opinions.iter().find(|opinion| opinion.reviewer == reviewer)
    }
}
