use arbiter_core::{Decision, DeliberationResult, RequestClass, Stance};
use serde::Serialize;

/// What the session may do with a deliberated request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    Deny { reason_code: &'static str, principle: String },
    Degrade { reason_code: &'static str, fallback: &'static str },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason_code, .. } | Self::Degrade { reason_code, .. } => Some(reason_code),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionGate {
    pub execution_enabled: bool,
    /// When set, a council verdict carrying a warning stance degrades execution to a
    /// confirmation step.
    pub confirm_on_warning: bool,
}

impl Default for ActionGate {
    fn default() -> Self {
        Self { execution_enabled: true, confirm_on_warning: true }
    }
}

impl ActionGate {
    pub fn evaluate(
        &self,
        class: RequestClass,
        decision: &Decision,
        deliberation: &DeliberationResult,
    ) -> GateDecision {
        if deliberation.is_veto() {
            return GateDecision::Deny {
                reason_code: "guardian_veto",
                principle: deliberation.vetoed_principle.clone().unwrap_or_default(),
            };
        }
        if class != RequestClass::ExecutionCommand {
            return GateDecision::Allow;
        }
        if !decision.is_executable() {
            return GateDecision::Degrade {
                reason_code: "not_executable",
                fallback: "explain_missing_operations",
            };
        }
        if !self.execution_enabled {
            return GateDecision::Degrade {
                reason_code: "execution_disabled",
                fallback: "describe_only",
            };
        }
        if self.confirm_on_warning && deliberation.stance == Stance::Warning {
            return GateDecision::Degrade {
                reason_code: "council_warning",
                fallback: "confirm_with_user",
            };
        }
        GateDecision::Allow
    }
}
