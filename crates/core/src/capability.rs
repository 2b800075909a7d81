use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::concept::Concept;

pub const REASON_NO_CONCEPTS: &str = "no concepts";
pub const REASON_NO_OPERATIONS: &str = "no operations required";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CapabilityAssessment {
    pub executable: bool,
    pub available_operations: BTreeSet<String>,
    pub missing_operations: BTreeSet<String>,
    pub certainty: f64,
    pub reason: String,
}

impl CapabilityAssessment {
    fn unfulfilled(reason: &str) -> Self {
        Self {
            executable: false,
            available_operations: BTreeSet::new(),
            missing_operations: BTreeSet::new(),
            certainty: 0.0,
            reason: reason.to_string(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.available_operations.is_empty() && !self.missing_operations.is_empty()
    }
}

pub trait CapabilityEvaluator: Send + Sync {
    /// `requested` adds operations on top of what the concepts themselves require.
    fn evaluate(&self, concepts: &[&Concept], requested: &[&str]) -> CapabilityAssessment;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicCapabilityEvaluator;

impl CapabilityEvaluator for DeterministicCapabilityEvaluator {
    fn evaluate(&self, concepts: &[&Concept], requested: &[&str]) -> CapabilityAssessment {
        evaluate_capability(concepts, requested)
    }
}

/// What a request naming `concepts` needs: their declared `requires`, or, when none declares
/// any, the operations the concepts register themselves.
pub fn required_operations(concepts: &[&Concept]) -> BTreeSet<String> {
    let declared = concepts
        .iter()
        .flat_map(|concept| concept.requires().iter().cloned())
        .collect::<BTreeSet<_>>();
    if !declared.is_empty() {
        return declared;
    }
    concepts.iter().flat_map(|concept| concept.operation_names().map(str::to_string)).collect()
}

/// Partial availability is never reported as capability: `executable` holds only when
/// every required operation is registered on one of the recognised concepts.
pub fn evaluate_capability(concepts: &[&Concept], requested: &[&str]) -> CapabilityAssessment {
    if concepts.is_empty() {
        return CapabilityAssessment::unfulfilled(REASON_NO_CONCEPTS);
    }

    let required = concepts
        .iter()
        .flat_map(|concept| concept.requires().iter().cloned())
        .chain(requested.iter().map(|name| name.to_string()))
        .collect::<BTreeSet<_>>();
    if required.is_empty() {
        return CapabilityAssessment::unfulfilled(REASON_NO_OPERATIONS);
    }

    let (available_operations, missing_operations): (BTreeSet<_>, BTreeSet<_>) = required
        .iter()
        .cloned()
        .partition(|name| concepts.iter().any(|concept| concept.has_operation(name)));

    let certainty = available_operations.len() as f64 / required.len() as f64;
    let executable = missing_operations.is_empty();
    let reason = if executable {
        format!("all {} required operations available", required.len())
    } else {
        format!(
            "missing operations: {}",
            missing_operations.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
        )
    };

    CapabilityAssessment { executable, available_operations, missing_operations, certainty, reason }
}
