use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::catalogue::RuleCatalogue;
use crate::config::MAX_CONTRADICTION_HISTORY;
use crate::domain::opinion::{Opinion, Priority, Stance};
use crate::reviewers::{Reviewer, Situation, CONTRADICTION};

pub const VERDICT_RECONCILE: &str = "Reconcile";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub context: String,
    pub verdict: String,
    pub observed_at: DateTime<Utc>,
}

/// Remembers recent `(context, verdict)` proposals and warns when a new proposal in the
/// same context contradicts one of them.
#[derive(Clone, Debug)]
pub struct ContradictionReviewer {
    antonyms: Vec<(String, String)>,
    history: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl ContradictionReviewer {
    /// `capacity` is clamped to `1..=20`.
    pub fn new(antonyms: Vec<(String, String)>, capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CONTRADICTION_HISTORY);
        Self { antonyms, history: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn from_catalogue(catalogue: &RuleCatalogue, capacity: usize) -> Self {
        Self::new(catalogue.antonyms.clone(), capacity)
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn are_antonyms(&self, left: &str, right: &str) -> bool {
        self.antonyms.iter().any(|(a, b)| {
            (a.eq_ignore_ascii_case(left) && b.eq_ignore_ascii_case(right))
                || (a.eq_ignore_ascii_case(right) && b.eq_ignore_ascii_case(left))
        })
    }

    /// Most recent prior entry contradicting `verdict` within `context`.
    pub fn contradicting(&self, context: &str, verdict: &str) -> Option<&HistoryEntry> {
        self.history
            .iter()
            .rev()
            .filter(|entry| entry.context.eq_ignore_ascii_case(context))
            .find(|entry| self.are_antonyms(&entry.verdict, verdict))
    }

    pub fn record(&mut self, context: &str, verdict: &str, observed_at: DateTime<Utc>) {
        let entry = HistoryEntry {
            context: context.to_string(),
            verdict: verdict.to_string(),
            observed_at,
        };
        // Re-deliberating the same situation must not grow the log.
        if self.history.back() == Some(&entry) {
            return;
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }
}

impl Reviewer for ContradictionReviewer {
    fn name(&self) -> &str {
        CONTRADICTION
    }

    fn evaluate(&self, situation: &Situation) -> Opinion {
        let verdict = situation.proposed_label();
        match self.contradicting(&situation.context, verdict) {
            Some(prior) => Opinion::new(
                CONTRADICTION,
                Stance::Warning,
                VERDICT_RECONCILE,
                format!(
                    "`{verdict}` contradicts earlier `{}` in context `{}`",
                    prior.verdict, situation.context
                ),
                Priority::High,
                0.8,
                situation.observed_at,
            )
            .with_metadata("prior_verdict", prior.verdict.as_str())
            .with_metadata("current_verdict", verdict),
            None => Opinion::approval(
                CONTRADICTION,
                "consistent with recent proposals",
                situation.observed_at,
            ),
        }
    }

    fn observe(&mut self, situation: &Situation) {
        let verdict = situation.proposed_label().to_string();
        self.record(&situation.context, &verdict, situation.observed_at);
    }
}

#[cfg(test)]
mod tests {
    use super::ContradictionReviewer;
    use crate::catalogue::RuleCatalogue;
    use crate::domain::opinion::Stance;
    use crate::reviewers::fixtures::{at, situation};
    use crate::reviewers::Reviewer;

    fn reviewer(capacity: usize) -> ContradictionReviewer {
        ContradictionReviewer::from_catalogue(&RuleCatalogue::builtin().expect("builtin"), capacity)
    }

    #[test]
    fn opposite_verdict_in_same_context_is_a_warning() {
        let mut reviewer = reviewer(20);
        let mut first = situation("ship it").with_proposed_verdict("APPROVE");
        first.context = "optimization".to_string();
        assert_eq!(reviewer.evaluate(&first).stance, Stance::Approval);
        reviewer.observe(&first);

        let mut second = situation("do not ship").with_proposed_verdict("REJECT");
        second.context = "optimization".to_string();
        second.observed_at = at(60);
        let opinion = reviewer.evaluate(&second);

        assert_eq!(opinion.stance, Stance::Warning);
        assert_eq!(opinion.metadata.get("prior_verdict").map(String::as_str), Some("APPROVE"));
    }

    #[test]
    fn different_context_is_not_a_contradiction() {
        let mut reviewer = reviewer(20);
        reviewer.record("billing", "approve", at(0));

        let mut proposal = situation("x").with_proposed_verdict("reject");
        proposal.context = "optimization".to_string();
        assert_eq!(reviewer.evaluate(&proposal).stance, Stance::Approval);
    }

    #[test]
    fn history_is_bounded_and_forgets_oldest() {
        let mut reviewer = reviewer(3);
        reviewer.record("ctx", "approve", at(0));
        for second in 1..=3 {
            reviewer.record("ctx", "defer", at(second));
        }

        assert_eq!(reviewer.history().count(), 3);
        assert!(reviewer.contradicting("ctx", "reject").is_none());
    }

    #[test]
    fn capacity_is_capped_at_twenty() {
        let mut reviewer = reviewer(500);
        for second in 0..40 {
            reviewer.record("ctx", "defer", at(second));
        }
        assert_eq!(reviewer.history().count(), 20);
    }

    #[test]
    fn observing_the_same_situation_twice_records_once() {
        let mut reviewer = reviewer(20);
        let proposal = situation("read");
        reviewer.observe(&proposal);
        reviewer.observe(&proposal);
        assert_eq!(reviewer.history().count(), 1);
    }
}
