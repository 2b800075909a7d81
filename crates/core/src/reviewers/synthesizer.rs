//! Merges the panel's opinions into one verdict.
//!
//! Merge order: any veto wins outright; otherwise neutral opinions are dropped and the
//! remainder is either empty (no objection), of one verdict (unanimous) or put to a vote
//! weighted by priority tier.
//!
//! Equal vote totals are broken by, in order: the label whose single strongest opinion
//! has the highest priority, the larger summed certainty, and the lexically smallest
//! reviewer name behind that strongest opinion.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::domain::opinion::{
    DeliberationMethod, DeliberationResult, Opinion, Stance, VERDICT_APPROVE,
};
use crate::reviewers::{Reviewer, Situation, SYNTHESIZER};

#[derive(Clone, Debug, Default)]
pub struct SynthesizerReviewer;

#[derive(Default)]
struct Tally<'a> {
    weight: u32,
    certainty: f64,
    strongest: Option<&'a Opinion>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, opinion: &'a Opinion) {
        self.weight += opinion.priority.weight();
        self.certainty += opinion.certainty;
        if self.strongest.map_or(true, |current| stronger(opinion, current) == Ordering::Greater) {
            self.strongest = Some(opinion);
        }
    }
}

/// `Greater` when `left` outranks `right`: higher priority, then higher certainty, then the
/// smaller reviewer name.
fn stronger(left: &Opinion, right: &Opinion) -> Ordering {
    left.priority
        .cmp(&right.priority)
        .then_with(|| left.certainty.total_cmp(&right.certainty))
        .then_with(|| right.reviewer.cmp(&left.reviewer))
}

impl SynthesizerReviewer {
    pub fn synthesize(&self, opinions: &[Opinion]) -> DeliberationResult {
        let suggestions = ranked_suggestions(opinions);

        if let Some(veto) = opinions.iter().find(|opinion| opinion.stance == Stance::Veto) {
            return DeliberationResult {
                verdict: veto.verdict.clone(),
                stance: Stance::Veto,
                rationale: format!("{} vetoed: {}", veto.reviewer, veto.rationale),
                certainty: veto.certainty,
                opinions: opinions.to_vec(),
                consensus: false,
                method: DeliberationMethod::Veto,
                vetoed_principle: veto.metadata.get("principle").cloned(),
                suggestions,
            };
        }

        let voting = opinions.iter().filter(|opinion| !opinion.is_neutral()).collect::<Vec<_>>();
        let Some(first) = voting.first().copied() else {
            return no_objection(opinions, suggestions);
        };

        if voting.iter().all(|opinion| opinion.verdict == first.verdict) {
            let strongest = voting
                .iter()
                .copied()
                .max_by(|left, right| stronger(left, right))
                .unwrap_or(first);
            let certainty =
                voting.iter().map(|opinion| opinion.certainty).sum::<f64>() / voting.len() as f64;
            return DeliberationResult {
                verdict: first.verdict.clone(),
                stance: strongest.stance,
                rationale: format!("all {} voting reviewers agree on {}", voting.len(), first.verdict),
                certainty,
                opinions: opinions.to_vec(),
                consensus: true,
                method: DeliberationMethod::Unanimous,
                vetoed_principle: None,
                suggestions,
            };
        }

        let mut tallies: BTreeMap<&str, Tally<'_>> = BTreeMap::new();
        for opinion in voting.iter().copied() {
            tallies.entry(opinion.verdict.as_str()).or_default().add(opinion);
        }
        let total_weight = tallies.values().map(|tally| tally.weight).sum::<u32>();

        let winner = tallies.iter().max_by(|(_, left), (_, right)| {
            left.weight
                .cmp(&right.weight)
                .then_with(|| match (left.strongest, right.strongest) {
                    (Some(l), Some(r)) => l
                        .priority
                        .cmp(&r.priority)
                        .then_with(|| left.certainty.total_cmp(&right.certainty))
                        .then_with(|| r.reviewer.cmp(&l.reviewer)),
                    _ => Ordering::Equal,
                })
        });

        let Some((label, tally)) = winner else {
            return no_objection(opinions, suggestions);
        };
        let stance = tally.strongest.map_or(first.stance, |opinion| opinion.stance);
        let breakdown = tallies
            .iter()
            .map(|(label, tally)| format!("{label}={}", tally.weight))
            .collect::<Vec<_>>()
            .join(", ");

        DeliberationResult {
            verdict: label.to_string(),
            stance,
            rationale: format!("weighted vote ({breakdown})"),
            certainty: if total_weight == 0 {
                0.0
            } else {
                f64::from(tally.weight) / f64::from(total_weight)
            },
            opinions: opinions.to_vec(),
            consensus: false,
            method: DeliberationMethod::WeightedVote,
            vetoed_principle: None,
            suggestions,
        }
    }
}

fn no_objection(opinions: &[Opinion], suggestions: Vec<String>) -> DeliberationResult {
    DeliberationResult {
        verdict: VERDICT_APPROVE.to_string(),
        stance: Stance::Approval,
        rationale: "no reviewer raised an objection".to_string(),
        certainty: 1.0,
        opinions: opinions.to_vec(),
        consensus: true,
        method: DeliberationMethod::NoObjection,
        vetoed_principle: None,
        suggestions,
    }
}

/// Suggestion verdicts strongest first, each listed once.
fn ranked_suggestions(opinions: &[Opinion]) -> Vec<String> {
    let mut suggestions =
        opinions.iter().filter(|opinion| opinion.stance == Stance::Suggestion).collect::<Vec<_>>();
    suggestions.sort_by(|left, right| stronger(right, left));

    let mut ranked: Vec<String> = Vec::with_capacity(suggestions.len());
    for opinion in suggestions {
        if !ranked.contains(&opinion.verdict) {
            ranked.push(opinion.verdict.clone());
        }
    }
    ranked
}

impl Reviewer for SynthesizerReviewer {
    fn name(&self) -> &str {
        SYNTHESIZER
    }

    /// Raises no objection of its own.
    fn evaluate(&self, situation: &Situation) -> Opinion {
        Opinion::neutral(SYNTHESIZER, "merges opinions only", situation.observed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::SynthesizerReviewer;
    use crate::domain::opinion::{DeliberationMethod, Opinion, Priority, Stance};
    use crate::reviewers::fixtures::at;

    fn opinion(reviewer: &str, stance: Stance, verdict: &str, priority: Priority) -> Opinion {
        Opinion::new(reviewer, stance, verdict, "test", priority, 0.8, at(0))
    }

    #[test]
    fn weighted_vote_drops_neutral_opinions() {
        let opinions = vec![
            opinion("a", Stance::Approval, "Approve", Priority::Medium),
            opinion("b", Stance::Approval, "Approve", Priority::Medium),
            opinion("c", Stance::Suggestion, "Optimize", Priority::Low),
            Opinion::neutral("d", "nothing", at(0)),
            Opinion::neutral("e", "nothing", at(0)),
        ];
        let result = SynthesizerReviewer.synthesize(&opinions);

        assert_eq!(result.verdict, "Approve");
        assert_eq!(result.method, DeliberationMethod::WeightedVote);
        assert!(!result.consensus);
        assert_eq!(result.certainty, 0.8);
        assert_eq!(result.opinions.len(), 5);
        assert_eq!(result.suggestions, vec!["Optimize".to_string()]);
    }

    #[test]
    fn veto_wins_regardless_of_weight() {
        let opinions = vec![
            opinion("guardian", Stance::Veto, "Veto", Priority::Critical)
                .with_metadata("principle", "preserve-user-data"),
            opinion("a", Stance::Approval, "Approve", Priority::Critical),
            opinion("b", Stance::Approval, "Approve", Priority::Critical),
        ];
        let result = SynthesizerReviewer.synthesize(&opinions);

        assert_eq!(result.verdict, "Veto");
        assert_eq!(result.method, DeliberationMethod::Veto);
        assert!(!result.consensus);
        assert_eq!(result.vetoed_principle.as_deref(), Some("preserve-user-data"));
    }

    #[test]
    fn only_neutral_opinions_means_no_objection() {
        let opinions = vec![Opinion::neutral("a", "x", at(0)), Opinion::neutral("b", "y", at(0))];
        let result = SynthesizerReviewer.synthesize(&opinions);
        assert_eq!(result.verdict, "Approve");
        assert_eq!(result.method, DeliberationMethod::NoObjection);

        let empty = SynthesizerReviewer.synthesize(&[]);
        assert_eq!(empty.method, DeliberationMethod::NoObjection);
    }

    #[test]
    fn shared_verdict_is_unanimous() {
        let opinions = vec![
            opinion("a", Stance::Approval, "Approve", Priority::Low),
            opinion("b", Stance::Approval, "Approve", Priority::High),
        ];
        let result = SynthesizerReviewer.synthesize(&opinions);
        assert_eq!(result.method, DeliberationMethod::Unanimous);
        assert!(result.consensus);
        assert_eq!(result.stance, Stance::Approval);
    }

    #[test]
    fn equal_totals_prefer_the_highest_single_priority() {
        // Approve: Medium + Medium = 4; Reconcile: Critical = 4.
        let opinions = vec![
            opinion("a", Stance::Approval, "Approve", Priority::Medium),
            opinion("b", Stance::Approval, "Approve", Priority::Medium),
            opinion("c", Stance::Warning, "Reconcile", Priority::Critical),
        ];
        let result = SynthesizerReviewer.synthesize(&opinions);
        assert_eq!(result.verdict, "Reconcile");
        assert_eq!(result.stance, Stance::Warning);
    }

    #[test]
    fn equal_totals_and_tiers_fall_back_to_certainty_then_name() {
        let mut sure = opinion("z", Stance::Warning, "Hold", Priority::High);
        sure.certainty = 0.9;
        let opinions = vec![opinion("a", Stance::Approval, "Approve", Priority::High), sure];
        assert_eq!(SynthesizerReviewer.synthesize(&opinions).verdict, "Hold");

        let opinions = vec![
            opinion("b", Stance::Approval, "Approve", Priority::High),
            opinion("a", Stance::Warning, "Hold", Priority::High),
        ];
        assert_eq!(SynthesizerReviewer.synthesize(&opinions).verdict, "Hold");
    }

    #[test]
    fn suggestions_are_ranked_by_priority() {
        let opinions = vec![
            opinion("tone", Stance::Suggestion, "Pause", Priority::Low),
            opinion("knowledge_gap", Stance::Suggestion, "Investigate", Priority::Medium),
            opinion("guardian", Stance::Approval, "Approve", Priority::Medium),
        ];
        let result = SynthesizerReviewer.synthesize(&opinions);
        assert_eq!(result.suggestions, vec!["Investigate".to_string(), "Pause".to_string()]);
    }
}
