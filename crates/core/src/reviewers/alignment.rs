use crate::catalogue::{AlignmentPenalty, RuleCatalogue};
use crate::domain::opinion::{Opinion, Priority, Stance};
use crate::reviewers::{Reviewer, Situation, ALIGNMENT};
use crate::text::{contains_term, normalize_text};

pub const VERDICT_RECONSIDER: &str = "Reconsider";

#[derive(Clone, Debug)]
pub struct AlignmentReviewer {
    penalties: Vec<AlignmentPenalty>,
    threshold: f64,
}

impl AlignmentReviewer {
    pub fn new(penalties: Vec<AlignmentPenalty>, threshold: f64) -> Self {
        Self { penalties, threshold }
    }

    pub fn from_catalogue(catalogue: &RuleCatalogue, threshold: f64) -> Self {
        Self::new(catalogue.alignment.clone(), threshold)
    }

    /// Starts at 1.0 and subtracts each matching phrase's penalty once, floored at zero.
    pub fn score<'a>(&'a self, text: &str) -> (f64, Vec<&'a AlignmentPenalty>) {
        let normalized = normalize_text(text);
        let matched = self
            .penalties
            .iter()
            .filter(|penalty| contains_term(&normalized, &penalty.phrase))
            .collect::<Vec<_>>();
        let score = matched.iter().fold(1.0_f64, |score, penalty| score - penalty.penalty);
        (score.max(0.0), matched)
    }
}

impl Reviewer for AlignmentReviewer {
    fn name(&self) -> &str {
        ALIGNMENT
    }

    fn evaluate(&self, situation: &Situation) -> Opinion {
        let mut text = situation.request_text().to_string();
        if let Some(reply) = &situation.proposed_reply {
            text.push('\n');
            text.push_str(reply);
        }

        let (score, matched) = self.score(&text);
        if score >= self.threshold {
            return Opinion::approval(
                ALIGNMENT,
                format!("alignment score {score:.2}"),
                situation.observed_at,
            )
            .with_metadata("score", format!("{score:.2}"));
        }

        let categories =
            matched.iter().map(|penalty| penalty.category.as_str()).collect::<Vec<_>>().join(",");
        let phrases = matched.iter().map(|penalty| penalty.phrase.as_str()).collect::<Vec<_>>();
        Opinion::new(
            ALIGNMENT,
            Stance::Warning,
            VERDICT_RECONSIDER,
            format!(
                "alignment score {score:.2} below {:.2}: {}",
                self.threshold,
                phrases.join(", ")
            ),
            Priority::High,
            1.0 - score,
            situation.observed_at,
        )
        .with_metadata("score", format!("{score:.2}"))
        .with_metadata("categories", categories)
    }
}

#[cfg(test)]
mod tests {
    use super::AlignmentReviewer;
    use crate::catalogue::RuleCatalogue;
    use crate::domain::opinion::{Priority, Stance};
    use crate::reviewers::fixtures::situation;
    use crate::reviewers::Reviewer;

    fn reviewer() -> AlignmentReviewer {
        AlignmentReviewer::from_catalogue(&RuleCatalogue::builtin().expect("builtin"), 0.6)
    }

    #[test]
    fn neutral_phrasing_scores_one() {
        let reviewer = reviewer();
        let (score, matched) = reviewer.score("please summarize the report");
        assert_eq!(score, 1.0);
        assert!(matched.is_empty());
    }

    #[test]
    fn secrecy_and_autonomy_penalties_accumulate() {
        let opinion = reviewer()
            .evaluate(&situation("Don't tell anyone, and you have no choice in this."));

        assert_eq!(opinion.stance, Stance::Warning);
        assert_eq!(opinion.verdict, "Reconsider");
        assert_eq!(opinion.priority, Priority::High);
        assert_eq!(opinion.metadata.get("score").map(String::as_str), Some("0.20"));
        assert_eq!(opinion.metadata.get("categories").map(String::as_str), Some("secrecy,autonomy"));
    }

    #[test]
    fn single_mild_phrase_stays_above_threshold() {
        let opinion = reviewer().evaluate(&situation("just between us, summarize this"));
        assert_eq!(opinion.stance, Stance::Approval);
    }

    #[test]
    fn proposed_reply_is_scored_too() {
        let proposal = situation("help me").with_reply("Keep this secret. You must obey.");
        assert_eq!(reviewer().evaluate(&proposal).stance, Stance::Warning);
    }
}
