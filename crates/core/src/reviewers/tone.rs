use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::catalogue::RuleCatalogue;
use crate::config::CouncilConfig;
use crate::domain::opinion::{Opinion, Priority, Stance};
use crate::reviewers::{Reviewer, Situation, TONE};
use crate::text::{all_matches, normalize_text};

pub const VERDICT_SOFTEN: &str = "Soften";
pub const VERDICT_PAUSE: &str = "Pause";

const MAX_WINDOW_SECS: u64 = 365 * 24 * 3600;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StressWindow {
    pub span: Duration,
    pub threshold: usize,
    pub capacity: usize,
}

impl StressWindow {
    pub fn from_config(config: &CouncilConfig) -> Self {
        Self {
            span: Duration::seconds(config.tone_window_secs.min(MAX_WINDOW_SECS) as i64),
            threshold: config.tone_stress_threshold.max(1),
            capacity: config.tone_window_capacity.max(1),
        }
    }
}

/// Checks the proposed reply for condescension and the interaction rate for sustained
/// engagement. Interaction timestamps are a set, so the same moment never counts twice.
#[derive(Clone, Debug)]
pub struct ToneReviewer {
    condescension: Vec<String>,
    window: StressWindow,
    interactions: BTreeSet<DateTime<Utc>>,
}

impl ToneReviewer {
    pub fn new(condescension: Vec<String>, window: StressWindow) -> Self {
        Self { condescension, window, interactions: BTreeSet::new() }
    }

    pub fn from_catalogue(catalogue: &RuleCatalogue, config: &CouncilConfig) -> Self {
        Self::new(catalogue.tone.condescension.clone(), StressWindow::from_config(config))
    }

    /// Interactions inside the trailing window ending at `now`, counting `now` itself.
    pub fn recent_interactions(&self, now: DateTime<Utc>) -> usize {
        let since = now - self.window.span;
        let recorded = self.interactions.range(since..=now).count();
        if self.interactions.contains(&now) {
            recorded
        } else {
            recorded + 1
        }
    }

    pub fn record(&mut self, at: DateTime<Utc>) {
        self.interactions.insert(at);
        while self.interactions.len() > self.window.capacity {
            self.interactions.pop_first();
        }
    }
}

impl Reviewer for ToneReviewer {
    fn name(&self) -> &str {
        TONE
    }

    fn evaluate(&self, situation: &Situation) -> Opinion {
        let reply = situation.proposed_reply.as_deref().map(normalize_text).unwrap_or_default();
        let markers = all_matches(&reply, &self.condescension);
        let recent = self.recent_interactions(situation.observed_at);
        let stressed = recent >= self.window.threshold;

        if markers.is_empty() && !stressed {
            return Opinion::approval(TONE, "tone and pace are fine", situation.observed_at);
        }

        let opinion = if markers.is_empty() {
            Opinion::new(
                TONE,
                Stance::Suggestion,
                VERDICT_PAUSE,
                format!("{recent} interactions in the current window; suggest a break"),
                Priority::Low,
                0.6,
                situation.observed_at,
            )
        } else {
            Opinion::new(
                TONE,
                Stance::Suggestion,
                VERDICT_SOFTEN,
                format!("reply sounds condescending: {}", markers.join(", ")),
                Priority::Medium,
                (0.5 + 0.1 * markers.len() as f64).min(0.9),
                situation.observed_at,
            )
            .with_metadata("markers", markers.join(","))
        };

        opinion.with_metadata("stressed", stressed.to_string())
    }

    fn observe(&mut self, situation: &Situation) {
        self.record(situation.observed_at);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::{StressWindow, ToneReviewer};
    use crate::catalogue::RuleCatalogue;
    use crate::domain::opinion::{Priority, Stance};
    use crate::reviewers::fixtures::{at, situation};
    use crate::reviewers::Reviewer;

    fn reviewer(threshold: usize) -> ToneReviewer {
        let catalogue = RuleCatalogue::builtin().expect("builtin");
        ToneReviewer::new(
            catalogue.tone.condescension,
            StressWindow { span: Duration::seconds(600), threshold, capacity: 64 },
        )
    }

    #[test]
    fn condescending_reply_gets_a_soften_suggestion() {
        let proposal = situation("why").with_reply("Obviously, as I already said, it is easy.");
        let opinion = reviewer(20).evaluate(&proposal);

        assert_eq!(opinion.stance, Stance::Suggestion);
        assert_eq!(opinion.verdict, "Soften");
        assert_eq!(opinion.priority, Priority::Medium);
    }

    #[test]
    fn polite_reply_is_approved() {
        let proposal = situation("why").with_reply("Here is how it works.");
        assert_eq!(reviewer(20).evaluate(&proposal).stance, Stance::Approval);
    }

    #[test]
    fn sustained_engagement_suggests_a_pause() {
        let mut tone = reviewer(3);
        tone.record(at(0));
        tone.record(at(100));

        let mut proposal = situation("again");
        proposal.observed_at = at(200);
        let opinion = tone.evaluate(&proposal);
        assert_eq!(opinion.verdict, "Pause");

        let mut later = situation("again");
        later.observed_at = at(5_000);
        assert_eq!(tone.evaluate(&later).stance, Stance::Approval);
    }

    #[test]
    fn same_moment_is_counted_once() {
        let mut tone = reviewer(2);
        let proposal = situation("hi");
        tone.observe(&proposal);
        tone.observe(&proposal);
        assert_eq!(tone.recent_interactions(proposal.observed_at), 1);
    }

    #[test]
    fn window_capacity_drops_oldest() {
        let mut tone = ToneReviewer::new(
            Vec::new(),
            StressWindow { span: Duration::seconds(10_000), threshold: 100, capacity: 2 },
        );
        for second in 0..5 {
            tone.record(at(second));
        }
        assert_eq!(tone.recent_interactions(at(10)), 3);
    }
}
