//! Heuristic stage classification over ILGA action phrases.

use crate::types::{Chamber, Stage};

/// A stage and the phrases that select it
#[derive(Debug, Clone, Copy)]
pub struct StageRule {
    pub phrases: &'static [&'static str],
    pub stage: Stage,
}

impl StageRule {
    /// `haystack` must already be lower-cased
    pub fn matches(&self, haystack: &str) -> bool {
        self.phrases.iter().any(|phrase| haystack.contains(phrase))
    }
}

/// Checked against the last action, top to bottom. Final outcomes come
/// first so "Approved by Governor" beats a later "Vetoed" in the same text.
pub const LAST_ACTION_RULES: &[StageRule] = &[
    StageRule {
        phrases: &["approved by governor", "public act"],
        stage: Stage::Signed,
    },
    StageRule {
        phrases: &["sent to the governor", "to the governor"],
        stage: Stage::AwaitingSignature,
    },
    StageRule {
        phrases: &["passed both", "enrolled"],
        stage: Stage::Enrolled,
    },
    StageRule {
        phrases: &["passed senate"],
        stage: Stage::PassedSenate,
    },
    StageRule {
        phrases: &["passed house"],
        stage: Stage::PassedHouse,
    },
    StageRule {
        phrases: &["vetoed", "failed", "did not pass", "tabled", "withdrawn"],
        stage: Stage::Failed,
    },
];

/// Checked against the whole action history when no last-action rule
/// fired. A bill that crossed in both directions resolves to the Senate.
pub const HISTORY_RULES: &[StageRule] = &[
    StageRule {
        phrases: &["passed house", "arrive in senate"],
        stage: Stage::InSenateCommittee,
    },
    StageRule {
        phrases: &["passed senate", "arrive in house"],
        stage: Stage::InHouseCommittee,
    },
];

fn first_match(rules: &[StageRule], haystack: &str) -> Option<Stage> {
    rules
        .iter()
        .find(|rule| rule.matches(haystack))
        .map(|rule| rule.stage)
}

/// Classify a bill. Total: every input maps to exactly one stage, and the
/// result is never `Unknown`.
pub fn classify(last_action: &str, action_history: &[String], prefix: &str) -> Stage {
    if let Some(stage) = first_match(LAST_ACTION_RULES, &last_action.to_lowercase()) {
        return stage;
    }

    let history = action_history.join(" ").to_lowercase();
    first_match(HISTORY_RULES, &history)
        .unwrap_or_else(|| Chamber::from_prefix(prefix).committee_stage())
}
