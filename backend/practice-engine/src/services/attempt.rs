//! Per-question attempt lifecycle.
//!
//! `Active -> {Warned, Wrong, Correct}`, `Warned -> Active` on
//! acknowledgement. `Wrong` and `Correct` end the question instance.

use serde::{Deserialize, Serialize};

use crate::models::{AttemptOutcome, QuestionRecord};

/// Questions shown before this index of a regular sequence get a second try.
pub const TWO_ATTEMPT_WINDOW: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionState {
    Active,
    Warned,
    Wrong,
    Correct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptContext {
    /// Lesson or practice flow; `sequence_index` is 0-based.
    Regular { sequence_index: usize },
    /// Reviews and skip quizzes allow a single attempt everywhere.
    ReviewOrSkipQuiz,
}

impl AttemptContext {
    pub fn initial_attempts(self) -> u8 {
        match self {
            AttemptContext::ReviewOrSkipQuiz => 1,
            AttemptContext::Regular { sequence_index } if sequence_index < TWO_ATTEMPT_WINDOW => 2,
            AttemptContext::Regular { .. } => 1,
        }
    }
}

/// Something the session must forward: an outcome, and whether a reward fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptReport {
    pub outcome: AttemptOutcome,
    pub reward: bool,
}

#[derive(Debug, Clone)]
pub struct AttemptState {
    context: AttemptContext,
    state: QuestionState,
    attempts_remaining: u8,
    selected_option: Option<String>,
    warned_reported: bool,
    resolution_reported: bool,
}

impl AttemptState {
    pub fn new(context: AttemptContext) -> Self {
        Self {
            context,
            state: QuestionState::Active,
            attempts_remaining: context.initial_attempts(),
            selected_option: None,
            warned_reported: false,
            resolution_reported: false,
        }
    }

    pub fn state(&self) -> QuestionState {
        self.state
    }

    pub fn attempts_remaining(&self) -> u8 {
        self.attempts_remaining
    }

    pub fn selected_option(&self) -> Option<&str> {
        self.selected_option.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, QuestionState::Wrong | QuestionState::Correct)
    }

    /// Selection only changes while the question is active.
    pub fn select_option(&mut self, option_id: impl Into<String>) -> bool {
        if self.state != QuestionState::Active {
            return false;
        }
        self.selected_option = Some(option_id.into());
        true
    }

    /// Grades the selected option. Returns a report the first time each
    /// reportable transition happens and `None` otherwise, including for
    /// submissions without a selection or outside `Active`.
    pub fn submit(&mut self, question: &QuestionRecord) -> Option<AttemptReport> {
        if self.state != QuestionState::Active {
            return None;
        }
        let selected = self.selected_option.as_deref()?;

        if question.is_correct(selected) {
            self.state = QuestionState::Correct;
            return self.report_resolution(AttemptOutcome::Correct);
        }

        if self.context == AttemptContext::ReviewOrSkipQuiz || self.attempts_remaining <= 1 {
            self.state = QuestionState::Wrong;
            self.attempts_remaining = 0;
            return self.report_resolution(AttemptOutcome::Wrong);
        }

        self.state = QuestionState::Warned;
        self.attempts_remaining -= 1;
        if self.warned_reported {
            return None;
        }
        self.warned_reported = true;
        Some(AttemptReport {
            outcome: AttemptOutcome::Warned,
            reward: false,
        })
    }

    /// "Understood": back to `Active` with the selection cleared.
    pub fn acknowledge(&mut self) -> bool {
        if self.state != QuestionState::Warned {
            return false;
        }
        self.state = QuestionState::Active;
        self.selected_option = None;
        true
    }

    /// Starts the same question over as a new instance.
    pub fn reset(&mut self) {
        *self = Self::new(self.context);
    }

    fn report_resolution(&mut self, outcome: AttemptOutcome) -> Option<AttemptReport> {
        if self.resolution_reported {
            return None;
        }
        self.resolution_reported = true;

        // One resolution per instance, so at most one reward
        Some(AttemptReport {
            outcome,
            reward: outcome == AttemptOutcome::Correct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionKind, QuestionOption};

    fn question() -> QuestionRecord {
        QuestionRecord {
            lesson_id: 1,
            question_index: 2,
            kind: QuestionKind::Mcq,
            body: serde_json::Value::Null,
            options: ["a", "b", "c"]
                .iter()
                .map(|id| QuestionOption {
                    id: id.to_string(),
                    text: id.to_uppercase(),
                })
                .collect(),
            correct_answer: "a".to_string(),
        }
    }

    fn regular(index: usize) -> AttemptState {
        AttemptState::new(AttemptContext::Regular {
            sequence_index: index,
        })
    }

    #[test]
    fn attempt_budget_by_context() {
        assert_eq!(regular(0).attempts_remaining(), 2);
        assert_eq!(regular(5).attempts_remaining(), 2);
        assert_eq!(regular(6).attempts_remaining(), 1);
        assert_eq!(
            AttemptState::new(AttemptContext::ReviewOrSkipQuiz).attempts_remaining(),
            1
        );
    }

    #[test]
    fn regular_question_warns_then_fails() {
        let q = question();
        let mut attempt = regular(2);

        attempt.select_option("b");
        let first = attempt.submit(&q).expect("warned is reported");
        assert_eq!(first.outcome, AttemptOutcome::Warned);
        assert!(!first.reward);
        assert_eq!(attempt.state(), QuestionState::Warned);
        assert_eq!(attempt.attempts_remaining(), 1);

        assert!(attempt.acknowledge());
        assert_eq!(attempt.state(), QuestionState::Active);
        assert_eq!(attempt.selected_option(), None);

        attempt.select_option("c");
        let second = attempt.submit(&q).expect("wrong is reported");
        assert_eq!(second.outcome, AttemptOutcome::Wrong);
        assert_eq!(attempt.state(), QuestionState::Wrong);
        assert_eq!(attempt.attempts_remaining(), 0);
        assert!(attempt.is_resolved());
    }

    #[test]
    fn review_context_fails_immediately() {
        let q = question();
        for _ in 0..3 {
            let mut attempt = AttemptState::new(AttemptContext::ReviewOrSkipQuiz);
            attempt.select_option("b");
            let report = attempt.submit(&q).expect("wrong is reported");
            assert_eq!(report.outcome, AttemptOutcome::Wrong);
            assert_eq!(attempt.state(), QuestionState::Wrong);
        }
    }

    #[test]
    fn late_questions_have_one_attempt() {
        let q = question();
        let mut attempt = regular(7);
        attempt.select_option("b");
        assert_eq!(
            attempt.submit(&q).map(|r| r.outcome),
            Some(AttemptOutcome::Wrong)
        );
    }

    #[test]
    fn correct_rewards_exactly_once() {
        let q = question();
        let mut attempt = regular(0);
        attempt.select_option("a");
        let report = attempt.submit(&q).expect("correct is reported");
        assert_eq!(report.outcome, AttemptOutcome::Correct);
        assert!(report.reward);

        // Late duplicate events are ignored
        assert!(!attempt.select_option("b"));
        assert_eq!(attempt.submit(&q), None);
        assert_eq!(attempt.state(), QuestionState::Correct);
    }

    #[test]
    fn submit_without_selection_is_ignored() {
        let q = question();
        let mut attempt = regular(0);
        assert_eq!(attempt.submit(&q), None);
        assert_eq!(attempt.state(), QuestionState::Active);
        assert_eq!(attempt.attempts_remaining(), 2);
    }

    #[test]
    fn submit_while_warned_is_ignored() {
        let q = question();
        let mut attempt = regular(1);
        attempt.select_option("b");
        attempt.submit(&q);
        assert_eq!(attempt.submit(&q), None);
        assert_eq!(attempt.attempts_remaining(), 1);
        assert!(!attempt.select_option("a"));
    }

    #[test]
    fn acknowledge_only_from_warned() {
        let mut attempt = regular(0);
        assert!(!attempt.acknowledge());
    }

    #[test]
    fn warn_then_correct_reports_each_once() {
        let q = question();
        let mut attempt = regular(3);
        let mut reports = Vec::new();

        attempt.select_option("c");
        reports.extend(attempt.submit(&q));
        attempt.acknowledge();
        attempt.select_option("a");
        reports.extend(attempt.submit(&q));
        reports.extend(attempt.submit(&q));

        let outcomes: Vec<_> = reports.iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec![AttemptOutcome::Warned, AttemptOutcome::Correct]);
        assert!(reports[1].reward);
    }

    #[test]
    fn reset_starts_a_fresh_instance() {
        let q = question();
        let mut attempt = regular(0);
        attempt.select_option("a");
        attempt.submit(&q);

        attempt.reset();
        assert_eq!(attempt.state(), QuestionState::Active);
        assert_eq!(attempt.attempts_remaining(), 2);
        attempt.select_option("a");
        assert!(attempt.submit(&q).is_some_and(|r| r.reward));
    }
}
