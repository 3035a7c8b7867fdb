use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::answer_store::AnswerEventStore;
use super::attempt::{AttemptContext, AttemptReport, AttemptState, QuestionState};
use super::collaborators::RewardSink;
use super::pool_builder::PoolBuilder;
use super::sampler::sample;
use crate::config::PracticeSettings;
use crate::metrics::{ATTEMPT_OUTCOMES_TOTAL, PRACTICE_SESSIONS_ACTIVE, PRACTICE_SESSIONS_TOTAL};
use crate::models::{
    AttemptOutcome, LearningPath, LessonId, PracticeMode, QuestionKey, QuestionRecord,
    ScoredCandidate, SessionStatus, SessionSummary,
};

/// Result of asking for a session. An empty pool is a normal terminal state.
pub enum PracticeStart {
    Ready(PracticeSession),
    NoPracticeAvailable,
}

impl PracticeStart {
    pub fn into_session(self) -> Option<PracticeSession> {
        match self {
            PracticeStart::Ready(session) => Some(session),
            PracticeStart::NoPracticeAvailable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    /// Another question is ready at [`PracticeSession::current`].
    Next,
    Completed(SessionSummary),
    Exhausted(SessionSummary),
}

pub struct PracticeSessionController {
    store: Arc<AnswerEventStore>,
    pools: PoolBuilder,
    rewards: Arc<dyn RewardSink>,
    settings: PracticeSettings,
    rng: Mutex<StdRng>,
}

impl PracticeSessionController {
    pub fn new(
        store: Arc<AnswerEventStore>,
        pools: PoolBuilder,
        rewards: Arc<dyn RewardSink>,
        settings: PracticeSettings,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            store,
            pools,
            rewards,
            settings,
            rng: Mutex::new(rng),
        }
    }

    pub fn settings(&self) -> &PracticeSettings {
        &self.settings
    }

    /// Single-lesson practice: a bounded draw over every question of the lesson.
    pub async fn start_lesson_practice(&self, lesson_id: LessonId) -> Result<PracticeStart> {
        let mode = PracticeMode::LessonPractice;
        let pool = self.pools.lesson_pool(lesson_id).await?;
        let queue = self.draw(&pool, self.settings.lesson_practice_questions);

        if queue.is_empty() {
            return Ok(self.unavailable(mode, &[lesson_id]));
        }

        // Count target: the session ends once every drawn question was shown
        let target = queue.len() as f64;
        Ok(PracticeStart::Ready(self.open(
            mode,
            queue,
            target,
            self.settings.lesson_practice_reward,
        )))
    }

    /// Personalized practice for the practice slot at `slot_index` of `path`.
    pub async fn start_personalized_practice(
        &self,
        path: &LearningPath,
        slot_index: usize,
    ) -> Result<PracticeStart> {
        let lessons = path.previous_lessons(slot_index, self.settings.personalized_source_lessons);
        self.start_personalized_from_lessons(&lessons).await
    }

    pub async fn start_personalized_from_lessons(
        &self,
        lesson_ids: &[LessonId],
    ) -> Result<PracticeStart> {
        let mode = PracticeMode::PersonalizedPractice;
        if lesson_ids.is_empty() {
            return Ok(self.unavailable(mode, lesson_ids));
        }

        let pool = self.pools.personalized_pool(lesson_ids).await?;
        let queue = self.draw(&pool, self.settings.personalized_initial_draw);

        if queue.is_empty() {
            return Ok(self.unavailable(mode, lesson_ids));
        }

        Ok(PracticeStart::Ready(self.open(
            mode,
            queue,
            self.settings.personalized_target,
            self.settings.personalized_reward,
        )))
    }

    fn draw(&self, pool: &[ScoredCandidate], k: usize) -> Vec<ScoredCandidate> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sample(pool, k, &mut *rng)
    }

    fn unavailable(&self, mode: PracticeMode, lesson_ids: &[LessonId]) -> PracticeStart {
        info!("No {} available for lessons {:?}", mode, lesson_ids);
        PRACTICE_SESSIONS_TOTAL
            .with_label_values(&[mode.label(), "unavailable"])
            .inc();
        PracticeStart::NoPracticeAvailable
    }

    fn open(
        &self,
        mode: PracticeMode,
        queue: Vec<ScoredCandidate>,
        target: f64,
        reward_amount: u32,
    ) -> PracticeSession {
        let session = PracticeSession::new(
            mode,
            queue,
            target,
            self.store.clone(),
            self.rewards.clone(),
            reward_amount,
        );

        PRACTICE_SESSIONS_TOTAL
            .with_label_values(&[mode.label(), "started"])
            .inc();

        info!(
            "Practice session started: {} ({}, {} questions queued, target {})",
            session.id,
            mode,
            session.queue.len(),
            target
        );
        session
    }
}

/// One learner's practice run. Owned by the caller and driven one UI event
/// at a time; nothing in it is shared with other sessions.
pub struct PracticeSession {
    id: String,
    mode: PracticeMode,
    queue: Vec<ScoredCandidate>,
    cursor: usize,
    progress: f64,
    target: f64,
    shown: usize,
    seen_keys: HashSet<QuestionKey>,
    pending_replenish: Vec<ScoredCandidate>,
    attempt: AttemptState,
    credited: bool,
    status: SessionStatus,
    correct: u32,
    warned: u32,
    wrong: u32,
    store: Arc<AnswerEventStore>,
    rewards: Arc<dyn RewardSink>,
    reward_amount: u32,
    recordings: Vec<JoinHandle<()>>,
}

impl PracticeSession {
    fn new(
        mode: PracticeMode,
        queue: Vec<ScoredCandidate>,
        target: f64,
        store: Arc<AnswerEventStore>,
        rewards: Arc<dyn RewardSink>,
        reward_amount: u32,
    ) -> Self {
        let mut seen_keys = HashSet::new();
        if let Some(first) = queue.first() {
            seen_keys.insert(first.key());
        }
        PRACTICE_SESSIONS_ACTIVE.inc();

        Self {
            id: Uuid::new_v4().to_string(),
            mode,
            queue,
            cursor: 0,
            progress: 0.0,
            target,
            shown: usize::from(!seen_keys.is_empty()),
            seen_keys,
            pending_replenish: Vec::new(),
            attempt: AttemptState::new(AttemptContext::Regular { sequence_index: 0 }),
            credited: false,
            status: SessionStatus::InProgress,
            correct: 0,
            warned: 0,
            wrong: 0,
            store,
            rewards,
            reward_amount,
            recordings: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Progress for an indicator, in `0.0..=1.0`.
    pub fn progress_fraction(&self) -> f64 {
        if self.target <= 0.0 {
            return 1.0;
        }
        (self.progress / self.target).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        match self.mode {
            PracticeMode::LessonPractice => self.cursor >= self.queue.len(),
            PracticeMode::PersonalizedPractice => self.progress >= self.target,
        }
    }

    /// Questions queued so far, including replenished ones.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_replenish(&self) -> &[ScoredCandidate] {
        &self.pending_replenish
    }

    /// The question being shown, while the session is in progress.
    pub fn current(&self) -> Option<&QuestionRecord> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        self.queue.get(self.cursor).map(|candidate| &candidate.question)
    }

    pub fn question_state(&self) -> QuestionState {
        self.attempt.state()
    }

    pub fn attempts_remaining(&self) -> u8 {
        self.attempt.attempts_remaining()
    }

    pub fn select_option(&mut self, option_id: impl Into<String>) -> bool {
        self.current().is_some() && self.attempt.select_option(option_id)
    }

    /// Grades the current selection and returns the outcome if it is reported.
    ///
    /// Warned and wrong outcomes are written to the answer store on a task
    /// detached onto the current Tokio runtime; the session moves on without
    /// waiting for the write. Outside a runtime the write is skipped and logged.
    pub fn submit(&mut self) -> Option<AttemptOutcome> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        let candidate = self.queue.get(self.cursor)?.clone();

        let report = self.attempt.submit(&candidate.question)?;
        self.apply_report(&candidate, report);
        Some(report.outcome)
    }

    /// "Understood" after a warning.
    pub fn acknowledge(&mut self) -> bool {
        self.status == SessionStatus::InProgress && self.attempt.acknowledge()
    }

    /// Moves past a resolved question. Returns `None` while the current
    /// question is still unresolved or the session is over.
    pub fn advance(&mut self) -> Option<SessionStep> {
        if self.status != SessionStatus::InProgress || !self.attempt.is_resolved() {
            return None;
        }

        self.cursor += 1;

        if self.mode == PracticeMode::PersonalizedPractice {
            if self.progress >= self.target {
                return Some(SessionStep::Completed(self.finish(SessionStatus::Completed)));
            }
            if self.cursor >= self.queue.len() && !self.replenish() {
                return Some(SessionStep::Exhausted(self.finish(SessionStatus::Exhausted)));
            }
        } else if self.cursor >= self.queue.len() {
            return Some(SessionStep::Completed(self.finish(SessionStatus::Completed)));
        }

        self.attempt = AttemptState::new(AttemptContext::Regular {
            sequence_index: self.cursor,
        });
        self.credited = false;
        self.shown += 1;
        if let Some(next) = self.queue.get(self.cursor) {
            self.seen_keys.insert(next.key());
        }
        Some(SessionStep::Next)
    }

    /// Abandons the session. Writes already detached still run to completion.
    pub fn quit(&mut self) -> SessionSummary {
        if self.status == SessionStatus::InProgress {
            return self.finish(SessionStatus::Abandoned);
        }
        self.summary()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            mode: self.mode,
            status: self.status,
            questions_shown: self.shown,
            distinct_questions: self.seen_keys.len(),
            correct: self.correct,
            warned: self.warned,
            wrong: self.wrong,
            progress: self.progress,
            target: self.target,
        }
    }

    /// Waits for every detached answer write started so far. Returns how many
    /// were awaited.
    pub async fn drain_recordings(&mut self) -> usize {
        let handles = std::mem::take(&mut self.recordings);
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Answer recording task did not finish: {}", e);
            }
        }
        count
    }

    fn apply_report(&mut self, candidate: &ScoredCandidate, report: AttemptReport) {
        let outcome = report.outcome;
        ATTEMPT_OUTCOMES_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();

        match outcome {
            AttemptOutcome::Correct => self.correct += 1,
            AttemptOutcome::Warned => self.warned += 1,
            AttemptOutcome::Wrong => self.wrong += 1,
        }

        // Lesson practice counts correct answers; personalized practice only
        // credits the first reported outcome of an instance
        self.progress += match (self.mode, outcome) {
            (PracticeMode::LessonPractice, AttemptOutcome::Correct) => 1.0,
            (PracticeMode::LessonPractice, _) => 0.0,
            (PracticeMode::PersonalizedPractice, _) if self.credited => 0.0,
            (PracticeMode::PersonalizedPractice, AttemptOutcome::Correct) => 1.0,
            (PracticeMode::PersonalizedPractice, AttemptOutcome::Warned) => 0.5,
            (PracticeMode::PersonalizedPractice, AttemptOutcome::Wrong) => 0.0,
        };
        self.credited = true;

        if report.reward {
            self.rewards.reward(self.reward_amount);
        }

        if outcome != AttemptOutcome::Correct {
            let key = candidate.key();
            if self.mode == PracticeMode::PersonalizedPractice
                && !self.pending_replenish.iter().any(|pending| pending.key() == key)
            {
                self.pending_replenish.push(candidate.clone());
            }
            self.record_detached(key, outcome);
        }

        debug!(
            "Session {}: question {} -> {} (progress {}/{})",
            self.id,
            candidate.key(),
            outcome,
            self.progress,
            self.target
        );
    }

    fn record_detached(&mut self, key: QuestionKey, outcome: AttemptOutcome) {
        self.recordings.retain(|handle| !handle.is_finished());

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(
                    "Session {}: {} for question {} not recorded: {}",
                    self.id, outcome, key, e
                );
                return;
            }
        };

        let store = self.store.clone();
        let session_id = self.id.clone();
        self.recordings.push(runtime.spawn(async move {
            if let Err(e) = store
                .record(key.lesson_id, key.question_index, outcome)
                .await
            {
                error!(
                    "Session {}: failed to record {} for question {}: {}",
                    session_id, outcome, key, e
                );
            }
        }));
    }

    /// Re-queues this session's warned/wrong questions, oldest first, when the
    /// queue runs dry short of the target.
    fn replenish(&mut self) -> bool {
        if self.pending_replenish.is_empty() {
            return false;
        }

        let remaining = self.target - self.progress;
        let wanted = (remaining * 2.0).ceil().max(1.0) as usize;
        let pending = std::mem::take(&mut self.pending_replenish);
        let added = wanted.min(pending.len());
        self.queue.extend(pending.into_iter().take(wanted));

        info!(
            "Session {}: replenished {} questions ({} score units short)",
            self.id, added, remaining
        );
        true
    }

    fn finish(&mut self, status: SessionStatus) -> SessionSummary {
        self.status = status;
        PRACTICE_SESSIONS_TOTAL
            .with_label_values(&[self.mode.label(), status.label()])
            .inc();
        PRACTICE_SESSIONS_ACTIVE.dec();

        let summary = self.summary();
        info!(
            "Practice session {} {}: {} shown, {} correct, {} warned, {} wrong, progress {}/{}",
            self.id,
            status.label(),
            summary.questions_shown,
            summary.correct,
            summary.warned,
            summary.wrong,
            summary.progress,
            summary.target
        );
        summary
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        if self.status == SessionStatus::InProgress {
            self.finish(SessionStatus::Abandoned);
        }
    }
}
