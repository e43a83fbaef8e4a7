use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use listening_core::Clock;
use listening_core::model::{
    AnswerLedger, CategoryInfo, Question, QuestionId, QuestionSet, ResultRecord, SessionPhase,
};
use listening_core::scorer::score_attempt;
use storage::repository::ResultStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::progress::SessionProgress;
use super::state::{Command, SessionState, SubmitTrigger, Submission, Transition};
use crate::error::SessionError;
use crate::timer::CountdownTimer;

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Scores a closed session, persists it and publishes the record.
struct Finisher {
    set: Arc<QuestionSet>,
    category: CategoryInfo,
    results: Arc<dyn ResultStore>,
    clock: Clock,
    published: watch::Sender<Option<ResultRecord>>,
}

impl Finisher {
    async fn finish(&self, submission: Submission) -> ResultRecord {
        let scorecard = score_attempt(&self.set, &submission.ledger);
        let record = ResultRecord::new(
            self.set.info().clone(),
            self.category.clone(),
            scorecard,
            submission.time_spent_secs,
            self.clock.now(),
        );

        let test_id = &self.set.info().id;
        match self.results.save(&self.category.id, test_id, &record).await {
            Ok(()) => info!(
                category = %self.category.id,
                %test_id,
                trigger = ?submission.trigger,
                score = record.score(),
                "result saved"
            ),
            // The attempt still completes; review will report the result as missing.
            Err(e) => warn!(category = %self.category.id, %test_id, error = %e, "failed to save result"),
        }

        self.published.send_replace(Some(record.clone()));
        record
    }
}

/// State machine for one timed attempt at a test.
///
/// Composes the countdown, the answer ledger and the scorer. A controller is
/// single-use: once submitted, a retake needs a new controller.
pub struct SessionController {
    set: Arc<QuestionSet>,
    state: Arc<Mutex<SessionState>>,
    timer: CountdownTimer,
    finisher: Arc<Finisher>,
    disposed: bool,
}

impl SessionController {
    /// Create a controller for `set`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` for a set without questions and
    /// `SessionError::InvalidDuration` when the declared duration is not a
    /// positive number of minutes.
    pub fn new(
        set: Arc<QuestionSet>,
        category: CategoryInfo,
        results: Arc<dyn ResultStore>,
    ) -> Result<Self, SessionError> {
        if set.is_empty() {
            return Err(SessionError::Empty);
        }
        if set.declared_duration_secs() == 0 {
            return Err(SessionError::InvalidDuration {
                label: set.info().duration_label.clone(),
            });
        }

        let (published, _) = watch::channel(None);
        let finisher = Arc::new(Finisher {
            set: Arc::clone(&set),
            category,
            results,
            clock: Clock::default(),
            published,
        });
        Ok(Self {
            state: Arc::new(Mutex::new(SessionState::new(Arc::clone(&set)))),
            set,
            timer: CountdownTimer::new(),
            finisher,
            disposed: false,
        })
    }

    /// Stamp submissions with `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        if let Some(finisher) = Arc::get_mut(&mut self.finisher) {
            finisher.clock = clock;
        }
        self
    }

    fn apply(&self, command: Command) -> Result<Transition, SessionError> {
        lock(&self.state).apply(command)
    }

    /// Begin the attempt and start the countdown.
    ///
    /// When the countdown runs out the session submits itself; use
    /// [`watch_result`](Self::watch_result) to observe that. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` unless the session is `NotStarted`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let Transition::Started { duration_secs } = self.apply(Command::Start)? else {
            return Ok(());
        };

        let state = Arc::clone(&self.state);
        self.timer.on_tick(move |remaining| {
            let _ = lock(&state).apply(Command::Tick(remaining));
        });

        let state = Arc::clone(&self.state);
        let finisher = Arc::clone(&self.finisher);
        self.timer.on_expire(move || {
            let transition = lock(&state).apply(Command::Submit(SubmitTrigger::Expired));
            if let Ok(Transition::Submitted(submission)) = transition {
                let finisher = Arc::clone(&finisher);
                tokio::spawn(async move {
                    finisher.finish(submission).await;
                });
            }
        });

        self.timer.start(duration_secs);
        Ok(())
    }

    /// Record `option` as the answer to `question`, replacing any earlier answer.
    ///
    /// Returns the replaced answer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active attempt and
    /// `SessionError::UnknownQuestion` for ids not in the test.
    pub fn select_answer(
        &self,
        question: QuestionId,
        option: impl Into<String>,
    ) -> Result<Option<String>, SessionError> {
        match self.apply(Command::Select {
            question,
            option: option.into(),
        })? {
            Transition::Answered { previous } => Ok(previous),
            _ => Ok(None),
        }
    }

    /// Toggle the review flag on `question`; returns whether it is now flagged.
    ///
    /// # Errors
    ///
    /// Same as [`select_answer`](Self::select_answer).
    pub fn toggle_flag(&self, question: QuestionId) -> Result<bool, SessionError> {
        Ok(matches!(
            self.apply(Command::ToggleFlag(question))?,
            Transition::Flagged(true)
        ))
    }

    fn moved(&self, command: Command) -> Result<bool, SessionError> {
        Ok(matches!(self.apply(command)?, Transition::Moved(true)))
    }

    /// Jump to the question at `index`; out-of-range targets are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active attempt.
    pub fn go_to(&self, index: isize) -> Result<bool, SessionError> {
        self.moved(Command::GoTo(index))
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active attempt.
    pub fn next(&self) -> Result<bool, SessionError> {
        self.moved(Command::Next)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside an active attempt.
    pub fn previous(&self) -> Result<bool, SessionError> {
        self.moved(Command::Previous)
    }

    /// Submit on the user's request.
    ///
    /// Returns `None` if the session was already submitted (for example by the
    /// countdown a moment earlier); the record is then available through
    /// [`wait_for_result`](Self::wait_for_result).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` if the session never started.
    pub async fn submit(&mut self) -> Result<Option<ResultRecord>, SessionError> {
        let transition = self.apply(Command::Submit(SubmitTrigger::User))?;
        let Transition::Submitted(submission) = transition else {
            return Ok(None);
        };
        self.timer.stop();
        Ok(Some(self.finisher.finish(submission).await))
    }

    /// Receiver that holds `Some(record)` once submission completed.
    #[must_use]
    pub fn watch_result(&self) -> watch::Receiver<Option<ResultRecord>> {
        self.finisher.published.subscribe()
    }

    /// Wait until the session has been submitted and its record handed to the store.
    ///
    /// Returns `None` right away for a session that was never started or was
    /// disposed before submission.
    pub async fn wait_for_result(&self) -> Option<ResultRecord> {
        match self.phase() {
            SessionPhase::NotStarted => return None,
            SessionPhase::InProgress if self.disposed => return None,
            _ => {}
        }
        let mut rx = self.watch_result();
        let published = rx.wait_for(Option::is_some).await.ok()?;
        (*published).clone()
    }

    /// Stop the countdown. Answers stay readable; no submission happens.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.timer.stop();
        self.disposed = true;
        debug!(test_id = %self.set.info().id, phase = ?self.phase(), "session disposed");
    }

    #[must_use]
    pub fn question_set(&self) -> &Arc<QuestionSet> {
        &self.set
    }

    #[must_use]
    pub fn category(&self) -> &CategoryInfo {
        &self.finisher.category
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        lock(&self.state).phase()
    }

    /// Snapshot of the answers given so far.
    #[must_use]
    pub fn ledger(&self) -> AnswerLedger {
        lock(&self.state).ledger().clone()
    }

    #[must_use]
    pub fn answer_for(&self, question: QuestionId) -> Option<String> {
        lock(&self.state).ledger().get(question).map(str::to_owned)
    }

    #[must_use]
    pub fn is_flagged(&self, question: QuestionId) -> bool {
        lock(&self.state).is_flagged(question)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        lock(&self.state).cursor().index()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.set.get(self.current_index())
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        lock(&self.state).remaining_secs()
    }

    /// What closed the session, once it is submitted.
    #[must_use]
    pub fn submitted_by(&self) -> Option<SubmitTrigger> {
        lock(&self.state).submitted_by()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        lock(&self.state).progress()
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("test_id", &self.set.info().id)
            .field("category", &self.finisher.category.id)
            .field("phase", &self.phase())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}
