use std::sync::Arc;

use listening_core::Clock;
use listening_core::model::{CategoryInfo, QuestionId, ResultRecord, TestId};
use storage::provider::QuestionProvider;
use storage::repository::ResultStore;
use tracing::{debug, warn};

use super::controller::SessionController;
use crate::error::SessionError;
use crate::playback::{LoadOptions, MediaBackend, Player};

/// Opens attempts: loads the question set, builds a fresh controller and
/// pairs it with a player for the question audio.
#[derive(Clone)]
pub struct AssessmentService {
    clock: Clock,
    results: Arc<dyn ResultStore>,
    questions: Arc<dyn QuestionProvider>,
    backend: Arc<dyn MediaBackend>,
    autoplay: bool,
}

impl AssessmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        results: Arc<dyn ResultStore>,
        questions: Arc<dyn QuestionProvider>,
        backend: Arc<dyn MediaBackend>,
    ) -> Self {
        Self {
            clock,
            results,
            questions,
            backend,
            autoplay: false,
        }
    }

    /// Start question audio automatically when it is ready.
    #[must_use]
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// Load a test and prepare a not-yet-started attempt.
    ///
    /// # Errors
    ///
    /// Returns a data error (`SessionError::Provider`, `Empty`,
    /// `InvalidDuration`) when the test cannot be attempted. No partial
    /// session is created in that case.
    pub async fn open(
        &self,
        category: CategoryInfo,
        test_id: &TestId,
    ) -> Result<LiveSession, SessionError> {
        let set = self.questions.fetch(&category.id, test_id).await?;
        let controller = SessionController::new(set, category, Arc::clone(&self.results))?
            .with_clock(self.clock);
        debug!(%test_id, "attempt prepared");
        Ok(LiveSession {
            controller,
            player: Player::new(Arc::clone(&self.backend)),
            autoplay: self.autoplay,
        })
    }

    /// Prepare a new attempt at the test behind `previous`.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub async fn rework(&self, previous: &ResultRecord) -> Result<LiveSession, SessionError> {
        self.open(previous.category_info().clone(), &previous.test_info().id)
            .await
    }
}

/// A live attempt: the session controller plus the player showing the
/// current question's audio.
///
/// Moving between questions swaps the player's source. Dropping or disposing
/// the session releases both the countdown and the playback resource.
#[derive(Debug)]
pub struct LiveSession {
    controller: SessionController,
    player: Player,
    autoplay: bool,
}

impl LiveSession {
    /// Start the countdown and load the first question's audio.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` if the attempt already began.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.controller.start()?;
        self.sync_media();
        Ok(())
    }

    /// Point the player at the current question's first media reference.
    ///
    /// Playback failures stay local to the question and are only logged.
    fn sync_media(&mut self) {
        let media = self
            .controller
            .current_question()
            .and_then(|q| q.primary_media())
            .map(|m| m.uri().clone());

        match media {
            Some(uri) if self.player.snapshot().source.as_ref() == Some(&uri) => {}
            Some(uri) => {
                let options = LoadOptions {
                    autoplay: self.autoplay,
                };
                if let Err(e) = self.player.load(uri, options) {
                    warn!(error = %e, "question audio unavailable");
                }
            }
            None => self.player.dispose(),
        }
    }

    fn after_move(&mut self, moved: bool) -> bool {
        if moved {
            self.sync_media();
        }
        moved
    }

    /// # Errors
    ///
    /// See [`SessionController::go_to`].
    pub fn go_to(&mut self, index: isize) -> Result<bool, SessionError> {
        let moved = self.controller.go_to(index)?;
        Ok(self.after_move(moved))
    }

    /// # Errors
    ///
    /// See [`SessionController::next`].
    pub fn next(&mut self) -> Result<bool, SessionError> {
        let moved = self.controller.next()?;
        Ok(self.after_move(moved))
    }

    /// # Errors
    ///
    /// See [`SessionController::previous`].
    pub fn previous(&mut self) -> Result<bool, SessionError> {
        let moved = self.controller.previous()?;
        Ok(self.after_move(moved))
    }

    /// # Errors
    ///
    /// See [`SessionController::select_answer`].
    pub fn select_answer(
        &self,
        question: QuestionId,
        option: impl Into<String>,
    ) -> Result<Option<String>, SessionError> {
        self.controller.select_answer(question, option)
    }

    /// # Errors
    ///
    /// See [`SessionController::toggle_flag`].
    pub fn toggle_flag(&self, question: QuestionId) -> Result<bool, SessionError> {
        self.controller.toggle_flag(question)
    }

    /// Submit and release the player.
    ///
    /// # Errors
    ///
    /// See [`SessionController::submit`].
    pub async fn submit(&mut self) -> Result<Option<ResultRecord>, SessionError> {
        let record = self.controller.submit().await?;
        self.player.dispose();
        Ok(record)
    }

    /// Wait for the submitted record (user- or expiry-driven) and release the player.
    pub async fn wait_for_result(&mut self) -> Option<ResultRecord> {
        let record = self.controller.wait_for_result().await;
        self.player.dispose();
        record
    }

    pub fn dispose(&mut self) {
        self.controller.dispose();
        self.player.dispose();
    }

    #[must_use]
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    #[must_use]
    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }
}
