//! Rebuilds a stored attempt for per-question review.

use std::sync::Arc;

use listening_core::model::{
    CategoryId, NO_ANSWER, Question, QuestionSet, ResultRecord, TestId,
};
use storage::provider::QuestionProvider;
use storage::repository::ResultStore;
use tracing::{debug, warn};

use crate::error::ReviewError;
use crate::navigation::Cursor;
use crate::playback::{LoadOptions, MediaBackend, Player};

/// One reviewed question with the answer given and the expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem<'a> {
    /// 1-based position in the test.
    pub number: usize,
    pub question: &'a Question,
    pub user_answer: &'a str,
    pub correct_answer: &'a str,
    pub is_correct: bool,
}

impl ReviewItem<'_> {
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.user_answer != NO_ANSWER
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        self.question.explanation()
    }
}

#[derive(Clone)]
pub struct ReviewService {
    results: Arc<dyn ResultStore>,
    questions: Arc<dyn QuestionProvider>,
    backend: Arc<dyn MediaBackend>,
    autoplay: bool,
}

impl ReviewService {
    #[must_use]
    pub fn new(
        results: Arc<dyn ResultStore>,
        questions: Arc<dyn QuestionProvider>,
        backend: Arc<dyn MediaBackend>,
    ) -> Self {
        Self {
            results,
            questions,
            backend,
            autoplay: false,
        }
    }

    #[must_use]
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// Open the stored result for a test, positioned at question `start`
    /// (1-based; anything outside the test falls back to the first question).
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NoResult` when no readable result is stored,
    /// `ReviewError::Provider` when the test cannot be loaded, and
    /// `ReviewError::QuestionMissing` when the stored answers reference a
    /// question the test no longer contains.
    pub async fn open(
        &self,
        category: &CategoryId,
        test_id: &TestId,
        start: Option<u32>,
    ) -> Result<ReviewSession, ReviewError> {
        let no_result = || ReviewError::NoResult {
            category: category.clone(),
            test_id: test_id.clone(),
        };
        let record = match self.results.load(category, test_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(no_result()),
            Err(e) => {
                warn!(%category, %test_id, error = %e, "result store unreadable; treating as missing");
                return Err(no_result());
            }
        };

        let set = self.questions.fetch(category, test_id).await?;
        if let Some(orphan) = record
            .answers()
            .iter()
            .find(|o| set.position_of(o.question_id).is_none())
        {
            return Err(ReviewError::QuestionMissing(orphan.question_id));
        }

        let start_index = start
            .and_then(|n| usize::try_from(n).ok())
            .and_then(|n| n.checked_sub(1))
            .unwrap_or(0);
        let mut session = ReviewSession {
            cursor: Cursor::new(set.len(), start_index),
            record,
            set,
            player: Player::new(Arc::clone(&self.backend)),
            autoplay: self.autoplay,
        };
        session.sync_media();
        debug!(%category, %test_id, index = session.cursor.index(), "review opened");
        Ok(session)
    }
}

/// Navigable replay of one stored attempt.
#[derive(Debug)]
pub struct ReviewSession {
    record: ResultRecord,
    set: Arc<QuestionSet>,
    cursor: Cursor,
    player: Player,
    autoplay: bool,
}

impl ReviewSession {
    #[must_use]
    pub fn record(&self) -> &ResultRecord {
        &self.record
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.cursor.index()
    }

    #[must_use]
    pub fn current(&self) -> Option<ReviewItem<'_>> {
        let index = self.cursor.index();
        let question = self.set.get(index)?;
        let item = match self.record.outcome_for(question.id()) {
            Some(outcome) => ReviewItem {
                number: index + 1,
                question,
                user_answer: &outcome.user_answer,
                correct_answer: &outcome.correct_answer,
                is_correct: outcome.is_correct,
            },
            None => ReviewItem {
                number: index + 1,
                question,
                user_answer: NO_ANSWER,
                correct_answer: question.correct_answer(),
                is_correct: false,
            },
        };
        Some(item)
    }

    /// Load the current question's first media reference, or release the
    /// player if it has none.
    fn sync_media(&mut self) {
        let media = self
            .set
            .get(self.cursor.index())
            .and_then(Question::primary_media)
            .map(|m| m.uri().clone());
        match media {
            Some(uri) => {
                let options = LoadOptions {
                    autoplay: self.autoplay,
                };
                if let Err(e) = self.player.load(uri, options) {
                    warn!(error = %e, "review audio unavailable");
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

    pub fn next(&mut self) -> bool {
        let moved = self.cursor.next();
        self.after_move(moved)
    }

    pub fn previous(&mut self) -> bool {
        let moved = self.cursor.previous();
        self.after_move(moved)
    }

    /// Jump to the 0-based `index`; out-of-range targets are ignored.
    pub fn jump_to(&mut self, index: isize) -> bool {
        let moved = self.cursor.go_to(index);
        self.after_move(moved)
    }

    #[must_use]
    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    /// Release the playback resource.
    pub fn close(&mut self) {
        self.player.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{PlaybackState, SimulatedBackend};
    use listening_core::model::{AnswerLedger, CategoryInfo, QuestionId};
    use listening_core::scorer::score_attempt;
    use listening_core::time::fixed_now;
    use storage::provider::InMemoryQuestionProvider;
    use storage::repository::{InMemoryResultStore, ResultKey};

    const DOC: &str = r#"{"testInfo":{"id":"t2","durationLabel":"5 minutes"},
        "questions":[
            {"id":1,"mediaRefs":["q1.mp3"],"options":[{"key":"A","correct":true},{"key":"B"}],
             "explanation":"The speaker says 'yes'."},
            {"id":2,"options":[{"key":"A"},{"key":"B","correct":true}]},
            {"id":3,"mediaRefs":[{"uri":"q3.mp3","label":"Part 2"}],"correctAnswer":"blue"}
        ]}"#;

    struct Fixture {
        store: InMemoryResultStore,
        backend: SimulatedBackend,
        service: ReviewService,
    }

    fn fixture() -> Fixture {
        let store = InMemoryResultStore::new();
        let provider = InMemoryQuestionProvider::new();
        provider
            .insert(CategoryId::new("ielts"), QuestionSet::from_json(DOC).unwrap())
            .unwrap();
        let backend = SimulatedBackend::new(45.0);
        let service = ReviewService::new(
            Arc::new(store.clone()),
            Arc::new(provider),
            Arc::new(backend.clone()),
        );
        Fixture {
            store,
            backend,
            service,
        }
    }

    async fn store_attempt(store: &InMemoryResultStore) {
        let set = QuestionSet::from_json(DOC).unwrap();
        let mut ledger = AnswerLedger::new();
        ledger.set(QuestionId::new(1), "A");
        ledger.set(QuestionId::new(2), "A");
        let record = ResultRecord::new(
            set.info().clone(),
            CategoryInfo {
                id: CategoryId::new("ielts"),
                name: "IELTS".into(),
            },
            score_attempt(&set, &ledger),
            90,
            fixed_now(),
        );
        store
            .save(&CategoryId::new("ielts"), &TestId::new("t2"), &record)
            .await
            .unwrap();
    }

    fn key() -> (CategoryId, TestId) {
        (CategoryId::new("ielts"), TestId::new("t2"))
    }

    #[tokio::test]
    async fn missing_or_malformed_result_reads_as_no_result() {
        let fx = fixture();
        let (cat, test) = key();
        let err = fx.service.open(&cat, &test, None).await.unwrap_err();
        assert!(matches!(err, ReviewError::NoResult { .. }));

        fx.store
            .insert_raw(ResultKey::new(&cat, &test), "{broken")
            .unwrap();
        let err = fx.service.open(&cat, &test, None).await.unwrap_err();
        assert!(matches!(err, ReviewError::NoResult { .. }));
    }

    #[tokio::test]
    async fn items_pair_stored_answers_with_questions() {
        let fx = fixture();
        store_attempt(&fx.store).await;
        let (cat, test) = key();
        let mut review = fx.service.open(&cat, &test, None).await.unwrap();

        let first = review.current().unwrap();
        assert_eq!(first.number, 1);
        assert!(first.is_correct);
        assert_eq!(first.explanation(), "The speaker says 'yes'.");

        assert!(review.next());
        let second = review.current().unwrap();
        assert_eq!((second.user_answer, second.correct_answer), ("A", "B"));
        assert!(!second.is_correct);

        assert!(review.next());
        let third = review.current().unwrap();
        assert!(!third.is_answered());
        assert_eq!(third.correct_answer, "blue");
    }

    #[tokio::test]
    async fn start_position_is_validated() {
        let fx = fixture();
        store_attempt(&fx.store).await;
        let (cat, test) = key();

        assert_eq!(fx.service.open(&cat, &test, Some(3)).await.unwrap().index(), 2);
        assert_eq!(fx.service.open(&cat, &test, Some(4)).await.unwrap().index(), 0);
        assert_eq!(fx.service.open(&cat, &test, Some(0)).await.unwrap().index(), 0);
    }

    #[tokio::test]
    async fn navigation_is_bounded_and_drives_the_player() {
        let fx = fixture();
        store_attempt(&fx.store).await;
        let (cat, test) = key();
        let mut review = fx.service.open(&cat, &test, None).await.unwrap();
        review.player_mut().drain_events().await;
        assert_eq!(review.player().state(), &PlaybackState::Ready);

        assert!(!review.jump_to(-1));
        assert!(!review.jump_to(3));
        assert!(!review.previous());
        assert_eq!(review.index(), 0);

        assert!(review.jump_to(1));
        assert_eq!(review.player().state(), &PlaybackState::Idle);
        assert_eq!(fx.backend.live_resources(), 0);

        assert!(review.jump_to(2));
        assert_eq!(fx.backend.live_resources(), 1);
        assert_eq!(fx.backend.opened(), 2);

        review.close();
        assert_eq!(fx.backend.live_resources(), 0);
    }
}
