use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use listening_core::model::{
    CategoryId, CategoryInfo, QuestionId, QuestionSet, ResultRecord, SessionPhase, TestId,
};
use listening_core::time::fixed_clock;
use services::{
    AppServices, AssessmentService, PlaybackState, ReviewError, SimulatedBackend, SubmitTrigger,
};
use storage::provider::InMemoryQuestionProvider;
use storage::repository::{InMemoryResultStore, ResultStore, Storage, StorageError};

/// Ten choice questions, every odd one with audio; correct option is "B".
fn ten_question_doc(duration: &str) -> String {
    let questions: Vec<String> = (1..=10)
        .map(|id| {
            let media = if id % 2 == 1 {
                format!(r#""mediaRefs":["audio/q{id}.mp3"],"#)
            } else {
                String::new()
            };
            format!(
                r#"{{"id":{id},{media}"options":[{{"key":"A"}},{{"key":"B","correct":true}},{{"key":"C"}}]}}"#
            )
        })
        .collect();
    format!(
        r#"{{"testInfo":{{"id":"cambridge-1","title":"Cambridge 1","durationLabel":"{duration}","category":"IELTS"}},
            "questions":[{}]}}"#,
        questions.join(",")
    )
}

fn ielts() -> CategoryInfo {
    CategoryInfo {
        id: CategoryId::new("ielts"),
        name: "IELTS".into(),
    }
}

fn provider(duration: &str) -> Arc<InMemoryQuestionProvider> {
    let provider = InMemoryQuestionProvider::new();
    provider
        .insert(
            ielts().id,
            QuestionSet::from_json(&ten_question_doc(duration)).unwrap(),
        )
        .unwrap();
    Arc::new(provider)
}

/// Result store that counts saves and can be slowed down.
#[derive(Clone, Default)]
struct CountingStore {
    inner: InMemoryResultStore,
    saves: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

#[async_trait]
impl ResultStore for CountingStore {
    async fn save(
        &self,
        category: &CategoryId,
        test_id: &TestId,
        record: &ResultRecord,
    ) -> Result<(), StorageError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(category, test_id, record).await
    }

    async fn load(
        &self,
        category: &CategoryId,
        test_id: &TestId,
    ) -> Result<Option<ResultRecord>, StorageError> {
        self.inner.load(category, test_id).await
    }
}

fn assessments(store: &CountingStore, backend: &SimulatedBackend) -> AssessmentService {
    AssessmentService::new(
        fixed_clock(),
        Arc::new(store.clone()),
        provider("1 minutes"),
        Arc::new(backend.clone()),
    )
}

#[tokio::test(start_paused = true)]
async fn user_submit_racing_expiry_saves_exactly_once() {
    let store = CountingStore::default();
    let backend = SimulatedBackend::new(20.0);
    let mut live = assessments(&store, &backend)
        .open(ielts(), &TestId::new("cambridge-1"))
        .await
        .unwrap();
    live.start().unwrap();
    live.select_answer(QuestionId::new(1), "B").unwrap();

    // Wake at the same instant the countdown expires.
    tokio::time::sleep(Duration::from_secs(60)).await;
    let by_user = live.submit().await.unwrap();
    let second = live.submit().await.unwrap();
    let record = live.wait_for_result().await.expect("record published");

    assert_eq!(second, None);
    match live.controller().submitted_by() {
        Some(SubmitTrigger::Expired) => {
            assert_eq!(by_user, None);
            assert_eq!(record.time_spent_secs(), 60);
        }
        Some(SubmitTrigger::User) => {
            assert_eq!(by_user, Some(record.clone()));
            // The final tick may not have been mirrored yet at the same instant.
            assert!((59..=60).contains(&record.time_spent_secs()));
        }
        None => panic!("session closed without a trigger"),
    }
    assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    assert_eq!(record.correct_count(), 1);
    assert_eq!(record.score(), 10);
    assert_eq!(live.controller().phase(), SessionPhase::Submitted);
}

#[tokio::test(start_paused = true)]
async fn slow_user_save_is_not_duplicated_by_expiry() {
    let store = CountingStore {
        delay: Some(Duration::from_secs(30)),
        ..CountingStore::default()
    };
    let backend = SimulatedBackend::new(20.0);
    let mut live = assessments(&store, &backend)
        .open(ielts(), &TestId::new("cambridge-1"))
        .await
        .unwrap();
    live.start().unwrap();

    tokio::time::sleep(Duration::from_secs(50)).await;
    let record = live.submit().await.unwrap().expect("user wins");
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(record.time_spent_secs(), 50);
    assert_eq!(store.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn expiry_submits_unanswered_attempt_and_releases_audio() {
    let store = CountingStore::default();
    let backend = SimulatedBackend::new(20.0);
    let mut live = assessments(&store, &backend)
        .open(ielts(), &TestId::new("cambridge-1"))
        .await
        .unwrap();
    live.start().unwrap();
    assert_eq!(backend.live_resources(), 1);

    let record = live.wait_for_result().await.expect("expiry submits");
    assert_eq!(record.score(), 0);
    assert_eq!(record.time_spent_secs(), 60);
    assert!(record.answers().iter().all(|o| !o.is_answered()));
    assert_eq!(backend.live_resources(), 0);
}

#[tokio::test(start_paused = true)]
async fn blocked_autoplay_is_silent_and_playable_after_gesture() {
    let store = CountingStore::default();
    let backend = SimulatedBackend::new(20.0);
    backend.block_autoplay();
    let mut live = assessments(&store, &backend)
        .with_autoplay(true)
        .open(ielts(), &TestId::new("cambridge-1"))
        .await
        .unwrap();
    live.start().unwrap();

    let state = live.player_mut().next_event().await;
    assert_eq!(state, PlaybackState::Ready);
    assert_eq!(backend.play_attempts(), 2);
    assert_eq!(live.controller().phase(), SessionPhase::InProgress);

    backend.grant_user_gesture();
    live.player_mut().play().await.unwrap();
    assert_eq!(live.player().state(), &PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn broken_audio_does_not_stop_the_session() {
    let store = CountingStore::default();
    let backend = SimulatedBackend::new(20.0);
    backend.fail_source("audio/q1.mp3");
    let mut live = assessments(&store, &backend)
        .open(ielts(), &TestId::new("cambridge-1"))
        .await
        .unwrap();
    live.start().unwrap();
    live.player_mut().drain_events().await;
    assert!(matches!(live.player().state(), PlaybackState::Error(_)));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(live.controller().remaining(), 55);
    live.select_answer(QuestionId::new(1), "B").unwrap();
    assert!(live.go_to(2).unwrap());
    live.player_mut().drain_events().await;
    assert_eq!(live.player().state(), &PlaybackState::Ready);
}

#[tokio::test(start_paused = true)]
async fn expiry_wins_when_it_fires_before_the_user() {
    let store = CountingStore::default();
    let backend = SimulatedBackend::new(20.0);
    let mut live = assessments(&store, &backend)
        .open(ielts(), &TestId::new("cambridge-1"))
        .await
        .unwrap();
    live.start().unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(live.submit().await.unwrap(), None);
    let record = live.wait_for_result().await.expect("expiry submits");

    assert_eq!(live.controller().submitted_by(), Some(SubmitTrigger::Expired));
    assert_eq!(record.time_spent_secs(), 60);
    assert_eq!(store.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn question_without_audio_leaves_player_idle() {
    let store = CountingStore::default();
    let backend = SimulatedBackend::new(20.0);
    let mut live = assessments(&store, &backend)
        .open(ielts(), &TestId::new("cambridge-1"))
        .await
        .unwrap();
    live.start().unwrap();
    live.player_mut().drain_events().await;

    assert!(live.next().unwrap());
    let state =
        tokio::time::timeout(Duration::from_secs(1), live.player_mut().next_event()).await;
    assert_eq!(state, Ok(PlaybackState::Idle));
    assert_eq!(backend.live_resources(), 0);
}

#[tokio::test]
async fn sqlite_backed_attempt_can_be_reviewed() {
    let backend = SimulatedBackend::new(20.0);
    let app = AppServices::new_sqlite(
        "sqlite::memory:",
        provider("10 minutes"),
        Arc::new(backend.clone()),
        fixed_clock(),
    )
    .await
    .unwrap();
    let (cat, test) = (ielts().id, TestId::new("cambridge-1"));

    let missing = app.reviews().open(&cat, &test, None).await.unwrap_err();
    assert!(matches!(missing, ReviewError::NoResult { .. }));

    let mut live = app.assessments().open(ielts(), &test).await.unwrap();
    live.start().unwrap();
    for id in 1..=6 {
        live.select_answer(QuestionId::new(id), if id <= 4 { "B" } else { "A" })
            .unwrap();
    }
    // Revise one answer before submitting.
    live.select_answer(QuestionId::new(6), "B").unwrap();
    let record = live.submit().await.unwrap().unwrap();
    assert_eq!(record.correct_count(), 5);
    assert_eq!(record.score(), 50);
    assert!(record.time_spent_secs() < 600);

    let summary = app.summaries().summary(&cat, &test).await.unwrap().unwrap();
    assert_eq!((summary.correct, summary.incorrect, summary.unanswered), (5, 1, 4));

    let mut review = app.reviews().open(&cat, &test, Some(5)).await.unwrap();
    assert_eq!(review.record(), &record);
    let item = review.current().unwrap();
    assert_eq!((item.number, item.user_answer, item.is_correct), (5, "A", false));

    assert!(!review.jump_to(-1));
    assert!(!review.jump_to(10));
    assert!(review.jump_to(9));
    assert_eq!(review.current().unwrap().user_answer, "No answer");
    review.close();
    assert_eq!(backend.live_resources(), 0);
}

#[tokio::test]
async fn rework_overwrites_previous_result() {
    let storage = Storage::with_provider(provider("10 minutes"));
    let backend = SimulatedBackend::new(20.0);
    let app = AppServices::new(&storage, Arc::new(backend), fixed_clock());
    let test = TestId::new("cambridge-1");

    let mut first = app.assessments().open(ielts(), &test).await.unwrap();
    first.start().unwrap();
    let first_record = first.submit().await.unwrap().unwrap();

    let mut retake = app.assessments().rework(&first_record).await.unwrap();
    retake.start().unwrap();
    retake.select_answer(QuestionId::new(1), "B").unwrap();
    let second_record = retake.submit().await.unwrap().unwrap();

    let stored = storage
        .results
        .load(&ielts().id, &test)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(first_record.token(), second_record.token());
    assert_eq!(stored.token(), second_record.token());
    assert_eq!(stored.score(), 10);
}
