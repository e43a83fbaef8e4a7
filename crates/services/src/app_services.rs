use std::sync::Arc;

use storage::provider::QuestionProvider;
use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::playback::MediaBackend;
use crate::review::ReviewService;
use crate::sessions::{AssessmentService, ResultSummaryService};

/// Assembles app-facing services over one result store, one question
/// provider and one playback backend.
#[derive(Clone)]
pub struct AppServices {
    assessments: Arc<AssessmentService>,
    reviews: Arc<ReviewService>,
    summaries: Arc<ResultSummaryService>,
}

impl AppServices {
    /// Build services over an existing `Storage`.
    #[must_use]
    pub fn new(storage: &Storage, backend: Arc<dyn MediaBackend>, clock: Clock) -> Self {
        let assessments = Arc::new(AssessmentService::new(
            clock,
            Arc::clone(&storage.results),
            Arc::clone(&storage.questions),
            Arc::clone(&backend),
        ));
        let reviews = Arc::new(ReviewService::new(
            Arc::clone(&storage.results),
            Arc::clone(&storage.questions),
            backend,
        ));
        let summaries = Arc::new(ResultSummaryService::new(Arc::clone(&storage.results)));
        Self {
            assessments,
            reviews,
            summaries,
        }
    }

    /// Build services whose results live in `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        questions: Arc<dyn QuestionProvider>,
        backend: Arc<dyn MediaBackend>,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url, questions).await?;
        Ok(Self::new(&storage, backend, clock))
    }

    /// Turn autoplay of question audio on or off for attempts and reviews.
    #[must_use]
    pub fn with_autoplay(self, autoplay: bool) -> Self {
        Self {
            assessments: Arc::new((*self.assessments).clone().with_autoplay(autoplay)),
            reviews: Arc::new((*self.reviews).clone().with_autoplay(autoplay)),
            summaries: self.summaries,
        }
    }

    #[must_use]
    pub fn assessments(&self) -> Arc<AssessmentService> {
        Arc::clone(&self.assessments)
    }

    #[must_use]
    pub fn reviews(&self) -> Arc<ReviewService> {
        Arc::clone(&self.reviews)
    }

    #[must_use]
    pub fn summaries(&self) -> Arc<ResultSummaryService> {
        Arc::clone(&self.summaries)
    }
}
