use chrono::{DateTime, Utc};
use std::sync::Arc;

use listening_core::model::{CategoryId, ResultRecord, TestId};
use storage::repository::ResultStore;

use crate::error::SessionError;

/// Presentation-agnostic summary of a stored result.
///
/// This is intentionally **not** a UI view-model:
/// - no pre-formatted strings
/// - no localization assumptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSummaryItem {
    pub test_id: TestId,
    pub title: String,
    pub category: String,
    pub submitted_at: DateTime<Utc>,

    pub score: u8,
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
    pub total: u32,
    pub time_spent_secs: u32,
}

impl ResultSummaryItem {
    #[must_use]
    pub fn from_record(record: &ResultRecord) -> Self {
        let unanswered = record.answers().iter().filter(|o| !o.is_answered()).count();
        let unanswered = u32::try_from(unanswered).unwrap_or(u32::MAX);
        let total = record.total_questions();
        let correct = record.correct_count();
        Self {
            test_id: record.test_info().id.clone(),
            title: record.test_info().title.clone(),
            category: record.category_info().name.clone(),
            submitted_at: record.submitted_at(),
            score: record.score(),
            correct,
            incorrect: total.saturating_sub(correct).saturating_sub(unanswered),
            unanswered,
            total,
            time_spent_secs: record.time_spent_secs(),
        }
    }
}

/// Result page facade that hides the result store from the UI.
#[derive(Clone)]
pub struct ResultSummaryService {
    results: Arc<dyn ResultStore>,
}

impl ResultSummaryService {
    #[must_use]
    pub fn new(results: Arc<dyn ResultStore>) -> Self {
        Self { results }
    }

    /// Summary of the latest result for a test, if one is stored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the store cannot be read.
    pub async fn summary(
        &self,
        category: &CategoryId,
        test_id: &TestId,
    ) -> Result<Option<ResultSummaryItem>, SessionError> {
        let record = self.results.load(category, test_id).await?;
        Ok(record.as_ref().map(ResultSummaryItem::from_record))
    }
}
