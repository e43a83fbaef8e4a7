use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::ids::{CategoryId, QuestionId};
use crate::model::test_set::TestInfo;
use crate::scorer::{Scorecard, percentage};

/// Stored in place of a user answer for questions left blank.
pub const NO_ANSWER: &str = "No answer";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultRecordError {
    #[error("total questions ({total}) does not match outcome count ({outcomes})")]
    OutcomeCountMismatch { total: u32, outcomes: usize },

    #[error("correct count ({stored}) does not match outcomes ({counted})")]
    CorrectCountMismatch { stored: u32, counted: u32 },

    #[error("score {stored} does not match {correct}/{total}")]
    ScoreMismatch { stored: u8, correct: u32, total: u32 },
}

/// Category metadata snapshotted at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
    pub id: CategoryId,
    pub name: String,
}

/// Per-question line of a result record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    /// The chosen option, or [`NO_ANSWER`].
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
}

impl QuestionOutcome {
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.user_answer != NO_ANSWER
    }
}

/// Outcome of one submitted attempt.
///
/// Built exactly once when a session is submitted and never mutated; the
/// `token` distinguishes two attempts at the same test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    test_info: TestInfo,
    category_info: CategoryInfo,
    answers: Vec<QuestionOutcome>,
    score: u8,
    correct_count: u32,
    total_questions: u32,
    time_spent_secs: u32,
    submitted_at: DateTime<Utc>,
    token: Uuid,
}

impl ResultRecord {
    #[must_use]
    pub fn new(
        test_info: TestInfo,
        category_info: CategoryInfo,
        scorecard: Scorecard,
        time_spent_secs: u32,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            test_info,
            category_info,
            answers: scorecard.outcomes,
            score: scorecard.score,
            correct_count: scorecard.correct_count,
            total_questions: scorecard.total_questions,
            time_spent_secs,
            submitted_at,
            token: Uuid::new_v4(),
        }
    }

    /// Check the internal consistency of a decoded record.
    ///
    /// # Errors
    ///
    /// Returns `ResultRecordError` when totals, correct count or score disagree
    /// with the per-question outcomes.
    pub fn validate(&self) -> Result<(), ResultRecordError> {
        if usize::try_from(self.total_questions).ok() != Some(self.answers.len()) {
            return Err(ResultRecordError::OutcomeCountMismatch {
                total: self.total_questions,
                outcomes: self.answers.len(),
            });
        }

        let counted = self.answers.iter().filter(|a| a.is_correct).count();
        let counted = u32::try_from(counted).unwrap_or(u32::MAX);
        if counted != self.correct_count {
            return Err(ResultRecordError::CorrectCountMismatch {
                stored: self.correct_count,
                counted,
            });
        }

        if self.score != percentage(self.correct_count, self.total_questions) {
            return Err(ResultRecordError::ScoreMismatch {
                stored: self.score,
                correct: self.correct_count,
                total: self.total_questions,
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn test_info(&self) -> &TestInfo {
        &self.test_info
    }

    #[must_use]
    pub fn category_info(&self) -> &CategoryInfo {
        &self.category_info
    }

    #[must_use]
    pub fn answers(&self) -> &[QuestionOutcome] {
        &self.answers
    }

    #[must_use]
    pub fn outcome_for(&self, question_id: QuestionId) -> Option<&QuestionOutcome> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> u32 {
        self.time_spent_secs
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    #[must_use]
    pub fn token(&self) -> Uuid {
        self.token
    }
}
