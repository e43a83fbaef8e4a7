use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::duration::parse_duration_label;
use crate::model::ids::{QuestionId, TestId};
use crate::model::question::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionSetError {
    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),
}

/// Descriptive metadata of a test, snapshotted into every result record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    pub id: TestId,
    pub title: String,
    pub difficulty: String,
    pub question_count: u32,
    pub duration_label: String,
    pub category: String,
    pub description: String,
}

impl TestInfo {
    /// Declared duration in seconds (`0` when the label is unparsable).
    #[must_use]
    pub fn declared_duration_secs(&self) -> u32 {
        parse_duration_label(&self.duration_label)
    }
}

/// Ordered questions of one test plus its metadata.
///
/// Loaded once per session and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    info: TestInfo,
    questions: Vec<Question>,
}

impl QuestionSet {
    /// Build a question set, rejecting duplicate question ids.
    ///
    /// An empty list is accepted here; starting a session on it is refused by
    /// the session layer.
    ///
    /// # Errors
    ///
    /// Returns `QuestionSetError::DuplicateQuestion` if two questions share an id.
    pub fn new(info: TestInfo, questions: Vec<Question>) -> Result<Self, QuestionSetError> {
        let mut seen = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id()) {
                return Err(QuestionSetError::DuplicateQuestion(q.id()));
            }
        }
        Ok(Self { info, questions })
    }

    #[must_use]
    pub fn info(&self) -> &TestInfo {
        &self.info
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn position_of(&self, id: QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| q.id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn declared_duration_secs(&self) -> u32 {
        self.info.declared_duration_secs()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::model::question::AnswerKey;

    #[test]
    fn duplicate_ids_are_rejected() {
        let key = AnswerKey::FreeForm { correct: "x".into() };
        let questions = vec![
            Question::new(QuestionId::new(1), key.clone()),
            Question::new(QuestionId::new(1), key),
        ];
        let err = QuestionSet::new(info("5"), questions).unwrap_err();
        assert_eq!(err, QuestionSetError::DuplicateQuestion(QuestionId::new(1)));
    }

    #[test]
    fn lookups_follow_order() {
        let set = choice_set(3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.position_of(QuestionId::new(3)), Some(2));
        assert!(set.get(3).is_none());
        assert_eq!(set.declared_duration_secs(), 600);
    }
}
