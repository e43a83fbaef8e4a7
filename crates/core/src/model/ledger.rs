use std::collections::BTreeMap;

use crate::model::ids::QuestionId;

/// The answers chosen during one attempt, at most one per question.
///
/// Writes always replace the previous value; no history is kept. The ledger
/// does not check options against the question or the session phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerLedger {
    answers: BTreeMap<QuestionId, String>,
}

impl AnswerLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `option` for `question_id`, returning the replaced answer if any.
    pub fn set(&mut self, question_id: QuestionId, option: impl Into<String>) -> Option<String> {
        self.answers.insert(question_id, option.into())
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&str> {
        self.answers.get(&question_id).map(String::as_str)
    }

    #[must_use]
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.answers.contains_key(&question_id)
    }

    /// Number of distinct questions with an answer.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Answers ordered by question id.
    pub fn entries(&self) -> impl Iterator<Item = (QuestionId, &str)> {
        self.answers.iter().map(|(id, answer)| (*id, answer.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_writes_win() {
        let mut ledger = AnswerLedger::new();
        assert_eq!(ledger.set(QuestionId::new(1), "A"), None);
        assert_eq!(ledger.set(QuestionId::new(1), "B"), Some("A".to_string()));
        assert_eq!(ledger.get(QuestionId::new(1)), Some("B"));
        assert_eq!(ledger.answered_count(), 1);
    }

    #[test]
    fn counts_distinct_questions() {
        let mut ledger = AnswerLedger::new();
        ledger.set(QuestionId::new(2), "C");
        ledger.set(QuestionId::new(1), "A");
        ledger.set(QuestionId::new(2), "D");
        assert_eq!(ledger.answered_count(), 2);
        let entries: Vec<_> = ledger.entries().collect();
        assert_eq!(entries, vec![(QuestionId::new(1), "A"), (QuestionId::new(2), "D")]);
        assert!(!ledger.is_answered(QuestionId::new(3)));
    }

    #[test]
    fn options_are_not_validated() {
        let mut ledger = AnswerLedger::new();
        ledger.set(QuestionId::new(9), "not-an-option");
        assert_eq!(ledger.get(QuestionId::new(9)), Some("not-an-option"));
    }
}
