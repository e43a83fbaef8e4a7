//! Pure scoring of an attempt against its question set.

use crate::model::{AnswerLedger, NO_ANSWER, QuestionOutcome, QuestionSet};

/// Result of scoring a ledger: per-question outcomes in question order plus totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scorecard {
    pub outcomes: Vec<QuestionOutcome>,
    pub correct_count: u32,
    pub total_questions: u32,
    pub score: u8,
}

/// `correct / total` as a 0–100 percentage, rounded half up.
///
/// Defined as `0` when `total` is `0`.
#[must_use]
pub fn percentage(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    // round(100c/t) == floor((200c + t) / 2t) for non-negative values.
    let rounded = (200 * correct + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

/// Score `ledger` against `set`.
///
/// Questions without a ledger entry are recorded with [`NO_ANSWER`] and count
/// as incorrect. Ledger entries for ids not in the set are ignored.
#[must_use]
pub fn score_attempt(set: &QuestionSet, ledger: &AnswerLedger) -> Scorecard {
    let outcomes: Vec<QuestionOutcome> = set
        .questions()
        .iter()
        .map(|question| {
            let answer = ledger.get(question.id());
            QuestionOutcome {
                question_id: question.id(),
                user_answer: answer.unwrap_or(NO_ANSWER).to_owned(),
                correct_answer: question.correct_answer().to_owned(),
                is_correct: answer.is_some_and(|a| question.key().is_correct(a)),
            }
        })
        .collect();

    let correct_count = u32::try_from(outcomes.iter().filter(|o| o.is_correct).count())
        .unwrap_or(u32::MAX);
    let total_questions = u32::try_from(outcomes.len()).unwrap_or(u32::MAX);

    Scorecard {
        score: percentage(correct_count, total_questions),
        outcomes,
        correct_count,
        total_questions,
    }
}
