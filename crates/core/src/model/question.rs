use crate::model::ids::QuestionId;
use crate::model::media::MediaRef;

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// A selectable option of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    pub key: String,
    pub text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// How a question is answered and what counts as correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    /// Pick one of `options`; `correct` holds the key of the right option.
    Choice {
        options: Vec<AnswerOption>,
        correct: String,
    },
    /// Type the answer; compared case-insensitively with whitespace collapsed.
    FreeForm { correct: String },
}

impl AnswerKey {
    #[must_use]
    pub fn correct_answer(&self) -> &str {
        match self {
            AnswerKey::Choice { correct, .. } | AnswerKey::FreeForm { correct } => correct,
        }
    }

    /// Options for choice questions; empty for free-form ones.
    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        match self {
            AnswerKey::Choice { options, .. } => options,
            AnswerKey::FreeForm { .. } => &[],
        }
    }

    #[must_use]
    pub fn is_correct(&self, answer: &str) -> bool {
        match self {
            AnswerKey::Choice { correct, .. } => answer.trim() == correct.trim(),
            AnswerKey::FreeForm { correct } => normalize_free_form(answer) == normalize_free_form(correct),
        }
    }
}

fn normalize_free_form(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

//
// ─── VOCABULARY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub term: String,
    pub meaning: Option<String>,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single listening question as delivered by the question provider.
///
/// Immutable once built; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    media: Vec<MediaRef>,
    key: AnswerKey,
    explanation: String,
    theme: Option<String>,
    difficulty: Option<String>,
    vocabulary: Vec<VocabularyEntry>,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, key: AnswerKey) -> Self {
        Self {
            id,
            media: Vec::new(),
            key,
            explanation: String::new(),
            theme: None,
            difficulty: None,
            vocabulary: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_media(mut self, media: Vec<MediaRef>) -> Self {
        self.media = media;
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    #[must_use]
    pub fn with_theme(mut self, theme: Option<String>) -> Self {
        self.theme = theme;
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Option<String>) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Vec<VocabularyEntry>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn media(&self) -> &[MediaRef] {
        &self.media
    }

    /// The recording played when the question is shown, if any.
    #[must_use]
    pub fn primary_media(&self) -> Option<&MediaRef> {
        self.media.first()
    }

    #[must_use]
    pub fn key(&self) -> &AnswerKey {
        &self.key
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        self.key.correct_answer()
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    #[must_use]
    pub fn vocabulary(&self) -> &[VocabularyEntry] {
        &self.vocabulary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice() -> AnswerKey {
        AnswerKey::Choice {
            options: vec![AnswerOption::new("A", "north"), AnswerOption::new("B", "south")],
            correct: "B".into(),
        }
    }

    #[test]
    fn choice_compares_option_key() {
        let key = choice();
        assert!(key.is_correct("B"));
        assert!(key.is_correct(" B "));
        assert!(!key.is_correct("b"));
        assert!(!key.is_correct("A"));
        assert_eq!(key.options().len(), 2);
    }

    #[test]
    fn free_form_ignores_case_and_spacing() {
        let key = AnswerKey::FreeForm {
            correct: "Tuesday  morning".into(),
        };
        assert!(key.is_correct("tuesday morning"));
        assert!(key.is_correct("  TUESDAY\tmorning "));
        assert!(!key.is_correct("tuesday"));
        assert!(key.options().is_empty());
    }

    #[test]
    fn question_exposes_primary_media() {
        let q = Question::new(QuestionId::new(1), choice());
        assert!(q.primary_media().is_none());
        assert_eq!(q.correct_answer(), "B");
    }
}
