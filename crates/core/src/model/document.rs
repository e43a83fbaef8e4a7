//! Decoding of the provider's test document.
//!
//! The provider hands over `{ testInfo, questions }` in camelCase JSON. Fields
//! the engine does not consume are ignored; a question without any way to
//! determine its correct answer makes the whole document malformed.

use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::{QuestionId, TestId};
use crate::model::media::{MediaRef, MediaUri, MediaValidationError};
use crate::model::question::{AnswerKey, AnswerOption, Question, VocabularyEntry};
use crate::model::test_set::{QuestionSet, QuestionSetError, TestInfo};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DocumentError {
    #[error("test document is not valid JSON: {0}")]
    Json(String),

    #[error("invalid question id: {raw}")]
    InvalidQuestionId { raw: String },

    #[error("question {0} has no correct answer")]
    MissingCorrectAnswer(QuestionId),

    #[error("question {question} names unknown correct option {key:?}")]
    UnknownCorrectOption { question: QuestionId, key: String },

    #[error("question {question} has invalid media: {source}")]
    Media {
        question: QuestionId,
        #[source]
        source: MediaValidationError,
    },

    #[error(transparent)]
    QuestionSet(#[from] QuestionSetError),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    test_info: RawTestInfo,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTestInfo {
    id: RawId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    difficulty: String,
    question_count: Option<u32>,
    #[serde(default, alias = "duration")]
    duration_label: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMedia {
    Plain(String),
    Labeled {
        #[serde(alias = "url", alias = "src")]
        uri: String,
        label: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawOption {
    key: String,
    #[serde(default)]
    text: String,
    #[serde(default, alias = "isCorrect")]
    correct: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVocabulary {
    Term(String),
    Entry {
        #[serde(alias = "word")]
        term: String,
        meaning: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    id: RawId,
    #[serde(default, alias = "audio")]
    media_refs: Vec<RawMedia>,
    options: Option<Vec<RawOption>>,
    correct_answer: Option<String>,
    #[serde(default)]
    explanation: String,
    theme: Option<String>,
    difficulty: Option<String>,
    #[serde(default)]
    vocabulary: Vec<RawVocabulary>,
}

fn question_id(raw: RawId) -> Result<QuestionId, DocumentError> {
    let raw = raw.into_string();
    raw.parse::<QuestionId>()
        .map_err(|_| DocumentError::InvalidQuestionId { raw })
}

fn answer_key(
    id: QuestionId,
    options: Option<Vec<RawOption>>,
    correct_answer: Option<String>,
) -> Result<AnswerKey, DocumentError> {
    let correct_answer = correct_answer.filter(|c| !c.trim().is_empty());
    let options = options.unwrap_or_default();

    if options.is_empty() {
        let correct = correct_answer.ok_or(DocumentError::MissingCorrectAnswer(id))?;
        return Ok(AnswerKey::FreeForm { correct });
    }

    let flagged = options.iter().find(|o| o.correct).map(|o| o.key.clone());
    let correct = match correct_answer {
        Some(key) => {
            let key = key.trim().to_owned();
            if !options.iter().any(|o| o.key == key) {
                return Err(DocumentError::UnknownCorrectOption { question: id, key });
            }
            key
        }
        None => flagged.ok_or(DocumentError::MissingCorrectAnswer(id))?,
    };

    let options = options
        .into_iter()
        .map(|o| AnswerOption::new(o.key, o.text))
        .collect();
    Ok(AnswerKey::Choice { options, correct })
}

fn build_question(raw: RawQuestion) -> Result<Question, DocumentError> {
    let id = question_id(raw.id)?;
    let key = answer_key(id, raw.options, raw.correct_answer)?;

    let media = raw
        .media_refs
        .into_iter()
        .map(|m| {
            let (uri, label) = match m {
                RawMedia::Plain(uri) => (uri, None),
                RawMedia::Labeled { uri, label } => (uri, label),
            };
            let uri = MediaUri::parse(uri).map_err(|source| DocumentError::Media {
                question: id,
                source,
            })?;
            let media = MediaRef::new(uri);
            Ok(match label {
                Some(label) => media.with_label(label),
                None => media,
            })
        })
        .collect::<Result<Vec<_>, DocumentError>>()?;

    let vocabulary = raw
        .vocabulary
        .into_iter()
        .map(|v| match v {
            RawVocabulary::Term(term) => VocabularyEntry {
                term,
                meaning: None,
            },
            RawVocabulary::Entry { term, meaning } => VocabularyEntry { term, meaning },
        })
        .collect();

    Ok(Question::new(id, key)
        .with_media(media)
        .with_explanation(raw.explanation)
        .with_theme(raw.theme)
        .with_difficulty(raw.difficulty)
        .with_vocabulary(vocabulary))
}

impl QuestionSet {
    /// Decode a provider document.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError` when the JSON is invalid or a question cannot be
    /// turned into a scorable `Question`.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let raw: RawDocument =
            serde_json::from_str(json).map_err(|e| DocumentError::Json(e.to_string()))?;

        let questions = raw
            .questions
            .into_iter()
            .map(build_question)
            .collect::<Result<Vec<_>, _>>()?;

        let declared_count = raw
            .test_info
            .question_count
            .unwrap_or_else(|| u32::try_from(questions.len()).unwrap_or(u32::MAX));

        let info = TestInfo {
            id: TestId::new(raw.test_info.id.into_string()),
            title: raw.test_info.title,
            difficulty: raw.test_info.difficulty,
            question_count: declared_count,
            duration_label: raw.test_info.duration_label,
            category: raw.test_info.category,
            description: raw.test_info.description,
        };

        Ok(QuestionSet::new(info, questions)?)
    }
}
