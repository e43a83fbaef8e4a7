mod document;
mod ids;
mod ledger;
mod media;
mod question;
mod result;
mod session;
pub(crate) mod test_set;

pub use document::DocumentError;
pub use ids::{CategoryId, ParseIdError, QuestionId, TestId};
pub use ledger::AnswerLedger;
pub use media::{MediaRef, MediaUri, MediaValidationError};
pub use question::{AnswerKey, AnswerOption, Question, VocabularyEntry};
pub use result::{CategoryInfo, QuestionOutcome, ResultRecord, ResultRecordError, NO_ANSWER};
pub use session::SessionPhase;
pub use test_set::{QuestionSet, QuestionSetError, TestInfo};
