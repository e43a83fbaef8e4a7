//! Shared error types for the services crate.

use thiserror::Error;

use listening_core::model::{CategoryId, QuestionId, TestId};
use storage::provider::ProviderError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the session controller and the assessment workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("test has no questions")]
    Empty,
    #[error("test declares an unusable duration: {label:?}")]
    InvalidDuration { label: String },
    #[error("session already started")]
    AlreadyStarted,
    #[error("session is not in progress")]
    NotInProgress,
    #[error("question {0} is not part of this test")]
    UnknownQuestion(QuestionId),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Data errors block the session from starting; the view offers a retry.
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            SessionError::Empty | SessionError::InvalidDuration { .. } | SessionError::Provider(_)
        )
    }
}

/// Errors emitted by the playback wrapper.
///
/// All of them are local to the question being played; none aborts a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("no media loaded")]
    NothingLoaded,
    #[error("media is not ready yet")]
    NotReady,
    #[error("playback was blocked until the user interacts")]
    NotAllowed,
    #[error("failed to load {uri}: {reason}")]
    Load { uri: String, reason: String },
    #[error("playback failed: {0}")]
    Failed(String),
}

/// Errors emitted while reconstructing a review.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewError {
    #[error("no stored result for {category}/{test_id}")]
    NoResult { category: CategoryId, test_id: TestId },
    #[error("stored result references question {0} which the test no longer has")]
    QuestionMissing(QuestionId),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
