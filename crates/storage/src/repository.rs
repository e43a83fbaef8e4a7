use async_trait::async_trait;
use listening_core::model::{CategoryId, ResultRecord, TestId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

use crate::provider::{InMemoryQuestionProvider, QuestionProvider};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Key under which one result record is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub category: CategoryId,
    pub test_id: TestId,
}

impl ResultKey {
    #[must_use]
    pub fn new(category: &CategoryId, test_id: &TestId) -> Self {
        Self {
            category: category.clone(),
            test_id: test_id.clone(),
        }
    }
}

/// Serialize a record for storage.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if JSON encoding fails.
pub fn encode_record(record: &ResultRecord) -> Result<String, StorageError> {
    serde_json::to_string(record).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode a stored payload.
///
/// Undecodable payloads and records whose totals disagree are reported as
/// absent; the caller falls back to its "no result" state.
#[must_use]
pub fn decode_record(key: &ResultKey, payload: &str) -> Option<ResultRecord> {
    let record: ResultRecord = match serde_json::from_str(payload) {
        Ok(record) => record,
        Err(e) => {
            warn!(category = %key.category, test_id = %key.test_id, error = %e, "discarding undecodable result record");
            return None;
        }
    };
    if let Err(e) = record.validate() {
        warn!(category = %key.category, test_id = %key.test_id, error = %e, "discarding inconsistent result record");
        return None;
    }
    Some(record)
}

/// Session-scoped persistence of submitted results, one per (category, test).
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Store `record`, replacing any previous record for the same key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be encoded or written.
    async fn save(
        &self,
        category: &CategoryId,
        test_id: &TestId,
        record: &ResultRecord,
    ) -> Result<(), StorageError>;

    /// Fetch the latest record for the key.
    ///
    /// Missing and malformed values both yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the backing store is unreachable.
    async fn load(
        &self,
        category: &CategoryId,
        test_id: &TestId,
    ) -> Result<Option<ResultRecord>, StorageError>;
}

/// In-memory result store for tests and single-process sessions.
///
/// Records are kept in their serialized form so every read goes through the
/// same decode path as the SQLite adapter.
#[derive(Clone, Default)]
pub struct InMemoryResultStore {
    payloads: Arc<Mutex<HashMap<ResultKey, String>>>,
}

impl InMemoryResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw payload, bypassing encoding.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_raw(&self, key: ResultKey, payload: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .payloads
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key, payload.into());
        Ok(())
    }

    /// Drop every stored record (end of the browsing session).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .payloads
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.clear();
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.lock().map(|g| g.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn save(
        &self,
        category: &CategoryId,
        test_id: &TestId,
        record: &ResultRecord,
    ) -> Result<(), StorageError> {
        let payload = encode_record(record)?;
        self.insert_raw(ResultKey::new(category, test_id), payload)
    }

    async fn load(
        &self,
        category: &CategoryId,
        test_id: &TestId,
    ) -> Result<Option<ResultRecord>, StorageError> {
        let key = ResultKey::new(category, test_id);
        let payload = {
            let guard = self
                .payloads
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard.get(&key).cloned()
        };
        Ok(payload.and_then(|p| decode_record(&key, &p)))
    }
}

/// Aggregates the result store and question provider behind trait objects.
#[derive(Clone)]
pub struct Storage {
    pub results: Arc<dyn ResultStore>,
    pub questions: Arc<dyn QuestionProvider>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_provider(Arc::new(InMemoryQuestionProvider::new()))
    }

    /// In-memory results paired with the given question provider.
    #[must_use]
    pub fn with_provider(questions: Arc<dyn QuestionProvider>) -> Self {
        let results: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());
        Self { results, questions }
    }
}
