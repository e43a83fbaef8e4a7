//! Question provider contract and local adapters.
//!
//! The provider is opaque to the engine: it either yields a question set or
//! fails, and every failure is a data error for the session that asked.

use async_trait::async_trait;
use listening_core::model::{CategoryId, DocumentError, QuestionSet, TestId};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("test {test_id} not found in category {category}")]
    NotFound { category: CategoryId, test_id: TestId },

    #[error("question provider unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Malformed(#[from] DocumentError),
}

/// Source of question sets.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    /// Fetch the question set for a test.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the test does not exist, cannot be read, or
    /// is not a valid test document.
    async fn fetch(
        &self,
        category: &CategoryId,
        test_id: &TestId,
    ) -> Result<Arc<QuestionSet>, ProviderError>;
}

/// Provider backed by a map, for tests and embedded fixtures.
#[derive(Clone, Default)]
pub struct InMemoryQuestionProvider {
    sets: Arc<Mutex<HashMap<(CategoryId, TestId), Arc<QuestionSet>>>>,
}

impl InMemoryQuestionProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a question set under `category` and the set's own test id.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unavailable` if the lock is poisoned.
    pub fn insert(&self, category: CategoryId, set: QuestionSet) -> Result<(), ProviderError> {
        let mut guard = self
            .sets
            .lock()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        guard.insert((category, set.info().id.clone()), Arc::new(set));
        Ok(())
    }
}

#[async_trait]
impl QuestionProvider for InMemoryQuestionProvider {
    async fn fetch(
        &self,
        category: &CategoryId,
        test_id: &TestId,
    ) -> Result<Arc<QuestionSet>, ProviderError> {
        let guard = self
            .sets
            .lock()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        guard
            .get(&(category.clone(), test_id.clone()))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                category: category.clone(),
                test_id: test_id.clone(),
            })
    }
}

/// Reads `<root>/<category>/<test_id>.json` documents from disk.
#[derive(Debug, Clone)]
pub struct JsonDirProvider {
    root: PathBuf,
}

impl JsonDirProvider {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, category: &CategoryId, test_id: &TestId) -> Option<PathBuf> {
        fn single_segment(raw: &str) -> bool {
            let mut parts = Path::new(raw).components();
            matches!(parts.next(), Some(Component::Normal(_))) && parts.next().is_none()
        }

        if !single_segment(category.as_str()) || !single_segment(test_id.as_str()) {
            return None;
        }
        Some(
            self.root
                .join(category.as_str())
                .join(format!("{}.json", test_id.as_str())),
        )
    }
}

#[async_trait]
impl QuestionProvider for JsonDirProvider {
    async fn fetch(
        &self,
        category: &CategoryId,
        test_id: &TestId,
    ) -> Result<Arc<QuestionSet>, ProviderError> {
        let not_found = || ProviderError::NotFound {
            category: category.clone(),
            test_id: test_id.clone(),
        };
        let path = self.document_path(category, test_id).ok_or_else(not_found)?;
        debug!(path = %path.display(), "reading test document");

        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(ProviderError::Unavailable(e.to_string())),
        };
        Ok(Arc::new(QuestionSet::from_json(&json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"testInfo":{"id":"t1","durationLabel":"5 minutes"},
        "questions":[{"id":1,"correctAnswer":"A"}]}"#;

    #[tokio::test]
    async fn in_memory_provider_keys_by_category_and_test() {
        let provider = InMemoryQuestionProvider::new();
        provider
            .insert(CategoryId::new("ielts"), QuestionSet::from_json(DOC).unwrap())
            .unwrap();

        let set = provider
            .fetch(&CategoryId::new("ielts"), &TestId::new("t1"))
            .await
            .unwrap();
        assert_eq!(set.len(), 1);

        let err = provider
            .fetch(&CategoryId::new("toeic"), &TestId::new("t1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn json_dir_provider_reads_documents() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("ielts")).await.unwrap();
        tokio::fs::write(dir.path().join("ielts").join("t1.json"), DOC)
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("ielts").join("bad.json"), "{")
            .await
            .unwrap();

        let provider = JsonDirProvider::new(dir.path());
        let cat = CategoryId::new("ielts");

        let set = provider.fetch(&cat, &TestId::new("t1")).await.unwrap();
        assert_eq!(set.declared_duration_secs(), 300);

        assert!(matches!(
            provider.fetch(&cat, &TestId::new("missing")).await.unwrap_err(),
            ProviderError::NotFound { .. }
        ));
        assert!(matches!(
            provider.fetch(&cat, &TestId::new("bad")).await.unwrap_err(),
            ProviderError::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn json_dir_provider_refuses_path_traversal() {
        let provider = JsonDirProvider::new("/tmp");
        let err = provider
            .fetch(&CategoryId::new(".."), &TestId::new("passwd"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { .. }));

        let err = provider
            .fetch(&CategoryId::new("a/b"), &TestId::new("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { .. }));
    }
}
