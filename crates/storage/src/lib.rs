#![forbid(unsafe_code)]

pub mod provider;
pub mod repository;
pub mod sqlite;

pub use provider::{InMemoryQuestionProvider, JsonDirProvider, ProviderError, QuestionProvider};
pub use repository::{InMemoryResultStore, ResultKey, ResultStore, Storage, StorageError};
