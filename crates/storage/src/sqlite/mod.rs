use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::provider::QuestionProvider;
use crate::repository::{ResultStore, Storage};

mod migrate;
mod result_repo;

/// Default database: private, in-memory, alive as long as the pool.
pub const SESSION_DATABASE_URL: &str = "sqlite::memory:";

/// Result store backed by `SQLite`.
///
/// With an in-memory URL the data lives exactly as long as this store (and its
/// clones), which gives results the lifetime of the browsing session.
#[derive(Clone)]
pub struct SqliteResultStore {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

fn is_private_memory(database_url: &str) -> bool {
    database_url == SESSION_DATABASE_URL || database_url == "sqlite://:memory:"
}

impl SqliteResultStore {
    /// Connect to `SQLite` using the given URL.
    ///
    /// A private in-memory database is pinned to a single connection that is
    /// never recycled, since every new connection would see an empty database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let mut options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(5));
        options = if is_private_memory(database_url) {
            options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options.max_connections(5)
        };

        let pool = options
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Connect to a fresh session-scoped database and create its schema.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migration fails.
    pub async fn session() -> Result<Self, SqliteInitError> {
        let store = Self::connect(SESSION_DATABASE_URL).await?;
        store.migrate().await?;
        Ok(store)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` whose results live in `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(
        database_url: &str,
        questions: Arc<dyn QuestionProvider>,
    ) -> Result<Self, SqliteInitError> {
        let store = SqliteResultStore::connect(database_url).await?;
        store.migrate().await?;
        let results: Arc<dyn ResultStore> = Arc::new(store);
        Ok(Self { results, questions })
    }
}
