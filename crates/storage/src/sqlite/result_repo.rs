use listening_core::model::{CategoryId, ResultRecord, TestId};
use sqlx::Row;

use super::SqliteResultStore;
use crate::repository::{ResultKey, ResultStore, StorageError, decode_record, encode_record};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl SqliteResultStore {
    /// Delete every stored result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the delete fails.
    pub async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM results")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    /// Write a raw payload for a key, bypassing encoding.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the write fails.
    pub async fn insert_raw(&self, key: &ResultKey, payload: &str) -> Result<(), StorageError> {
        upsert(self, key, payload, chrono::Utc::now()).await
    }
}

async fn upsert(
    store: &SqliteResultStore,
    key: &ResultKey,
    payload: &str,
    saved_at: chrono::DateTime<chrono::Utc>,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
            INSERT INTO results (category, test_id, payload, saved_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(category, test_id) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at
        ",
    )
    .bind(key.category.as_str())
    .bind(key.test_id.as_str())
    .bind(payload)
    .bind(saved_at)
    .execute(&store.pool)
    .await
    .map_err(conn)?;
    Ok(())
}

#[async_trait::async_trait]
impl ResultStore for SqliteResultStore {
    async fn save(
        &self,
        category: &CategoryId,
        test_id: &TestId,
        record: &ResultRecord,
    ) -> Result<(), StorageError> {
        let payload = encode_record(record)?;
        upsert(
            self,
            &ResultKey::new(category, test_id),
            &payload,
            record.submitted_at(),
        )
        .await
    }

    async fn load(
        &self,
        category: &CategoryId,
        test_id: &TestId,
    ) -> Result<Option<ResultRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT payload
                FROM results
                WHERE category = ?1 AND test_id = ?2
            ",
        )
        .bind(category.as_str())
        .bind(test_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload").map_err(conn)?;
        Ok(decode_record(&ResultKey::new(category, test_id), &payload))
    }
}
