//! SQLite sequence store
//!
//! Compare-and-set on `sequence_counters`:
//! - expected = 0: `INSERT OR IGNORE` claims a fresh partition row
//! - otherwise:    `UPDATE ... WHERE last_sequence = expected`
//!
//! Success means exactly one row changed. SQLite lock contention
//! ("database is locked") is reported as a lost race so the allocator
//! retries it like any other conflict.

use crate::allocator::SequenceStore;
use async_trait::async_trait;
use fid_common::db::SequenceCounter;
use fid_common::error::is_lock_error;
use fid_common::{Error, Result, SequencePartitionKey};
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct SqliteSequenceStore {
    pool: SqlitePool,
}

impl SqliteSequenceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Raise a partition counter to at least `floor`; never lowers it
    ///
    /// Used after restoring facilities from backup, when registered
    /// identifiers may be ahead of the counter. Returns the resulting value.
    pub async fn reconcile(&self, key: &SequencePartitionKey, floor: i64) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO sequence_counters (industry_code, region_code, year, last_sequence)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (industry_code, region_code, year) DO UPDATE SET
                last_sequence = MAX(last_sequence, excluded.last_sequence),
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key.industry_code())
        .bind(key.region_code())
        .bind(i64::from(key.year()))
        .bind(floor.max(0))
        .execute(&self.pool)
        .await
        .map_err(Error::from_store)?;

        let value = self.current(key).await?;
        tracing::info!(partition = %key, floor, value, "Sequence counter reconciled");
        Ok(value)
    }

    /// All counters, ordered by partition
    pub async fn list_counters(&self) -> Result<Vec<SequenceCounter>> {
        let rows = sqlx::query_as::<_, SequenceCounter>(
            r#"
            SELECT industry_code, region_code, year, last_sequence
            FROM sequence_counters
            ORDER BY industry_code, region_code, year
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::from_store)?;

        Ok(rows)
    }

    async fn try_claim_partition(&self, key: &SequencePartitionKey, new: i64) -> std::result::Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO sequence_counters (industry_code, region_code, year, last_sequence)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(key.industry_code())
        .bind(key.region_code())
        .bind(i64::from(key.year()))
        .bind(new)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_advance(&self, key: &SequencePartitionKey, expected: i64, new: i64) -> std::result::Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sequence_counters
            SET last_sequence = ?, updated_at = CURRENT_TIMESTAMP
            WHERE industry_code = ? AND region_code = ? AND year = ? AND last_sequence = ?
            "#,
        )
        .bind(new)
        .bind(key.industry_code())
        .bind(key.region_code())
        .bind(i64::from(key.year()))
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl SequenceStore for SqliteSequenceStore {
    async fn current(&self, key: &SequencePartitionKey) -> Result<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT last_sequence FROM sequence_counters
            WHERE industry_code = ? AND region_code = ? AND year = ?
            "#,
        )
        .bind(key.industry_code())
        .bind(key.region_code())
        .bind(i64::from(key.year()))
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::from_store)?;

        Ok(value.unwrap_or(0))
    }

    async fn compare_and_set(&self, key: &SequencePartitionKey, expected: i64, new: i64) -> Result<bool> {
        let outcome = if expected == 0 {
            // A pre-created row still at 0 is advanced like any other
            match self.try_claim_partition(key, new).await {
                Ok(true) => Ok(true),
                Ok(false) => self.try_advance(key, expected, new).await,
                Err(e) => Err(e),
            }
        } else {
            self.try_advance(key, expected, new).await
        };

        match outcome {
            Ok(applied) => Ok(applied),
            Err(e) if is_lock_error(&e) => {
                tracing::debug!(partition = %key, "Sequence counter locked, treating as conflict");
                Ok(false)
            }
            Err(e) => Err(Error::from_store(e)),
        }
    }
}
