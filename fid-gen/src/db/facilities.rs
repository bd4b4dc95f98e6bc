//! Facility repository
//!
//! Records each generated identifier with its fusion audit trail. The
//! UNIQUE constraint on `identifier` is the last line of defense against an
//! allocator bug; a violation surfaces as `DuplicateIdentifier`.

use crate::types::{FacilityDraft, FusionResult};
use fid_common::db::FacilityRecord;
use fid_common::{Error, FacilityIdentifier, Result, SequencePartitionKey};
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FacilityRepository {
    pool: SqlitePool,
}

impl FacilityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a facility under its permanent identifier
    pub async fn record(
        &self,
        identifier: &FacilityIdentifier,
        draft: &FacilityDraft,
        fusion: &FusionResult,
    ) -> Result<FacilityRecord> {
        let fusion_json = serde_json::to_string(fusion)
            .map_err(|e| Error::InvalidInput(format!("fusion result not serializable: {}", e)))?;

        let record = FacilityRecord {
            guid: Uuid::new_v4().to_string(),
            identifier: identifier.format(),
            industry_code: identifier.industry_code().to_string(),
            region_code: identifier.region_code().to_string(),
            year: i64::from(identifier.year()),
            sequence: i64::from(identifier.sequence()),
            name: draft.name.clone(),
            overall_confidence: fusion.overall_confidence,
            needs_confirmation: fusion.needs_confirmation,
            fusion_json,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO facilities (
                guid, identifier, industry_code, region_code, year, sequence,
                name, overall_confidence, needs_confirmation, fusion_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.guid)
        .bind(&record.identifier)
        .bind(&record.industry_code)
        .bind(&record.region_code)
        .bind(record.year)
        .bind(record.sequence)
        .bind(&record.name)
        .bind(record.overall_confidence)
        .bind(record.needs_confirmation)
        .bind(&record.fusion_json)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                tracing::info!(
                    identifier = %record.identifier,
                    needs_confirmation = record.needs_confirmation,
                    "Facility recorded"
                );
                Ok(record)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::error!(identifier = %record.identifier, "Identifier already registered");
                Err(Error::DuplicateIdentifier(record.identifier))
            }
            Err(e) => Err(Error::from_store(e)),
        }
    }

    /// Load a facility by identifier
    pub async fn find_by_identifier(&self, identifier: &FacilityIdentifier) -> Result<Option<FacilityRecord>> {
        let record = sqlx::query_as::<_, FacilityRecord>(
            r#"
            SELECT guid, identifier, industry_code, region_code, year, sequence,
                   name, overall_confidence, needs_confirmation, fusion_json
            FROM facilities
            WHERE identifier = ?
            "#,
        )
        .bind(identifier.format())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::from_store)?;

        Ok(record)
    }

    /// Highest registered sequence in a partition (0 when empty)
    pub async fn max_sequence(&self, key: &SequencePartitionKey) -> Result<i64> {
        let max: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(sequence) FROM facilities
            WHERE industry_code = ? AND region_code = ? AND year = ?
            "#,
        )
        .bind(key.industry_code())
        .bind(key.region_code())
        .bind(i64::from(key.year()))
        .fetch_one(&self.pool)
        .await
        .map_err(Error::from_store)?;

        Ok(max.unwrap_or(0))
    }

    /// Facilities awaiting manual classification review, oldest first
    pub async fn pending_confirmation(&self) -> Result<Vec<FacilityRecord>> {
        let rows = sqlx::query_as::<_, FacilityRecord>(
            r#"
            SELECT guid, identifier, industry_code, region_code, year, sequence,
                   name, overall_confidence, needs_confirmation, fusion_json
            FROM facilities
            WHERE needs_confirmation = 1
            ORDER BY created_at, identifier
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::from_store)?;

        Ok(rows)
    }
}
