//! Facility Identifier Service
//!
//! Pipeline: Signal Fusion Engine → Sequence Allocator → Identifier Codec
//!
//! Classification never fails and never blocks: low confidence is reported
//! via `FusionResult::needs_confirmation` alongside a valid identifier. Only
//! the allocator's store round-trip can fail, and only that step observes the
//! caller's cancellation token.

use crate::allocator::{SequenceAllocator, SequenceStore};
use crate::classify::{engine_from_config, SignalFusionEngine};
use crate::db::FacilityRepository;
use crate::types::{FacilityDraft, FusionResult};
use fid_common::config::FidConfig;
use fid_common::db::FacilityRecord;
use fid_common::{FacilityIdentifier, Result, SequencePartitionKey};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Identifier plus the classification audit trail that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedIdentifier {
    pub identifier: FacilityIdentifier,
    pub fusion: FusionResult,
}

/// Generated identifier after it was recorded in the facility store
#[derive(Debug, Clone)]
pub struct RegisteredFacility {
    pub identifier: FacilityIdentifier,
    pub fusion: FusionResult,
    pub record: FacilityRecord,
}

#[derive(Debug, Clone)]
pub struct FacilityIdentifierService {
    engine: Arc<SignalFusionEngine>,
    allocator: SequenceAllocator,
}

impl FacilityIdentifierService {
    pub fn new(engine: SignalFusionEngine, allocator: SequenceAllocator) -> Self {
        Self {
            engine: Arc::new(engine),
            allocator,
        }
    }

    /// Build the full pipeline from configuration over a given store
    pub fn from_config(config: &FidConfig, store: Arc<dyn SequenceStore>) -> Result<Self> {
        config.validate()?;
        let engine = engine_from_config(&config.classification)?;
        let allocator = SequenceAllocator::new(store, config.allocator.clone());
        Ok(Self::new(engine, allocator))
    }

    /// Classification only (no allocation)
    pub fn infer(&self, draft: &FacilityDraft) -> FusionResult {
        self.engine.infer(draft)
    }

    /// Generate an identifier dated the current year
    pub async fn generate_identifier(
        &self,
        draft: &FacilityDraft,
        cancel: &CancellationToken,
    ) -> Result<GeneratedIdentifier> {
        self.generate_identifier_for_year(draft, fid_common::time::current_year(), cancel)
            .await
    }

    /// Generate an identifier dated `year`
    pub async fn generate_identifier_for_year(
        &self,
        draft: &FacilityDraft,
        year: u16,
        cancel: &CancellationToken,
    ) -> Result<GeneratedIdentifier> {
        let fusion = self.engine.infer(draft);

        let partition = SequencePartitionKey::new(
            fusion.industry_code.clone(),
            fusion.region_code.clone(),
            year,
        )?;
        let sequence = self.allocator.next_sequence(&partition, cancel).await?;
        let identifier = FacilityIdentifier::new(partition, sequence)?;

        if fusion.needs_confirmation {
            tracing::warn!(
                identifier = %identifier,
                overall_confidence = fusion.overall_confidence,
                "Identifier issued with low classification confidence; route to manual review"
            );
        } else {
            tracing::info!(identifier = %identifier, "Identifier issued");
        }

        Ok(GeneratedIdentifier { identifier, fusion })
    }

    /// Generate an identifier dated the current year and record the facility
    pub async fn register_facility(
        &self,
        draft: &FacilityDraft,
        repository: &FacilityRepository,
        cancel: &CancellationToken,
    ) -> Result<RegisteredFacility> {
        self.register_facility_for_year(draft, fid_common::time::current_year(), repository, cancel)
            .await
    }

    /// Generate an identifier dated `year` and record the facility
    pub async fn register_facility_for_year(
        &self,
        draft: &FacilityDraft,
        year: u16,
        repository: &FacilityRepository,
        cancel: &CancellationToken,
    ) -> Result<RegisteredFacility> {
        let generated = self.generate_identifier_for_year(draft, year, cancel).await?;
        let record = repository
            .record(&generated.identifier, draft, &generated.fusion)
            .await?;

        Ok(RegisteredFacility {
            identifier: generated.identifier,
            fusion: generated.fusion,
            record,
        })
    }

    /// Validation entry point for identifiers received from elsewhere
    pub fn validate_identifier(&self, input: &str) -> Result<FacilityIdentifier> {
        FacilityIdentifier::parse(input)
    }
}
