//! Test Helper Utilities
//!
//! Shared utilities for testing fid-gen

#![allow(dead_code)]

use fid_common::config::{AllocatorConfig, DatabaseConfig, FidConfig};
use fid_common::db::init_database;
use fid_gen::allocator::SequenceStore;
use fid_gen::FacilityIdentifierService;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

/// Create temporary test database with schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> anyhow::Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_fid.db");
    let pool = init_database(&db_path, &DatabaseConfig::default()).await?;
    Ok((temp_dir, pool))
}

/// Retry policy generous enough for heavy contention in tests
pub fn contention_policy() -> AllocatorConfig {
    AllocatorConfig {
        max_attempts: 200,
        initial_backoff_ms: 1,
        max_backoff_ms: 16,
        store_timeout_ms: 10_000,
    }
}

/// Service over the built-in tables and the given store
pub fn service_with_store(store: Arc<dyn SequenceStore>) -> FacilityIdentifierService {
    FacilityIdentifierService::from_config(&FidConfig::default(), store)
        .expect("default config must build a service")
}
