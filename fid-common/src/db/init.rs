//! Database initialization
//!
//! Creates the database file on first run and idempotently creates the
//! tables the generator depends on:
//! - `sequence_counters`: one row per (industry, region, year) partition
//! - `facilities`: registered facilities keyed by their permanent identifier

use crate::config::DatabaseConfig;
use crate::time::millis_to_duration;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path, config: &DatabaseConfig) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // busy_timeout must be set per connection, so it goes on the connect
    // options rather than a one-off PRAGMA
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(millis_to_duration(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create all tables on an existing pool (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_sequence_counters_table(pool).await?;
    create_facilities_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the sequence_counters table
///
/// Owned exclusively by the sequence allocator's store. `last_sequence` is
/// the highest sequence handed out in the partition (0 = none yet).
pub async fn create_sequence_counters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sequence_counters (
            industry_code TEXT NOT NULL CHECK (length(industry_code) = 3),
            region_code TEXT NOT NULL CHECK (length(region_code) = 2),
            year INTEGER NOT NULL CHECK (year BETWEEN 0 AND 9999),
            last_sequence INTEGER NOT NULL DEFAULT 0 CHECK (last_sequence >= 0),
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (industry_code, region_code, year)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the facilities table
///
/// `identifier` carries a UNIQUE constraint as the last line of defense
/// against duplicate allocation.
pub async fn create_facilities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS facilities (
            guid TEXT PRIMARY KEY,
            identifier TEXT NOT NULL UNIQUE,
            industry_code TEXT NOT NULL,
            region_code TEXT NOT NULL,
            year INTEGER NOT NULL,
            sequence INTEGER NOT NULL,
            name TEXT,
            overall_confidence REAL NOT NULL,
            needs_confirmation INTEGER NOT NULL,
            fusion_json TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_facilities_partition
        ON facilities (industry_code, region_code, year, sequence)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
