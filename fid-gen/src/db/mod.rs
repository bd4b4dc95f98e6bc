//! Database access for fid-gen
//!
//! SQLite-backed implementations of the sequence store and the facility
//! repository. Schema is created by `fid_common::db::init_database`.

pub mod facilities;
pub mod sequences;

pub use facilities::FacilityRepository;
pub use sequences::SqliteSequenceStore;

use fid_common::{Result, SequencePartitionKey};

/// Bring a partition counter up to the highest registered facility sequence
pub async fn reconcile_partition(
    store: &SqliteSequenceStore,
    repository: &FacilityRepository,
    key: &SequencePartitionKey,
) -> Result<i64> {
    let registered = repository.max_sequence(key).await?;
    store.reconcile(key, registered).await
}
