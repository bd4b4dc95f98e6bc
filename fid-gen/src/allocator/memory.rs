// In-process sequence store
//
// A mutex-guarded map; every operation holds the lock only for the map
// access itself, never across an await.

use super::SequenceStore;
use async_trait::async_trait;
use fid_common::{Error, Result, SequencePartitionKey};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemorySequenceStore {
    counters: Mutex<HashMap<SequencePartitionKey, i64>>,
}

impl MemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one counter (0 when the partition is unused)
    pub fn snapshot(&self, key: &SequencePartitionKey) -> Result<i64> {
        let counters = self.lock()?;
        Ok(counters.get(key).copied().unwrap_or(0))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SequencePartitionKey, i64>>> {
        self.counters
            .lock()
            .map_err(|_| Error::StoreUnavailable("in-memory sequence store poisoned".to_string()))
    }
}

#[async_trait]
impl SequenceStore for MemorySequenceStore {
    async fn current(&self, key: &SequencePartitionKey) -> Result<i64> {
        self.snapshot(key)
    }

    async fn compare_and_set(&self, key: &SequencePartitionKey, expected: i64, new: i64) -> Result<bool> {
        let mut counters = self.lock()?;
        let slot = counters.entry(key.clone()).or_insert(0);
        if *slot == expected {
            *slot = new;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
