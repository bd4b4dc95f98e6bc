//! Sequence Allocator
//!
//! Hands out strictly increasing sequence numbers per
//! (industry, region, year) partition, starting at 1, safe under any number
//! of concurrent callers.
//!
//! **Algorithm (optimistic compare-and-set):**
//! 1. Read the partition's current value `n`
//! 2. Compare-and-set the counter from `n` to `n + 1`
//! 3. If the CAS lost to another caller: back off, re-read, retry
//! 4. After `max_attempts` lost rounds: `AllocationExhausted`
//!
//! No lock is held between read and write; contention degrades to retry.
//! A partition already at `MAX_SEQUENCE` is reported as `SequenceOverflow`
//! without touching the counter.
//!
//! **Backoff:** exponential from `initial_backoff_ms`, capped at
//! `max_backoff_ms`, with jitter so contenders do not retry in lockstep.
//!
//! **Bounding:** every store call runs under `store_timeout_ms` and races
//! the caller's cancellation token.

use super::SequenceStore;
use fid_common::config::AllocatorConfig;
use fid_common::identifier::MAX_SEQUENCE;
use fid_common::time::millis_to_duration;
use fid_common::{Error, Result, SequencePartitionKey};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn SequenceStore>,
    policy: AllocatorConfig,
}

impl std::fmt::Debug for SequenceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceAllocator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn SequenceStore>, policy: AllocatorConfig) -> Self {
        Self { store, policy }
    }

    /// Allocate the next sequence in `key`'s partition
    ///
    /// # Errors
    /// * `SequenceOverflow` - the partition already handed out `MAX_SEQUENCE`
    /// * `AllocationExhausted` - lost the CAS race `max_attempts` times
    /// * `StoreUnavailable` - store unreachable or a call exceeded `store_timeout_ms`
    /// * `Cancelled` - `cancel` fired while a store call or backoff was pending
    pub async fn next_sequence(&self, key: &SequencePartitionKey, cancel: &CancellationToken) -> Result<i64> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff_ms = self.policy.initial_backoff_ms;

        for attempt in 1..=max_attempts {
            let current = self.bounded("read", cancel, self.store.current(key)).await?;
            if current >= i64::from(MAX_SEQUENCE) {
                tracing::error!(partition = %key, current, "Partition has no sequences left");
                return Err(Error::SequenceOverflow {
                    partition: key.to_string(),
                    sequence: current + 1,
                });
            }
            let next = current + 1;

            if self
                .bounded("compare_and_set", cancel, self.store.compare_and_set(key, current, next))
                .await?
            {
                if attempt > 1 {
                    tracing::debug!(partition = %key, attempt, sequence = next, "Sequence allocated after retry");
                } else {
                    tracing::debug!(partition = %key, sequence = next, "Sequence allocated");
                }
                return Ok(next);
            }

            if attempt == max_attempts {
                break;
            }

            let delay_ms = jittered(backoff_ms);
            tracing::warn!(
                partition = %key,
                attempt,
                observed = current,
                backoff_ms = delay_ms,
                "Sequence allocation conflict, will retry after backoff"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(millis_to_duration(delay_ms)) => {}
            }

            backoff_ms = backoff_ms.saturating_mul(2).min(self.policy.max_backoff_ms);
        }

        tracing::error!(
            partition = %key,
            attempts = max_attempts,
            "Sequence allocation failed: retry ceiling reached"
        );
        Err(Error::AllocationExhausted {
            partition: key.to_string(),
            attempts: max_attempts,
        })
    }

    /// Run one store call under the store timeout and the caller's token
    async fn bounded<T, F>(&self, operation: &str, cancel: &CancellationToken, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = millis_to_duration(self.policy.store_timeout_ms);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(Error::StoreUnavailable(format!(
                    "sequence store {} timed out after {} ms",
                    operation, self.policy.store_timeout_ms
                ))),
            },
        }
    }
}

/// Half fixed, half random: spreads contenders without collapsing to zero
fn jittered(backoff_ms: u64) -> u64 {
    if backoff_ms < 2 {
        return backoff_ms;
    }
    let half = backoff_ms / 2;
    half + rand::thread_rng().gen_range(0..=half)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::MemorySequenceStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn key() -> SequencePartitionKey {
        SequencePartitionKey::new("151", "SD", 2025).unwrap()
    }

    fn policy(max_attempts: u32) -> AllocatorConfig {
        AllocatorConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            store_timeout_ms: 1000,
        }
    }

    /// Loses every CAS
    struct AlwaysConflicting {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl SequenceStore for AlwaysConflicting {
        async fn current(&self, _key: &SequencePartitionKey) -> Result<i64> {
            Ok(0)
        }

        async fn compare_and_set(&self, _key: &SequencePartitionKey, _expected: i64, _new: i64) -> Result<bool> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    }

    /// Another writer sneaks in between our read and our first CAS
    struct InterleavedWriter {
        inner: MemorySequenceStore,
        interfered: AtomicU32,
    }

    #[async_trait]
    impl SequenceStore for InterleavedWriter {
        async fn current(&self, key: &SequencePartitionKey) -> Result<i64> {
            self.inner.current(key).await
        }

        async fn compare_and_set(&self, key: &SequencePartitionKey, expected: i64, new: i64) -> Result<bool> {
            if self.interfered.fetch_add(1, Ordering::SeqCst) == 0 {
                assert!(self.inner.compare_and_set(key, expected, new).await?);
            }
            self.inner.compare_and_set(key, expected, new).await
        }
    }

    /// Never answers
    struct Hanging;

    #[async_trait]
    impl SequenceStore for Hanging {
        async fn current(&self, _key: &SequencePartitionKey) -> Result<i64> {
            std::future::pending().await
        }

        async fn compare_and_set(&self, _key: &SequencePartitionKey, _expected: i64, _new: i64) -> Result<bool> {
            std::future::pending().await
        }
    }

    /// Unreachable backend
    struct Unreachable;

    #[async_trait]
    impl SequenceStore for Unreachable {
        async fn current(&self, _key: &SequencePartitionKey) -> Result<i64> {
            Err(Error::StoreUnavailable("connection refused".to_string()))
        }

        async fn compare_and_set(&self, _key: &SequencePartitionKey, _expected: i64, _new: i64) -> Result<bool> {
            Err(Error::StoreUnavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sequences_start_at_one_and_increase() {
        let allocator = SequenceAllocator::new(Arc::new(MemorySequenceStore::new()), policy(5));
        let token = CancellationToken::new();

        assert_eq!(allocator.next_sequence(&key(), &token).await.unwrap(), 1);
        assert_eq!(allocator.next_sequence(&key(), &token).await.unwrap(), 2);
        assert_eq!(allocator.next_sequence(&key(), &token).await.unwrap(), 3);

        let other = SequencePartitionKey::new("151", "SD", 2026).unwrap();
        assert_eq!(allocator.next_sequence(&other, &token).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_lost_race() {
        let store = Arc::new(InterleavedWriter {
            inner: MemorySequenceStore::new(),
            interfered: AtomicU32::new(0),
        });
        let allocator = SequenceAllocator::new(store.clone(), policy(5));

        // The interloper took 1; we must get 2, not a duplicate 1
        let seq = allocator.next_sequence(&key(), &CancellationToken::new()).await.unwrap();
        assert_eq!(seq, 2);
        assert_eq!(store.inner.snapshot(&key()).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_after_ceiling() {
        let store = Arc::new(AlwaysConflicting {
            attempts: AtomicU32::new(0),
        });
        let allocator = SequenceAllocator::new(store.clone(), policy(5));

        let err = allocator.next_sequence(&key(), &CancellationToken::new()).await.unwrap_err();
        match err {
            Error::AllocationExhausted { attempts, ref partition } => {
                assert_eq!(attempts, 5);
                assert_eq!(partition, "151-SD-2025");
            }
            other => panic!("expected AllocationExhausted, got {:?}", other),
        }
        assert!(err.is_retryable());
        assert_eq!(store.attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_full_partition_overflows_without_advancing() {
        let store = Arc::new(MemorySequenceStore::new());
        assert!(store.compare_and_set(&key(), 0, 999).await.unwrap());
        let allocator = SequenceAllocator::new(store.clone(), policy(5));

        for _ in 0..3 {
            let err = allocator.next_sequence(&key(), &CancellationToken::new()).await.unwrap_err();
            match err {
                Error::SequenceOverflow { sequence, ref partition } => {
                    assert_eq!(sequence, 1000);
                    assert_eq!(partition, "151-SD-2025");
                }
                other => panic!("expected SequenceOverflow, got {:?}", other),
            }
            assert!(!err.is_retryable());
        }
        assert_eq!(store.snapshot(&key()).unwrap(), 999);
    }

    #[tokio::test]
    async fn test_last_sequence_still_allocated() {
        let store = Arc::new(MemorySequenceStore::new());
        assert!(store.compare_and_set(&key(), 0, 998).await.unwrap());
        let allocator = SequenceAllocator::new(store, policy(5));

        assert_eq!(allocator.next_sequence(&key(), &CancellationToken::new()).await.unwrap(), 999);
    }

    #[tokio::test]
    async fn test_store_timeout_is_unavailable() {
        let mut p = policy(5);
        p.store_timeout_ms = 20;
        let allocator = SequenceAllocator::new(Arc::new(Hanging), p);

        let err = allocator.next_sequence(&key(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_store_call() {
        let mut p = policy(5);
        p.store_timeout_ms = 60_000;
        let allocator = SequenceAllocator::new(Arc::new(Hanging), p);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = allocator.next_sequence(&key(), &token).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_fast() {
        let allocator = SequenceAllocator::new(Arc::new(Unreachable), policy(5));
        let err = allocator.next_sequence(&key(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let d = jittered(100);
            assert!((50..=100).contains(&d));
        }
        assert_eq!(jittered(1), 1);
        assert_eq!(jittered(0), 0);
    }
}
