// Sequence allocation
//
// The per-partition counter is the only shared mutable state in the
// pipeline. Stores expose read + compare-and-set; the allocator turns those
// into a retrying, cancellable `next_sequence`.

pub mod memory;
pub mod sequence_allocator;

pub use memory::MemorySequenceStore;
pub use sequence_allocator::SequenceAllocator;

use async_trait::async_trait;
use fid_common::{Result, SequencePartitionKey};

/// Persistence seam for partition counters
///
/// Implementations must make `compare_and_set` atomic with respect to every
/// other caller of the same partition.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Last sequence handed out in the partition (0 when none yet)
    async fn current(&self, key: &SequencePartitionKey) -> Result<i64>;

    /// Set the counter to `new` only if it still equals `expected`
    ///
    /// Returns `Ok(false)` when another caller got there first.
    async fn compare_and_set(&self, key: &SequencePartitionKey, expected: i64, new: i64) -> Result<bool>;
}
