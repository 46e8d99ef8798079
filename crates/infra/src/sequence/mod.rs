//! Per-year invoice number allocation.
//!
//! Allocation is durable independently of the verification unit of work: a
//! number handed to a verification that later aborts is never handed out
//! again. Numbers are therefore monotonic per year with gaps permitted,
//! which is exactly what the `YYYY####` format promises.

use async_trait::async_trait;

use crate::store::StoreError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemorySequenceAllocator;
pub use postgres::PostgresSequenceAllocator;

/// Hands out the next per-year invoice sequence (1-based).
///
/// Implementations must serialize concurrent callers at the storage layer
/// (an atomic counter or a uniqueness constraint, never a bare
/// read-then-increment), because multiple process instances allocate
/// concurrently.
#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    async fn next(&self, year: i32) -> Result<u32, StoreError>;
}
