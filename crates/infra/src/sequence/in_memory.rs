//! In-memory sequence allocator (tests/dev).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::SequenceAllocator;
use crate::store::StoreError;

/// Per-year counters behind one mutex. Numbers are handed out exactly once,
/// whether or not the requesting verification commits.
#[derive(Debug, Default, Clone)]
pub struct InMemorySequenceAllocator {
    counters: Arc<Mutex<HashMap<i32, u32>>>,
}

impl InMemorySequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceAllocator for InMemorySequenceAllocator {
    async fn next(&self, year: i32) -> Result<u32, StoreError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let counter = counters.entry(year).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
