use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::plan;

/// Per-chunk completion bitmap, persisted between runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    pub chunk: Vec<bool>,
    pub chunk_size: u64,
}

impl ProgressState {
    /// All-incomplete state sized for `total_size`.
    pub fn new(total_size: u64, chunk_size: u64) -> Self {
        Self {
            chunk: vec![false; plan::chunk_count(total_size, chunk_size)],
            chunk_size,
        }
    }

    pub fn len(&self) -> usize {
        self.chunk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk.is_empty()
    }

    /// True iff every chunk is done. A zero-chunk state is complete.
    pub fn is_complete(&self) -> bool {
        self.chunk.iter().all(|done| *done)
    }

    pub fn completed(&self) -> usize {
        self.chunk.iter().filter(|done| **done).count()
    }
}

/// Progress state shared between chunk workers and the checkpoint writer.
///
/// Every read and write goes through one mutex, so a snapshot taken for
/// serialization never observes a half-updated bitmap.
#[derive(Debug, Clone)]
pub struct SharedProgress {
    inner: Arc<Mutex<ProgressState>>,
}

impl SharedProgress {
    pub fn new(state: ProgressState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn is_done(&self, index: usize) -> bool {
        let state = self.inner.lock().await;
        state.chunk.get(index).copied().unwrap_or(false)
    }

    pub async fn mark_done(&self, index: usize) {
        let mut state = self.inner.lock().await;
        if let Some(done) = state.chunk.get_mut(index) {
            *done = true;
        }
    }

    pub async fn is_complete(&self) -> bool {
        self.inner.lock().await.is_complete()
    }

    pub async fn snapshot(&self) -> ProgressState {
        self.inner.lock().await.clone()
    }
}
