//! Job queue seam and an in-memory FIFO implementation.
//!
//! Jobs travel through a queue as opaque JSON records; a worker decodes a
//! record only when it claims it.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::job::Job;

/// Hands jobs from the engine to workers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue jobs, returning how many were accepted.
    async fn push(&self, jobs: Vec<Job>) -> Result<usize>;

    /// Take the next job, if any. A claimed job can no longer be cancelled.
    async fn claim(&self) -> Result<Option<Job>>;

    /// Drop an unclaimed job. Returns whether it was found.
    async fn cancel(&self, job_id: Uuid) -> Result<bool>;

    /// Number of unclaimed jobs.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// First-in, first-out queue held in memory.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<(Uuid, serde_json::Value)>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn push(&self, jobs: Vec<Job>) -> Result<usize> {
        let records = jobs
            .iter()
            .map(|job| Ok((job.id, job.to_payload()?)))
            .collect::<Result<Vec<_>>>()?;
        let count = records.len();
        self.pending.lock().await.extend(records);
        debug!("Queued {count} jobs");
        Ok(count)
    }

    async fn claim(&self) -> Result<Option<Job>> {
        let record = self.pending.lock().await.pop_front();
        match record {
            Some((_, payload)) => Ok(Some(Job::from_payload(payload)?)),
            None => Ok(None),
        }
    }

    async fn cancel(&self, job_id: Uuid) -> Result<bool> {
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|(id, _)| *id != job_id);
        Ok(pending.len() != before)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.pending.lock().await.len())
    }
}
