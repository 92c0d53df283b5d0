//! Drains a queue through a runner with bounded concurrency.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tracing::{info, warn};

use crate::job::JobOutcome;
use crate::queue::JobQueue;
use crate::report::BatchReport;
use crate::runner::JobRunner;

/// Claims jobs from a queue and runs them until the queue is empty.
pub struct BatchWorker {
    queue: Arc<dyn JobQueue>,
    runner: Arc<JobRunner>,
    concurrency: usize,
}

impl BatchWorker {
    /// Create a worker using the runner's configured concurrency.
    pub fn new(queue: Arc<dyn JobQueue>, runner: Arc<JobRunner>) -> Self {
        let concurrency = runner.config().concurrency;
        Self {
            queue,
            runner,
            concurrency,
        }
    }

    /// Override the number of jobs run at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Run every job currently claimable and collect their outcomes.
    pub async fn drain(&self) -> Vec<JobOutcome> {
        let claims = stream::unfold(Arc::clone(&self.queue), |queue| async move {
            match queue.claim().await {
                Ok(Some(job)) => Some((job, queue)),
                Ok(None) => None,
                Err(e) => {
                    warn!("Stopping batch: failed to claim job: {e}");
                    None
                }
            }
        });

        let runner = &self.runner;
        let outcomes: Vec<JobOutcome> = claims
            .map(|job| async move { runner.run(job).await })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        info!("Batch worker ran {} jobs", outcomes.len());
        outcomes
    }

    /// Run every claimable job and summarize the batch.
    pub async fn run_batch(&self) -> BatchReport {
        let report = BatchReport::from_outcomes(self.drain().await);
        info!("Batch finished: {}", report.summary_line());
        report
    }
}
