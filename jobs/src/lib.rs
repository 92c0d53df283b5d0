//! # Replacement Jobs
//!
//! One job applies one rule to one document under one attribution. Jobs
//! are independent: each revalidates against the authoritative store and
//! the permission seam before changing anything, so they are safe to run
//! out of order, concurrently, and more than once.
//!
//! ## State machine
//!
//! ```text
//!   Pending ──► Validating ──► Applying ──► Committed
//!      ▲            │              │
//!      │            │              ├──────► Skipped
//!      └── retry ───┴──────────────┤
//!                                  └──────► Failed
//! ```
//!
//! Transient storage errors send a job back to `Pending` until its retry
//! budget is spent. A lost permission ends in `Failed` but counts as a
//! successful no-op.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bulkedit_jobs::{BatchWorker, JobRunner, MemoryQueue, StaticAuthority};
//!
//! let runner = Arc::new(JobRunner::new(store, authority));
//! let worker = BatchWorker::new(queue, runner);
//! let report = worker.run_batch().await;
//! println!("{}", report.summary_line());
//! ```

pub mod attribution;
pub mod authority;
pub mod error;
pub mod job;
pub mod queue;
pub mod report;
pub mod retry;
pub mod runner;
pub mod worker;

pub use attribution::Attribution;
pub use authority::{Authority, Right, StaticAuthority};
pub use error::{ErrorKind, JobError, Result};
pub use job::{Job, JobExecution, JobMode, JobOutcome, JobState, MoveOptions, StateChange};
pub use queue::{JobQueue, MemoryQueue};
pub use report::{BatchReport, DocumentFailure};
pub use retry::RetryPolicy;
pub use runner::{DEFAULT_UNREADABLE_MARKER, JobConfig, JobRunner};
pub use worker::BatchWorker;
