/// Periodic jobs
///
/// A job is one unit of maintenance work the [`Scheduler`](crate::scheduler::Scheduler)
/// runs on a fixed interval. Jobs receive a [`JobContext`] with the pool and the shutdown
/// token, and report what they did as a [`JobOutcome`].
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use fintrack_worker::jobs::{Job, JobContext, JobOutcome, JobResult};
///
/// struct Noop;
///
/// #[async_trait]
/// impl Job for Noop {
///     fn name(&self) -> &'static str {
///         "noop"
///     }
///
///     async fn run(&self, _ctx: &JobContext) -> JobResult<JobOutcome> {
///         Ok(JobOutcome::Completed { items: 0 })
///     }
/// }
/// ```

pub mod config_check;
pub mod log_purge;
pub mod market_refresh;

pub use config_check::ConfigCheckJob;
pub use log_purge::LogPurgeJob;
pub use market_refresh::MarketRefreshJob;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use fintrack_shared::providers::ProviderError;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Every source of a multi-source job failed
    #[error("Job failed: {0}")]
    Failed(String),

    #[error("Job exceeded its {0:?} timeout")]
    TimedOut(Duration),

    #[error("Job was cancelled")]
    Cancelled,
}

pub type JobResult<T> = Result<T, JobError>;

/// What a finished run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Rows written, deleted or created
    Completed { items: u64 },

    /// Nothing to do this time
    Skipped(&'static str),
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Completed { items } => write!(f, "completed ({items} items)"),
            JobOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Handed to every run
#[derive(Clone)]
pub struct JobContext {
    pub db: PgPool,

    /// Cancelled on shutdown; long jobs should check it between steps
    pub shutdown: CancellationToken,
}

impl JobContext {
    pub fn new(db: PgPool, shutdown: CancellationToken) -> Self {
        Self { db, shutdown }
    }

    pub fn ensure_running(&self) -> JobResult<()> {
        if self.shutdown.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &JobContext) -> JobResult<JobOutcome>;
}
