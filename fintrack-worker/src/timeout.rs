/// Time limits for job runs
///
/// Every run is raced against its deadline and the shutdown token. Whichever fires first
/// drops the run's future, so a job stuck on a slow provider or a locked table cannot hold
/// up the next tick or the shutdown.
///
/// # Limits
///
/// - Default: 5 minutes
/// - Minimum: 1 second
/// - Maximum: 1 hour
///
/// # Example
///
/// ```no_run
/// use fintrack_worker::timeout::JobTimeout;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let limit = JobTimeout::new(Duration::from_secs(30));
/// let shutdown = CancellationToken::new();
///
/// let result = limit.run(&shutdown, async { Ok(42) }).await;
/// assert_eq!(result.unwrap(), 42);
/// # }
/// ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::jobs::{JobError, JobResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);

pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTimeout {
    limit: Duration,
}

impl Default for JobTimeout {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TIMEOUT,
        }
    }
}

impl JobTimeout {
    /// Clamps `limit` into `[MIN_TIMEOUT, MAX_TIMEOUT]`
    pub fn new(limit: Duration) -> Self {
        Self {
            limit: limit.clamp(MIN_TIMEOUT, MAX_TIMEOUT),
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Runs `work` until it finishes, the limit passes or `shutdown` is cancelled
    pub async fn run<T, F>(&self, shutdown: &CancellationToken, work: F) -> JobResult<T>
    where
        F: Future<Output = JobResult<T>>,
    {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(JobError::Cancelled),
            result = tokio::time::timeout(self.limit, work) => {
                result.map_err(|_| JobError::TimedOut(self.limit))?
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn test_clamped() {
        assert_eq!(JobTimeout::new(Duration::ZERO).limit(), MIN_TIMEOUT);
        assert_eq!(JobTimeout::new(Duration::from_secs(86_400)).limit(), MAX_TIMEOUT);
        assert_eq!(
            JobTimeout::new(Duration::from_secs(120)).limit(),
            Duration::from_secs(120)
        );
        assert_eq!(JobTimeout::default().limit(), DEFAULT_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finishes_in_time() {
        let limit = JobTimeout::new(Duration::from_secs(10));
        let shutdown = CancellationToken::new();

        let result = limit
            .run(&shutdown, async {
                sleep(Duration::from_secs(2)).await;
                Ok("done")
            })
            .await;

        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let limit = JobTimeout::new(Duration::from_secs(5));
        let shutdown = CancellationToken::new();

        let result: JobResult<()> = limit
            .run(&shutdown, async {
                sleep(Duration::from_secs(600)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(JobError::TimedOut(d)) if d == Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts() {
        let limit = JobTimeout::new(Duration::from_secs(300));
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result: JobResult<()> = limit
            .run(&shutdown, async {
                sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(JobError::Cancelled)));
    }

    #[tokio::test]
    async fn test_job_error_passes_through() {
        let shutdown = CancellationToken::new();

        let result: JobResult<()> = JobTimeout::default()
            .run(&shutdown, async { Err(JobError::Failed("both markets".into())) })
            .await;

        assert!(matches!(result, Err(JobError::Failed(_))));
    }
}
