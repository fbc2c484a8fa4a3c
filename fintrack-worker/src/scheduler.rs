/// Job scheduler
///
/// Runs each registered job on its own fixed interval until shutdown.
///
/// # Architecture
///
/// ```text
/// Scheduler
///   ├─> market_refresh   every hour
///   ├─> log_purge        every day
///   └─> config_check     every 6 hours
/// ```
///
/// Every job gets its own Tokio task and ticks immediately on start. A run that fails, times
/// out or overruns its interval is logged and the next tick is delayed rather than
/// bunched up. Runs of the same job never overlap.
///
/// # Example
///
/// ```no_run
/// use fintrack_worker::{jobs::ConfigCheckJob, scheduler::Scheduler, timeout::JobTimeout};
/// use sqlx::PgPool;
/// use std::{sync::Arc, time::Duration};
///
/// # async fn example(pool: PgPool) {
/// let mut scheduler = Scheduler::new(pool, JobTimeout::default());
/// scheduler.register(Arc::new(ConfigCheckJob), Duration::from_secs(6 * 3600));
///
/// let shutdown = scheduler.shutdown_token();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.cancel();
/// });
///
/// scheduler.run().await;
/// # }
/// ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::PgPool;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::jobs::{Job, JobContext, JobError, JobOutcome, JobResult};
use crate::timeout::JobTimeout;

struct Entry {
    job: Arc<dyn Job>,
    every: Duration,
}

pub struct Scheduler {
    db: PgPool,
    timeout: JobTimeout,
    entries: Vec<Entry>,
    shutdown_token: CancellationToken,
}

impl Scheduler {
    pub fn new(db: PgPool, timeout: JobTimeout) -> Self {
        Scheduler {
            db,
            timeout,
            entries: Vec::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn register(&mut self, job: Arc<dyn Job>, every: Duration) {
        tracing::info!(job = job.name(), every_secs = every.as_secs(), "Registering job");
        self.entries.push(Entry { job, every });
    }

    /// Cancelling this token stops every job loop
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.job.name()).collect()
    }

    /// Runs until the shutdown token is cancelled and every loop has stopped
    pub async fn run(self) {
        tracing::info!(jobs = self.entries.len(), "Scheduler starting");

        let ctx = JobContext::new(self.db, self.shutdown_token.clone());
        let mut loops = JoinSet::new();

        for entry in self.entries {
            loops.spawn(job_loop(entry, ctx.clone(), self.timeout));
        }

        while let Some(result) = loops.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job loop panicked");
            }
        }

        tracing::info!("Scheduler stopped");
    }
}

async fn job_loop(entry: Entry, ctx: JobContext, timeout: JobTimeout) {
    let mut ticker = tokio::time::interval(entry.every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                run_once(entry.job.as_ref(), &ctx, timeout).await.ok();
            }
        }
    }

    tracing::debug!(job = entry.job.name(), "Job loop stopped");
}

/// One bounded run with its outcome logged
pub async fn run_once(job: &dyn Job, ctx: &JobContext, timeout: JobTimeout) -> JobResult<JobOutcome> {
    let started = Instant::now();
    let result = timeout.run(&ctx.shutdown, job.run(ctx)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match &result {
        Ok(outcome) => {
            tracing::info!(job = job.name(), elapsed_ms, %outcome, "Job finished");
        }
        Err(JobError::Cancelled) => {
            tracing::info!(job = job.name(), "Job interrupted by shutdown");
        }
        Err(e) => {
            tracing::error!(job = job.name(), elapsed_ms, error = %e, "Job failed");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgresql://localhost:1/fintrack")
            .unwrap()
    }

    #[derive(Default)]
    struct Counting {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Job for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, _ctx: &JobContext) -> JobResult<JobOutcome> {
            let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(JobOutcome::Completed { items: runs as u64 })
        }
    }

    struct Failing;

    #[async_trait]
    impl Job for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&self, _ctx: &JobContext) -> JobResult<JobOutcome> {
            Err(JobError::Failed("provider down".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_tick_until_shutdown() {
        let counting = Arc::new(Counting::default());
        let mut scheduler = Scheduler::new(lazy_pool(), JobTimeout::default());
        scheduler.register(counting.clone(), Duration::from_secs(10));
        scheduler.register(Arc::new(Failing), Duration::from_secs(10));
        assert_eq!(scheduler.job_names(), vec!["counting", "failing"]);

        let shutdown = scheduler.shutdown_token();
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.cancel();
        handle.await.unwrap();

        // ticks at 0s, 10s and 20s; failures do not stop the other loop
        assert_eq!(counting.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_once_reports_outcome() {
        let ctx = JobContext::new(lazy_pool(), CancellationToken::new());

        let outcome = run_once(&Counting::default(), &ctx, JobTimeout::default())
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed { items: 1 });

        let failed = run_once(&Failing, &ctx, JobTimeout::default()).await;
        assert!(matches!(failed, Err(JobError::Failed(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let ctx = JobContext::new(lazy_pool(), shutdown);

        let result = run_once(&Counting::default(), &ctx, JobTimeout::default()).await;
        assert!(matches!(result, Err(JobError::Cancelled)));
    }
}
