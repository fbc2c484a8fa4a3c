/// Daily purge of scraping logs and AI usage rows past their retention
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fintrack_shared::models::{ai_usage::AiUsage, scraping::ScrapingLog};

use super::{Job, JobContext, JobOutcome, JobResult};
use crate::config::Retention;

pub struct LogPurgeJob {
    retention: Retention,
}

impl LogPurgeJob {
    pub fn new(retention: Retention) -> Self {
        Self { retention }
    }

    /// Cutoffs for scraping logs and usage rows, in that order
    pub fn cutoffs(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            now - Duration::days(self.retention.scraping_log_days),
            now - Duration::days(self.retention.usage_days),
        )
    }
}

#[async_trait]
impl Job for LogPurgeJob {
    fn name(&self) -> &'static str {
        "log_purge"
    }

    async fn run(&self, ctx: &JobContext) -> JobResult<JobOutcome> {
        let (logs_cutoff, usage_cutoff) = self.cutoffs(Utc::now());

        let logs = ScrapingLog::purge_before(&ctx.db, logs_cutoff).await?;
        ctx.ensure_running()?;
        let usage = AiUsage::purge_before(&ctx.db, usage_cutoff).await?;

        tracing::info!(scraping_logs = logs, ai_usage = usage, "Purged expired rows");

        Ok(JobOutcome::Completed {
            items: logs + usage,
        })
    }
}
