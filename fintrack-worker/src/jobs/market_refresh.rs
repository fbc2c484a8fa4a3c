/// Hourly market refresh
///
/// Fetches crypto and stock quotes, upserts them and writes one `full` scraping log row.
/// Honours `scraping_config.scraping_enabled`; a missing config row counts as enabled.

use std::sync::Arc;

use async_trait::async_trait;
use fintrack_shared::{
    market,
    models::scraping::{ScrapeStatus, ScrapingConfig},
    providers::MarketDataProvider,
};

use super::{Job, JobContext, JobError, JobOutcome, JobResult};

pub struct MarketRefreshJob {
    provider: Arc<dyn MarketDataProvider>,
}

impl MarketRefreshJob {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Job for MarketRefreshJob {
    fn name(&self) -> &'static str {
        "market_refresh"
    }

    async fn run(&self, ctx: &JobContext) -> JobResult<JobOutcome> {
        let enabled = ScrapingConfig::load(&ctx.db)
            .await?
            .map_or(true, |config| config.scraping_enabled);
        if !enabled {
            return Ok(JobOutcome::Skipped("scraping disabled"));
        }

        ctx.ensure_running()?;

        let report = market::refresh_all(&ctx.db, self.provider.as_ref()).await?;

        tracing::info!(
            status = report.status.as_str(),
            records_updated = report.records_updated,
            execution_time_ms = report.execution_time_ms,
            "Market refresh finished"
        );

        match report.status {
            ScrapeStatus::Error => Err(JobError::Failed(report.errors.join("; "))),
            ScrapeStatus::Success | ScrapeStatus::Partial => Ok(JobOutcome::Completed {
                items: report.records_updated,
            }),
        }
    }
}
