/// Makes sure the singleton `scraping_config` row exists
use async_trait::async_trait;
use fintrack_shared::models::scraping::ScrapingConfig;

use super::{Job, JobContext, JobOutcome, JobResult};

pub struct ConfigCheckJob;

#[async_trait]
impl Job for ConfigCheckJob {
    fn name(&self) -> &'static str {
        "config_check"
    }

    async fn run(&self, ctx: &JobContext) -> JobResult<JobOutcome> {
        if ScrapingConfig::ensure_default(&ctx.db).await? {
            tracing::info!("Created default scraping config");
            Ok(JobOutcome::Completed { items: 1 })
        } else {
            Ok(JobOutcome::Skipped("scraping config present"))
        }
    }
}
