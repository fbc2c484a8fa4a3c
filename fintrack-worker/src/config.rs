/// Worker configuration
///
/// Read from the environment through the `config` crate. Every setting uses the
/// `FINTRACK_WORKER_` prefix except the database URL, which is shared with the API:
///
/// | Variable                                  | Default |
/// |-------------------------------------------|---------|
/// | `DATABASE_URL`                            | required |
/// | `FINTRACK_WORKER_DB_POOL_LIMIT`           | 5       |
/// | `FINTRACK_WORKER_MARKET_REFRESH_SECS`     | 3600    |
/// | `FINTRACK_WORKER_LOG_PURGE_SECS`          | 86400   |
/// | `FINTRACK_WORKER_CONFIG_CHECK_SECS`       | 21600   |
/// | `FINTRACK_WORKER_JOB_TIMEOUT_SECS`        | 300     |
/// | `FINTRACK_WORKER_HTTP_TIMEOUT_SECS`       | 30      |
/// | `FINTRACK_WORKER_SCRAPING_LOG_RETENTION_DAYS` | 30  |
/// | `FINTRACK_WORKER_USAGE_RETENTION_DAYS`    | 90      |

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "FINTRACK_WORKER";

#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    database_url: String,
    db_pool_limit: u32,
    market_refresh_secs: u64,
    log_purge_secs: u64,
    config_check_secs: u64,
    job_timeout_secs: u64,
    http_timeout_secs: u64,
    scraping_log_retention_days: i64,
    usage_retention_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub market_refresh_interval: Duration,
    pub log_purge_interval: Duration,
    pub config_check_interval: Duration,
    /// Upper bound on a single job run
    pub job_timeout: Duration,
    pub http_timeout: Duration,
    pub retention: Retention,
}

/// How long purged tables keep their rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub scraping_log_days: i64,
    pub usage_days: i64,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            scraping_log_days: 30,
            usage_days: 90,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_sources(
            Environment::with_prefix(ENV_PREFIX),
            std::env::var("DATABASE_URL").ok(),
        )
    }

    fn from_sources(
        environment: Environment,
        database_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let retention = Retention::default();

        let raw: RawSettings = Config::builder()
            .set_default("db_pool_limit", 5_i64)?
            .set_default("market_refresh_secs", 3600_i64)?
            .set_default("log_purge_secs", 86_400_i64)?
            .set_default("config_check_secs", 21_600_i64)?
            .set_default("job_timeout_secs", 300_i64)?
            .set_default("http_timeout_secs", 30_i64)?
            .set_default("scraping_log_retention_days", retention.scraping_log_days)?
            .set_default("usage_retention_days", retention.usage_days)?
            .add_source(environment)
            .set_override_option("database_url", database_url)?
            .build()?
            .try_deserialize()?;

        Self::try_from(raw)
    }
}

impl TryFrom<RawSettings> for WorkerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        if raw.database_url.trim().is_empty() {
            return Err(ConfigError::Message("DATABASE_URL must not be empty".to_string()));
        }

        let intervals = [
            ("market_refresh_secs", raw.market_refresh_secs),
            ("log_purge_secs", raw.log_purge_secs),
            ("config_check_secs", raw.config_check_secs),
            ("job_timeout_secs", raw.job_timeout_secs),
            ("http_timeout_secs", raw.http_timeout_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Message(format!("{name} must be positive")));
        }

        if raw.scraping_log_retention_days < 1 || raw.usage_retention_days < 1 {
            return Err(ConfigError::Message(
                "retention periods must be at least one day".to_string(),
            ));
        }

        Ok(Self {
            database_url: raw.database_url,
            max_connections: raw.db_pool_limit.max(1),
            market_refresh_interval: Duration::from_secs(raw.market_refresh_secs),
            log_purge_interval: Duration::from_secs(raw.log_purge_secs),
            config_check_interval: Duration::from_secs(raw.config_check_secs),
            job_timeout: Duration::from_secs(raw.job_timeout_secs),
            http_timeout: Duration::from_secs(raw.http_timeout_secs),
            retention: Retention {
                scraping_log_days: raw.scraping_log_retention_days,
                usage_days: raw.usage_retention_days,
            },
        })
    }
}
