/// Tiered usage limiting for metered AI operations
///
/// Two independent ceilings exist:
///
/// **Market analysis** (counted from `ai_usage` rows of type `market_analysis`):
/// - Free: 1 call per calendar day (UTC)
/// - Premium: 3 calls per rolling 7-day window
/// - Premium+: unlimited
///
/// **AI chat** (lifetime `users.ai_questions_used` counter):
/// - Free: 3 questions, reset only by a paid upgrade
/// - Premium and Premium+: unlimited
///
/// A metered call is checked twice. [`UsageLimiter::check`] turns an over-limit caller away
/// before any slow work. Once the result is ready, [`UsageLimiter::begin`] opens a
/// transaction, locks the caller's user row and evaluates the ceiling again. The caller
/// writes its result through [`MeteredCall::conn`] and finishes with
/// [`MeteredCall::commit`], which inserts the usage row with the tier snapshot. Dropping the
/// call without committing records nothing. The lock is held only for those writes.
///
/// # Example
///
/// ```no_run
/// use fintrack_shared::models::ai_usage::UsageType;
/// use fintrack_shared::usage::{UsageError, UsageLimiter};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), UsageError> {
/// let limiter = UsageLimiter::new(pool);
///
/// limiter.check(user_id, UsageType::MarketAnalysis).await?;
/// // ... produce the analysis ...
/// let call = limiter.begin(user_id, UsageType::MarketAnalysis).await?;
/// let check = call.commit().await?;
/// println!("{}", check.message);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::ai_usage::{AiUsage, UsageType};
use crate::models::user::{SubscriptionTier, User};

/// Market analyses per calendar day on the free tier
pub const FREE_DAILY_ANALYSES: i64 = 1;

/// Market analyses per rolling week on the premium tier
pub const PREMIUM_WEEKLY_ANALYSES: i64 = 3;

/// Lifetime chat questions on the free tier
pub const FREE_CHAT_QUESTIONS: i32 = 3;

/// Usage limiter error
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// Ceiling reached; carries the evaluated check for the 429 body
    #[error("{}", .0.message)]
    LimitExceeded(UsageCheck),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Market-analysis ceiling of a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisCeiling {
    PerCalendarDay(i64),
    PerRollingWeek(i64),
    Unlimited,
}

impl AnalysisCeiling {
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Free => AnalysisCeiling::PerCalendarDay(FREE_DAILY_ANALYSES),
            SubscriptionTier::Premium => AnalysisCeiling::PerRollingWeek(PREMIUM_WEEKLY_ANALYSES),
            SubscriptionTier::PremiumPlus => AnalysisCeiling::Unlimited,
        }
    }

    /// Start of the counting window ending at `now`
    ///
    /// Unlimited tiers report usage over the rolling week.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            AnalysisCeiling::PerCalendarDay(_) => now.date_naive().and_time(NaiveTime::MIN).and_utc(),
            AnalysisCeiling::PerRollingWeek(_) | AnalysisCeiling::Unlimited => now - Duration::days(7),
        }
    }
}

/// Limit metadata returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UsageLimits {
    Daily { daily: i64, used: i64, remaining: i64 },
    Weekly { weekly: i64, used: i64, remaining: i64 },
    Unlimited { unlimited: bool, used: i64 },
    Chat { limit: i32, used: i32, remaining: i32 },
}

/// Outcome of a ceiling evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageCheck {
    pub allowed: bool,
    pub message: String,
    pub limits: UsageLimits,
}

impl UsageCheck {
    /// Evaluates the market-analysis ceiling given `used` calls in the current window
    pub fn market_analysis(ceiling: AnalysisCeiling, used: i64) -> Self {
        match ceiling {
            AnalysisCeiling::PerCalendarDay(limit) => {
                let allowed = used < limit;
                UsageCheck {
                    allowed,
                    message: if allowed {
                        "Analysis available".to_string()
                    } else {
                        format!("Daily analysis limit reached ({limit}/day)")
                    },
                    limits: UsageLimits::Daily {
                        daily: limit,
                        used,
                        remaining: (limit - used).max(0),
                    },
                }
            }
            AnalysisCeiling::PerRollingWeek(limit) => {
                let allowed = used < limit;
                UsageCheck {
                    allowed,
                    message: if allowed {
                        "Analysis available".to_string()
                    } else {
                        format!("Weekly analysis limit reached ({limit}/week)")
                    },
                    limits: UsageLimits::Weekly {
                        weekly: limit,
                        used,
                        remaining: (limit - used).max(0),
                    },
                }
            }
            AnalysisCeiling::Unlimited => UsageCheck {
                allowed: true,
                message: "Unlimited analyses".to_string(),
                limits: UsageLimits::Unlimited {
                    unlimited: true,
                    used,
                },
            },
        }
    }

    /// Evaluates the lifetime chat ceiling; only the free tier is bounded
    pub fn chat(tier: SubscriptionTier, used: i32) -> Self {
        if tier.is_paid() {
            return UsageCheck {
                allowed: true,
                message: "Unlimited questions".to_string(),
                limits: UsageLimits::Unlimited {
                    unlimited: true,
                    used: i64::from(used),
                },
            };
        }

        let allowed = used < FREE_CHAT_QUESTIONS;
        UsageCheck {
            allowed,
            message: if allowed {
                "Question available".to_string()
            } else {
                format!(
                    "Free question limit reached ({FREE_CHAT_QUESTIONS}). Upgrade to premium for unlimited questions"
                )
            },
            limits: UsageLimits::Chat {
                limit: FREE_CHAT_QUESTIONS,
                used,
                remaining: (FREE_CHAT_QUESTIONS - used).max(0),
            },
        }
    }

    /// The same check after one more call has been recorded
    fn after_one_more(&self) -> Self {
        let limits = match self.limits {
            UsageLimits::Daily {
                daily,
                used,
                remaining,
            } => UsageLimits::Daily {
                daily,
                used: used + 1,
                remaining: (remaining - 1).max(0),
            },
            UsageLimits::Weekly {
                weekly,
                used,
                remaining,
            } => UsageLimits::Weekly {
                weekly,
                used: used + 1,
                remaining: (remaining - 1).max(0),
            },
            UsageLimits::Unlimited { unlimited, used } => UsageLimits::Unlimited {
                unlimited,
                used: used + 1,
            },
            UsageLimits::Chat {
                limit,
                used,
                remaining,
            } => UsageLimits::Chat {
                limit,
                used: used + 1,
                remaining: (remaining - 1).max(0),
            },
        };

        UsageCheck {
            allowed: self.allowed,
            message: self.message.clone(),
            limits,
        }
    }
}

/// Usage limiting service
#[derive(Clone)]
pub struct UsageLimiter {
    db: PgPool,
}

impl UsageLimiter {
    pub fn new(db: PgPool) -> Self {
        UsageLimiter { db }
    }

    /// Evaluates the ceiling for `user_id` without locking or recording anything
    ///
    /// Handlers call this before slow work (provider fetches, completions) so a caller
    /// over the limit is turned away early. [`UsageLimiter::begin`] repeats the check under
    /// the row lock before anything is recorded.
    pub async fn check(&self, user_id: Uuid, kind: UsageType) -> Result<UsageCheck, UsageError> {
        let mut conn = self.db.acquire().await?;

        let user = User::find_by_id(&mut *conn, user_id)
            .await?
            .ok_or(UsageError::UserNotFound(user_id))?;
        let check = evaluate(&mut conn, &user, kind).await?;

        if !check.allowed {
            return Err(UsageError::LimitExceeded(check));
        }
        Ok(check)
    }

    /// Starts a metered call for `user_id`
    ///
    /// `InvestmentAdvice` has no ceiling and is only recorded. The returned call holds a
    /// pooled connection and the caller's row lock until it is committed or dropped, so
    /// reads through the pool and provider calls belong before `begin`.
    ///
    /// # Errors
    ///
    /// - `UsageError::LimitExceeded` when the caller's tier ceiling is reached
    /// - `UsageError::UserNotFound` when the user row is gone
    pub async fn begin(&self, user_id: Uuid, kind: UsageType) -> Result<MeteredCall, UsageError> {
        let mut tx = self.db.begin().await?;

        let user = User::lock_for_update(&mut tx, user_id)
            .await?
            .ok_or(UsageError::UserNotFound(user_id))?;
        let check = evaluate(&mut tx, &user, kind).await?;

        if !check.allowed {
            tracing::info!(
                user_id = %user_id,
                tier = %user.tier(),
                kind = kind.as_str(),
                "Usage limit reached"
            );
            tx.rollback().await?;
            return Err(UsageError::LimitExceeded(check));
        }

        Ok(MeteredCall {
            tx,
            user,
            kind,
            check,
        })
    }

    /// Current market-analysis standing without recording anything
    pub async fn analysis_status(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
    ) -> Result<UsageCheck, sqlx::Error> {
        let ceiling = AnalysisCeiling::for_tier(tier);
        let used = AiUsage::count_since(
            &self.db,
            user_id,
            UsageType::MarketAnalysis,
            ceiling.window_start(Utc::now()),
        )
        .await?;

        Ok(UsageCheck::market_analysis(ceiling, used))
    }
}

async fn evaluate(
    conn: &mut PgConnection,
    user: &User,
    kind: UsageType,
) -> Result<UsageCheck, sqlx::Error> {
    let tier = user.tier();

    let check = match kind {
        UsageType::MarketAnalysis => {
            let ceiling = AnalysisCeiling::for_tier(tier);
            let since = ceiling.window_start(Utc::now());
            let used = AiUsage::count_since(&mut *conn, user.id, kind, since).await?;
            UsageCheck::market_analysis(ceiling, used)
        }
        UsageType::Chat => UsageCheck::chat(tier, user.ai_questions_used),
        UsageType::InvestmentAdvice => UsageCheck {
            allowed: true,
            message: "Advice available".to_string(),
            limits: UsageLimits::Unlimited {
                unlimited: true,
                used: 0,
            },
        },
    };

    Ok(check)
}

/// A permitted metered call holding the caller's row lock until commit or drop
pub struct MeteredCall {
    tx: Transaction<'static, Postgres>,
    user: User,
    kind: UsageType,
    check: UsageCheck,
}

impl MeteredCall {
    /// The locked user row as read when the call began
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn tier(&self) -> SubscriptionTier {
        self.user.tier()
    }

    pub fn check(&self) -> &UsageCheck {
        &self.check
    }

    /// Connection inside the call's transaction, for writes that must land atomically
    /// with the usage record
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Records the usage row (and, for free-tier chat, bumps the lifetime counter) and
    /// commits
    pub async fn commit(mut self) -> Result<UsageCheck, UsageError> {
        let tier = self.user.tier();

        AiUsage::record(&mut *self.tx, self.user.id, self.kind, tier).await?;

        if self.kind == UsageType::Chat && !tier.is_paid() {
            User::increment_ai_questions(&mut *self.tx, self.user.id).await?;
        }

        self.tx.commit().await?;

        Ok(self.check.after_one_more())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_free_tier_one_analysis_per_day() {
        let ceiling = AnalysisCeiling::for_tier(SubscriptionTier::Free);

        let first = UsageCheck::market_analysis(ceiling, 0);
        assert!(first.allowed);

        let second = UsageCheck::market_analysis(ceiling, 1);
        assert!(!second.allowed);
        assert_eq!(
            second.limits,
            UsageLimits::Daily {
                daily: 1,
                used: 1,
                remaining: 0
            }
        );
    }

    #[test]
    fn test_premium_three_per_week() {
        let ceiling = AnalysisCeiling::for_tier(SubscriptionTier::Premium);
        assert!(UsageCheck::market_analysis(ceiling, 2).allowed);

        let fourth = UsageCheck::market_analysis(ceiling, 3);
        assert!(!fourth.allowed);
        assert_eq!(
            fourth.limits,
            UsageLimits::Weekly {
                weekly: 3,
                used: 3,
                remaining: 0
            }
        );
    }

    #[test]
    fn test_premium_plus_unlimited() {
        let ceiling = AnalysisCeiling::for_tier(SubscriptionTier::PremiumPlus);
        assert!(UsageCheck::market_analysis(ceiling, 10_000).allowed);
    }

    #[test]
    fn test_window_start() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 15, 30, 0).unwrap();

        assert_eq!(
            AnalysisCeiling::PerCalendarDay(1).window_start(now),
            Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap()
        );
        assert_eq!(
            AnalysisCeiling::PerRollingWeek(3).window_start(now),
            Utc.with_ymd_and_hms(2024, 5, 13, 15, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_call_eight_days_later_outside_week_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        let prior_call = now - Duration::days(8);
        assert!(prior_call < AnalysisCeiling::PerRollingWeek(3).window_start(now));
    }

    #[test]
    fn test_chat_ceiling_free_only() {
        let denied = UsageCheck::chat(SubscriptionTier::Free, 3);
        assert!(!denied.allowed);
        assert_eq!(
            denied.limits,
            UsageLimits::Chat {
                limit: 3,
                used: 3,
                remaining: 0
            }
        );

        assert!(UsageCheck::chat(SubscriptionTier::Free, 2).allowed);
        assert!(UsageCheck::chat(SubscriptionTier::Premium, 50).allowed);
        assert!(UsageCheck::chat(SubscriptionTier::PremiumPlus, 50).allowed);
    }

    #[test]
    fn test_after_one_more_consumes_remaining() {
        let check = UsageCheck::market_analysis(AnalysisCeiling::PerRollingWeek(3), 1);
        assert_eq!(
            check.after_one_more().limits,
            UsageLimits::Weekly {
                weekly: 3,
                used: 2,
                remaining: 1
            }
        );
    }

    #[test]
    fn test_limits_serialize_flat() {
        let json = serde_json::to_value(UsageLimits::Daily {
            daily: 1,
            used: 1,
            remaining: 0,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"daily": 1, "used": 1, "remaining": 0}));
    }
}
