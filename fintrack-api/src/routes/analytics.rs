/// Spending analytics
///
/// ```text
/// GET /api/analytics/dashboard?period=30
/// GET /api/analytics/trends?period=week|month|year&start_date=YYYY-MM-DD&end_date=YYYY-MM-DD
/// GET /api/analytics/categories?period=30
/// GET /api/analytics/predictions
/// GET /api/analytics/monthly-report?year=2024&month=5
/// ```
///
/// All windows are half-open `[from, to)` in UTC.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiQuery,
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use fintrack_shared::{
    auth::middleware::AuthContext,
    calculators::{percent_change, share_of},
    models::transaction::{CategoryTotal, LedgerSummary, PeriodBucket, PeriodTotals, Transaction},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const DEFAULT_PERIOD_DAYS: i64 = 30;
const MAX_PERIOD_DAYS: i64 = 3650;
const RECENT_TRANSACTIONS: i64 = 10;
const DAILY_TREND_DAYS: i64 = 7;
const PREDICTION_MONTHS: u32 = 6;
const TOP_TRANSACTIONS: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyReportQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Totals over a window
#[derive(Debug, Clone, Serialize)]
pub struct WindowSummary {
    #[serde(flatten)]
    pub totals: LedgerSummary,
    pub transaction_count: i64,
}

impl From<(LedgerSummary, i64)> for WindowSummary {
    fn from((totals, transaction_count): (LedgerSummary, i64)) -> Self {
        Self {
            totals,
            transaction_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub period_days: i64,
    pub summary: WindowSummary,
    pub categories: Vec<CategoryTotal>,
    pub recent_transactions: Vec<Transaction>,
    pub daily_trend: Vec<PeriodTotals>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HalfComparison {
    pub first_half: LedgerSummary,
    pub second_half: LedgerSummary,
    pub income_change: Decimal,
    pub expense_change: Decimal,
}

#[derive(Debug, Serialize)]
pub struct Trends {
    pub period: TrendPeriod,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub trends: Vec<PeriodTotals>,
    pub comparison: HalfComparison,
}

#[derive(Debug, Serialize)]
pub struct CategoryShare {
    #[serde(flatten)]
    pub category: CategoryTotal,
    /// Percentage of the total for the same type
    pub share: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predictions {
    pub average_monthly: Projection,
    pub next_month: Projection,
    pub next_quarter: Projection,
    pub income_trend: Decimal,
    pub expense_trend: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    pub predictions: Predictions,
    pub historical_data: Vec<PeriodTotals>,
}

#[derive(Debug, Serialize)]
pub struct MonthComparison {
    pub previous: WindowSummary,
    pub income_change: Decimal,
    pub expense_change: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub summary: WindowSummary,
    pub comparison: MonthComparison,
    pub category_breakdown: Vec<CategoryShare>,
    pub top_transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPeriod {
    Week,
    Month,
    Year,
}

impl TrendPeriod {
    /// Unknown values fall back to `month`
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("week") => TrendPeriod::Week,
            Some("year") => TrendPeriod::Year,
            _ => TrendPeriod::Month,
        }
    }

    pub fn bucket(&self) -> PeriodBucket {
        match self {
            TrendPeriod::Year => PeriodBucket::Month,
            _ => PeriodBucket::Day,
        }
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TrendPeriod::Week => now - Duration::days(7),
            TrendPeriod::Month => now.checked_sub_months(Months::new(1)).unwrap_or(now),
            TrendPeriod::Year => now.checked_sub_months(Months::new(12)).unwrap_or(now),
        }
    }
}

/// Positive day count, falling back to the default for anything unparsable
pub fn period_days(raw: Option<&str>) -> i64 {
    raw.and_then(|r| r.trim().parse::<i64>().ok())
        .filter(|days| *days > 0)
        .map(|days| days.min(MAX_PERIOD_DAYS))
        .unwrap_or(DEFAULT_PERIOD_DAYS)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Explicit date range, inclusive of both days
pub fn explicit_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, ApiError> {
    let parse = |raw: &str| {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest("Invalid date range".to_string()))
    };

    let start = start.map(parse).transpose()?;
    let end = end.map(parse).transpose()?;

    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(ApiError::BadRequest(
            "start_date must not be after end_date".to_string(),
        )),
        (Some(start), Some(end)) => Ok(Some((midnight(start), midnight(end) + Duration::days(1)))),
        _ => Ok(None),
    }
}

/// First instant of the month and of the following month
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some((midnight(first), midnight(next)))
}

/// Averages, projections and month-over-month trend from a monthly series
pub fn predict(history: &[PeriodTotals]) -> Predictions {
    let months = Decimal::from(history.len().max(1) as u64);
    let income: Decimal = history.iter().map(|m| m.income).sum();
    let expenses: Decimal = history.iter().map(|m| m.expenses).sum();

    let avg_income = (income / months).round_dp(2);
    let avg_expenses = (expenses / months).round_dp(2);
    let three = Decimal::from(3);

    let (income_trend, expense_trend) = match history {
        [.., previous, latest] => (
            percent_change(previous.income, latest.income),
            percent_change(previous.expenses, latest.expenses),
        ),
        _ => (Decimal::ZERO, Decimal::ZERO),
    };

    let average_monthly = Projection {
        income: avg_income,
        expenses: avg_expenses,
        balance: avg_income - avg_expenses,
    };

    Predictions {
        next_month: average_monthly.clone(),
        next_quarter: Projection {
            income: avg_income * three,
            expenses: avg_expenses * three,
            balance: (avg_income - avg_expenses) * three,
        },
        average_monthly,
        income_trend,
        expense_trend,
    }
}

/// Attaches each category's share of its type total
pub fn with_shares(categories: Vec<CategoryTotal>) -> Vec<CategoryShare> {
    let type_total = |kind: &str| -> Decimal {
        categories
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.total)
            .sum()
    };
    let income_total = type_total("income");
    let expense_total = type_total("expense");

    categories
        .into_iter()
        .map(|category| {
            let total = if category.kind == "income" {
                income_total
            } else {
                expense_total
            };
            CategoryShare {
                share: share_of(category.total, total),
                category,
            }
        })
        .collect()
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<PeriodQuery>,
) -> ApiResult<Dashboard> {
    let days = period_days(query.period.as_deref());
    let now = Utc::now();
    let from = now - Duration::days(days);

    let summary = Transaction::summary_between(&state.db, auth.user_id, from, now).await?;
    let categories = Transaction::category_totals(&state.db, auth.user_id, from, now).await?;
    let recent_transactions =
        Transaction::recent(&state.db, auth.user_id, RECENT_TRANSACTIONS).await?;
    let daily_trend = Transaction::totals_by_period(
        &state.db,
        auth.user_id,
        now - Duration::days(DAILY_TREND_DAYS),
        now,
        PeriodBucket::Day,
    )
    .await?;

    Ok(ApiResponse::success(Dashboard {
        period_days: days,
        summary: summary.into(),
        categories,
        recent_transactions,
        daily_trend,
    }))
}

pub async fn trends(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<TrendsQuery>,
) -> ApiResult<Trends> {
    let period = TrendPeriod::parse(query.period.as_deref());
    let now = Utc::now();

    let (from, to) = explicit_range(query.start_date.as_deref(), query.end_date.as_deref())?
        .unwrap_or_else(|| (period.window_start(now), now));

    let series =
        Transaction::totals_by_period(&state.db, auth.user_id, from, to, period.bucket()).await?;

    let mid = from + (to - from) / 2;
    let (first_half, _) = Transaction::summary_between(&state.db, auth.user_id, from, mid).await?;
    let (second_half, _) = Transaction::summary_between(&state.db, auth.user_id, mid, to).await?;

    Ok(ApiResponse::success(Trends {
        period,
        from,
        to,
        trends: series,
        comparison: HalfComparison {
            income_change: percent_change(first_half.income, second_half.income),
            expense_change: percent_change(first_half.expenses, second_half.expenses),
            first_half,
            second_half,
        },
    }))
}

pub async fn categories(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<PeriodQuery>,
) -> ApiResult<Vec<CategoryShare>> {
    let days = period_days(query.period.as_deref());
    let now = Utc::now();

    let categories =
        Transaction::category_totals(&state.db, auth.user_id, now - Duration::days(days), now)
            .await?;

    Ok(ApiResponse::success(with_shares(categories)))
}

pub async fn predictions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<PredictionsResponse> {
    let now = Utc::now();
    let from = now
        .checked_sub_months(Months::new(PREDICTION_MONTHS))
        .unwrap_or(now);

    let history =
        Transaction::totals_by_period(&state.db, auth.user_id, from, now, PeriodBucket::Month)
            .await?;

    Ok(ApiResponse::success(PredictionsResponse {
        predictions: predict(&history),
        historical_data: history,
    }))
}

pub async fn monthly_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<MonthlyReportQuery>,
) -> ApiResult<MonthlyReport> {
    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());

    let (from, to) = month_bounds(year, month)
        .ok_or_else(|| ApiError::BadRequest("Invalid year or month".to_string()))?;
    let previous_from = from
        .checked_sub_months(Months::new(1))
        .ok_or_else(|| ApiError::BadRequest("Invalid year or month".to_string()))?;

    let (current, count) = Transaction::summary_between(&state.db, auth.user_id, from, to).await?;
    let previous = Transaction::summary_between(&state.db, auth.user_id, previous_from, from).await?;

    let expense_categories = Transaction::category_totals(&state.db, auth.user_id, from, to)
        .await?
        .into_iter()
        .filter(|c| c.kind == "expense")
        .collect();

    let top_transactions =
        Transaction::largest_between(&state.db, auth.user_id, from, to, TOP_TRANSACTIONS).await?;

    Ok(ApiResponse::success(MonthlyReport {
        year,
        month,
        comparison: MonthComparison {
            income_change: percent_change(previous.0.income, current.income),
            expense_change: percent_change(previous.0.expenses, current.expenses),
            previous: previous.into(),
        },
        summary: (current, count).into(),
        category_breakdown: with_shares(expense_categories),
        top_transactions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn month(period: &str, income: i64, expenses: i64) -> PeriodTotals {
        PeriodTotals {
            period: period.to_string(),
            income: Decimal::from(income),
            expenses: Decimal::from(expenses),
            transaction_count: 1,
        }
    }

    #[test]
    fn test_period_days() {
        assert_eq!(period_days(None), 30);
        assert_eq!(period_days(Some("90")), 90);
        assert_eq!(period_days(Some("-5")), 30);
        assert_eq!(period_days(Some("abc")), 30);
        assert_eq!(period_days(Some("999999")), MAX_PERIOD_DAYS);
    }

    #[test]
    fn test_trend_period() {
        assert_eq!(TrendPeriod::parse(Some("year")), TrendPeriod::Year);
        assert_eq!(TrendPeriod::parse(Some("decade")), TrendPeriod::Month);
        assert_eq!(TrendPeriod::Year.bucket(), PeriodBucket::Month);
        assert_eq!(TrendPeriod::Week.bucket(), PeriodBucket::Day);

        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(
            TrendPeriod::Month.window_start(now),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_explicit_range() {
        let (from, to) = explicit_range(Some("2024-01-01"), Some("2024-01-31"))
            .unwrap()
            .unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());

        assert!(explicit_range(Some("2024-01-01"), None).unwrap().is_none());
        assert!(explicit_range(Some("yesterday"), Some("2024-01-31")).is_err());
        assert!(explicit_range(Some("2024-02-01"), Some("2024-01-01")).is_err());
    }

    #[test]
    fn test_month_bounds() {
        let (from, to) = month_bounds(2024, 12).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        assert!(month_bounds(2024, 13).is_none());
        assert!(month_bounds(2024, 0).is_none());
    }

    #[test]
    fn test_predict() {
        let history = vec![
            month("2024-01", 3000, 2000),
            month("2024-02", 3000, 2500),
            month("2024-03", 3600, 2000),
        ];
        let predictions = predict(&history);

        assert_eq!(predictions.next_month.income, Decimal::from(3200));
        assert_eq!(predictions.next_month.expenses, Decimal::new(216667, 2));
        assert_eq!(predictions.next_quarter.income, Decimal::from(9600));
        assert_eq!(predictions.income_trend, Decimal::from(20));
        assert_eq!(predictions.expense_trend, Decimal::from(-20));
    }

    #[test]
    fn test_predict_without_history() {
        let predictions = predict(&[]);
        assert_eq!(predictions.next_month.income, Decimal::ZERO);
        assert_eq!(predictions.income_trend, Decimal::ZERO);
    }

    #[test]
    fn test_category_shares() {
        let category = |name: &str, kind: &str, total: i64| CategoryTotal {
            category: name.to_string(),
            kind: kind.to_string(),
            total: Decimal::from(total),
            count: 1,
            average: Decimal::from(total),
            max_amount: Decimal::from(total),
            min_amount: Decimal::from(total),
        };

        let shares = with_shares(vec![
            category("Salary", "income", 3000),
            category("Rent", "expense", 750),
            category("Food", "expense", 250),
        ]);

        assert_eq!(shares[0].share, Decimal::from(100));
        assert_eq!(shares[1].share, Decimal::from(75));
        assert_eq!(shares[2].share, Decimal::from(25));
    }
}
