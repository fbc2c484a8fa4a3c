/// Goal, reminder and ledger calculators
///
/// Pure functions over decimals and calendar dates. Everything that depends on "now"
/// takes it as an argument so callers and tests control the clock.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use fintrack_shared::calculators::next_due_date;
/// use fintrack_shared::models::reminder::RecurrenceType;
///
/// let due = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
/// let next = next_due_date(due, RecurrenceType::Monthly);
/// assert_eq!(next, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
/// ```

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::reminder::RecurrenceType;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Progress percentage `current / target * 100`, clamped to `[0, 100]`, 2 decimals
///
/// A non-positive target yields 0.
pub fn progress(current: Decimal, target: Decimal) -> Decimal {
    if target <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let pct = current * Decimal::ONE_HUNDRED / target;
    pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whole days until `date` (midnight UTC), rounded up; negative once the date has passed
pub fn days_remaining(date: NaiveDate, now: DateTime<Utc>) -> i64 {
    let due = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let millis = (due - now).num_milliseconds();

    if millis >= 0 {
        (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    } else {
        // truncation toward zero is the ceiling for negatives
        millis / MILLIS_PER_DAY
    }
}

pub fn is_overdue(days_remaining: i64) -> bool {
    days_remaining < 0
}

/// True inside the notification window `0 <= days <= reminder_days`
pub fn should_notify(days_remaining: i64, reminder_days: i32) -> bool {
    days_remaining >= 0 && days_remaining <= i64::from(reminder_days)
}

/// Due date of the next occurrence of a recurring reminder
///
/// Adds one calendar month or year; a day past the end of the target month clamps to
/// its last day (Jan 31 -> Feb 29 in a leap year, Feb 29 -> Feb 28 a year later).
pub fn next_due_date(due: NaiveDate, recurrence: RecurrenceType) -> NaiveDate {
    let months = match recurrence {
        RecurrenceType::Monthly => Months::new(1),
        RecurrenceType::Yearly => Months::new(12),
    };

    due.checked_add_months(months).unwrap_or(due)
}

/// Rounds up to the next whole cent
pub fn ceil_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::ToPositiveInfinity)
}

/// Suggested contribution per period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsSuggestions {
    pub daily: Decimal,
    pub weekly: Decimal,
    pub monthly: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsPlan {
    pub remaining_amount: Decimal,
    pub current_progress: Decimal,
    pub days_remaining: Option<i64>,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<SavingsSuggestions>,
    /// Monthly suggestion as a share of average monthly income, 1 decimal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_of_income: Option<Decimal>,
}

/// Builds the savings plan for a goal
///
/// Suggestions appear only while the goal is open and the deadline lies ahead; the income
/// share additionally requires a positive `avg_monthly_income`.
pub fn savings_plan(
    current: Decimal,
    target: Decimal,
    days_remaining: Option<i64>,
    avg_monthly_income: Decimal,
) -> SavingsPlan {
    let remaining = (target - current).max(Decimal::ZERO);
    let is_completed = current >= target;

    let mut plan = SavingsPlan {
        remaining_amount: remaining,
        current_progress: progress(current, target),
        days_remaining,
        is_completed,
        suggestions: None,
        percentage_of_income: None,
    };

    let days = match days_remaining {
        Some(days) if days > 0 && !is_completed => days,
        _ => return plan,
    };

    let daily_raw = remaining / Decimal::from(days);
    let monthly = ceil_cents(daily_raw * Decimal::from(30));

    plan.suggestions = Some(SavingsSuggestions {
        daily: ceil_cents(daily_raw),
        weekly: ceil_cents(daily_raw * Decimal::from(7)),
        monthly,
    });

    if avg_monthly_income > Decimal::ZERO {
        plan.percentage_of_income = Some(
            (monthly * Decimal::ONE_HUNDRED / avg_monthly_income)
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
        );
    }

    plan
}

/// Percentage change from `previous` to `current`, 2 decimals; 0 when `previous` is 0
pub fn percent_change(previous: Decimal, current: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }

    ((current - previous) * Decimal::ONE_HUNDRED / previous.abs())
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `part` as a percentage of `total`, 2 decimals; 0 when `total` is 0
pub fn share_of(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }

    (part * Decimal::ONE_HUNDRED / total)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_progress_clamps() {
        assert_eq!(progress(dec("250"), dec("1000")), dec("25"));
        assert_eq!(progress(dec("1000"), dec("1000")), dec("100"));
        assert_eq!(progress(dec("1500"), dec("1000")), dec("100"));
        assert_eq!(progress(dec("-10"), dec("1000")), Decimal::ZERO);
        assert_eq!(progress(dec("10"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_progress_rounds_to_cents() {
        assert_eq!(progress(dec("1"), dec("3")), dec("33.33"));
    }

    #[test]
    fn test_days_remaining_rounds_up() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(days_remaining(date(2024, 3, 11), now), 1);
        assert_eq!(days_remaining(date(2024, 3, 20), now), 10);
        assert_eq!(days_remaining(date(2024, 3, 10), now), 0);
        assert_eq!(days_remaining(date(2024, 3, 9), now), -1);
        assert_eq!(days_remaining(date(2024, 3, 8), now), -2);
    }

    #[test]
    fn test_overdue_and_notify_window() {
        assert!(is_overdue(-1));
        assert!(!is_overdue(0));
        assert!(should_notify(0, 3));
        assert!(should_notify(3, 3));
        assert!(!should_notify(4, 3));
        assert!(!should_notify(-1, 3));
    }

    #[test]
    fn test_next_due_date_monthly() {
        assert_eq!(
            next_due_date(date(2024, 1, 15), RecurrenceType::Monthly),
            date(2024, 2, 15)
        );
        assert_eq!(
            next_due_date(date(2024, 12, 20), RecurrenceType::Monthly),
            date(2025, 1, 20)
        );
    }

    #[test]
    fn test_next_due_date_clamps_month_end() {
        assert_eq!(
            next_due_date(date(2024, 1, 31), RecurrenceType::Monthly),
            date(2024, 2, 29)
        );
        assert_eq!(
            next_due_date(date(2023, 1, 31), RecurrenceType::Monthly),
            date(2023, 2, 28)
        );
        assert_eq!(
            next_due_date(date(2024, 2, 29), RecurrenceType::Yearly),
            date(2025, 2, 28)
        );
    }

    #[test]
    fn test_ceil_cents() {
        assert_eq!(ceil_cents(dec("3.3333")), dec("3.34"));
        assert_eq!(ceil_cents(dec("3.30")), dec("3.30"));
    }

    #[test]
    fn test_savings_plan_suggestions() {
        let plan = savings_plan(dec("0"), dec("100"), Some(30), dec("1000"));
        let suggestions = plan.suggestions.unwrap();

        assert_eq!(plan.remaining_amount, dec("100"));
        assert_eq!(suggestions.daily, dec("3.34"));
        assert_eq!(suggestions.weekly, dec("23.34"));
        assert_eq!(suggestions.monthly, dec("100"));
        assert_eq!(plan.percentage_of_income, Some(dec("10.0")));
    }

    #[test]
    fn test_savings_plan_completed_has_no_suggestions() {
        let plan = savings_plan(dec("120"), dec("100"), Some(30), dec("1000"));
        assert!(plan.is_completed);
        assert_eq!(plan.remaining_amount, Decimal::ZERO);
        assert!(plan.suggestions.is_none());
    }

    #[test]
    fn test_savings_plan_without_deadline_or_income() {
        let plan = savings_plan(dec("10"), dec("100"), None, dec("1000"));
        assert!(plan.suggestions.is_none());

        let plan = savings_plan(dec("10"), dec("100"), Some(10), Decimal::ZERO);
        assert!(plan.suggestions.is_some());
        assert!(plan.percentage_of_income.is_none());
    }

    #[test]
    fn test_percent_change_and_share() {
        assert_eq!(percent_change(dec("100"), dec("150")), dec("50"));
        assert_eq!(percent_change(Decimal::ZERO, dec("150")), Decimal::ZERO);
        assert_eq!(share_of(dec("25"), dec("200")), dec("12.5"));
        assert_eq!(share_of(dec("25"), Decimal::ZERO), Decimal::ZERO);
    }
}
