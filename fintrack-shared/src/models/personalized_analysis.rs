/// Personalized market analyses (premium+ only, append-only)
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

impl RiskTolerance {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTolerance::Low => "low",
            RiskTolerance::Medium => "medium",
            RiskTolerance::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PersonalizedAnalysis {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub risk_tolerance: String,
    pub investment_goals: Option<String>,
    pub analysis_data: serde_json::Value,
    pub recommendations: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePersonalizedAnalysis {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub risk_tolerance: RiskTolerance,
    pub investment_goals: Option<String>,
    pub analysis_data: serde_json::Value,
    pub recommendations: String,
}

impl PersonalizedAnalysis {
    pub async fn create<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        data: CreatePersonalizedAnalysis,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PersonalizedAnalysis>(
            r#"
            INSERT INTO personalized_analysis
                (user_id, balance, risk_tolerance, investment_goals, analysis_data, recommendations)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, balance, risk_tolerance, investment_goals, analysis_data,
                      recommendations, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.balance)
        .bind(data.risk_tolerance.as_str())
        .bind(data.investment_goals)
        .bind(data.analysis_data)
        .bind(data.recommendations)
        .fetch_one(executor)
        .await
    }
}
