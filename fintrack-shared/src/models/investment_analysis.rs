/// Stored investment recommendations
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Buy,
    Sell,
    Hold,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Buy => "buy",
            AnalysisType::Sell => "sell",
            AnalysisType::Hold => "hold",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvestmentAnalysis {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub analysis_type: String,
    pub confidence_score: f64,
    pub reasoning: String,
    pub ai_recommendation: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateInvestmentAnalysis {
    pub user_id: Uuid,
    pub symbol: String,
    pub analysis_type: AnalysisType,
    pub confidence_score: f64,
    pub reasoning: String,
    pub ai_recommendation: Option<String>,
}

const ANALYSIS_COLUMNS: &str =
    "id, user_id, symbol, analysis_type, confidence_score, reasoning, ai_recommendation, created_at";

impl InvestmentAnalysis {
    pub async fn create<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        data: CreateInvestmentAnalysis,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, InvestmentAnalysis>(&format!(
            r#"
            INSERT INTO investment_analysis
                (user_id, symbol, analysis_type, confidence_score, reasoning, ai_recommendation)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ANALYSIS_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.symbol.to_uppercase())
        .bind(data.analysis_type.as_str())
        .bind(data.confidence_score)
        .bind(data.reasoning)
        .bind(data.ai_recommendation)
        .fetch_one(executor)
        .await
    }

    /// The caller's latest analyses of one symbol
    pub async fn recent_for_symbol(
        pool: &PgPool,
        user_id: Uuid,
        symbol: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, InvestmentAnalysis>(&format!(
            r#"
            SELECT {ANALYSIS_COLUMNS} FROM investment_analysis
            WHERE user_id = $1 AND symbol = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(symbol.to_uppercase())
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Every analysis of the caller, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, InvestmentAnalysis>(&format!(
            "SELECT {ANALYSIS_COLUMNS} FROM investment_analysis WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
