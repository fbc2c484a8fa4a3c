/// AI assistant endpoints
///
/// ```text
/// POST /api/ai/chat                              one question, answered with the caller's context
/// GET  /api/ai/conversations?conversation_id=    latest exchanges, newest first
/// GET  /api/ai/conversations/:conversation_id    one thread, oldest first
/// GET  /api/ai/analysis                          financial-health review
/// ```
///
/// Free accounts get a lifetime allowance of chat questions. The allowance is checked before
/// the completion and again under the user's row lock afterwards. A chat exchange and the
/// counter increment commit together; a failed completion consumes nothing.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{parse_id, ApiJson, ApiQuery},
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    Extension,
};
use fintrack_shared::{
    advisor::{self, FinancialContext},
    auth::middleware::AuthContext,
    models::{
        ai_conversation::AiConversation,
        ai_usage::UsageType,
        goal::Goal,
        transaction::Transaction,
    },
    usage::UsageLimits,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Items echoed back with a chat answer
const ECHO_TRANSACTIONS: usize = 3;
const ECHO_GOALS: usize = 2;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatContext {
    pub balance: Decimal,
    pub recent_transactions: Vec<Transaction>,
    pub active_goals: Vec<Goal>,
}

impl ChatContext {
    fn excerpt(context: FinancialContext) -> Self {
        let mut recent_transactions = context.recent_transactions;
        recent_transactions.truncate(ECHO_TRANSACTIONS);
        let mut active_goals = context.active_goals;
        active_goals.truncate(ECHO_GOALS);

        Self {
            balance: context.balance,
            recent_transactions,
            active_goals,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: Uuid,
    pub context: ChatContext,
    pub limits: UsageLimits,
}

#[derive(Debug, Deserialize)]
pub struct ConversationFilter {
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FinancialAnalysis {
    pub analysis: String,
    pub context: FinancialContext,
}

fn completion_failed(user_id: Uuid, e: impl std::fmt::Display) -> ApiError {
    tracing::error!(user_id = %user_id, error = %e, "Completion request failed");
    ApiError::InternalError("Error processing AI request".to_string())
}

pub async fn chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let message = req
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("message is required".to_string()))?;
    let conversation_id = match req.conversation_id.as_deref() {
        Some(raw) => parse_id(raw, "conversation")?,
        None => Uuid::new_v4(),
    };
    let llm = state.llm()?;
    let usage = state.usage();

    usage.check(auth.user_id, UsageType::Chat).await?;

    let context = FinancialContext::load(&state.db, auth.user_id).await?;
    let answer = llm
        .complete(advisor::chat_request(&context, &message))
        .await
        .map_err(|e| completion_failed(auth.user_id, e))?;

    let mut call = usage.begin(auth.user_id, UsageType::Chat).await?;
    AiConversation::create(
        &mut *call.conn(),
        auth.user_id,
        conversation_id,
        &message,
        &answer,
    )
    .await?;

    let check = call.commit().await?;

    tracing::debug!(user_id = %auth.user_id, conversation_id = %conversation_id, "Chat answered");

    Ok(ApiResponse::success(ChatResponse {
        response: answer,
        conversation_id,
        context: ChatContext::excerpt(context),
        limits: check.limits,
    }))
}

pub async fn conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<ConversationFilter>,
) -> ApiResult<Vec<AiConversation>> {
    let conversation_id = filter
        .conversation_id
        .as_deref()
        .map(|raw| parse_id(raw, "conversation"))
        .transpose()?;

    let exchanges = AiConversation::list_recent(&state.db, auth.user_id, conversation_id).await?;
    Ok(ApiResponse::success(exchanges))
}

pub async fn conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Vec<AiConversation>> {
    let conversation_id = parse_id(&conversation_id, "conversation")?;

    let thread = AiConversation::thread(&state.db, auth.user_id, conversation_id).await?;
    Ok(ApiResponse::success(thread))
}

/// Subject to the chat allowance but does not consume it
pub async fn financial_analysis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<FinancialAnalysis> {
    let llm = state.llm()?;

    state.usage().check(auth.user_id, UsageType::Chat).await?;

    let context = FinancialContext::load(&state.db, auth.user_id).await?;
    let analysis = llm
        .complete(advisor::financial_analysis_request(&context))
        .await
        .map_err(|e| completion_failed(auth.user_id, e))?;

    Ok(ApiResponse::success(FinancialAnalysis { analysis, context }))
}
