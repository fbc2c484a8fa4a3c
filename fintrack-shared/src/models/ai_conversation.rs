/// Stored AI chat exchanges
///
/// Each row is one question/answer pair; rows sharing a `conversation_id` form a thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AiConversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub response: String,
    pub conversation_id: Uuid,
    pub created_at: DateTime<Utc>,
}

const CONVERSATION_COLUMNS: &str = "id, user_id, message, response, conversation_id, created_at";

/// Upper bound on exchanges returned by the listing endpoint
pub const CONVERSATION_PAGE_SIZE: i64 = 50;

impl AiConversation {
    pub async fn create<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        user_id: Uuid,
        conversation_id: Uuid,
        message: &str,
        response: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AiConversation>(&format!(
            r#"
            INSERT INTO ai_conversations (user_id, message, response, conversation_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {CONVERSATION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(message)
        .bind(response)
        .bind(conversation_id)
        .fetch_one(executor)
        .await
    }

    /// Latest exchanges, newest first, optionally restricted to one conversation
    pub async fn list_recent(
        pool: &PgPool,
        user_id: Uuid,
        conversation_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AiConversation>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS} FROM ai_conversations
            WHERE user_id = $1 AND ($2::UUID IS NULL OR conversation_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(conversation_id)
        .bind(CONVERSATION_PAGE_SIZE)
        .fetch_all(pool)
        .await
    }

    /// One conversation, oldest exchange first
    pub async fn thread(
        pool: &PgPool,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AiConversation>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS} FROM ai_conversations
            WHERE user_id = $1 AND conversation_id = $2
            ORDER BY created_at ASC
            "#
        ))
        .bind(user_id)
        .bind(conversation_id)
        .fetch_all(pool)
        .await
    }
}
