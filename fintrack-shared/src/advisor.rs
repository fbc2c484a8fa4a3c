/// Prompt construction for the LLM-backed endpoints
///
/// [`FinancialContext`] gathers what the assistant is told about a user: ledger totals,
/// the latest transactions, active goals and upcoming reminders. The prompt builders
/// render that context (or market snapshots) into plain text for a [`CompletionRequest`].
///
/// [`CompletionRequest`]: crate::providers::CompletionRequest

use std::fmt::Write;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::goal::Goal;
use crate::models::market_data::MarketData;
use crate::models::reminder::Reminder;
use crate::models::transaction::Transaction;
use crate::providers::CompletionRequest;

pub const CONTEXT_TRANSACTIONS: i64 = 10;
pub const CONTEXT_REMINDERS: i64 = 5;

/// Snapshots listed per market in a prompt
const PROMPT_SYMBOLS: usize = 5;

const CHAT_INSTRUCTIONS: &str = "\
Instructions:
1. Give personalised financial advice grounded in the context above
2. Point out spending patterns and suggest improvements
3. Help with saving strategies for the active goals
4. Mention upcoming payments when relevant
5. Be specific and practical
6. Keep a friendly but professional tone

Be concise but useful.";

const ANALYSIS_INSTRUCTIONS: &str = "\
Provide:
1. An assessment of the user's current financial health
2. Spending patterns you can identify
3. Specific improvements
4. Strategies to reach the active goals
5. Any warnings or concerns

Be specific and practical.";

const MARKET_SYSTEM: &str = "You are an expert financial analyst who explains complex \
topics in simple terms for beginners.";

const PERSONALIZED_SYSTEM: &str = "You are a personal financial advisor who reviews the \
user's profile and gives recommendations specific to their situation.";

/// Everything the assistant is told about one user
#[derive(Debug, Clone, Serialize)]
pub struct FinancialContext {
    pub balance: Decimal,
    pub income: Decimal,
    pub expenses: Decimal,
    pub recent_transactions: Vec<Transaction>,
    pub active_goals: Vec<Goal>,
    pub pending_reminders: Vec<Reminder>,
}

impl FinancialContext {
    pub async fn load(pool: &PgPool, user_id: Uuid) -> Result<Self, sqlx::Error> {
        let summary = Transaction::summary(pool, user_id).await?;
        let recent_transactions = Transaction::recent(pool, user_id, CONTEXT_TRANSACTIONS).await?;
        let active_goals = Goal::active(pool, user_id).await?;
        let pending_reminders = Reminder::next_pending(pool, user_id, CONTEXT_REMINDERS).await?;

        Ok(FinancialContext {
            balance: summary.balance,
            income: summary.income,
            expenses: summary.expenses,
            recent_transactions,
            active_goals,
            pending_reminders,
        })
    }

    /// Context rendered as the block shared by the chat and analysis prompts
    pub fn describe(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "- Current balance: ${}", self.balance);
        let _ = writeln!(out, "- Total income: ${}", self.income);
        let _ = writeln!(out, "- Total expenses: ${}", self.expenses);

        out.push_str("- Recent transactions:\n");
        if self.recent_transactions.is_empty() {
            out.push_str("  none\n");
        }
        for t in &self.recent_transactions {
            let _ = writeln!(
                out,
                "  {} {} ${} ({}, {})",
                t.created_at.date_naive(),
                t.kind,
                t.amount,
                t.title,
                t.category
            );
        }

        out.push_str("- Active goals:\n");
        if self.active_goals.is_empty() {
            out.push_str("  none\n");
        }
        for g in &self.active_goals {
            let deadline = g
                .deadline
                .map(|d| d.to_string())
                .unwrap_or_else(|| "no deadline".to_string());
            let _ = writeln!(
                out,
                "  {}: ${} of ${} ({})",
                g.title, g.current_amount, g.target_amount, deadline
            );
        }

        out.push_str("- Pending reminders:\n");
        if self.pending_reminders.is_empty() {
            out.push_str("  none\n");
        }
        for r in &self.pending_reminders {
            let amount = r.amount.map(|a| format!(" ${a}")).unwrap_or_default();
            let _ = writeln!(out, "  {}{} due {}", r.title, amount, r.due_date);
        }

        out
    }
}

/// Chat turn: the context goes in the system prompt, the user's message is sent as is
pub fn chat_request(context: &FinancialContext, message: &str) -> CompletionRequest {
    CompletionRequest {
        model: None,
        system: format!(
            "You are an expert personal finance assistant with access to the user's \
             financial context:\n\n{}\n{}",
            context.describe(),
            CHAT_INSTRUCTIONS
        ),
        prompt: message.to_string(),
        max_tokens: 1000,
        temperature: 0.7,
    }
}

/// Financial-health review of the caller's own figures
pub fn financial_analysis_request(context: &FinancialContext) -> CompletionRequest {
    CompletionRequest {
        model: None,
        system: format!(
            "You are an expert personal finance assistant with access to the user's \
             financial context:\n\n{}",
            context.describe()
        ),
        prompt: format!(
            "Analyse this user's financial situation in detail.\n\n{}",
            ANALYSIS_INSTRUCTIONS
        ),
        max_tokens: 1000,
        temperature: 0.7,
    }
}

fn list_quotes(out: &mut String, heading: &str, rows: &[MarketData], take: usize) {
    if rows.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{heading}:");
    for row in rows.iter().take(take) {
        let sign = if row.change_24h > 0.0 { "+" } else { "" };
        let _ = writeln!(
            out,
            "- {}: ${:.2} ({}{:.2}%)",
            row.symbol, row.price, sign, row.change_24h
        );
    }
}

/// Beginner-oriented commentary on the current market snapshot
pub fn market_request(crypto: &[MarketData], stocks: &[MarketData]) -> CompletionRequest {
    let mut prompt = String::from(
        "Analyse the current state of the financial markets and give simple recommendations \
         for beginners.\n\nMARKET DATA:\n",
    );
    list_quotes(&mut prompt, "CRYPTO", crypto, PROMPT_SYMBOLS);
    list_quotes(&mut prompt, "STOCKS", stocks, PROMPT_SYMBOLS);
    prompt.push_str(
        "\nPlease provide:\n\
         1. A simple summary of the market\n\
         2. Three basic recommendations for beginners\n\
         3. Why these recommendations make sense\n\
         4. Important risk warnings\n\n\
         Avoid technical jargon.",
    );

    CompletionRequest {
        model: None,
        system: MARKET_SYSTEM.to_string(),
        prompt,
        max_tokens: 1000,
        temperature: 0.7,
    }
}

/// Investor profile used by the personalised analysis
#[derive(Debug, Clone, Serialize)]
pub struct InvestorProfile {
    pub balance: Decimal,
    pub risk_tolerance: String,
    pub investment_goals: Option<String>,
}

pub fn personalized_request(
    profile: &InvestorProfile,
    crypto: &[MarketData],
    stocks: &[MarketData],
) -> CompletionRequest {
    let mut prompt = String::from(
        "Analyse this user's financial situation and give personalised recommendations.\n\n",
    );
    let _ = writeln!(prompt, "USER PROFILE:");
    let _ = writeln!(prompt, "- Current balance: ${}", profile.balance);
    let _ = writeln!(prompt, "- Risk tolerance: {}", profile.risk_tolerance);
    let _ = writeln!(
        prompt,
        "- Investment goals: {}",
        profile.investment_goals.as_deref().unwrap_or("not specified")
    );
    prompt.push_str("\nCURRENT MARKET DATA:\n");
    list_quotes(&mut prompt, "TOP CRYPTO", crypto, 3);
    list_quotes(&mut prompt, "TOP STOCKS", stocks, 3);
    prompt.push_str(
        "\nProvide a personalised analysis including:\n\
         1. An assessment of the current financial situation\n\
         2. Recommendations specific to the balance and profile\n\
         3. An investment strategy matching the risk tolerance\n\
         4. Concrete steps to take now\n\
         5. A suggested timeline for the goals",
    );

    CompletionRequest {
        model: None,
        system: PERSONALIZED_SYSTEM.to_string(),
        prompt,
        max_tokens: 1500,
        temperature: 0.6,
    }
}
