/// API route handlers, one module per resource
///
/// - `health`: liveness and database connectivity
/// - `auth`: register, login, token refresh, logout
/// - `users`: profile, subscription downgrade, usage overview
/// - `transactions`, `goals`, `reminders`: the personal ledger
/// - `analytics`: dashboards, trends, predictions, monthly reports
/// - `market`, `investments`: market snapshots and investment advice
/// - `payments`: payment intents, confirmation, cancellation, webhook
/// - `ai`: assistant chat and financial analysis

pub mod ai;
pub mod analytics;
pub mod auth;
pub mod goals;
pub mod health;
pub mod investments;
pub mod market;
pub mod payments;
pub mod reminders;
pub mod transactions;
pub mod users;
