//! # FinTrack API Server Library
//!
//! REST backend for personal finance tracking: ledger, savings goals, reminders,
//! analytics, market data and an AI assistant, with tiered subscriptions.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Request extractors and path helpers
//! - `middleware`: Authentication, tier guards, rate limiting, security headers
//! - `response`: Success envelope
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
