//! # FinTrack Shared Library
//!
//! Types and business logic shared by the FinTrack API server and background worker.
//!
//! ## Module Organization
//!
//! - `models`: Database rows and their queries
//! - `db`: Connection pool and migrations
//! - `auth`: Passwords, JWTs and the bearer-token guard
//! - `usage`: Tiered limits for metered AI operations
//! - `subscription`: Payment-driven tier transitions
//! - `calculators`: Goal progress, due dates and savings plans
//! - `providers`: Payment, market data and LLM clients
//! - `market`: Market snapshot cache, refresh runs and trend helpers
//! - `advisor`: Financial context and prompts for the LLM endpoints

pub mod advisor;
pub mod auth;
pub mod calculators;
pub mod db;
pub mod market;
pub mod models;
pub mod providers;
pub mod subscription;
pub mod usage;

/// Current version of the FinTrack shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
