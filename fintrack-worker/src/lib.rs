//! # FinTrack Worker Library
//!
//! Background maintenance that runs beside the API against the same database.
//!
//! ## Modules
//!
//! - `config`: environment settings
//! - `jobs`: the `Job` trait and the market refresh, log purge and config check jobs
//! - `scheduler`: interval loops with cooperative shutdown
//! - `timeout`: per-run time limits

pub mod config;
pub mod jobs;
pub mod scheduler;
pub mod timeout;
