//! Paygate payment gateway library
//!
//! Routes payments to a default or fallback processor behind a circuit
//! breaker, retry policy, health monitor and bounded worker pool, and rebuilds
//! per-processor totals from storage on demand.

pub mod config;
pub mod error;
pub mod handlers;
pub mod infrastructure;
pub mod models;
pub mod ports;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::Config;
pub use models::*;
pub use state::AppState;
