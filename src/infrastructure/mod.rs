//! Infrastructure layer
//!
//! This module contains all external dependencies and infrastructure concerns.
//! It provides the resilience primitives and the adapters over Redis and the
//! processors' HTTP APIs.

pub mod circuit_breaker;
pub mod http_client;
pub mod memory_store;
pub mod redis_client;
pub mod retry;
pub mod worker_pool;
