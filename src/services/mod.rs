//! Business logic services
//!
//! This module contains all the business logic of the application.
//! Services orchestrate domain operations and coordinate with infrastructure.

pub mod health_service;
pub mod payment_service;
pub mod summary_service;
