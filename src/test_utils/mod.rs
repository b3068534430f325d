//! Test utilities for use case and HTTP tests.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository implementations for mocking persistence
//! - A scriptable payment gateway
//! - An `AppState` builder for route tests

mod app_state_builder;
mod factories;
mod gateway_mocks;
mod payment_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use gateway_mocks::*;
pub use payment_mocks::*;
