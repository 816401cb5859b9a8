//! Data Transfer Objects for the API

pub mod common;
pub mod health;

pub use common::ApiResponse;
pub use health::HealthResponse;
