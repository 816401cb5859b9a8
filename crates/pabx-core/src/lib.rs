//! PABX Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! shared by the AMI pool, the call consolidator and the HTTP surface:
//!
//! - Domain models (consolidated active calls)
//! - The cache sink abstraction (`CacheService`)
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
