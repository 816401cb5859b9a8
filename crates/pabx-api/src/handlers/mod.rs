//! HTTP request handlers

pub mod active_call;
pub mod ami;
pub mod health;

pub use active_call::configure as configure_active_calls;
pub use ami::configure as configure_ami;
