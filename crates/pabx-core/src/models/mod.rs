//! Domain models

pub mod active_call;

pub use active_call::{CallState, ConsolidatedCall};
