//! Call consolidation services for the PABX backend
//!
//! This crate turns the switch's raw per-channel event stream into a live,
//! per-account list of active calls and publishes it to the cache.
//!
//! # Architecture
//!
//! The pipeline is split so every stage can be tested on its own:
//! - `call_filter` decides which events matter and for which account
//! - `event_buffer` queues accepted events behind one shared debounce deadline
//! - `call_reducer` folds an account's queued events into call entries
//! - `consolidator` owns the loop, publishes snapshots and serves reads
//!
//! # Services
//!
//! - `CallConsolidator` - Event ingestion, debounced flushing and snapshot reads

pub mod call_filter;
pub mod call_reducer;
pub mod consolidator;
pub mod event_buffer;

pub use call_reducer::consolidate;
pub use consolidator::{CallConsolidator, CallsUpdated};
pub use event_buffer::{BufferedEntry, EventBuffer};

/// Consolidation constants
pub mod constants {
    /// Channel technologies whose `<Tech>/<endpoint>-<suffix>` channels are live legs
    pub const DYNAMIC_CHANNEL_TECHS: &[&str] = &["PJSIP", "SIP", "IAX2", "DAHDI"];

    /// Channel state the switch reports for an answered leg
    pub const STATE_UP: &str = "Up";

    /// Channel state the switch reports for a ringing leg
    pub const STATE_RINGING: &str = "Ringing";

    /// Capacity of the "calls updated" notification channel
    pub const UPDATE_CHANNEL_CAPACITY: usize = 256;
}
