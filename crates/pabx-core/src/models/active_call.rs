//! Consolidated active call model
//!
//! A `ConsolidatedCall` is the call-level view built from the switch's noisy
//! per-channel events. Calls only exist while they are live: there is no
//! terminal state, a hangup removes the call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Call state as seen by the consolidator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    Ringing,
    Talking,
    #[default]
    Unknown,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Ringing => "ringing",
            CallState::Talking => "talking",
            CallState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live call of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedCall {
    /// Linked-call id when the switch reports one, else the channel name
    pub id: String,
    pub channel_name: String,
    pub account_code: String,
    /// Endpoint part of the channel name (`PJSIP/1001-0000002a` → `1001`)
    pub extension: String,
    pub caller_number: Option<String>,
    pub connected_number: Option<String>,
    pub state: CallState,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl ConsolidatedCall {
    /// Create a call first seen on `channel_name` at `now`
    pub fn new(
        id: impl Into<String>,
        channel_name: impl Into<String>,
        account_code: impl Into<String>,
        extension: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_name: channel_name.into(),
            account_code: account_code.into(),
            extension: extension.into(),
            caller_number: None,
            connected_number: None,
            state: CallState::Unknown,
            start_time: now,
            duration_seconds: 0,
        }
    }

    /// Recompute the elapsed duration against `now`
    pub fn refresh_duration(&mut self, now: DateTime<Utc>) {
        self.duration_seconds = (now - self.start_time).num_seconds().max(0);
    }
}
