//! Folding one account's queued events into its call list
//!
//! Only the events of the current flush are considered; nothing carries over
//! from earlier flushes, and the result replaces the account's snapshot.

use crate::call_filter::extension_of;
use crate::constants::{STATE_RINGING, STATE_UP};
use crate::event_buffer::BufferedEntry;
use chrono::{DateTime, Utc};
use pabx_ami::events;
use pabx_core::models::{CallState, ConsolidatedCall};

/// Reduce `entries` (in arrival order) to the account's live calls at `now`
///
/// Calls are keyed by `Linkedid`, falling back to the channel name, and keep
/// the order in which they were first seen. A call starts when its first
/// event (or its `Newchannel`) was queued; durations are measured up to `now`.
pub fn consolidate(
    account_code: &str,
    entries: &[BufferedEntry],
    now: DateTime<Utc>,
) -> Vec<ConsolidatedCall> {
    let mut calls: Vec<ConsolidatedCall> = Vec::new();

    for entry in entries {
        let event = &entry.event;
        let (Some(name), Some(channel)) = (event.event_name(), event.channel()) else {
            continue;
        };
        let Some(extension) = extension_of(channel) else {
            continue;
        };
        let id = event.linked_id().unwrap_or(channel);

        if name == events::HANGUP {
            calls.retain(|call| call.id != id);
            continue;
        }

        let idx = match calls.iter().position(|call| call.id == id) {
            Some(idx) => idx,
            None => {
                calls.push(ConsolidatedCall::new(
                    id,
                    channel,
                    account_code,
                    extension,
                    entry.arrived_at,
                ));
                calls.len() - 1
            }
        };
        let call = &mut calls[idx];

        match name {
            events::NEWCHANNEL => {
                call.state = CallState::Ringing;
                call.start_time = entry.arrived_at;
            }
            events::NEWSTATE => match event.channel_state_desc() {
                Some(STATE_UP) => call.state = CallState::Talking,
                Some(STATE_RINGING) => call.state = CallState::Ringing,
                _ => {}
            },
            events::BRIDGE => call.state = CallState::Talking,
            _ => {}
        }

        if let Some(number) = event.caller_id_num() {
            call.caller_number = Some(number.to_string());
        }
        if let Some(number) = event.connected_line_num() {
            call.connected_number = Some(number.to_string());
        }
    }

    for call in &mut calls {
        call.refresh_duration(now);
    }

    calls
}
