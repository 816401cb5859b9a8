//! Event admission for the consolidator

use crate::constants::DYNAMIC_CHANNEL_TECHS;
use pabx_ami::{events::CALL_EVENTS, AmiMessage};

/// Split a dynamic channel name into `(tech, endpoint)`
///
/// `PJSIP/1001-0000002a` yields `("PJSIP", "1001")`. Static or control
/// channels (`Local/...`, `Message/...`, a bare `PJSIP/1001`) yield `None`.
pub fn parse_dynamic_channel(channel: &str) -> Option<(&str, &str)> {
    let (tech, rest) = channel.split_once('/')?;
    if !DYNAMIC_CHANNEL_TECHS.contains(&tech) {
        return None;
    }

    let (endpoint, suffix) = rest.rsplit_once('-')?;
    if endpoint.is_empty() || suffix.is_empty() {
        return None;
    }

    Some((tech, endpoint))
}

/// Extension (endpoint) part of a dynamic channel name
pub fn extension_of(channel: &str) -> Option<&str> {
    parse_dynamic_channel(channel).map(|(_, endpoint)| endpoint)
}

pub fn is_call_event(name: &str) -> bool {
    CALL_EVENTS.contains(&name)
}

/// Account the event belongs to, when the consolidator should keep it
pub fn accepted_account(message: &AmiMessage) -> Option<&str> {
    if !message.event_name().is_some_and(is_call_event) {
        return None;
    }

    message.channel().and_then(parse_dynamic_channel)?;
    message.account_code()
}
