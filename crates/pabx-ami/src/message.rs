//! AMI message parsing and representation
//!
//! Every block the switch sends is either an asynchronous event (it carries an
//! `Event` field) or a reply to an action (it carries a `Response` field).

use std::fmt;

/// One decoded manager block
///
/// Fields keep their wire order; lookups are case-insensitive since the
/// switch is not consistent about header casing (`ActionID` / `ActionId`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmiMessage {
    fields: Vec<(String, String)>,
}

impl AmiMessage {
    /// Create a new empty message
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Parse one block (without its terminating blank line)
    ///
    /// Lines without a `:` separator, such as the
    /// `Asterisk Call Manager/5.0.1` banner, are skipped.
    pub fn parse(block: &str) -> Self {
        let fields = block
            .lines()
            .filter_map(|line| {
                let line = line.trim_end_matches('\r');
                let (key, value) = line.split_once(':')?;
                let key = key.trim();
                if key.is_empty() || key.contains(' ') {
                    return None;
                }
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect();

        Self { fields }
    }

    /// Append a field, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Append a field
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// Get the first value of a field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Get a field, treating empty values as absent
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// All fields in wire order
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Events carry an `Event` field; everything else is a response
    pub fn is_event(&self) -> bool {
        self.get("Event").is_some()
    }

    pub fn is_response(&self) -> bool {
        !self.is_event()
    }

    // Common fields with convenient accessors

    pub fn event_name(&self) -> Option<&str> {
        self.get("Event")
    }

    pub fn response(&self) -> Option<&str> {
        self.get("Response")
    }

    pub fn message(&self) -> Option<&str> {
        self.get("Message")
    }

    pub fn action_id(&self) -> Option<&str> {
        self.get_non_empty("ActionID")
    }

    pub fn channel(&self) -> Option<&str> {
        self.get_non_empty("Channel")
    }

    pub fn account_code(&self) -> Option<&str> {
        self.get_non_empty("AccountCode")
    }

    pub fn linked_id(&self) -> Option<&str> {
        self.get_non_empty("Linkedid")
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.get_non_empty("Uniqueid")
    }

    pub fn channel_state_desc(&self) -> Option<&str> {
        self.get_non_empty("ChannelStateDesc")
    }

    /// Caller id number, `<unknown>` counts as absent
    pub fn caller_id_num(&self) -> Option<&str> {
        self.get_non_empty("CallerIDNum")
            .filter(|v| *v != "<unknown>")
    }

    /// Connected line number, `<unknown>` counts as absent
    pub fn connected_line_num(&self) -> Option<&str> {
        self.get_non_empty("ConnectedLineNum")
            .filter(|v| *v != "<unknown>")
    }

    /// `Response: Success`
    pub fn is_success(&self) -> bool {
        self.response()
            .map(|r| r.eq_ignore_ascii_case("Success"))
            .unwrap_or(false)
    }

    /// `Response: Error`
    pub fn is_error(&self) -> bool {
        self.response()
            .map(|r| r.eq_ignore_ascii_case("Error"))
            .unwrap_or(false)
    }

    /// Successful reply to a Login action
    pub fn is_auth_accepted(&self) -> bool {
        self.is_success()
            && self
                .message()
                .map(|m| m.contains(crate::constants::AUTH_ACCEPTED))
                .unwrap_or(false)
    }
}

impl fmt::Display for AmiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmiMessage {{")?;

        if let Some(event) = self.event_name() {
            write!(f, " Event: {}", event)?;
        } else if let Some(response) = self.response() {
            write!(f, " Response: {}", response)?;
        }

        if let Some(action_id) = self.action_id() {
            write!(f, ", ActionID: {}", action_id)?;
        }

        if let Some(channel) = self.channel() {
            write!(f, ", Channel: {}", channel)?;
        }

        write!(f, ", Fields: {} }}", self.fields.len())
    }
}
