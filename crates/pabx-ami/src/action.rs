//! Outbound manager actions

use crate::constants::LINE_TERMINATOR;
use std::fmt;
use uuid::Uuid;

/// An ordered set of fields sent to the switch; `Action` is always first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmiAction {
    fields: Vec<(String, String)>,
}

impl AmiAction {
    /// Start an action named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            fields: vec![("Action".to_string(), name.into())],
        }
    }

    /// Append a field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Attach a freshly generated `ActionID`
    pub fn with_action_id(self) -> Self {
        self.field("ActionID", Uuid::new_v4().to_string())
    }

    /// Login with the configured credentials and the event stream turned on
    pub fn login(username: &str, secret: &str) -> Self {
        Self::new("Login")
            .field("Username", username)
            .field("Secret", secret)
            .field("Events", "on")
    }

    /// Keep-alive
    pub fn ping() -> Self {
        Self::new("Ping").with_action_id()
    }

    /// Hang up a channel, optionally with a Q.850 cause code
    pub fn hangup(channel: &str, cause: Option<u32>) -> Self {
        let action = Self::new("Hangup").with_action_id().field("Channel", channel);
        match cause {
            Some(cause) => action.field("Cause", cause.to_string()),
            None => action,
        }
    }

    /// End the manager session
    pub fn logoff() -> Self {
        Self::new("Logoff")
    }

    pub fn name(&self) -> &str {
        &self.fields[0].1
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn action_id(&self) -> Option<&str> {
        self.get("ActionID")
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Serialize to the wire format: `Key: Value` lines and a blank line
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push_str(LINE_TERMINATOR);
        }
        out.push_str(LINE_TERMINATOR);
        out
    }
}

impl fmt::Display for AmiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmiAction {{ Action: {}", self.name())?;
        if let Some(action_id) = self.action_id() {
            write!(f, ", ActionID: {}", action_id)?;
        }
        write!(f, " }}")
    }
}
