//! Connection lifecycle state machine

use crate::error::AmiError;
use serde::Serialize;
use std::fmt;

/// Lifecycle of one manager session
///
/// ```text
/// Disconnected --begin_connect--> Connecting --socket_opened--> ConnectedUnauthenticated
///      ^                                                                |
///      |                                                          login_accepted
///      +---------------------------- lost ---------------- Authenticated <--+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    ConnectedUnauthenticated,
    Authenticated,
}

impl ConnectionState {
    pub fn begin_connect(self) -> Result<Self, AmiError> {
        match self {
            ConnectionState::Disconnected => Ok(ConnectionState::Connecting),
            from => Err(AmiError::InvalidTransition {
                from,
                input: "begin_connect",
            }),
        }
    }

    pub fn socket_opened(self) -> Result<Self, AmiError> {
        match self {
            ConnectionState::Connecting => Ok(ConnectionState::ConnectedUnauthenticated),
            from => Err(AmiError::InvalidTransition {
                from,
                input: "socket_opened",
            }),
        }
    }

    pub fn login_accepted(self) -> Result<Self, AmiError> {
        match self {
            ConnectionState::ConnectedUnauthenticated => Ok(ConnectionState::Authenticated),
            from => Err(AmiError::InvalidTransition {
                from,
                input: "login_accepted",
            }),
        }
    }

    /// Socket error, timeout, close or explicit teardown; valid from any state
    pub fn lost(self) -> Self {
        ConnectionState::Disconnected
    }

    /// A socket is open (authenticated or not)
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectionState::ConnectedUnauthenticated | ConnectionState::Authenticated
        )
    }

    pub fn is_authenticated(&self) -> bool {
        *self == ConnectionState::Authenticated
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::ConnectedUnauthenticated => "connected_unauthenticated",
            ConnectionState::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
