//! AMI error types

use crate::state::ConnectionState;
use pabx_core::AppError;
use std::time::Duration;
use thiserror::Error;

/// Result alias for AMI operations
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors raised by connections and the pool
#[derive(Error, Debug)]
pub enum AmiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection closed by switch")]
    ConnectionClosed,

    #[error("Login rejected: {0}")]
    LoginRejected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection {0} is not connected")]
    NotConnected(usize),

    #[error("Connection {0} was already started")]
    AlreadyStarted(usize),

    #[error("Invalid state transition from {from} on {input}")]
    InvalidTransition {
        from: ConnectionState,
        input: &'static str,
    },

    #[error("Connection task stopped")]
    TaskStopped,

    #[error("No healthy connection available")]
    NoHealthyConnection,
}

impl From<AmiError> for AppError {
    fn from(err: AmiError) -> Self {
        match err {
            AmiError::NoHealthyConnection => AppError::NoHealthyConnection,
            AmiError::NotConnected(_) | AmiError::LoginRejected(_) => {
                AppError::AmiCommand(err.to_string())
            }
            other => AppError::AmiConnection(other.to_string()),
        }
    }
}
