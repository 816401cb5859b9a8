//! Asterisk Manager Interface (AMI) integration for the PABX backend
//!
//! This crate keeps a pool of authenticated manager sessions open against the
//! switch, load-balances outbound actions across them and fans their
//! asynchronous event streams into one broadcast stream.
//!
//! # Features
//!
//! - Block-delimited `Key: Value` wire codec
//! - Login handshake, keep-alive pings and health tracking per connection
//! - Automatic reconnection with capped exponential backoff
//! - Round-robin dispatch over the currently healthy connections
//! - Periodic health checks with transparent connection replacement
//!
//! # Architecture
//!
//! ```text
//!   Asterisk manager port
//!      |      |      |
//!      v      v      v
//!  AmiConnection (one task per socket, owns its reconnect policy)
//!      \      |      /
//!       v     v     v
//!     AmiPool fan-in  ---> broadcast<AmiMessage>  ---> consolidator, command callers
//!          ^
//!          |
//!   send_action (round robin over healthy connections)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pabx_ami::{AmiAction, AmiPool};
//! use pabx_core::config::AmiConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = AmiPool::new(AmiConfig::new("127.0.0.1", 5038, "admin", "secret"));
//!     pool.initialize().await?;
//!
//!     let mut events = pool.subscribe();
//!     pool.send_action(AmiAction::hangup("PJSIP/1001-00000001", None)).await?;
//!
//!     while let Ok(message) = events.recv().await {
//!         println!("{}", message);
//!     }
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod codec;
pub mod connection;
pub mod error;
pub mod message;
pub mod pool;
pub mod reconnect;
pub mod state;

pub use action::AmiAction;
pub use codec::AmiCodec;
pub use connection::{AmiConnection, ConnectionSignal, ConnectionStatus, SignalKind};
pub use error::{AmiError, AmiResult};
pub use message::AmiMessage;
pub use pool::{AmiPool, PoolSummary};
pub use reconnect::ReconnectPolicy;
pub use state::ConnectionState;

/// AMI protocol constants
pub mod constants {
    /// Default manager port
    pub const DEFAULT_PORT: u16 = 5038;

    /// Line terminator
    pub const LINE_TERMINATOR: &str = "\r\n";

    /// Block terminator (one blank line)
    pub const BLOCK_DELIMITER: &[u8] = b"\r\n\r\n";

    /// `Message` text of a successful login reply
    pub const AUTH_ACCEPTED: &str = "Authentication accepted";

    /// Largest unterminated block accepted before the session is dropped
    pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

    /// Highest exponent used by the reconnect backoff
    pub const MAX_BACKOFF_EXPONENT: u32 = 5;

    /// Capacity of the pool's outward message stream, per pooled session
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

    /// Time allowed for a best-effort Logoff on disconnect
    pub const LOGOFF_TIMEOUT_MS: u64 = 1000;
}

/// Manager event names the call consolidator understands
pub mod events {
    pub const NEWCHANNEL: &str = "Newchannel";
    pub const HANGUP: &str = "Hangup";
    pub const NEWSTATE: &str = "Newstate";
    pub const DIAL_BEGIN: &str = "DialBegin";
    pub const DIAL_END: &str = "DialEnd";
    pub const BRIDGE: &str = "Bridge";
    pub const UNBRIDGE: &str = "Unbridge";

    /// Events that describe a call leg's lifecycle
    pub const CALL_EVENTS: &[&str] = &[
        NEWCHANNEL, HANGUP, NEWSTATE, DIAL_BEGIN, DIAL_END, BRIDGE, UNBRIDGE,
    ];
}
