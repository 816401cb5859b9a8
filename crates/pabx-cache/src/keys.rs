//! Cache key constants and builders
//!
//! Provides the standardized key naming for the consolidated call snapshots
//! so publishers and readers never disagree on the namespace.
//!
//! # Key Patterns
//!
//! - `active-calls:{account_code}` - Live calls of one account
//!
//! # Example
//!
//! ```
//! use pabx_cache::keys;
//!
//! let key = keys::active_calls_key("U1");
//! assert_eq!(key, "active-calls:U1");
//! assert_eq!(keys::account_from_active_calls_key(&key), Some("U1"));
//! ```

/// Prefix for per-account active call snapshots
///
/// Format: `active-calls:{account_code}`
pub const ACTIVE_CALLS_PREFIX: &str = "active-calls";

/// Default TTL for active call snapshots (5 seconds)
pub const ACTIVE_CALLS_TTL_SECS: u64 = 5;

/// Build the cache key holding an account's active calls
pub fn active_calls_key(account_code: &str) -> String {
    format!("{}:{}", ACTIVE_CALLS_PREFIX, account_code)
}

/// Glob pattern matching every active call snapshot
pub fn active_calls_pattern() -> String {
    format!("{}:*", ACTIVE_CALLS_PREFIX)
}

/// Extract the account code from an active call snapshot key
pub fn account_from_active_calls_key(key: &str) -> Option<&str> {
    key.strip_prefix(ACTIVE_CALLS_PREFIX)
        .and_then(|rest| rest.strip_prefix(':'))
        .filter(|code| !code.is_empty())
}
