//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub ami: AmiConfig,
    #[serde(default)]
    pub consolidator: ConsolidatorConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Redis configuration
///
/// When no URL is configured the active-call snapshots are kept in process.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Asterisk Manager Interface configuration
#[derive(Deserialize, Clone)]
pub struct AmiConfig {
    /// Switch hostname or IP
    #[serde(default = "default_ami_host")]
    pub host: String,

    /// Manager port
    #[serde(default = "default_ami_port")]
    pub port: u16,

    /// Manager user
    pub username: String,

    /// Manager secret
    pub secret: String,

    /// Number of pooled manager sessions
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Base delay of the exponential reconnect backoff
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,

    /// Reconnect attempts before a connection gives up for good
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Ping interval while authenticated
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Pool health check period
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// Silence after which an authenticated connection counts as unhealthy
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,

    /// Socket connect/read timeout
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_secs: u64,
}

fn default_ami_host() -> String {
    "127.0.0.1".to_string()
}

fn default_ami_port() -> u16 {
    5038
}

fn default_pool_size() -> usize {
    3
}

fn default_reconnect_base_delay() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_health_check_interval() -> u64 {
    60
}

fn default_health_timeout() -> u64 {
    60
}

fn default_socket_timeout() -> u64 {
    30
}

impl AmiConfig {
    /// Build a config with default timers for the given switch and credentials
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            secret: secret.into(),
            pool_size: default_pool_size(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            health_check_interval_secs: default_health_check_interval(),
            health_timeout_secs: default_health_timeout(),
            socket_timeout_secs: default_socket_timeout(),
        }
    }

    /// `host:port` of the manager interface
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }
}

impl fmt::Debug for AmiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"***")
            .field("pool_size", &self.pool_size)
            .field("reconnect_base_delay_ms", &self.reconnect_base_delay_ms)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("health_check_interval_secs", &self.health_check_interval_secs)
            .field("health_timeout_secs", &self.health_timeout_secs)
            .field("socket_timeout_secs", &self.socket_timeout_secs)
            .finish()
    }
}

/// Event consolidation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConsolidatorConfig {
    /// Quiet period after the last accepted event before every queue is flushed
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// Lifetime of a published active-call snapshot
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_debounce() -> u64 {
    200
}

fn default_cache_ttl() -> u64 {
    5
}

impl ConsolidatorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("ami.host", "127.0.0.1")?
            .set_default("ami.port", 5038)?
            .set_default("ami.pool_size", 3)?
            .set_default("consolidator.debounce_ms", 200)?
            .set_default("consolidator.cache_ttl_secs", 5)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with PABX_ prefix
            .add_source(
                Environment::with_prefix("PABX")
                    .separator("__")
                    .try_parsing(true),
            )
            // Support legacy flat environment variables
            .set_override_option("ami.host", env::var("AMI_HOST").ok())?
            .set_override_option("ami.port", env::var("AMI_PORT").ok())?
            .set_override_option("ami.username", env::var("AMI_USERNAME").ok())?
            .set_override_option("ami.secret", env::var("AMI_SECRET").ok())?
            .set_override_option("ami.pool_size", env::var("AMI_POOL_SIZE").ok())?
            .set_override_option("redis.url", env::var("REDIS_URL").ok())?
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("PABX").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
