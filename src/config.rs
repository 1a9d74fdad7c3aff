//! Collector configuration.
//!
//! Every field has a default; the builder-style `with_*` setters and
//! [`CollectorConfig::from_env`] override them.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use frame_collector::CollectorConfig;
//!
//! let config = CollectorConfig::new()
//!     .with_address("10.0.0.5", 7000)
//!     .with_token("secret")
//!     .with_target_messages(100)
//!     .with_drain_timeout(Duration::from_secs(2));
//!
//! assert_eq!(config.address(), "10.0.0.5:7000");
//! ```

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CollectorError, Result};
use crate::persist::DEFAULT_QUEUE_CAPACITY;
use crate::protocol::DEFAULT_BUFFER_CAPACITY;
use crate::validation::ValidationLimits;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_TARGET_MESSAGES: u64 = 600;
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_HOST: &str = "COLLECTOR_HOST";
pub const ENV_PORT: &str = "COLLECTOR_PORT";
pub const ENV_TOKEN: &str = "COLLECTOR_TOKEN";
pub const ENV_TARGET: &str = "COLLECTOR_TARGET";
pub const ENV_DRAIN_TIMEOUT_MS: &str = "COLLECTOR_DRAIN_TIMEOUT_MS";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "COLLECTOR_CONNECT_TIMEOUT_MS";
pub const ENV_REPORT_INVALID_ASCII: &str = "COLLECTOR_REPORT_INVALID_ASCII";
pub const ENV_WARN_BYTES: &str = "COLLECTOR_WARN_BYTES";
pub const ENV_MAX_BYTES: &str = "COLLECTOR_MAX_BYTES";

/// Settings of a collection session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    pub host: String,
    pub port: u16,
    /// Credential sent once as `AUTH <token>`.
    pub token: String,
    /// Total frames after which the session drains.
    pub target_messages: u64,
    /// Upper bound of the drain phase.
    pub drain_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_buffer_size: usize,
    pub persist_queue_capacity: usize,
    /// Record dropped ASCII frames in the error list.
    pub report_invalid_ascii: bool,
    pub limits: ValidationLimits,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            token: String::new(),
            target_messages: DEFAULT_TARGET_MESSAGES,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_buffer_size: DEFAULT_BUFFER_CAPACITY,
            persist_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            report_invalid_ascii: false,
            limits: ValidationLimits::default(),
        }
    }
}

impl CollectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `COLLECTOR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load overrides through `lookup`, which maps a variable name to its value.
    ///
    /// Unset variables keep their defaults. A malformed value is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup(ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, ENV_PORT)? {
            config.port = port;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            config.token = token;
        }
        if let Some(target) = parse_var(&lookup, ENV_TARGET)? {
            config.target_messages = target;
        }
        if let Some(ms) = parse_var(&lookup, ENV_DRAIN_TIMEOUT_MS)? {
            config.drain_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, ENV_CONNECT_TIMEOUT_MS)? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(ENV_REPORT_INVALID_ASCII) {
            config.report_invalid_ascii = parse_bool(ENV_REPORT_INVALID_ASCII, &value)?;
        }
        if let Some(bytes) = parse_var(&lookup, ENV_WARN_BYTES)? {
            config.limits.large_binary_warning = bytes;
        }
        if let Some(bytes) = parse_var(&lookup, ENV_MAX_BYTES)? {
            config.limits.max_binary_len = bytes;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.target_messages == 0 {
            return Err(CollectorError::Config(
                "target message count must be at least 1".into(),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(CollectorError::Config("read buffer size must be non-zero".into()));
        }
        if self.persist_queue_capacity == 0 {
            return Err(CollectorError::Config(
                "persistence queue capacity must be non-zero".into(),
            ));
        }
        if self.limits.large_binary_warning > self.limits.max_binary_len {
            return Err(CollectorError::Config(format!(
                "warning threshold {} exceeds maximum binary length {}",
                self.limits.large_binary_warning, self.limits.max_binary_len
            )));
        }
        Ok(())
    }

    /// `host:port` of the remote server.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_target_messages(mut self, target: u64) -> Self {
        self.target_messages = target;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_persist_queue_capacity(mut self, capacity: usize) -> Self {
        self.persist_queue_capacity = capacity;
        self
    }

    pub fn with_report_invalid_ascii(mut self, report: bool) -> Self {
        self.report_invalid_ascii = report;
        self
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| CollectorError::Config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CollectorError::Config(format!(
            "{key}={raw:?}: expected a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.address(), "127.0.0.1:9000");
        assert_eq!(config.target_messages, 600);
        assert_eq!(config.drain_timeout, Duration::from_secs(5));
        assert!(!config.report_invalid_ascii);
        assert_eq!(config.limits, ValidationLimits::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_environment_keeps_defaults() {
        let config = CollectorConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, CollectorConfig::default());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = CollectorConfig::from_lookup(lookup_from(&[
            (ENV_HOST, "data.example"),
            (ENV_PORT, "7001"),
            (ENV_TOKEN, "s3cret"),
            (ENV_TARGET, " 50 "),
            (ENV_DRAIN_TIMEOUT_MS, "250"),
            (ENV_REPORT_INVALID_ASCII, "yes"),
            (ENV_WARN_BYTES, "1024"),
            (ENV_MAX_BYTES, "4096"),
        ]))
        .unwrap();

        assert_eq!(config.address(), "data.example:7001");
        assert_eq!(config.token, "s3cret");
        assert_eq!(config.target_messages, 50);
        assert_eq!(config.drain_timeout, Duration::from_millis(250));
        assert!(config.report_invalid_ascii);
        assert_eq!(config.limits.large_binary_warning, 1024);
        assert_eq!(config.limits.max_binary_len, 4096);
    }

    #[test]
    fn test_malformed_port() {
        let err = CollectorConfig::from_lookup(lookup_from(&[(ENV_PORT, "ninety")])).unwrap_err();
        assert!(matches!(err, CollectorError::Config(_)));
        assert!(err.to_string().contains("COLLECTOR_PORT"));
    }

    #[test]
    fn test_malformed_bool() {
        let err = CollectorConfig::from_lookup(lookup_from(&[(ENV_REPORT_INVALID_ASCII, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, CollectorError::Config(_)));
    }

    #[test]
    fn test_zero_target_rejected() {
        let err = CollectorConfig::from_lookup(lookup_from(&[(ENV_TARGET, "0")])).unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_warning_above_maximum_rejected() {
        let config = CollectorConfig::new().with_limits(ValidationLimits {
            large_binary_warning: 10,
            max_binary_len: 5,
            ..ValidationLimits::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_setters() {
        let config = CollectorConfig::new()
            .with_token("t")
            .with_connect_timeout(Duration::from_millis(10))
            .with_read_buffer_size(16)
            .with_persist_queue_capacity(2)
            .with_report_invalid_ascii(true);

        assert_eq!(config.token, "t");
        assert_eq!(config.connect_timeout, Duration::from_millis(10));
        assert_eq!(config.read_buffer_size, 16);
        assert_eq!(config.persist_queue_capacity, 2);
        assert!(config.report_invalid_ascii);
    }
}
