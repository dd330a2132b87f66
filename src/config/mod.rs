//! # Service Configuration
//!
//! Service-level configuration loaded from environment variables.
//!
//! All configuration has sensible defaults and can be overridden via environment variables.
//! Loading configuration is the embedding process's job; the service only consumes it.

mod service;

pub use service::ServiceConfig;

/// Load configuration from environment variables with defaults
pub fn load_config() -> ServiceConfig {
    ServiceConfig::from_env()
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read the first non-blank environment variable out of `keys`
pub(crate) fn first_env_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
