use std::env;
use std::time::Duration;

use crate::client::executor::DEFAULT_TIMEOUT_MS;

pub struct Config {
    pub port: u16,
    /// Applied to requests that carry no timeout of their own.
    pub default_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            default_timeout: Duration::from_millis(
                var("TRACE_TIMEOUT_MS")
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
        }
    }
}
