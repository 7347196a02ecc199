//! Process configuration, read once at startup from `ENACT_*` variables.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use enact_core::app::PoolConfig;
use enact_core::domain::{PolicyError, RetryPolicy};
use secrecy::SecretString;

pub const ADDR: &str = "ENACT_ADDR";
pub const REMOTE: &str = "ENACT_REMOTE";
pub const REMOTE_TOKEN: &str = "ENACT_REMOTE_TOKEN";
pub const REMOTE_TIMEOUT: &str = "ENACT_REMOTE_TIMEOUT";
pub const MAX_ATTEMPTS: &str = "ENACT_MAX_ATTEMPTS";
pub const BACKOFF_BASE_MS: &str = "ENACT_BACKOFF_BASE_MS";
pub const BACKOFF_MAX_MS: &str = "ENACT_BACKOFF_MAX_MS";
pub const BACKOFF_MULTIPLIER: &str = "ENACT_BACKOFF_MULTIPLIER";
pub const BACKOFF_JITTER: &str = "ENACT_BACKOFF_JITTER";
pub const WORKERS: &str = "ENACT_WORKERS";
pub const QUEUE_CAPACITY: &str = "ENACT_QUEUE_CAPACITY";
pub const STATE_PATH: &str = "ENACT_STATE_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid backoff settings: {0}")]
    Policy(#[from] PolicyError),
}

#[derive(Debug)]
pub struct Config {
    /// Always `host:port`; a bare `:port` binds every interface.
    pub addr: String,
    pub remote: String,
    pub remote_token: Option<SecretString>,
    pub remote_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub pool: PoolConfig,
    pub state_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = normalize_addr(&get(ADDR).unwrap_or_else(|| ":8080".to_string()));
        let remote = get(REMOTE).unwrap_or_else(|| "http://localhost:8090".to_string());
        let remote_token = get(REMOTE_TOKEN).map(SecretString::from);

        let timeout_secs: u64 = parse(&get, REMOTE_TIMEOUT, 10)?;
        if timeout_secs == 0 {
            return Err(invalid(REMOTE_TIMEOUT, "0", "must be greater than zero"));
        }

        let retry_policy = RetryPolicy {
            max_attempts: parse(&get, MAX_ATTEMPTS, 5)?,
            base_delay: Duration::from_millis(parse(&get, BACKOFF_BASE_MS, 2000)?),
            max_delay: Duration::from_millis(parse(&get, BACKOFF_MAX_MS, 60_000)?),
            multiplier: parse(&get, BACKOFF_MULTIPLIER, 2.0)?,
            jitter: parse_bool(&get, BACKOFF_JITTER, false)?,
        };
        retry_policy.validate()?;

        let pool = PoolConfig {
            workers: parse_positive(&get, WORKERS, 8)?,
            queue_capacity: parse_positive(&get, QUEUE_CAPACITY, 1024)?,
        };

        Ok(Self {
            addr,
            remote,
            remote_token,
            remote_timeout: Duration::from_secs(timeout_secs),
            retry_policy,
            pool,
            state_path: get(STATE_PATH).map(PathBuf::from),
        })
    }
}

fn normalize_addr(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(key, &raw, e)),
        None => Ok(default),
    }
}

fn parse_positive<G>(get: &G, key: &'static str, default: usize) -> Result<usize, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse(get, key, default)?;
    if value == 0 {
        return Err(invalid(key, "0", "must be at least 1"));
    }
    Ok(value)
}

fn parse_bool<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, &raw, "expected true or false")),
    }
}
