//! Subscription configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Grace period override
pub const ENV_GRACE_PERIOD_DAYS: &str = "CAMPUS_GRACE_PERIOD_DAYS";
/// Sweep interval override
pub const ENV_SWEEP_INTERVAL_SECS: &str = "CAMPUS_SWEEP_INTERVAL_SECS";
/// Expiring-soon window override
pub const ENV_EXPIRING_SOON_DAYS: &str = "CAMPUS_EXPIRING_SOON_DAYS";

/// Longest accepted grace period
pub const MAX_GRACE_PERIOD_DAYS: u32 = 3650;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },

    #[error("{key} must be at most {max}")]
    TooLarge { key: &'static str, max: u64 },
}

/// Subscription configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Days after expiry during which access continues
    pub grace_period_days: u32,
    /// Seconds between expiry sweeps
    pub sweep_interval_secs: u64,
    /// Window for the expiring-soon query
    pub expiring_soon_days: u32,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            grace_period_days: 7,
            sweep_interval_secs: 3600,
            expiring_soon_days: 14,
        }
    }
}

impl SubscriptionConfig {
    /// Defaults overridden from `CAMPUS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse(&lookup, ENV_GRACE_PERIOD_DAYS)? {
            config.grace_period_days = v;
        }
        if let Some(v) = parse(&lookup, ENV_SWEEP_INTERVAL_SECS)? {
            config.sweep_interval_secs = v;
        }
        if let Some(v) = parse(&lookup, ENV_EXPIRING_SOON_DAYS)? {
            config.expiring_soon_days = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// A zero grace period is allowed; a zero sweep interval is not
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_period_days > MAX_GRACE_PERIOD_DAYS {
            return Err(ConfigError::TooLarge {
                key: ENV_GRACE_PERIOD_DAYS,
                max: u64::from(MAX_GRACE_PERIOD_DAYS),
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Zero { key: ENV_SWEEP_INTERVAL_SECS });
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
