use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;

pub const CONFIG_ENV: &str = "LAMBDA_SYNC_CONFIG";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint_url: Option<String>,
    pub retry: RetryConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: DurationString,
    pub max_delay: DurationString,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay: DurationString::new(policy.base_delay),
            max_delay: DurationString::new(policy.max_delay),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region={} profile={} retry={}x",
            self.region.as_deref().unwrap_or("<default>"),
            self.profile.as_deref().unwrap_or("<default>"),
            self.retry.max_attempts
        )
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Loads `path`, falling back to `$LAMBDA_SYNC_CONFIG`, then to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match std::env::var(CONFIG_ENV) {
                Ok(path) if !path.is_empty() => Self::from_file(path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let base_delay = Duration::from(self.retry.base_delay.clone());
        let max_delay = Duration::from(self.retry.max_delay.clone());
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }
}
