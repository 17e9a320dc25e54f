//! User configuration (`config.toml`)
//!
//! Every setting is optional. Command line flags win over the file.

use crate::paths;
use anyhow::{Context, Result, bail};
use provisioning::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TOKEN_ENV: &str = "PROVCTL_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tenant: TenantConfig,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantConfig {
    /// Root url, e.g. `https://contoso.sharepoint.com`
    pub url: Option<String>,
    /// Environment variable holding the bearer token
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            url: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            backoff_factor: defaults.backoff_factor,
        }
    }
}

impl Config {
    /// Load the user config file, defaults when it does not exist
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        if !path.exists() {
            log::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.backoff_factor < 1.0 {
            bail!("retry.backoff_factor must be at least 1.0");
        }
        Ok(())
    }

    /// Retry policy with an optional attempt count override
    pub fn retry_config(&self, attempts: Option<u32>) -> RetryConfig {
        RetryConfig::new(
            attempts.unwrap_or(self.retry.max_attempts).max(1),
            Duration::from_millis(self.retry.base_delay_ms),
            self.retry.backoff_factor,
        )
    }

    /// Request timeout with an optional override in seconds
    pub fn timeout(&self, secs: Option<u64>) -> Duration {
        Duration::from_secs(secs.unwrap_or(self.tenant.timeout_secs))
    }

    /// Tenant url from the flag, then the file
    pub fn tenant_url(&self, flag: Option<&str>) -> Option<String> {
        flag.map(str::to_string)
            .or_else(|| self.tenant.url.clone())
            .map(|url| url.trim_end_matches('/').to_string())
    }

    /// Read the bearer token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        let name = &self.tenant.token_env;
        match std::env::var(name) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => bail!("No access token: set {name} to a bearer token for the tenant"),
        }
    }
}
