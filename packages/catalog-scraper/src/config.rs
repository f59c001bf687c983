//! Runtime configuration loaded from environment variables.

use dotenvy::dotenv;
use secrecy::{ExposeSecret, SecretBox};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::config::OrchestratorConfig;
use crate::types::policy::{CompliancePolicy, DEFAULT_TRUSTED_DOMAINS, DEFAULT_USER_AGENT};

/// A string that never shows up in logs or debug output.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Only call this where the secret is actually sent somewhere.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Scraper configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub safe_scraping_enforced: bool,
    pub trusted_domains: Vec<String>,
    pub user_agent: String,
    pub max_concurrent_jobs: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub fallback_currency: Option<String>,
    pub openai_api_key: Option<SecretString>,
    pub summary_model: String,
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub profile_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any name -> value lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let trusted_domains = match var("SCRAPER_TRUSTED_DOMAINS") {
            Some(list) => list
                .split(',')
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            None => DEFAULT_TRUSTED_DOMAINS.iter().map(|d| d.to_string()).collect(),
        };

        let backoff_ms: u64 = parse_or("SCRAPER_RETRY_BACKOFF_MS", var("SCRAPER_RETRY_BACKOFF_MS"), 60_000)?;

        Ok(Self {
            safe_scraping_enforced: parse_bool("SAFE_SCRAPING_ENFORCED", var("SAFE_SCRAPING_ENFORCED"), true)?,
            trusted_domains,
            user_agent: var("SCRAPER_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_concurrent_jobs: parse_or("SCRAPER_MAX_CONCURRENT_JOBS", var("SCRAPER_MAX_CONCURRENT_JOBS"), 2)?,
            max_retries: parse_or("SCRAPER_MAX_RETRIES", var("SCRAPER_MAX_RETRIES"), 3)?,
            retry_backoff: Duration::from_millis(backoff_ms),
            fallback_currency: Some(
                var("SCRAPER_FALLBACK_CURRENCY")
                    .unwrap_or_else(|| "JOD".to_string())
                    .to_uppercase(),
            ),
            openai_api_key: var("OPENAI_API_KEY").map(SecretString::from),
            summary_model: var("SCRAPER_SUMMARY_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            chromium_path: var("CHROMIUM_PATH").map(PathBuf::from),
            headless: parse_bool("SCRAPER_HEADLESS", var("SCRAPER_HEADLESS"), true)?,
            profile_dir: PathBuf::from(var("SCRAPER_PROFILE_DIR").unwrap_or_else(|| "./user_data".to_string())),
        })
    }

    pub fn policy(&self) -> CompliancePolicy {
        CompliancePolicy::new()
            .with_enforced(self.safe_scraping_enforced)
            .with_trusted_domains(&self.trusted_domains)
            .with_user_agent(self.user_agent.clone())
    }

    /// Orchestrator settings; pagination and cache use their defaults.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig::new()
            .with_policy(self.policy())
            .with_max_concurrent_jobs(self.max_concurrent_jobs)
            .with_max_retries(self.max_retries)
            .with_retry_backoff(self.retry_backoff)
            .with_fallback_currency(self.fallback_currency.clone())
    }
}

fn parse_or<T: FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { name, value }),
    }
}
