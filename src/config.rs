//! Configuration types for jobpulse

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};
use utoipa::ToSchema;

/// Provider API tier
///
/// The Standard tier can list tasks and read data; starting, stopping and
/// batch status lookups are only offered on the Advanced tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiTier {
    /// Read-only access
    Standard,
    /// Full task control
    #[default]
    Advanced,
}

impl ApiTier {
    /// Whether this tier may start/stop tasks and query their status
    pub fn allows_task_control(&self) -> bool {
        matches!(self, ApiTier::Advanced)
    }
}

impl FromStr for ApiTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ApiTier::Standard),
            "advanced" => Ok(ApiTier::Advanced),
            other => Err(Error::Config {
                message: format!("unknown API tier '{other}' (expected 'standard' or 'advanced')"),
                key: Some("OCTOPARSE_API_TIER".to_string()),
            }),
        }
    }
}

/// Remote provider connection settings
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderConfig {
    /// Base URL for token, task and data endpoints (default: "https://advancedapi.octoparse.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL for the batch status endpoint (default: "https://openapi.octoparse.com")
    #[serde(default = "default_status_base_url")]
    pub status_base_url: String,

    /// Account username for the password grant
    #[serde(default)]
    pub username: Option<String>,

    /// Account password for the password grant
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// API tier of the account (default: advanced)
    #[serde(default)]
    pub tier: ApiTier,

    /// Timeout for control requests (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for data page requests (default: 60 seconds)
    #[serde(default = "default_data_timeout", with = "duration_serde")]
    pub data_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            status_base_url: default_status_base_url(),
            username: None,
            password: None,
            tier: ApiTier::default(),
            request_timeout: default_request_timeout(),
            data_timeout: default_data_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("status_base_url", &self.status_base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tier", &self.tier)
            .field("request_timeout", &self.request_timeout)
            .field("data_timeout", &self.data_timeout)
            .finish()
    }
}

/// Orchestration defaults (polling, paging, deadlines)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct OrchestrationConfig {
    /// Interval between status polls (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Lower bound applied to any requested poll interval (default: 5 seconds)
    ///
    /// The provider rate-limits status lookups to one request per 5 seconds.
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub min_poll_interval: Duration,

    /// Rows requested per data page (default: 1000)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Give up waiting for completion after this long (default: 30 minutes, None = never)
    #[serde(default = "default_wait_timeout", with = "optional_duration_serde")]
    pub wait_timeout: Option<Duration>,

    /// Pause between clearing a task's data and starting it (default: 2 seconds)
    #[serde(default = "default_clear_settle_delay", with = "duration_serde")]
    pub clear_settle_delay: Duration,

    /// Abort the wait after this many consecutive failed status polls (default: 10)
    #[serde(default = "default_max_status_failures")]
    pub max_consecutive_status_failures: u32,

    /// Number of tasks whose pages are collected concurrently (default: 1)
    #[serde(default = "default_collect_concurrency")]
    pub collect_concurrency: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            min_poll_interval: default_poll_interval(),
            page_size: default_page_size(),
            wait_timeout: default_wait_timeout(),
            clear_settle_delay: default_clear_settle_delay(),
            max_consecutive_status_failures: default_max_status_failures(),
            collect_concurrency: default_collect_concurrency(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Local job store settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Open the job store and allow runs to persist rows (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Database path (default: "./jobpulse.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:1112)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Optional API key for authentication
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for jobpulse
///
/// Fields are organized into logical sub-configs:
/// - [`provider`](ProviderConfig) - remote endpoints, credentials, tier
/// - [`orchestration`](OrchestrationConfig) - polling, paging, deadlines
/// - [`retry`](RetryConfig) - backoff for transient transport failures
/// - [`persistence`](PersistenceConfig) - optional local job store
/// - [`api`](ApiConfig) - REST server
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Remote provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Orchestration defaults
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Local job store
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API server
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Build a configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Recognized keys: `OCTOPARSE_USERNAME`, `OCTOPARSE_PASSWORD`,
    /// `OCTOPARSE_API_TIER`, `OCTOPARSE_BASE_URL`, `OCTOPARSE_STATUS_BASE_URL`,
    /// `JOBPULSE_DATABASE_PATH`, `JOBPULSE_PERSIST`, `JOBPULSE_BIND`,
    /// `JOBPULSE_API_KEY`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        config.provider.username = get("OCTOPARSE_USERNAME");
        config.provider.password = get("OCTOPARSE_PASSWORD");
        if let Some(tier) = get("OCTOPARSE_API_TIER") {
            config.provider.tier = tier.parse()?;
        }
        if let Some(url) = get("OCTOPARSE_BASE_URL") {
            config.provider.base_url = url;
        }
        if let Some(url) = get("OCTOPARSE_STATUS_BASE_URL") {
            config.provider.status_base_url = url;
        }
        if let Some(path) = get("JOBPULSE_DATABASE_PATH") {
            config.persistence.database_path = PathBuf::from(path);
        }
        if let Some(flag) = get("JOBPULSE_PERSIST") {
            config.persistence.enabled = parse_bool(&flag).ok_or_else(|| Error::Config {
                message: format!("expected a boolean, got '{flag}'"),
                key: Some("JOBPULSE_PERSIST".to_string()),
            })?;
        }
        if let Some(bind) = get("JOBPULSE_BIND") {
            config.api.bind_address = bind.parse().map_err(|_| Error::Config {
                message: format!("invalid socket address '{bind}'"),
                key: Some("JOBPULSE_BIND".to_string()),
            })?;
        }
        config.api.api_key = get("JOBPULSE_API_KEY");

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("OCTOPARSE_BASE_URL", &self.provider.base_url),
            ("OCTOPARSE_STATUS_BASE_URL", &self.provider.status_base_url),
        ] {
            url::Url::parse(value).map_err(|e| Error::Config {
                message: format!("invalid URL '{value}': {e}"),
                key: Some(key.to_string()),
            })?;
        }

        if self.orchestration.page_size == 0 {
            return Err(Error::Config {
                message: "page_size must be greater than 0".to_string(),
                key: Some("page_size".to_string()),
            });
        }

        if self.orchestration.collect_concurrency == 0 {
            return Err(Error::Config {
                message: "collect_concurrency must be greater than 0".to_string(),
                key: Some("collect_concurrency".to_string()),
            });
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_base_url() -> String {
    "https://advancedapi.octoparse.com".to_string()
}

fn default_status_base_url() -> String {
    "https://openapi.octoparse.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_data_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_page_size() -> usize {
    1000
}

fn default_wait_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30 * 60))
}

fn default_clear_settle_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_status_failures() -> u32 {
    10
}

fn default_collect_concurrency() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./jobpulse.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 1112))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_provider_limits() {
        let config = Config::default();
        assert_eq!(config.orchestration.poll_interval, Duration::from_secs(5));
        assert_eq!(config.orchestration.min_poll_interval, Duration::from_secs(5));
        assert_eq!(config.orchestration.page_size, 1000);
        assert_eq!(config.provider.tier, ApiTier::Advanced);
        assert!(!config.persistence.enabled);
        assert_eq!(config.api.bind_address.port(), 1112);
        config.validate().unwrap();
    }

    #[test]
    fn from_lookup_reads_credentials_and_tier() {
        let config = Config::from_lookup(lookup_from(&[
            ("OCTOPARSE_USERNAME", "alice"),
            ("OCTOPARSE_PASSWORD", "hunter2"),
            ("OCTOPARSE_API_TIER", "Standard"),
            ("JOBPULSE_PERSIST", "yes"),
            ("JOBPULSE_BIND", "0.0.0.0:8080"),
        ]))
        .unwrap();

        assert_eq!(config.provider.username.as_deref(), Some("alice"));
        assert_eq!(config.provider.password.as_deref(), Some("hunter2"));
        assert_eq!(config.provider.tier, ApiTier::Standard);
        assert!(config.persistence.enabled);
        assert_eq!(config.api.bind_address.port(), 8080);
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let config = Config::from_lookup(lookup_from(&[("OCTOPARSE_USERNAME", "  ")])).unwrap();
        assert!(config.provider.username.is_none());
    }

    #[test]
    fn unknown_tier_reports_the_key() {
        let err = Config::from_lookup(lookup_from(&[("OCTOPARSE_API_TIER", "gold")])).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("OCTOPARSE_API_TIER")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err =
            Config::from_lookup(lookup_from(&[("OCTOPARSE_BASE_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn zero_page_size_fails_validation() {
        let mut config = Config::default();
        config.orchestration.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let provider = ProviderConfig {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let debug = format!("{provider:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn serialized_config_omits_secrets() {
        let mut config = Config::default();
        config.provider.password = Some("hunter2".to_string());
        config.api.api_key = Some("key".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("\"api_key\""));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"orchestration": {"page_size": 50}}"#).unwrap();
        assert_eq!(config.orchestration.page_size, 50);
        assert_eq!(config.orchestration.poll_interval, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 3);
    }
}
