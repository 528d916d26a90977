//! Configuration helpers: fast local settings and `.env` credentials

use jobpulse::config::{ApiTier, OrchestrationConfig, ProviderConfig, RetryConfig};
use jobpulse::Config;
use std::time::Duration;

/// Configuration pointing both provider hosts at `base_url`, tuned for tests
pub fn local_config(base_url: &str, tier: ApiTier) -> Config {
    Config {
        provider: ProviderConfig {
            base_url: base_url.to_string(),
            status_base_url: base_url.to_string(),
            username: Some("alice".into()),
            password: Some("hunter2".into()),
            tier,
            ..Default::default()
        },
        orchestration: OrchestrationConfig {
            poll_interval: Duration::from_millis(20),
            min_poll_interval: Duration::from_millis(1),
            page_size: 2,
            wait_timeout: Some(Duration::from_secs(10)),
            clear_settle_delay: Duration::from_millis(1),
            max_consecutive_status_failures: 5,
            collect_concurrency: 2,
        },
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    }
}

/// Whether `.env` / the environment carries real provider credentials
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("OCTOPARSE_USERNAME").is_ok() && std::env::var("OCTOPARSE_PASSWORD").is_ok()
}
