use std::time::Duration;

use aipolicy_cache::FetchPolicy;
use aipolicy_core::{AppConfig, EndpointConfig, MAX_POLICIES_LIMIT};

/// Durable cache keys. The names are shared with snapshots written by
/// earlier sessions, so they must not change.
pub mod keys {
    pub const COUNTRIES: &str = "countries";
    pub const POLICIES: &str = "cached_policies";
    pub const STATISTICS: &str = "cached_stats";
    pub const ADMIN_STATISTICS: &str = "admin_stats_cache";

    pub const ALL: [&str; 4] = [COUNTRIES, POLICIES, STATISTICS, ADMIN_STATISTICS];
}

/// Per-collection fetch policies for [`MapDataService`](crate::MapDataService).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub countries: FetchPolicy,
    pub policies: FetchPolicy,
    pub statistics: FetchPolicy,
    pub policies_limit: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            countries: FetchPolicy::new(Duration::from_secs(300), Duration::from_secs(15)),
            policies: FetchPolicy::new(Duration::from_secs(600), Duration::from_secs(45)),
            statistics: FetchPolicy::new(Duration::from_secs(300), Duration::from_secs(20)),
            policies_limit: MAX_POLICIES_LIMIT,
        }
    }
}

impl ServiceSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let backoff = Duration::from_millis(config.retry_backoff_ms);
        let policy = |endpoint: &EndpointConfig| {
            FetchPolicy::new(endpoint.ttl, endpoint.timeout).with_retries(config.max_retries, backoff)
        };
        Self {
            countries: policy(&config.countries),
            policies: policy(&config.policies),
            statistics: policy(&config.statistics),
            policies_limit: config.policies_limit,
        }
    }
}
