use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Timeout and freshness settings for one cached backend collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub timeout: Duration,
    pub ttl: Duration,
}

#[derive(Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub env: Environment,
    pub log_level: String,
    pub cache_dir: PathBuf,
    pub user_agent: String,
    pub countries: EndpointConfig,
    pub policies: EndpointConfig,
    pub statistics: EndpointConfig,
    pub policies_limit: u32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("api_base_url", &self.api_base_url)
            .field("log_level", &self.log_level)
            .field("cache_dir", &self.cache_dir)
            .field("user_agent", &self.user_agent)
            .field("countries", &self.countries)
            .field("policies", &self.policies)
            .field("statistics", &self.statistics)
            .field("policies_limit", &self.policies_limit)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}
