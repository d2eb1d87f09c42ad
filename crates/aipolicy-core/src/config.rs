use std::time::Duration;

use crate::app_config::{AppConfig, EndpointConfig, Environment};
use crate::ConfigError;

/// Largest page the master-policy endpoint serves.
pub const MAX_POLICIES_LIMIT: u32 = 1000;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let endpoint = |timeout_var: &str,
                    timeout_default: &str,
                    ttl_var: &str,
                    ttl_default: &str|
     -> Result<EndpointConfig, ConfigError> {
        let timeout_secs = parse_u64(timeout_var, timeout_default)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: timeout_var.to_string(),
                reason: "timeout must be at least one second".to_string(),
            });
        }
        Ok(EndpointConfig {
            timeout: Duration::from_secs(timeout_secs),
            ttl: Duration::from_secs(parse_u64(ttl_var, ttl_default)?),
        })
    };

    let api_base_url = require("AIPOLICY_API_BASE_URL")?;
    if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
        return Err(ConfigError::InvalidEnvVar {
            var: "AIPOLICY_API_BASE_URL".to_string(),
            reason: format!("'{api_base_url}' is not an http(s) URL"),
        });
    }

    let env = parse_environment(&or_default("AIPOLICY_ENV", "development"))?;
    let log_level = or_default("AIPOLICY_LOG_LEVEL", "info");
    let cache_dir = PathBuf::from(or_default("AIPOLICY_CACHE_DIR", "./.aipolicy-cache"));
    let user_agent = or_default("AIPOLICY_USER_AGENT", "aipolicy/0.1 (coverage-map)");

    let countries = endpoint(
        "AIPOLICY_COUNTRIES_TIMEOUT_SECS",
        "15",
        "AIPOLICY_COUNTRIES_TTL_SECS",
        "300",
    )?;
    let policies = endpoint(
        "AIPOLICY_POLICIES_TIMEOUT_SECS",
        "45",
        "AIPOLICY_POLICIES_TTL_SECS",
        "600",
    )?;
    let statistics = endpoint(
        "AIPOLICY_STATS_TIMEOUT_SECS",
        "20",
        "AIPOLICY_STATS_TTL_SECS",
        "300",
    )?;

    let policies_limit = parse_u32("AIPOLICY_POLICIES_LIMIT", "1000")?;
    if policies_limit == 0 || policies_limit > MAX_POLICIES_LIMIT {
        return Err(ConfigError::InvalidEnvVar {
            var: "AIPOLICY_POLICIES_LIMIT".to_string(),
            reason: format!("must be between 1 and {MAX_POLICIES_LIMIT}"),
        });
    }

    let max_retries = parse_u32("AIPOLICY_MAX_RETRIES", "2")?;
    let retry_backoff_ms = parse_u64("AIPOLICY_RETRY_BACKOFF_MS", "1000")?;

    Ok(AppConfig {
        api_base_url,
        env,
        log_level,
        cache_dir,
        user_agent,
        countries,
        policies,
        statistics,
        policies_limit,
        max_retries,
        retry_backoff_ms,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "AIPOLICY_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
