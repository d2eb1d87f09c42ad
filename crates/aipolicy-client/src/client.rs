//! HTTP client for the policy backend.
//!
//! Wraps `reqwest` with per-endpoint timeouts and typed response parsing.
//! Collections are parsed record by record; a malformed record is logged
//! and skipped rather than failing the whole response.

use std::future::Future;
use std::time::Duration;

use aipolicy_core::{AppConfig, PublicStatistics, RawCountryRecord, RawPolicy, MAX_POLICIES_LIMIT};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::types::{CountriesResponse, PoliciesResponse};

/// Narrow fetch interface the cache layer consumes.
///
/// Implemented by [`PolicyApiClient`] for the real backend and by in-memory
/// fakes in tests.
pub trait PolicyDataSource: Send + Sync + 'static {
    fn fetch_countries(
        &self,
    ) -> impl Future<Output = Result<Vec<RawCountryRecord>, ApiError>> + Send;

    fn fetch_master_policies(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<RawPolicy>, ApiError>> + Send;

    fn fetch_statistics(&self) -> impl Future<Output = Result<PublicStatistics, ApiError>> + Send;

    /// Always bypasses every cache between here and the backend.
    fn fetch_country_policies(
        &self,
        country: &str,
    ) -> impl Future<Output = Result<Vec<RawPolicy>, ApiError>> + Send;
}

/// Per-endpoint request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub countries: Duration,
    pub policies: Duration,
    pub statistics: Duration,
    pub country_detail: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            countries: Duration::from_secs(15),
            policies: Duration::from_secs(45),
            statistics: Duration::from_secs(20),
            country_detail: Duration::from_secs(30),
        }
    }
}

/// Client for the policy backend REST API.
pub struct PolicyApiClient {
    client: Client,
    base_url: Url,
    timeouts: ClientTimeouts,
}

impl PolicyApiClient {
    /// Builds a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`ApiError::InvalidBaseUrl`] for a bad base URL.
    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        let timeouts = ClientTimeouts {
            countries: config.countries.timeout,
            policies: config.policies.timeout,
            statistics: config.statistics.timeout,
            ..ClientTimeouts::default()
        };
        Self::with_base_url(&config.api_base_url, &config.user_agent, timeouts)
    }

    /// Builds a client against an arbitrary base URL (wiremock in tests).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`ApiError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        base_url: &str,
        user_agent: &str,
        timeouts: ClientTimeouts,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash so relative joins append to the base path.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ApiError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            timeouts,
        })
    }

    /// `GET /countries`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Http`] on network failure or timeout.
    /// - [`ApiError::UnexpectedStatus`] on a non-2xx status.
    /// - [`ApiError::Deserialize`] if the envelope does not parse.
    pub async fn get_countries(&self) -> Result<Vec<RawCountryRecord>, ApiError> {
        let url = self.build_url("countries", &[])?;
        let envelope: CountriesResponse = self
            .request_json(&url, self.timeouts.countries, false)
            .await?;
        Ok(parse_each(envelope.countries, "country record"))
    }

    /// `GET /public/master-policies-fast?limit=N`, `N` clamped to `1..=1000`.
    ///
    /// # Errors
    ///
    /// See [`PolicyApiClient::get_countries`].
    pub async fn get_master_policies(&self, limit: u32) -> Result<Vec<RawPolicy>, ApiError> {
        let limit = limit.clamp(1, MAX_POLICIES_LIMIT).to_string();
        let url = self.build_url("public/master-policies-fast", &[("limit", &limit)])?;
        let envelope: PoliciesResponse = self
            .request_json(&url, self.timeouts.policies, false)
            .await?;
        Ok(parse_each(envelope.policies, "master policy"))
    }

    /// `GET /public/statistics-fast`.
    ///
    /// # Errors
    ///
    /// See [`PolicyApiClient::get_countries`].
    pub async fn get_statistics(&self) -> Result<PublicStatistics, ApiError> {
        let url = self.build_url("public/statistics-fast", &[])?;
        self.request_json(&url, self.timeouts.statistics, false)
            .await
    }

    /// `GET /public/master-policies-no-dedup?country=X&limit=1000`, cache-busted.
    ///
    /// # Errors
    ///
    /// See [`PolicyApiClient::get_countries`].
    pub async fn get_country_policies(&self, country: &str) -> Result<Vec<RawPolicy>, ApiError> {
        let limit = MAX_POLICIES_LIMIT.to_string();
        let bust = chrono::Utc::now().timestamp_millis().to_string();
        let url = self.build_url(
            "public/master-policies-no-dedup",
            &[("country", country), ("limit", &limit), ("_t", &bust)],
        )?;
        let envelope: PoliciesResponse = self
            .request_json(&url, self.timeouts.country_detail, true)
            .await?;
        Ok(parse_each(envelope.policies, "country policy"))
    }

    /// Joins `path` onto the base URL and appends percent-encoded query pairs.
    fn build_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Sends a GET with the given timeout, asserts a 2xx status, and parses
    /// the body as `T`.
    async fn request_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        timeout: Duration,
        no_cache: bool,
    ) -> Result<T, ApiError> {
        let mut request = self.client.get(url.clone()).timeout(timeout);
        if no_cache {
            request = request
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Deserialize {
            context: url.path().to_string(),
            source: e,
        })
    }
}

/// Parses each value independently, logging and dropping failures.
fn parse_each<T: DeserializeOwned>(values: Vec<serde_json::Value>, what: &str) -> Vec<T> {
    let total = values.len();
    let parsed: Vec<T> = values
        .into_iter()
        .enumerate()
        .filter_map(|(idx, value)| match serde_json::from_value::<T>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "skipping malformed {what}");
                None
            }
        })
        .collect();
    if parsed.len() < total {
        tracing::info!(kept = parsed.len(), total, "dropped malformed {what}s");
    }
    parsed
}

impl PolicyDataSource for PolicyApiClient {
    fn fetch_countries(
        &self,
    ) -> impl Future<Output = Result<Vec<RawCountryRecord>, ApiError>> + Send {
        self.get_countries()
    }

    fn fetch_master_policies(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<RawPolicy>, ApiError>> + Send {
        self.get_master_policies(limit)
    }

    fn fetch_statistics(&self) -> impl Future<Output = Result<PublicStatistics, ApiError>> + Send {
        self.get_statistics()
    }

    fn fetch_country_policies(
        &self,
        country: &str,
    ) -> impl Future<Output = Result<Vec<RawPolicy>, ApiError>> + Send {
        self.get_country_policies(country)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
