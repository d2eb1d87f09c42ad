//! Shared data model, taxonomy, name normalization, and configuration for
//! the AI-policy coverage map.

pub mod aliases;
pub mod app_config;
pub mod areas;
pub mod config;
pub mod normalize;
pub mod types;

use thiserror::Error;

pub use aliases::{AliasTable, ALIAS_TABLE_VERSION};
pub use app_config::{AppConfig, EndpointConfig, Environment};
pub use areas::{AreaId, PolicyArea, POLICY_AREAS};
pub use config::{load_app_config, load_app_config_from_env, MAX_POLICIES_LIMIT};
pub use normalize::{slugify, AreaMatch, NameNormalizer};
pub use types::{AreaDetail, PublicStatistics, RawCountryRecord, RawPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
