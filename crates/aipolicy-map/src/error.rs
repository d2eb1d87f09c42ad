use aipolicy_cache::CacheError;
use aipolicy_client::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("country name is empty")]
    EmptyCountry,
}
