pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientTimeouts, PolicyApiClient, PolicyDataSource};
pub use error::ApiError;
