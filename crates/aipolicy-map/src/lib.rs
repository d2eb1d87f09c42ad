pub mod error;
pub mod service;
pub mod settings;
pub mod snapshot;

pub use error::MapError;
pub use service::{MapDataService, ServiceStatistics};
pub use settings::{keys, ServiceSettings};
pub use snapshot::{CountryDetail, MapSnapshot};
