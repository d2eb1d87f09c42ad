pub mod cache;
pub mod entry;
pub mod error;
pub(crate) mod retry;
pub mod store;

pub use cache::{CacheStatistics, DataCache};
pub use entry::{CacheEntry, Cached, FetchPolicy};
pub use error::{CacheError, StoreError};
pub use store::{Envelope, FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use tokio_util::sync::CancellationToken;
