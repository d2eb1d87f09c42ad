use std::sync::Arc;

use aipolicy_core::RawPolicy;
use aipolicy_coverage::{AggregateOptions, CountryCoverage, CoverageMap, MapStats};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Read-only view of the map published by [`MapDataService`](crate::MapDataService).
///
/// A new snapshot replaces the old one wholesale; holders of an older
/// `Arc<MapSnapshot>` keep a consistent view.
#[derive(Debug, Clone, Default)]
pub struct MapSnapshot {
    pub coverage: Arc<CoverageMap>,
    pub map_stats: MapStats,
    pub options: AggregateOptions,
    pub is_loading: bool,
    /// Set once country data has been published at least once.
    pub is_loaded: bool,
    /// The country data is a previous value served after a failed fetch.
    pub served_stale: bool,
    pub last_error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl MapSnapshot {
    #[must_use]
    pub fn countries(&self) -> &[CountryCoverage] {
        self.coverage.as_slice()
    }

    #[must_use]
    pub fn country(&self, canonical_name: &str) -> Option<&CountryCoverage> {
        self.coverage.get(canonical_name)
    }
}

/// Policies for one country, fetched fresh on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryDetail {
    pub canonical_name: String,
    /// The country's entry in the current snapshot, if it has one.
    pub coverage: Option<CountryCoverage>,
    pub policies: Vec<RawPolicy>,
}
