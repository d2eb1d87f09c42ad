//! The map's data layer: cached backend collections in, one published
//! [`MapSnapshot`] out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use aipolicy_cache::{
    CacheError, CacheStatistics, Cached, DataCache, FetchPolicy, FileSnapshotStore,
    SnapshotStore,
};
use aipolicy_client::{ApiError, PolicyDataSource};
use aipolicy_core::{AppConfig, AreaId, PublicStatistics, RawCountryRecord, RawPolicy};
use aipolicy_coverage::{
    AdminStatistics, AggregateOptions, ColorMode, ColorPalette, CoverageAggregator, CoverageMap,
    MapStats, SearchIndex,
};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::MapError;
use crate::settings::{keys, ServiceSettings};
use crate::snapshot::{CountryDetail, MapSnapshot};

/// Last aggregation, reused while neither the records nor the view change.
struct Memo {
    records: Arc<Vec<RawCountryRecord>>,
    options: AggregateOptions,
    coverage: Arc<CoverageMap>,
}

struct ViewState {
    options: AggregateOptions,
    records: Option<Arc<Vec<RawCountryRecord>>>,
    public: Option<PublicStatistics>,
    fetched_at: Option<DateTime<Utc>>,
    served_stale: bool,
    /// Loads started but not yet published.
    loads_in_flight: usize,
    last_error: Option<String>,
    memo: Option<Memo>,
    search: SearchIndex,
    snapshot: Arc<MapSnapshot>,
}

struct ServiceInner<S> {
    source: Arc<S>,
    settings: ServiceSettings,
    aggregator: CoverageAggregator,
    palette: ColorPalette,
    countries: DataCache<Vec<RawCountryRecord>>,
    policies: DataCache<Vec<RawPolicy>>,
    statistics: DataCache<PublicStatistics>,
    admin_statistics: DataCache<AdminStatistics>,
    view: Mutex<ViewState>,
}

/// Cache counters for each backend collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStatistics {
    pub countries: CacheStatistics,
    pub policies: CacheStatistics,
    pub statistics: CacheStatistics,
    pub admin_statistics: CacheStatistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Load {
    Cached,
    Refresh,
}

/// Owns the caches, the aggregation pipeline and the published snapshot.
///
/// Cloning is cheap; clones share everything.
pub struct MapDataService<S> {
    inner: Arc<ServiceInner<S>>,
}

impl<S> Clone for MapDataService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PolicyDataSource> MapDataService<S> {
    /// A service whose caches live only in memory.
    pub fn new(source: S, settings: ServiceSettings) -> Self {
        Self::build(source, settings, None)
    }

    /// A service that persists and hydrates cache entries through `store`.
    pub fn with_store(source: S, settings: ServiceSettings, store: Arc<dyn SnapshotStore>) -> Self {
        Self::build(source, settings, Some(store))
    }

    /// Snapshots go to `config.cache_dir`.
    pub fn from_config(source: S, config: &AppConfig) -> Self {
        let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(config.cache_dir.clone()));
        Self::with_store(source, ServiceSettings::from_config(config), store)
    }

    fn build(source: S, settings: ServiceSettings, store: Option<Arc<dyn SnapshotStore>>) -> Self {
        fn cache<T>(store: Option<&Arc<dyn SnapshotStore>>) -> DataCache<T>
        where
            T: Serialize + DeserializeOwned + Send + Sync + 'static,
        {
            match store {
                Some(store) => DataCache::with_store(Arc::clone(store)),
                None => DataCache::new(),
            }
        }

        let store = store.as_ref();
        Self {
            inner: Arc::new(ServiceInner {
                source: Arc::new(source),
                settings,
                aggregator: CoverageAggregator::default(),
                palette: ColorPalette::new(),
                countries: cache(store),
                policies: cache(store),
                statistics: cache(store),
                admin_statistics: cache(store),
                view: Mutex::new(ViewState {
                    options: AggregateOptions::default(),
                    records: None,
                    public: None,
                    fetched_at: None,
                    served_stale: false,
                    loads_in_flight: 0,
                    last_error: None,
                    memo: None,
                    search: SearchIndex::default(),
                    snapshot: Arc::new(MapSnapshot::default()),
                }),
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ServiceSettings {
        &self.inner.settings
    }

    /// The currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<MapSnapshot> {
        Arc::clone(&self.inner.view().snapshot)
    }

    /// Loads countries and statistics through their caches and publishes the
    /// aggregated snapshot.
    ///
    /// A statistics failure is not fatal: the map stats are then derived
    /// from the coverage itself.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Cache`] if country data could not be obtained and
    /// there was no previous value. The previous snapshot stays published
    /// with `last_error` set.
    pub async fn fetch_map_data(&self) -> Result<Arc<MapSnapshot>, MapError> {
        self.load(Load::Cached).await
    }

    /// Refetches countries and statistics regardless of freshness. The
    /// previous snapshot stays published until the new one replaces it.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_map_data`](Self::fetch_map_data).
    pub async fn refresh(&self) -> Result<Arc<MapSnapshot>, MapError> {
        self.inner.view().memo = None;
        tracing::info!("refreshing map data");
        self.load(Load::Refresh).await
    }

    async fn load(&self, mode: Load) -> Result<Arc<MapSnapshot>, MapError> {
        self.inner.begin_loading();
        self.run_load(mode).await
    }

    /// Fetches and publishes; the caller has already called `begin_loading`.
    async fn run_load(&self, mode: Load) -> Result<Arc<MapSnapshot>, MapError> {
        let (countries, statistics) =
            tokio::join!(self.inner.load_countries(mode), self.inner.load_statistics(mode));

        let public = match statistics {
            Ok(cached) => Some(*cached.data),
            Err(e) => {
                tracing::warn!(error = %e, "statistics unavailable; deriving map stats from coverage");
                None
            }
        };

        match countries {
            Ok(cached) => {
                let snapshot = self.inner.publish_countries(cached, public);
                tracing::info!(
                    countries = snapshot.coverage.len(),
                    stale = snapshot.served_stale,
                    "map data published"
                );
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load country data");
                self.inner.publish_error(&e);
                Err(e.into())
            }
        }
    }

    /// Loads durable snapshots into the caches, publishes whatever they
    /// hold, then fetches in the background.
    pub fn boot(&self) -> JoinHandle<Result<Arc<MapSnapshot>, MapError>> {
        self.hydrate();
        self.inner.begin_loading();
        let service = self.clone();
        tokio::spawn(async move { service.run_load(Load::Cached).await })
    }

    /// Loads durable snapshots into the caches and publishes the country
    /// data among them, without any network I/O.
    pub fn hydrate(&self) -> Arc<MapSnapshot> {
        let inner = &self.inner;
        hydrate_key(&inner.countries, keys::COUNTRIES);
        hydrate_key(&inner.policies, keys::POLICIES);
        hydrate_key(&inner.statistics, keys::STATISTICS);
        hydrate_key(&inner.admin_statistics, keys::ADMIN_STATISTICS);

        let countries = inner
            .countries
            .peek(keys::COUNTRIES, inner.settings.countries.ttl);
        let statistics = inner
            .statistics
            .peek(keys::STATISTICS, inner.settings.statistics.ttl);

        let mut view = inner.view();
        if let Some(cached) = countries {
            view.records = Some(cached.data);
            view.fetched_at = Some(cached.fetched_at);
            view.served_stale = cached.stale;
        }
        if let Some(cached) = statistics {
            view.public = Some(*cached.data);
        }
        inner.rebuild(&mut view)
    }

    /// Changes the area filter and color mode, re-deriving the snapshot from
    /// data already loaded.
    pub fn set_view(&self, filter_area: Option<AreaId>, color_mode: ColorMode) -> Arc<MapSnapshot> {
        let mut view = self.inner.view();
        view.options = AggregateOptions {
            filter_area,
            color_mode,
        };
        self.inner.rebuild(&mut view)
    }

    /// Country names in the current snapshot containing `query`.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<String> {
        self.inner.view().search.suggest(query, limit)
    }

    /// Fetches the full policy list for one country, bypassing every cache.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::EmptyCountry`] for a blank name, or
    /// [`MapError::Api`] if the request fails.
    pub async fn country_detail(&self, name: &str) -> Result<CountryDetail, MapError> {
        let canonical_name = self
            .inner
            .aggregator
            .normalizer()
            .normalize_country(Some(name))
            .ok_or(MapError::EmptyCountry)?;

        let policies = self
            .inner
            .source
            .fetch_country_policies(&canonical_name)
            .await?;
        tracing::debug!(country = %canonical_name, policies = policies.len(), "fetched country detail");

        let coverage = self.snapshot().country(&canonical_name).cloned();
        Ok(CountryDetail {
            canonical_name,
            coverage,
            policies,
        })
    }

    /// The master policy list, cached under `cached_policies`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Cache`] if the list could not be fetched and no
    /// previous value exists.
    pub async fn master_policies(&self) -> Result<Cached<Vec<RawPolicy>>, MapError> {
        let inner = &self.inner;
        Ok(inner
            .policies
            .get_or_fetch(keys::POLICIES, &inner.settings.policies, inner.policies_fetcher())
            .await?)
    }

    /// Per-area, per-country and per-status totals over the master policy
    /// list, cached under `admin_stats_cache`.
    ///
    /// # Errors
    ///
    /// Same as [`master_policies`](Self::master_policies).
    pub async fn admin_statistics(&self) -> Result<Cached<AdminStatistics>, MapError> {
        let inner = &self.inner;
        // The nested policies lookup owns retries; this layer only bounds the
        // whole of it.
        let policy = inner.settings.policies;
        let derived = FetchPolicy {
            timeout: policy.budget(),
            ..policy.with_retries(0, Duration::ZERO)
        };
        Ok(inner
            .admin_statistics
            .get_or_fetch(keys::ADMIN_STATISTICS, &derived, inner.admin_statistics_fetcher())
            .await?)
    }

    #[must_use]
    pub fn cache_statistics(&self) -> ServiceStatistics {
        let inner = &self.inner;
        ServiceStatistics {
            countries: inner.countries.statistics(),
            policies: inner.policies.statistics(),
            statistics: inner.statistics.statistics(),
            admin_statistics: inner.admin_statistics.statistics(),
        }
    }
}

fn hydrate_key<T>(cache: &DataCache<T>, key: &str)
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    match cache.hydrate(key) {
        Ok(true) => tracing::debug!(key, "hydrated from snapshot"),
        Ok(false) => {}
        Err(e) => tracing::warn!(key, error = %e, "ignoring unreadable snapshot"),
    }
}

type Fetch<T, E> = BoxFuture<'static, Result<T, E>>;

impl<S: PolicyDataSource> ServiceInner<S> {
    fn view(&self) -> MutexGuard<'_, ViewState> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn countries_fetcher(
        &self,
    ) -> impl Fn() -> Fetch<Vec<RawCountryRecord>, ApiError> + Send + Sync + Clone + 'static {
        let source = Arc::clone(&self.source);
        move || {
            let source = Arc::clone(&source);
            async move { source.fetch_countries().await }.boxed()
        }
    }

    fn statistics_fetcher(
        &self,
    ) -> impl Fn() -> Fetch<PublicStatistics, ApiError> + Send + Sync + Clone + 'static {
        let source = Arc::clone(&self.source);
        move || {
            let source = Arc::clone(&source);
            async move { source.fetch_statistics().await }.boxed()
        }
    }

    fn policies_fetcher(
        &self,
    ) -> impl Fn() -> Fetch<Vec<RawPolicy>, ApiError> + Send + Sync + Clone + 'static {
        let source = Arc::clone(&self.source);
        let limit = self.settings.policies_limit;
        move || {
            let source = Arc::clone(&source);
            async move { source.fetch_master_policies(limit).await }.boxed()
        }
    }

    fn admin_statistics_fetcher(
        &self,
    ) -> impl Fn() -> Fetch<AdminStatistics, CacheError> + Send + Sync + Clone + 'static {
        let policies = self.policies.clone();
        let policy = self.settings.policies;
        let fetch_policies = self.policies_fetcher();
        let normalizer = self.aggregator.normalizer().clone();
        move || {
            let policies = policies.clone();
            let fetch_policies = fetch_policies.clone();
            let normalizer = normalizer.clone();
            async move {
                let cached = policies
                    .get_or_fetch(keys::POLICIES, &policy, fetch_policies)
                    .await?;
                Ok(AdminStatistics::from_policies(&cached.data, &normalizer))
            }
            .boxed()
        }
    }

    async fn load_countries(&self, mode: Load) -> Result<Cached<Vec<RawCountryRecord>>, CacheError> {
        let policy = &self.settings.countries;
        let fetcher = self.countries_fetcher();
        match mode {
            Load::Cached => self.countries.get_or_fetch(keys::COUNTRIES, policy, fetcher).await,
            Load::Refresh => self.countries.refresh(keys::COUNTRIES, policy, fetcher).await,
        }
    }

    async fn load_statistics(&self, mode: Load) -> Result<Cached<PublicStatistics>, CacheError> {
        let policy = &self.settings.statistics;
        let fetcher = self.statistics_fetcher();
        match mode {
            Load::Cached => self.statistics.get_or_fetch(keys::STATISTICS, policy, fetcher).await,
            Load::Refresh => self.statistics.refresh(keys::STATISTICS, policy, fetcher).await,
        }
    }

    fn begin_loading(&self) {
        let mut view = self.view();
        view.loads_in_flight += 1;
        self.rebuild(&mut view);
    }

    fn publish_countries(
        &self,
        countries: Cached<Vec<RawCountryRecord>>,
        public: Option<PublicStatistics>,
    ) -> Arc<MapSnapshot> {
        let mut view = self.view();
        view.records = Some(countries.data);
        view.fetched_at = Some(countries.fetched_at);
        view.served_stale = countries.stale;
        view.public = public;
        view.loads_in_flight = view.loads_in_flight.saturating_sub(1);
        view.last_error = None;
        self.rebuild(&mut view)
    }

    fn publish_error(&self, error: &CacheError) {
        let mut view = self.view();
        view.loads_in_flight = view.loads_in_flight.saturating_sub(1);
        view.last_error = Some(error.to_string());
        self.rebuild(&mut view);
    }

    fn aggregate_memoized(
        &self,
        memo: &mut Option<Memo>,
        records: Arc<Vec<RawCountryRecord>>,
        options: AggregateOptions,
    ) -> Arc<CoverageMap> {
        if let Some(memo) = memo.as_ref() {
            if Arc::ptr_eq(&memo.records, &records) && memo.options == options {
                return Arc::clone(&memo.coverage);
            }
        }
        let coverage = Arc::new(self.aggregator.aggregate(&records, &options, &self.palette));
        *memo = Some(Memo {
            records,
            options,
            coverage: Arc::clone(&coverage),
        });
        coverage
    }

    /// Publishes a snapshot derived from `view`.
    fn rebuild(&self, view: &mut ViewState) -> Arc<MapSnapshot> {
        let options = view.options;
        let coverage = view
            .records
            .clone()
            .map(|records| self.aggregate_memoized(&mut view.memo, records, options));
        let is_loaded = coverage.is_some();
        let coverage = coverage.unwrap_or_default();

        if !Arc::ptr_eq(&coverage, &view.snapshot.coverage) {
            view.search.rebuild(&coverage);
        }

        let mut map_stats = MapStats::from_coverage(&coverage);
        if let Some(public) = &view.public {
            map_stats = map_stats.with_public(public);
        }

        let snapshot = Arc::new(MapSnapshot {
            coverage,
            map_stats,
            options,
            is_loading: view.loads_in_flight > 0,
            is_loaded,
            served_stale: view.served_stale,
            last_error: view.last_error.clone(),
            fetched_at: view.fetched_at,
        });
        view.snapshot = Arc::clone(&snapshot);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSource;

    impl PolicyDataSource for NoSource {
        async fn fetch_countries(&self) -> Result<Vec<RawCountryRecord>, ApiError> {
            Ok(Vec::new())
        }

        async fn fetch_master_policies(&self, _limit: u32) -> Result<Vec<RawPolicy>, ApiError> {
            Ok(Vec::new())
        }

        async fn fetch_statistics(&self) -> Result<PublicStatistics, ApiError> {
            Ok(PublicStatistics::default())
        }

        async fn fetch_country_policies(&self, _country: &str) -> Result<Vec<RawPolicy>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn record(country: &str) -> RawCountryRecord {
        RawCountryRecord {
            country: Some(country.to_owned()),
            ..RawCountryRecord::default()
        }
    }

    #[test]
    fn initial_snapshot_is_empty_and_not_loaded() {
        let service = MapDataService::new(NoSource, ServiceSettings::default());
        let snapshot = service.snapshot();
        assert!(!snapshot.is_loaded);
        assert!(!snapshot.is_loading);
        assert!(snapshot.countries().is_empty());
    }

    #[test]
    fn overlapping_loads_stay_loading_until_the_last_publishes() {
        let service = MapDataService::new(NoSource, ServiceSettings::default());
        let inner = &service.inner;

        inner.begin_loading();
        inner.begin_loading();
        assert!(service.snapshot().is_loading);

        let first = Cached {
            data: Arc::new(vec![record("Kenya")]),
            fetched_at: Utc::now(),
            stale: false,
            from_cache: false,
        };
        let published = inner.publish_countries(first, None);
        assert!(published.is_loading, "second load is still pending");

        inner.publish_error(&CacheError::Cancelled { key: "countries".into() });
        let snapshot = service.snapshot();
        assert!(!snapshot.is_loading);
        assert!(snapshot.is_loaded);
    }

    #[test]
    fn memo_is_reused_for_same_records_and_options() {
        let service = MapDataService::new(NoSource, ServiceSettings::default());
        let records = Arc::new(vec![record("Kenya")]);

        let mut view = service.inner.view();
        view.records = Some(Arc::clone(&records));
        let first = service.inner.rebuild(&mut view);
        let second = service.inner.rebuild(&mut view);
        assert!(Arc::ptr_eq(&first.coverage, &second.coverage));

        view.options.color_mode = ColorMode::RgbPure;
        let third = service.inner.rebuild(&mut view);
        assert!(!Arc::ptr_eq(&first.coverage, &third.coverage));
    }

    #[test]
    fn search_tracks_published_coverage() {
        let service = MapDataService::new(NoSource, ServiceSettings::default());
        {
            let mut view = service.inner.view();
            view.records = Some(Arc::new(vec![record("Bangladesh"), record("Albania")]));
            service.inner.rebuild(&mut view);
        }
        assert_eq!(service.suggest("ban", 10), vec!["Bangladesh", "Albania"]);
    }
}
