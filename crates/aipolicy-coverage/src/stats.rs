//! Summary statistics over coverage and master-policy collections.

use std::collections::BTreeMap;

use aipolicy_core::{NameNormalizer, PublicStatistics, RawPolicy};
use serde::{Deserialize, Serialize};

use crate::coverage::{CoverageLevel, CoverageMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub none: usize,
    pub emerging: usize,
    pub developing: usize,
    pub advanced: usize,
}

impl LevelCounts {
    fn bump(&mut self, level: CoverageLevel) {
        match level {
            CoverageLevel::None => self.none += 1,
            CoverageLevel::Emerging => self.emerging += 1,
            CoverageLevel::Developing => self.developing += 1,
            CoverageLevel::Advanced => self.advanced += 1,
        }
    }
}

/// Headline numbers shown next to the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStats {
    pub total_countries: u64,
    pub countries_with_policies: u64,
    pub total_policies: u64,
    pub level_counts: LevelCounts,
}

impl MapStats {
    /// Derives every figure from the coverage map itself.
    #[must_use]
    pub fn from_coverage(coverage: &CoverageMap) -> Self {
        let mut stats = Self::default();
        for country in coverage {
            stats.total_countries += 1;
            stats.total_policies += country.total_policies as u64;
            if country.total_policies > 0 {
                stats.countries_with_policies += 1;
            }
            stats.level_counts.bump(country.level);
        }
        stats
    }

    /// Replaces the headline totals with the backend's figures, keeping the
    /// locally derived level distribution.
    #[must_use]
    pub fn with_public(mut self, public: &PublicStatistics) -> Self {
        self.total_countries = public.total_countries;
        self.countries_with_policies = public.countries_with_policies;
        self.total_policies = public.total_policies;
        self
    }
}

/// Per-area and per-country totals over the master policy list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStatistics {
    pub total_policies: u64,
    /// Keyed by area id (or derived slug for unknown areas).
    pub by_area: BTreeMap<String, u64>,
    /// Keyed by canonical country name.
    pub by_country: BTreeMap<String, u64>,
    pub by_status: BTreeMap<String, u64>,
}

impl AdminStatistics {
    #[must_use]
    pub fn from_policies(policies: &[RawPolicy], normalizer: &NameNormalizer) -> Self {
        let mut stats = Self::default();
        for policy in policies {
            stats.total_policies += 1;

            if let Some(area) = normalizer.normalize_area(policy.policy_area.as_deref()) {
                *stats.by_area.entry(area.key().to_owned()).or_default() += 1;
            }
            if let Some(country) = normalizer.normalize_country(policy.country.as_deref()) {
                *stats.by_country.entry(country).or_default() += 1;
            }
            let status = policy
                .status
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown")
                .to_lowercase();
            *stats.by_status.entry(status).or_default() += 1;
        }
        stats
    }
}
