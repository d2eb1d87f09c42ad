//! Derived per-country coverage types.

use std::collections::{BTreeSet, HashMap};

use aipolicy_core::{AreaId, AreaMatch};
use serde::{Deserialize, Serialize};

/// Four-bucket classification of a country's approved-area count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageLevel {
    None,
    Emerging,
    Developing,
    Advanced,
}

impl CoverageLevel {
    /// `0 → none`, `1..=3 → emerging`, `4..=7 → developing`, `8.. → advanced`.
    #[must_use]
    pub fn from_count(approved_area_count: usize) -> Self {
        match approved_area_count {
            0 => CoverageLevel::None,
            1..=3 => CoverageLevel::Emerging,
            4..=7 => CoverageLevel::Developing,
            _ => CoverageLevel::Advanced,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CoverageLevel::None => "none",
            CoverageLevel::Emerging => "emerging",
            CoverageLevel::Developing => "developing",
            CoverageLevel::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for CoverageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An approved policy re-tagged with its canonical country and area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedPolicy {
    pub country: String,
    pub area: AreaMatch,
    pub policy_name: String,
    pub policy_description: Option<String>,
    pub approved_at: Option<String>,
}

/// Coverage of one country, rebuilt from scratch on every aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryCoverage {
    pub canonical_name: String,
    /// Always equal to `approved_areas.len()`.
    pub approved_area_count: usize,
    pub total_policies: usize,
    pub approved_areas: BTreeSet<AreaId>,
    pub dominant_area: Option<AreaId>,
    pub policies: Vec<NormalizedPolicy>,
    pub level: CoverageLevel,
    /// Hidden by an area filter; counts are unaffected.
    pub masked: bool,
    pub color: String,
}

impl CountryCoverage {
    #[must_use]
    pub fn has_area(&self, area: AreaId) -> bool {
        self.approved_areas.contains(&area)
    }
}

/// Coverage entries keyed by canonical name, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageMap {
    entries: Vec<CountryCoverage>,
    index: HashMap<String, usize>,
}

impl CoverageMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `coverage`, replacing any entry with the same canonical name
    /// in place. Returns the replaced entry.
    pub fn insert(&mut self, coverage: CountryCoverage) -> Option<CountryCoverage> {
        if let Some(&pos) = self.index.get(&coverage.canonical_name) {
            return Some(std::mem::replace(&mut self.entries[pos], coverage));
        }
        self.index
            .insert(coverage.canonical_name.clone(), self.entries.len());
        self.entries.push(coverage);
        None
    }

    #[must_use]
    pub fn get(&self, canonical_name: &str) -> Option<&CountryCoverage> {
        self.index.get(canonical_name).map(|&pos| &self.entries[pos])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CountryCoverage> {
        self.entries.iter()
    }

    /// Canonical names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|c| c.canonical_name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[CountryCoverage] {
        &self.entries
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<CountryCoverage> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a CoverageMap {
    type Item = &'a CountryCoverage;
    type IntoIter = std::slice::Iter<'a, CountryCoverage>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(name: &str, count: usize) -> CountryCoverage {
        CountryCoverage {
            canonical_name: name.to_owned(),
            approved_area_count: count,
            total_policies: count,
            approved_areas: BTreeSet::new(),
            dominant_area: None,
            policies: vec![],
            level: CoverageLevel::from_count(count),
            masked: false,
            color: String::new(),
        }
    }

    #[test]
    fn level_buckets_follow_thresholds() {
        let expected = [
            (0, CoverageLevel::None),
            (1, CoverageLevel::Emerging),
            (3, CoverageLevel::Emerging),
            (4, CoverageLevel::Developing),
            (7, CoverageLevel::Developing),
            (8, CoverageLevel::Advanced),
            (10, CoverageLevel::Advanced),
        ];
        for (count, level) in expected {
            assert_eq!(CoverageLevel::from_count(count), level, "count {count}");
        }
    }

    #[test]
    fn level_is_monotonic_in_count() {
        let levels: Vec<_> = (0..=10).map(CoverageLevel::from_count).collect();
        assert!(levels.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut map = CoverageMap::new();
        map.insert(bare("Kenya", 1));
        map.insert(bare("Peru", 2));
        let replaced = map.insert(bare("Kenya", 5));

        assert_eq!(replaced.map(|c| c.approved_area_count), Some(1));
        assert_eq!(map.len(), 2);
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["Kenya", "Peru"]);
        assert_eq!(map.get("Kenya").map(|c| c.approved_area_count), Some(5));
    }
}
