//! Raw country payloads → [`CoverageMap`].
//!
//! Coverage is always recomputed from the presence of parsed approved
//! policies; the server's `area_points` is logged when it disagrees but
//! never trusted.

use std::collections::BTreeSet;

use aipolicy_core::{AreaId, NameNormalizer, RawCountryRecord};

use crate::color::{ColorMode, ColorPalette};
use crate::coverage::{CountryCoverage, CoverageLevel, CoverageMap, NormalizedPolicy};

/// View options applied while aggregating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Countries without an approved policy in this area are masked.
    pub filter_area: Option<AreaId>,
    pub color_mode: ColorMode,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageAggregator {
    normalizer: NameNormalizer,
}

impl CoverageAggregator {
    #[must_use]
    pub fn new(normalizer: NameNormalizer) -> Self {
        Self { normalizer }
    }

    #[must_use]
    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Aggregates `records` in input order.
    ///
    /// Records with an empty country are skipped. When two records resolve to
    /// the same canonical name the later one replaces the earlier one but
    /// keeps its position.
    #[must_use]
    pub fn aggregate(
        &self,
        records: &[RawCountryRecord],
        options: &AggregateOptions,
        palette: &ColorPalette,
    ) -> CoverageMap {
        let mut map = CoverageMap::new();

        for (position, record) in records.iter().enumerate() {
            let Some(canonical_name) = self.normalizer.normalize_country(record.country.as_deref())
            else {
                tracing::warn!(position, "skipping country record with empty country field");
                continue;
            };

            let mut coverage = self.build_coverage(canonical_name, record, options);
            coverage.color = palette.color_for(&coverage, options.color_mode);

            if let Some(previous) = map.insert(coverage) {
                tracing::warn!(
                    country = %previous.canonical_name,
                    raw = ?record.country,
                    "duplicate canonical country; later record replaces earlier one"
                );
            }
        }

        map
    }

    fn build_coverage(
        &self,
        canonical_name: String,
        record: &RawCountryRecord,
        options: &AggregateOptions,
    ) -> CountryCoverage {
        // (area, approved-policy count) in first-seen order
        let mut area_counts: Vec<(AreaId, usize)> = Vec::new();
        let mut policies = Vec::new();

        for detail in &record.areas_detail {
            let Some(area) = self.normalizer.normalize_area(detail.area_name.as_deref()) else {
                tracing::warn!(country = %canonical_name, "skipping area entry without a name");
                continue;
            };

            let parsed = detail.parsed_policies();
            if parsed.is_empty() {
                continue;
            }

            if let Some(id) = area.area_id() {
                match area_counts.iter_mut().find(|(seen, _)| *seen == id) {
                    Some((_, count)) => *count += parsed.len(),
                    None => area_counts.push((id, parsed.len())),
                }
            }

            policies.extend(parsed.into_iter().map(|p| NormalizedPolicy {
                country: canonical_name.clone(),
                area: area.clone(),
                policy_name: p.policy_name,
                policy_description: p.policy_description,
                approved_at: p.approved_at,
            }));
        }

        let approved_areas: BTreeSet<AreaId> = area_counts.iter().map(|(id, _)| *id).collect();
        let approved_area_count = approved_areas.len();

        let mut dominant: Option<(AreaId, usize)> = None;
        for &(id, count) in &area_counts {
            if dominant.is_none_or(|(_, best)| count > best) {
                dominant = Some((id, count));
            }
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let reported = record.area_points.max(0.0).round() as usize;
        if reported != approved_area_count {
            tracing::debug!(
                country = %canonical_name,
                reported,
                derived = approved_area_count,
                "server area_points disagrees with approved policies"
            );
        }

        let masked = options
            .filter_area
            .is_some_and(|area| !approved_areas.contains(&area));

        CountryCoverage {
            canonical_name,
            approved_area_count,
            total_policies: policies.len(),
            approved_areas,
            dominant_area: dominant.map(|(id, _)| id),
            policies,
            level: CoverageLevel::from_count(approved_area_count),
            masked,
            color: String::new(),
        }
    }
}

#[cfg(test)]
#[path = "aggregate_test.rs"]
mod tests;
