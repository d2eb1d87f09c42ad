//! Reconciliation of raw country and policy-area spellings.
//!
//! Both lookups are total: empty input yields `None`, and anything the
//! tables do not recognize passes through (countries verbatim, areas as a
//! derived slug) so new names still render under their own spelling.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::aliases::AliasTable;
use crate::areas::{AreaId, PolicyArea, POLICY_AREAS};

static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

struct AreaLookup {
    exact: HashMap<&'static str, AreaId>,
    folded: HashMap<String, AreaId>,
    slugs: HashMap<String, AreaId>,
}

static AREA_LOOKUP: LazyLock<AreaLookup> = LazyLock::new(|| {
    let mut lookup = AreaLookup {
        exact: HashMap::new(),
        folded: HashMap::new(),
        slugs: HashMap::new(),
    };
    for area in &POLICY_AREAS {
        for spelling in [area.id, area.name, area.legacy_name] {
            lookup.exact.insert(spelling, area.area_id);
            lookup.folded.insert(spelling.to_lowercase(), area.area_id);
            lookup.slugs.insert(slugify(spelling), area.area_id);
        }
    }
    lookup
});

/// Result of resolving a raw policy-area name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AreaMatch {
    Known(AreaId),
    /// No table entry matched; `slug` is derived from `raw`.
    Unknown { slug: String, raw: String },
}

impl AreaMatch {
    /// Stable key: the area id for known areas, the derived slug otherwise.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            AreaMatch::Known(id) => id.as_str(),
            AreaMatch::Unknown { slug, .. } => slug,
        }
    }

    #[must_use]
    pub fn area(&self) -> Option<&'static PolicyArea> {
        match self {
            AreaMatch::Known(id) => Some(id.area()),
            AreaMatch::Unknown { .. } => None,
        }
    }

    #[must_use]
    pub fn area_id(&self) -> Option<AreaId> {
        match self {
            AreaMatch::Known(id) => Some(*id),
            AreaMatch::Unknown { .. } => None,
        }
    }

    /// Display name for known areas, the original spelling otherwise.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            AreaMatch::Known(id) => id.area().name,
            AreaMatch::Unknown { raw, .. } => raw,
        }
    }
}

/// Lower-cases, turns every run of non-alphanumerics into one `-`, and trims
/// separators from both ends.
#[must_use]
pub fn slugify(raw: &str) -> String {
    let lower = raw.to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Canonicalizes country and policy-area names against an [`AliasTable`].
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    table: Arc<AliasTable>,
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new(AliasTable::builtin())
    }
}

impl NameNormalizer {
    #[must_use]
    pub fn new(table: Arc<AliasTable>) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn table(&self) -> &AliasTable {
        &self.table
    }

    /// Resolves a raw country spelling to its canonical name.
    ///
    /// Exact lookup first, then a case-insensitive lookup on the trimmed
    /// input. Unrecognized input is returned verbatim; empty input is `None`.
    #[must_use]
    pub fn normalize_country(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(canonical) = self.table.exact(raw).or_else(|| self.table.exact(trimmed)) {
            return Some(canonical.to_owned());
        }
        if let Some(canonical) = self.table.folded(trimmed) {
            return Some(canonical.to_owned());
        }
        Some(raw.to_owned())
    }

    /// Resolves a raw policy-area name to one of the ten canonical areas.
    ///
    /// Ids, display names and legacy names all match, exactly and then
    /// case-insensitively; a final pass compares slugs so `"AI-Safety"` and
    /// `"ai_safety"` still land on `ai-safety`. Returns `None` only for empty
    /// input. Input with no alphanumeric content keeps its trimmed spelling
    /// as the key.
    #[must_use]
    pub fn normalize_area(&self, raw: Option<&str>) -> Option<AreaMatch> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }

        let lookup = &*AREA_LOOKUP;
        if let Some(id) = lookup.exact.get(raw) {
            return Some(AreaMatch::Known(*id));
        }
        if let Some(id) = lookup.folded.get(&raw.to_lowercase()) {
            return Some(AreaMatch::Known(*id));
        }

        let slug = slugify(raw);
        if slug.is_empty() {
            tracing::debug!(raw, "policy area has no alphanumeric content");
            return Some(AreaMatch::Unknown {
                slug: raw.to_owned(),
                raw: raw.to_owned(),
            });
        }
        if let Some(id) = lookup.slugs.get(&slug) {
            return Some(AreaMatch::Known(*id));
        }

        tracing::debug!(raw, slug = %slug, "unrecognized policy area");
        Some(AreaMatch::Unknown {
            slug,
            raw: raw.to_owned(),
        })
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
