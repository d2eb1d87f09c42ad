//! Autocomplete over the canonical names of a [`CoverageMap`].

use crate::coverage::CoverageMap;

/// Case-insensitive substring search over canonical country names.
///
/// Results keep the insertion order of the coverage map. When a query
/// extends the previous one, only the previous matches are rescanned.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    names: Vec<String>,
    folded: Vec<String>,
    last_query: String,
    last_matches: Vec<usize>,
}

impl SearchIndex {
    #[must_use]
    pub fn from_coverage(coverage: &CoverageMap) -> Self {
        Self::from_names(coverage.names())
    }

    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<String> = names.into_iter().map(str::to_owned).collect();
        let folded = names.iter().map(|n| n.to_lowercase()).collect();
        Self {
            names,
            folded,
            last_query: String::new(),
            last_matches: Vec::new(),
        }
    }

    /// Replaces the indexed names and forgets any narrowing state.
    pub fn rebuild(&mut self, coverage: &CoverageMap) {
        *self = Self::from_coverage(coverage);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Up to `limit` names containing `query`, ignoring case. A blank query
    /// returns nothing.
    pub fn suggest(&mut self, query: &str, limit: usize) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            self.last_query.clear();
            self.last_matches.clear();
            return Vec::new();
        }

        let matches: Vec<usize> = if !self.last_query.is_empty() && query.contains(&self.last_query)
        {
            self.last_matches
                .iter()
                .copied()
                .filter(|&i| self.folded[i].contains(&query))
                .collect()
        } else {
            (0..self.folded.len())
                .filter(|&i| self.folded[i].contains(&query))
                .collect()
        };

        let result = matches
            .iter()
            .take(limit)
            .map(|&i| self.names[i].clone())
            .collect();
        self.last_query = query;
        self.last_matches = matches;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SearchIndex {
        SearchIndex::from_names([
            "Bangladesh",
            "Brazil",
            "Albania",
            "Germany",
            "Panama",
            "United States of America",
        ])
    }

    #[test]
    fn suggest_matches_substring_case_insensitively() {
        let mut idx = index();
        assert_eq!(idx.suggest("ban", 10), vec!["Bangladesh", "Albania"]);
        assert_eq!(idx.suggest("BAN", 10), vec!["Bangladesh", "Albania"]);
    }

    #[test]
    fn suggest_excludes_non_matching_names() {
        let mut idx = index();
        let results = idx.suggest("ban", 10);
        assert!(!results.contains(&"Brazil".to_string()));
        assert!(!results.contains(&"Germany".to_string()));
    }

    #[test]
    fn empty_query_returns_nothing() {
        let mut idx = index();
        assert!(idx.suggest("", 10).is_empty());
        assert!(idx.suggest("   ", 10).is_empty());
    }

    #[test]
    fn limit_truncates_in_insertion_order() {
        let mut idx = index();
        assert_eq!(idx.suggest("a", 2), vec!["Bangladesh", "Brazil"]);
    }

    #[test]
    fn narrowing_query_matches_fresh_scan() {
        let mut incremental = index();
        let _ = incremental.suggest("a", 1);
        let _ = incremental.suggest("an", 1);
        let narrowed = incremental.suggest("ani", 10);

        let mut fresh = index();
        assert_eq!(narrowed, fresh.suggest("ani", 10));
        assert_eq!(narrowed, vec!["Albania"]);
    }

    #[test]
    fn widening_query_rescans() {
        let mut idx = index();
        assert_eq!(idx.suggest("ama", 10), vec!["Panama"]);
        assert_eq!(
            idx.suggest("am", 10),
            vec!["Panama", "United States of America"]
        );
    }

    #[test]
    fn rebuild_replaces_names() {
        let mut idx = index();
        let _ = idx.suggest("ban", 10);
        idx.rebuild(&CoverageMap::new());
        assert!(idx.is_empty());
        assert!(idx.suggest("ban", 10).is_empty());
    }
}
