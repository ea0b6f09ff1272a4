//! Name-based team resolution for vendors that expose no stable team id.
//!
//! ESPN rosters, for example, reference teams by display name only. The
//! [`NameIndex`] maps normalized names to internal ids, falling back to a
//! Jaro-Winkler score when the exact normalized form is absent (handles
//! "St. Louis" vs "St Louis", "LA Clippers" vs "Los Angeles Clippers").

use std::collections::HashMap;
use strsim::jaro_winkler;
use uuid::Uuid;

/// Minimum similarity for a fuzzy match to count.
const FUZZY_THRESHOLD: f64 = 0.88;

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
pub struct NameIndex {
    by_name: HashMap<String, Uuid>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, id: Uuid) {
        let key = normalize_name(name);
        if !key.is_empty() {
            self.by_name.insert(key, id);
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, Uuid)>) -> Self {
        let mut index = Self::new();
        for (name, id) in pairs {
            index.insert(name, id);
        }
        index
    }

    /// Exact normalized match first, then best fuzzy candidate above the
    /// threshold. Returns None when nothing is close enough.
    pub fn resolve(&self, name: &str) -> Option<Uuid> {
        let key = normalize_name(name);
        if key.is_empty() {
            return None;
        }
        if let Some(id) = self.by_name.get(&key) {
            return Some(*id);
        }

        let mut best: Option<(f64, Uuid)> = None;
        for (candidate, id) in &self.by_name {
            let score = jaro_winkler(&key, candidate);
            if score >= FUZZY_THRESHOLD && best.map_or(true, |(b, _)| score > b) {
                best = Some((score, *id));
            }
        }
        best.map(|(_, id)| id)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("St. Louis Cardinals"), "st louis cardinals");
        assert_eq!(normalize_name("  LA   Clippers "), "la clippers");
        assert_eq!(normalize_name("D-backs"), "dbacks");
    }

    #[test]
    fn test_exact_normalized_match() {
        let id = Uuid::new_v4();
        let mut index = NameIndex::new();
        index.insert("Boston Red Sox", id);
        assert_eq!(index.resolve("boston red sox"), Some(id));
        assert_eq!(index.resolve("Boston  Red  Sox"), Some(id));
    }

    #[test]
    fn test_fuzzy_match_close_variant() {
        let id = Uuid::new_v4();
        let mut index = NameIndex::new();
        index.insert("St. Louis Cardinals", id);
        assert_eq!(index.resolve("St Louis Cardinal"), Some(id));
    }

    #[test]
    fn test_no_match_for_distant_name() {
        let mut index = NameIndex::new();
        index.insert("Miami Heat", Uuid::new_v4());
        assert_eq!(index.resolve("Denver Nuggets"), None);
        assert_eq!(index.resolve(""), None);
    }

    #[test]
    fn test_best_candidate_wins() {
        let mut index = NameIndex::new();
        let sox = Uuid::new_v4();
        let reds = Uuid::new_v4();
        index.insert("Boston Red Sox", sox);
        index.insert("Cincinnati Reds", reds);
        assert_eq!(index.resolve("Boston RedSox"), Some(sox));
    }
}
