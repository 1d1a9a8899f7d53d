// ==============================================================================
// index.rs - Identifier Lookup Cache
// ==============================================================================
// Description: Lazily built id -> position maps for samples and variants
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::cell::OnceCell;
use std::collections::HashMap;

/// Identifier to axis position map, built on first use
///
/// Whoever replaces or reorders the owning axis must call [`IdIndex::invalidate`];
/// a stale map silently points lookups at the wrong rows.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    map: OnceCell<HashMap<String, usize>>,
}

impl IdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the map, building it from `ids` if absent
    ///
    /// With duplicate ids the first occurrence wins.
    pub fn get_or_build<'a, I>(&self, ids: I) -> &HashMap<String, usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.map.get_or_init(|| {
            let mut map = HashMap::new();
            for (idx, id) in ids.into_iter().enumerate() {
                map.entry(id.to_string()).or_insert(idx);
            }
            map
        })
    }

    pub fn is_built(&self) -> bool {
        self.map.get().is_some()
    }

    pub fn invalidate(&mut self) {
        self.map.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_once_until_invalidated() {
        let mut index = IdIndex::new();
        assert!(!index.is_built());

        let map = index.get_or_build(["s1", "s2", "s3"]);
        assert_eq!(map.get("s2"), Some(&1));
        assert!(index.is_built());

        // A built index ignores new ids until it is cleared
        let map = index.get_or_build(["x"]);
        assert_eq!(map.len(), 3);

        index.invalidate();
        assert!(!index.is_built());
        let map = index.get_or_build(["x"]);
        assert_eq!(map.get("x"), Some(&0));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let index = IdIndex::new();
        let map = index.get_or_build(["a", "b", "a"]);
        assert_eq!(map.get("a"), Some(&0));
    }
}
