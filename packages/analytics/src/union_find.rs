//! Disjoint sets over arbitrary ordered keys.
//!
//! Thin keyed front for [`petgraph::unionfind::UnionFind`], which only
//! works on dense indices.

use std::collections::BTreeMap;

/// Union-find over a fixed key set.
#[derive(Debug, Clone)]
pub struct UnionFind<K: Ord + Copy> {
    index: BTreeMap<K, usize>,
    sets: petgraph::unionfind::UnionFind<usize>,
}

impl<K: Ord + Copy> UnionFind<K> {
    /// Creates singleton sets for every distinct key in `keys`.
    pub fn new(keys: impl IntoIterator<Item = K>) -> Self {
        let mut index = BTreeMap::new();
        for key in keys {
            let next = index.len();
            index.entry(key).or_insert(next);
        }
        let sets = petgraph::unionfind::UnionFind::new(index.len());
        Self { index, sets }
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Merges the sets containing `a` and `b`.
    ///
    /// Returns `true` if they were previously disjoint. Unknown keys are
    /// ignored.
    pub fn union(&mut self, a: K, b: K) -> bool {
        match (self.index.get(&a), self.index.get(&b)) {
            (Some(&a), Some(&b)) => self.sets.union(a, b),
            _ => false,
        }
    }

    /// Representative of the set containing `key`, or `None` for an
    /// unknown key.
    pub fn find(&mut self, key: K) -> Option<usize> {
        let slot = *self.index.get(&key)?;
        Some(self.sets.find_mut(slot))
    }

    /// Whether `a` and `b` are in the same set. Unknown keys are never
    /// connected.
    pub fn connected(&mut self, a: K, b: K) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unions_are_transitive() {
        let mut uf = UnionFind::new(1u64..=4);
        assert!(uf.union(1, 2));
        assert!(uf.union(3, 4));
        assert!(!uf.connected(1, 3));
        assert!(uf.union(2, 3));
        assert!(uf.connected(1, 4));
        assert!(!uf.union(4, 1));
        assert_eq!(uf.len(), 4);
    }

    #[test]
    fn duplicate_and_unknown_keys() {
        let mut uf = UnionFind::new([7u64, 7, 9]);
        assert_eq!(uf.len(), 2);
        assert!(uf.find(8).is_none());
        assert!(!uf.union(7, 8));
        assert!(!uf.connected(7, 8));
        assert!(uf.connected(7, 7));
    }

    #[test]
    fn long_chain_shares_one_root() {
        let mut uf = UnionFind::new(0u64..=100);
        for i in 0u64..100 {
            uf.union(i, i + 1);
        }
        let root = uf.find(0).unwrap();
        assert!((0u64..=100).all(|i| uf.find(i) == Some(root)));
    }
}
