use std::hash::Hash;

use fnv::FnvHashMap;

/// FNV-hashed map keyed by small integers (Galois elements, rotation steps).
#[derive(Clone, Debug)]
pub struct Map<K, V>(pub FnvHashMap<K, V>);

impl<K: Eq + Hash, V> Map<K, V> {
    pub fn new() -> Self {
        Self(FnvHashMap::<K, V>::default())
    }

    pub fn insert(&mut self, k: K, data: V) -> Option<V> {
        self.0.insert(k, data)
    }

    pub fn get(&self, k: &K) -> Option<&V> {
        self.0.get(k)
    }

    pub fn contains_key(&self, k: &K) -> bool {
        self.0.contains_key(k)
    }

    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, k: K, f: F) -> &V {
        self.0.entry(k).or_insert_with(f)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the keys in ascending order, for deterministic iteration.
    pub fn sorted_keys(&self) -> Vec<&K>
    where
        K: Ord,
    {
        let mut keys: Vec<&K> = self.0.keys().collect();
        keys.sort();
        keys
    }
}

impl<K: Eq + Hash, V> Default for Map<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_sorted() {
        let mut map: Map<u64, &str> = Map::new();
        assert!(map.is_empty());
        map.insert(25, "b");
        map.insert(5, "a");
        assert_eq!(map.get(&5), Some(&"a"));
        assert_eq!(*map.get_or_insert_with(125, || "c"), "c");
        assert_eq!(*map.get_or_insert_with(125, || "d"), "c");
        assert_eq!(map.sorted_keys(), vec![&5, &25, &125]);
        assert_eq!(map.len(), 3);
        assert!(map.contains_key(&25));
    }
}
