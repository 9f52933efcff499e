//! Caches of translation operators shared across the boxes of a run, and across runs.
//!
//! Translation operators between boxes depend only on the truncation order, the level and the
//! relative position of the boxes, so a wrangler bound to one tree computes each of them once.
use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, RwLock},
};

/// Identifies a translation between two boxes on the same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferKey {
    /// Truncation order of the operator.
    pub expansion_order: usize,

    /// Level of the boxes.
    pub level: u64,

    /// Position of the source box relative to the target box, in boxes.
    pub components: [i64; 2],
}

/// Thread safe map from operator keys to operators.
#[derive(Debug)]
pub struct TranslationCache<K, V> {
    operators: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for TranslationCache<K, V> {
    fn default() -> Self {
        Self {
            operators: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> TranslationCache<K, V>
where
    K: Hash + Eq,
{
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached operator, if present.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let operators = self.operators.read().unwrap_or_else(|e| e.into_inner());
        operators.get(key).cloned()
    }

    /// Cached operator, computing and storing it first if absent.
    ///
    /// Concurrent callers missing the same key may each compute the operator, only the first
    /// stored is kept.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&self, key: K, compute: F) -> Arc<V> {
        if let Some(operator) = self.get(&key) {
            return operator;
        }

        let operator = Arc::new(compute());
        let mut operators = self.operators.write().unwrap_or_else(|e| e.into_inner());
        operators.entry(key).or_insert(operator).clone()
    }

    /// Number of cached operators.
    pub fn len(&self) -> usize {
        self.operators
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached operators.
    pub fn clear(&self) {
        self.operators
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_get_or_insert() {
        let cache = TranslationCache::<TransferKey, Vec<f64>>::new();
        let key = TransferKey {
            expansion_order: 4,
            level: 2,
            components: [2, -1],
        };

        let first = cache.get_or_insert_with(key, || vec![1.0]);
        let second = cache.get_or_insert_with(key, || vec![2.0]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let other = TransferKey {
            components: [-2, 1],
            ..key
        };
        assert!(cache.get(&other).is_none());

        cache.clear();
        assert!(cache.is_empty());
    }
}
