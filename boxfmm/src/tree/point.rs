//! Ordering of points by the key of the box containing them.
use std::cmp::Ordering;

use crate::tree::types::Point;

impl<T> PartialEq for Point<T> {
    fn eq(&self, other: &Self) -> bool {
        self.base_key == other.base_key && self.global_index == other.global_index
    }
}

impl<T> Eq for Point<T> {}

impl<T> Ord for Point<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base_key
            .cmp(&other.base_key)
            .then(self.global_index.cmp(&other.global_index))
    }
}

impl<T> PartialOrd for Point<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
