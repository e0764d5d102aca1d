//! Ordered cost queue with keyed updates.
//!
//! The engines need more than a binary heap: they scan candidates in
//! ascending cost order without popping them, change the cost of queued
//! entries after every edit, and remove arbitrary entries whose element was
//! destroyed. [`PriorityTree`] keeps a sorted set of `(cost, key)` pairs next
//! to a key → cost map so each of these is logarithmic.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

/// Cost wrapper with a total order.
#[derive(Debug, Clone, Copy)]
struct Cost(f64);

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A set of keys ordered by an `f64` cost.
///
/// Each key appears at most once. Entries with equal costs are ordered by
/// key, so iteration order is deterministic.
#[derive(Debug, Clone)]
pub struct PriorityTree<K> {
    entries: BTreeSet<(Cost, K)>,
    costs: HashMap<K, f64>,
}

impl<K> Default for PriorityTree<K> {
    fn default() -> Self {
        Self {
            entries: BTreeSet::new(),
            costs: HashMap::new(),
        }
    }
}

impl<K: Copy + Ord + Hash> PriorityTree<K> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key` with `cost`, replacing its previous cost if it was
    /// already queued.
    ///
    /// Returns the previous cost.
    pub fn insert(&mut self, key: K, cost: f64) -> Option<f64> {
        debug_assert!(!cost.is_nan(), "NaN cost");
        let previous = self.costs.insert(key, cost);
        if let Some(old) = previous {
            self.entries.remove(&(Cost(old), key));
        }
        self.entries.insert((Cost(cost), key));
        previous
    }

    /// Change the cost of `key`, inserting it when absent.
    ///
    /// Returns `true` if the key was already queued.
    pub fn update(&mut self, key: K, cost: f64) -> bool {
        self.insert(key, cost).is_some()
    }

    /// Remove `key`. Returns `true` if it was queued.
    pub fn remove(&mut self, key: K) -> bool {
        match self.costs.remove(&key) {
            Some(old) => {
                self.entries.remove(&(Cost(old), key));
                true
            }
            None => false,
        }
    }

    /// Whether `key` is queued.
    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.costs.contains_key(&key)
    }

    /// Current cost of `key`.
    #[inline]
    pub fn cost(&self, key: K) -> Option<f64> {
        self.costs.get(&key).copied()
    }

    /// Entry with the lowest cost.
    pub fn first(&self) -> Option<(K, f64)> {
        self.entries.first().map(|&(c, k)| (k, c.0))
    }

    /// Entry with the highest cost.
    pub fn last(&self) -> Option<(K, f64)> {
        self.entries.last().map(|&(c, k)| (k, c.0))
    }

    /// Lowest cost in the tree.
    pub fn root_value(&self) -> Option<f64> {
        self.entries.first().map(|(c, _)| c.0)
    }

    /// Remove and return the entry with the lowest cost.
    pub fn pop_first(&mut self) -> Option<(K, f64)> {
        let (c, k) = self.entries.pop_first()?;
        self.costs.remove(&k);
        Some((k, c.0))
    }

    /// Iterate in ascending cost order.
    pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        self.entries.iter().map(|&(c, k)| (k, c.0))
    }

    /// Number of queued keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    /// Whether the tree is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.costs.clear();
    }
}
