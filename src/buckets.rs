//! Running-mean aggregation keyed by arbitrary ordered bucket identifiers.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningMean {
    pub count: u64,
    pub mean: f64,
}

impl RunningMean {
    pub fn new(value: f64) -> Self {
        Self {
            count: 1,
            mean: value,
        }
    }

    /// `mean' = (mean * n + value) / (n + 1)`, applied per observation.
    pub fn push(&mut self, value: f64) {
        let n = self.count as f64;
        self.mean = (self.mean * n + value) / (n + 1.0);
        self.count += 1;
    }

    /// Weighted combine of two partial means over disjoint observations.
    pub fn merge(&mut self, other: &RunningMean) {
        if other.count == 0 {
            return;
        }
        let (n1, n2) = (self.count as f64, other.count as f64);
        self.mean = (self.mean * n1 + other.mean * n2) / (n1 + n2);
        self.count += other.count;
    }
}

/// Lazily created buckets; none is removed until [`BucketAggregator::reset`].
#[derive(Debug, Clone, PartialEq)]
pub struct BucketAggregator<K: Ord> {
    buckets: BTreeMap<K, RunningMean>,
}

impl<K: Ord> Default for BucketAggregator<K> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }
}

impl<K: Ord> BucketAggregator<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: K, value: f64) {
        match self.buckets.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(RunningMean::new(value));
            }
            Entry::Occupied(mut slot) => slot.get_mut().push(value),
        }
    }

    /// `None` when the bucket has seen no observations.
    pub fn query(&self, key: &K) -> Option<RunningMean> {
        self.buckets.get(key).copied()
    }

    pub fn merge(&mut self, other: BucketAggregator<K>) {
        for (key, partial) in other.buckets {
            match self.buckets.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(partial);
                }
                Entry::Occupied(mut slot) => slot.get_mut().merge(&partial),
            }
        }
    }

    pub fn reset(&mut self) {
        self.buckets.clear();
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &RunningMean)> {
        self.buckets.iter()
    }
}
