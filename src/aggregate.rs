//! Count accumulation.
//!
//! `RunningCounters` form a commutative monoid under `merge`, so partial
//! results from different years, files, or worker threads can be combined in
//! any order without retaining raw rows.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::geography::GeographicCode;
use crate::normalize::AgeBucket;
use crate::types::SexCode;

/// Dimensions a count is grouped by.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregationKey {
    /// Canonical municipality code.
    pub municipality: GeographicCode,
    /// Sex code, when the dataset carries that dimension.
    pub sex: Option<SexCode>,
    /// Mother's age band, when the dataset carries that dimension.
    pub age_group: Option<AgeBucket>,
}

impl AggregationKey {
    /// Key for single-dimension datasets.
    pub fn municipality(code: GeographicCode) -> Self {
        Self {
            municipality: code,
            sex: None,
            age_group: None,
        }
    }
}

/// Count per aggregation key. Counts start at zero and only grow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunningCounters {
    counts: HashMap<AggregationKey, u64>,
}

impl RunningCounters {
    /// Empty counters (the merge identity).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` observations of `key`.
    pub fn add(&mut self, key: AggregationKey, count: u64) {
        if count == 0 {
            return;
        }
        let slot = self.counts.entry(key).or_insert(0);
        *slot = slot.saturating_add(count);
    }

    /// Fold `other` into `self` by summing per key.
    pub fn merge_from(&mut self, other: RunningCounters) {
        if self.counts.len() < other.counts.len() {
            let smaller = std::mem::replace(&mut self.counts, other.counts);
            self.absorb(smaller);
        } else {
            self.absorb(other.counts);
        }
    }

    /// Merge two counters into a new one.
    pub fn merge(mut self, other: RunningCounters) -> RunningCounters {
        self.merge_from(other);
        self
    }

    fn absorb(&mut self, counts: HashMap<AggregationKey, u64>) {
        for (key, count) in counts {
            match self.counts.entry(key) {
                Entry::Occupied(mut slot) => {
                    let merged = slot.get().saturating_add(count);
                    slot.insert(merged);
                }
                Entry::Vacant(slot) => {
                    slot.insert(count);
                }
            }
        }
    }

    /// Count recorded for `key`.
    pub fn get(&self, key: &AggregationKey) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count))
    }

    /// Iterate keys and counts in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&AggregationKey, u64)> {
        self.counts.iter().map(|(key, count)| (key, *count))
    }
}

impl IntoIterator for RunningCounters {
    type Item = (AggregationKey, u64);
    type IntoIter = std::collections::hash_map::IntoIter<AggregationKey, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.into_iter()
    }
}

impl FromIterator<AggregationKey> for RunningCounters {
    fn from_iter<T: IntoIterator<Item = AggregationKey>>(iter: T) -> Self {
        let mut counters = RunningCounters::new();
        for key in iter {
            counters.add(key, 1);
        }
        counters
    }
}

/// Mutable accumulator owned by exactly one query (or one worker of a query).
///
/// It receives only rows that already passed normalization and filtering.
#[derive(Debug, Default)]
pub struct Aggregator {
    counters: RunningCounters,
}

impl Aggregator {
    /// Fresh aggregator with empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one row.
    pub fn observe(&mut self, key: AggregationKey) {
        self.counters.add(key, 1);
    }

    /// Fold independently accumulated counters into this aggregator.
    pub fn merge(&mut self, other: RunningCounters) {
        self.counters.merge_from(other);
    }

    /// Rows counted so far.
    pub fn observed(&self) -> u64 {
        self.counters.total()
    }

    /// Read-only view of the counters.
    pub fn counters(&self) -> &RunningCounters {
        &self.counters
    }

    /// Release the counters for summary building.
    pub fn into_counters(self) -> RunningCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: &str, sex: Option<&str>) -> AggregationKey {
        AggregationKey {
            municipality: GeographicCode::parse(code).unwrap(),
            sex: sex.map(str::to_string),
            age_group: None,
        }
    }

    fn counters(entries: &[(&str, Option<&str>, u64)]) -> RunningCounters {
        let mut counters = RunningCounters::new();
        for (code, sex, count) in entries {
            counters.add(key(code, *sex), *count);
        }
        counters
    }

    #[test]
    fn merge_is_associative_with_identity() {
        let a = counters(&[("260010", Some("1"), 2), ("310620", None, 1)]);
        let b = counters(&[("260010", Some("1"), 3), ("260020", Some("2"), 4)]);
        let c = counters(&[("310620", None, 5)]);

        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.clone().merge(b.clone().merge(c.clone()));
        assert_eq!(left, right);
        assert_eq!(a.clone().merge(RunningCounters::new()), a);
        assert_eq!(RunningCounters::new().merge(a.clone()), a);
        assert_eq!(left.get(&key("260010", Some("1"))), 5);
        assert_eq!(left.total(), 15);
    }

    #[test]
    fn merge_is_commutative() {
        let a = counters(&[("260010", None, 2)]);
        let b = counters(&[("260010", None, 1), ("350010", None, 7)]);
        assert_eq!(a.clone().merge(b.clone()), b.merge(a));
    }

    #[test]
    fn zero_additions_do_not_create_keys() {
        let mut counters = RunningCounters::new();
        counters.add(key("260010", None), 0);
        assert!(counters.is_empty());
    }

    #[test]
    fn aggregator_observes_one_per_row() {
        let mut aggregator = Aggregator::new();
        aggregator.observe(key("260010", None));
        aggregator.observe(key("260010", None));
        aggregator.merge(counters(&[("260010", None, 3)]));
        assert_eq!(aggregator.observed(), 5);
        assert_eq!(aggregator.into_counters().len(), 1);
    }

    #[test]
    fn counters_collect_from_keys() {
        let collected: RunningCounters = [key("1", None), key("1", None), key("2", None)]
            .into_iter()
            .collect();
        assert_eq!(collected.get(&key("1", None)), 2);
        assert_eq!(collected.get(&key("2", None)), 1);
    }
}
