// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Insertion-ordered storage of settled calls and its eviction sweep.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::{entry::CacheEntry, matcher::ArgMatcher};

/// Limits applied to the entry store.
///
/// TTL expiry and LRU promotion are mutually exclusive: promotion only happens when no TTL is
/// configured and a size bound is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct EvictionPolicy {
    pub(crate) ttl: Option<Duration>,
    pub(crate) max_entries: Option<usize>,
}

impl EvictionPolicy {
    pub(crate) fn is_lru(&self) -> bool {
        self.ttl.is_none() && self.max_entries.is_some()
    }

    /// Returns `true` if the store needs periodic sweeping at all.
    pub(crate) fn is_bounded(&self) -> bool {
        self.ttl.is_some() || self.max_entries.is_some()
    }

    pub(crate) fn is_expired<A, V, E>(&self, entry: &CacheEntry<A, V, E>, now: Instant) -> bool {
        self.ttl.is_some_and(|ttl| entry.is_expired(now, ttl))
    }
}

/// Number of entries removed by a sweep, by reason.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SweepReport {
    pub(crate) expired: usize,
    pub(crate) evicted: usize,
}

impl SweepReport {
    pub(crate) fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

/// Settled calls in insertion order, oldest first.
///
/// Lookups are linear scans through an [`ArgMatcher`]. The order is load-bearing: the sweep
/// stops at the first entry it keeps, which is only sound because entries are visited in
/// non-decreasing recency.
#[derive(Debug)]
pub(crate) struct EntryStore<A, V, E> {
    entries: VecDeque<CacheEntry<A, V, E>>,
}

impl<A, V, E> Default for EntryStore<A, V, E> {
    fn default() -> Self {
        Self { entries: VecDeque::new() }
    }
}

impl<A, V, E> EntryStore<A, V, E> {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn position(&self, matcher: &ArgMatcher<A>, args: &A) -> Option<usize> {
        matcher.position(self.entries.iter().map(CacheEntry::key), args)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&CacheEntry<A, V, E>> {
        self.entries.get(index)
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<CacheEntry<A, V, E>> {
        self.entries.remove(index)
    }

    /// Moves the entry at `index` to the most recently used end and restamps it.
    pub(crate) fn touch(&mut self, index: usize, now: Instant) -> Option<&CacheEntry<A, V, E>> {
        let mut entry = self.entries.remove(index)?;
        entry.touch(now);
        self.entries.push_back(entry);
        self.entries.back()
    }

    /// Appends `entry`, replacing any entry whose key matches it.
    pub(crate) fn insert(&mut self, matcher: &ArgMatcher<A>, entry: CacheEntry<A, V, E>) {
        if let Some(index) = self.position(matcher, entry.key()) {
            self.entries.remove(index);
        }
        self.entries.push_back(entry);
    }

    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Removes expired entries and, oldest first, entries beyond the size bound.
    pub(crate) fn sweep(&mut self, policy: &EvictionPolicy, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();

        while let Some(oldest) = self.entries.front() {
            let expired = policy.is_expired(oldest, now);
            let oversized = policy.max_entries.is_some_and(|max| self.entries.len() > max);
            if !expired && !oversized {
                break;
            }

            self.entries.pop_front();
            if expired {
                report.expired += 1;
            } else {
                report.evicted += 1;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Store = EntryStore<u32, String, String>;

    fn entry(key: u32, at: Instant) -> CacheEntry<u32, String, String> {
        CacheEntry::new(key, Ok(format!("v{key}")), at)
    }

    fn keys(store: &Store) -> Vec<u32> {
        store.entries.iter().map(|e| *e.key()).collect()
    }

    #[test]
    fn insert_replaces_matching_key_and_moves_it_to_the_end() {
        let matcher = ArgMatcher::deep_eq();
        let now = Instant::now();
        let mut store = Store::default();

        store.insert(&matcher, entry(1, now));
        store.insert(&matcher, entry(2, now));
        store.insert(&matcher, CacheEntry::new(1, Err("boom".to_string()), now));

        assert_eq!(keys(&store), vec![2, 1]);
        assert_eq!(store.get(1).map(CacheEntry::outcome), Some(&Err("boom".to_string())));
    }

    #[test]
    fn touch_promotes_to_most_recently_used() {
        let matcher = ArgMatcher::deep_eq();
        let start = Instant::now();
        let later = start + Duration::from_secs(5);
        let mut store = Store::default();
        for key in 1..=3 {
            store.insert(&matcher, entry(key, start));
        }

        let touched = store.touch(0, later).map(|e| *e.key());

        assert_eq!(touched, Some(1));
        assert_eq!(keys(&store), vec![2, 3, 1]);
        assert_eq!(store.touch(10, later).map(|e| *e.key()), None);
    }

    #[test]
    fn sweep_evicts_oldest_beyond_bound() {
        let matcher = ArgMatcher::deep_eq();
        let now = Instant::now();
        let policy = EvictionPolicy {
            ttl: None,
            max_entries: Some(2),
        };
        let mut store = Store::default();
        for key in 1..=5 {
            store.insert(&matcher, entry(key, now));
        }

        let report = store.sweep(&policy, now);

        assert_eq!(report, SweepReport { expired: 0, evicted: 3 });
        assert_eq!(keys(&store), vec![4, 5]);
    }

    #[test]
    fn sweep_removes_expired_and_stops_at_first_fresh_entry() {
        let matcher = ArgMatcher::deep_eq();
        let start = Instant::now();
        let policy = EvictionPolicy {
            ttl: Some(Duration::from_secs(10)),
            max_entries: None,
        };
        let mut store = Store::default();
        store.insert(&matcher, entry(1, start));
        store.insert(&matcher, entry(2, start + Duration::from_secs(1)));
        store.insert(&matcher, entry(3, start + Duration::from_secs(8)));

        let report = store.sweep(&policy, start + Duration::from_millis(11_500));

        assert_eq!(report, SweepReport { expired: 2, evicted: 0 });
        assert_eq!(report.removed(), 2);
        assert_eq!(keys(&store), vec![3]);
    }

    #[test]
    fn sweep_without_limits_keeps_everything() {
        let matcher = ArgMatcher::deep_eq();
        let now = Instant::now();
        let mut store = Store::default();
        store.insert(&matcher, entry(1, now));

        let report = store.sweep(&EvictionPolicy::default(), now + Duration::from_secs(3600));

        assert_eq!(report.removed(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn policy_modes() {
        let lru = EvictionPolicy {
            ttl: None,
            max_entries: Some(3),
        };
        let ttl = EvictionPolicy {
            ttl: Some(Duration::from_secs(1)),
            max_entries: Some(3),
        };

        assert!(lru.is_lru());
        assert!(!ttl.is_lru());
        assert!(ttl.is_bounded());
        assert!(!EvictionPolicy::default().is_bounded());
    }

    #[test]
    fn clear_reports_removed_count() {
        let matcher = ArgMatcher::deep_eq();
        let now = Instant::now();
        let mut store = Store::default();
        store.insert(&matcher, entry(1, now));
        store.insert(&matcher, entry(2, now));

        assert_eq!(store.clear(), 2);
        assert_eq!(store.len(), 0);
        assert_eq!(store.position(&matcher, &1), None);
    }
}
