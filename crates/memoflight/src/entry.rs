// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

/// A settled call held by the entry store.
///
/// Exactly one of value or error is present, which is why the outcome is a plain `Result`.
#[derive(Clone, Debug)]
pub(crate) struct CacheEntry<A, V, E> {
    key: A,
    inserted_at: Instant,
    outcome: Result<V, E>,
}

impl<A, V, E> CacheEntry<A, V, E> {
    pub(crate) fn new(key: A, outcome: Result<V, E>, inserted_at: Instant) -> Self {
        Self { key, inserted_at, outcome }
    }

    pub(crate) fn key(&self) -> &A {
        &self.key
    }

    pub(crate) fn outcome(&self) -> &Result<V, E> {
        &self.outcome
    }

    /// Moves the timestamp forward on LRU promotion.
    pub(crate) fn touch(&mut self, now: Instant) {
        self.inserted_at = now;
    }

    /// Returns `true` once the entry is strictly older than `ttl`.
    pub(crate) fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_only_after_ttl_has_fully_elapsed() {
        let start = Instant::now();
        let entry: CacheEntry<u8, u8, ()> = CacheEntry::new(1, Ok(2), start);
        let ttl = Duration::from_millis(1000);

        assert!(!entry.is_expired(start + Duration::from_millis(500), ttl));
        assert!(!entry.is_expired(start + ttl, ttl));
        assert!(entry.is_expired(start + Duration::from_millis(1500), ttl));
    }

    #[test]
    fn touch_restarts_the_clock() {
        let start = Instant::now();
        let mut entry: CacheEntry<u8, u8, ()> = CacheEntry::new(1, Ok(2), start);
        let ttl = Duration::from_secs(1);

        entry.touch(start + Duration::from_secs(2));

        assert!(!entry.is_expired(start + Duration::from_secs(2), ttl));
        assert_eq!(entry.key(), &1);
        assert_eq!(entry.outcome(), &Ok(2));
    }
}
