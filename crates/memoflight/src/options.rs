// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Plain-data cache settings, for when configuration comes from somewhere other than code.
///
/// Every field mirrors a setter on [`MergeCacheBuilder`](crate::MergeCacheBuilder). Zero values
/// disable the corresponding limit. With the `serde` feature, missing fields fall back to their
/// defaults when deserializing.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use memoflight::{CacheOptions, MergeCache, Outcome};
/// use tick::Clock;
///
/// let options = CacheOptions {
///     ttl: Duration::from_secs(5),
///     tags: vec!["users".to_string()],
///     ..CacheOptions::default()
/// };
///
/// let cache = MergeCache::builder(Clock::new_frozen(), |id: u64| Outcome::<u64, String>::value(id))
///     .options(options)
///     .build()
///     .unwrap();
/// assert_eq!(cache.tags(), ["users"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct CacheOptions {
    /// Store settled outcomes for reuse. Concurrent calls are merged either way.
    pub cache: bool,

    /// Also store failures. Has no effect unless `cache` is set.
    pub cache_on_error: bool,

    /// Age after which a stored outcome is stale. Zero means never.
    pub ttl: Duration,

    /// Maximum number of stored outcomes. Zero means unbounded.
    ///
    /// With a zero `ttl`, the least recently used entries go first.
    pub max_cache_size: usize,

    /// Tags the cache can be revalidated by.
    pub tags: Vec<String>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache: true,
            cache_on_error: false,
            ttl: Duration::ZERO,
            max_cache_size: 0,
            tags: Vec::new(),
        }
    }
}
