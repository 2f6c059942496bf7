// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Construction of merge caches.

use std::{fmt::Debug, time::Duration};

use tick::Clock;

use crate::{
    ALL_TAG, BuildError, CacheOptions, CacheTelemetry, MergeCache, Outcome, RevalidationBus,
    cache::{CacheConfig, CacheName, CacheParts, Target},
    matcher::ArgMatcher,
    store::EvictionPolicy,
    sweep::SweepMode,
};

const DEFAULT_NAME: CacheName = "memoflight";

/// Builder for a [`MergeCache`].
///
/// Created by [`MergeCache::builder`] or [`MergeCacheBuilder::with_matcher`]. Unset options keep
/// the defaults of [`CacheOptions`], the cache subscribes to the
/// [global bus](RevalidationBus::global), and telemetry is off.
///
/// Expiry and eviction sweeps run at most once per second. By default a due sweep runs on the
/// calling thread at the end of the call that found it due, after the result is in hand; it
/// never holds up a call waiting on the cache's lock. With the `tokio` feature,
/// `background_sweep` moves it onto the current runtime.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use memoflight::{MergeCache, Outcome};
/// use tick::Clock;
///
/// let cache = MergeCache::builder(Clock::new_frozen(), |path: String| {
///     Outcome::<usize, String>::value(path.len())
/// })
/// .name("path_lengths")
/// .max_cache_size(128)
/// .cache_on_error(true)
/// .tag("fs")
/// .build()?;
///
/// assert_eq!(cache.name(), "path_lengths");
/// # Ok::<(), memoflight::BuildError>(())
/// ```
pub struct MergeCacheBuilder<A, V, E> {
    name: CacheName,
    target: Box<Target<A, V, E>>,
    clock: Clock,
    matcher: ArgMatcher<A>,
    options: CacheOptions,
    bus: Option<RevalidationBus>,
    telemetry: CacheTelemetry,
    sweep_mode: SweepMode,
}

impl<A, V, E> MergeCacheBuilder<A, V, E> {
    /// Creates a builder for a cache around `target` that compares arguments with `matcher`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight::{ArgMatcher, MergeCacheBuilder, Outcome};
    /// use tick::Clock;
    ///
    /// let by_id = ArgMatcher::new(|stored: &(u32, String), candidate: &(u32, String)| stored.0 == candidate.0);
    /// let cache = MergeCacheBuilder::with_matcher(Clock::new_frozen(), by_id, |(id, _): (u32, String)| {
    ///     Outcome::<u32, String>::value(id)
    /// })
    /// .build()?;
    /// # Ok::<(), memoflight::BuildError>(())
    /// ```
    pub fn with_matcher<F>(clock: Clock, matcher: ArgMatcher<A>, target: F) -> Self
    where
        F: Fn(A) -> Outcome<V, E> + Send + Sync + 'static,
    {
        Self {
            name: DEFAULT_NAME,
            target: Box::new(target),
            clock,
            matcher,
            options: CacheOptions::default(),
            bus: None,
            telemetry: CacheTelemetry::default(),
            sweep_mode: SweepMode::default(),
        }
    }

    /// Sets the name reported in telemetry.
    #[must_use]
    pub fn name(mut self, name: CacheName) -> Self {
        self.name = name;
        self
    }

    /// Replaces every option with `options`.
    #[must_use]
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Enables or disables storing settled outcomes. Enabled by default.
    ///
    /// Concurrent calls are merged regardless.
    #[must_use]
    pub fn cache(mut self, enabled: bool) -> Self {
        self.options.cache = enabled;
        self
    }

    /// Enables or disables storing failures. Disabled by default.
    #[must_use]
    pub fn cache_on_error(mut self, enabled: bool) -> Self {
        self.options.cache_on_error = enabled;
        self
    }

    /// Replaces the argument comparison.
    #[must_use]
    pub fn arg_comparer<F>(mut self, matches: F) -> Self
    where
        F: Fn(&A, &A) -> bool + Send + Sync + 'static,
    {
        self.matcher = ArgMatcher::new(matches);
        self
    }

    /// Sets how long stored outcomes stay fresh. [`Duration::ZERO`] means forever.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.options.ttl = ttl;
        self
    }

    /// Bounds the number of stored outcomes. Zero means unbounded.
    ///
    /// Without a TTL, the least recently used entries are evicted first.
    #[must_use]
    pub fn max_cache_size(mut self, max_entries: usize) -> Self {
        self.options.max_cache_size = max_entries;
        self
    }

    /// Adds a tag the cache can be revalidated by.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.options.tags.push(tag.into());
        self
    }

    /// Adds several tags the cache can be revalidated by.
    #[must_use]
    pub fn tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.options.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Subscribes the cache to `bus` instead of the global one.
    #[must_use]
    pub fn bus(mut self, bus: RevalidationBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Sets the telemetry sink.
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Runs expiry and eviction sweeps on the current Tokio runtime instead of on the calling
    /// thread.
    ///
    /// Without this, a due sweep runs inside [`MergeCache::call`] right after the call step,
    /// once the cache's lock is released. Calls made outside a runtime still sweep inline.
    #[cfg(feature = "tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
    #[must_use]
    pub fn background_sweep(mut self) -> Self {
        self.sweep_mode = SweepMode::Background;
        self
    }

    /// Builds the cache and subscribes it to its bus.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ReservedTag`] if any tag equals [`ALL_TAG`].
    pub fn build(self) -> Result<MergeCache<A, V, E>, BuildError>
    where
        A: Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let CacheOptions {
            cache,
            cache_on_error,
            ttl,
            max_cache_size,
            tags,
        } = self.options;

        if let Some(tag) = tags.iter().find(|tag| *tag == ALL_TAG) {
            return Err(BuildError::ReservedTag(tag.clone()));
        }

        let policy = EvictionPolicy {
            ttl: (!ttl.is_zero()).then_some(ttl),
            max_entries: (max_cache_size > 0).then_some(max_cache_size),
        };

        Ok(MergeCache::new(CacheParts {
            name: self.name,
            target: self.target,
            config: CacheConfig {
                cache,
                cache_on_error,
                matcher: self.matcher,
                policy,
                tags,
            },
            clock: self.clock,
            telemetry: self.telemetry,
            bus: self.bus.unwrap_or_else(|| RevalidationBus::global().clone()),
            sweep_mode: self.sweep_mode,
        }))
    }
}

impl<A, V, E> Debug for MergeCacheBuilder<A, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeCacheBuilder")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("sweep_mode", &self.sweep_mode)
            .finish_non_exhaustive()
    }
}
