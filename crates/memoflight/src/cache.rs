// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The merge cache façade.

use std::{
    fmt::Debug,
    sync::{Arc, Weak},
};

use futures::{FutureExt, future::BoxFuture};
use parking_lot::Mutex;
use tick::Clock;

use crate::{
    CallError, Outcome,
    builder::MergeCacheBuilder,
    bus::{RevalidationBus, Subscriber, SubscriptionId},
    call::Call,
    entry::CacheEntry,
    inflight::{CallId, InFlightRegistry, Waiter, Waiters},
    matcher::ArgMatcher,
    store::{EntryStore, EvictionPolicy},
    sweep::{SweepGuard, SweepMode},
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

/// Type alias for cache names used in telemetry.
pub type CacheName = &'static str;

pub(crate) type Target<A, V, E> = dyn Fn(A) -> Outcome<V, E> + Send + Sync;

/// Settings fixed when a cache is built.
pub(crate) struct CacheConfig<A> {
    pub(crate) cache: bool,
    pub(crate) cache_on_error: bool,
    pub(crate) matcher: ArgMatcher<A>,
    pub(crate) policy: EvictionPolicy,
    pub(crate) tags: Vec<String>,
}

impl<A> CacheConfig<A> {
    fn should_store<V, E>(&self, result: &Result<V, E>) -> bool {
        self.cache && (result.is_ok() || self.cache_on_error)
    }
}

/// Everything the builder hands over to construct a cache.
pub(crate) struct CacheParts<A, V, E> {
    pub(crate) name: CacheName,
    pub(crate) target: Box<Target<A, V, E>>,
    pub(crate) config: CacheConfig<A>,
    pub(crate) clock: Clock,
    pub(crate) telemetry: CacheTelemetry,
    pub(crate) bus: RevalidationBus,
    pub(crate) sweep_mode: SweepMode,
}

/// A memoizing wrapper around a function, keyed by its arguments.
///
/// Calling the cache with arguments that match a settled entry returns the stored outcome
/// without invoking the function. Concurrent calls with matching arguments while a deferred
/// computation is running share that one computation. Arguments are compared through an
/// [`ArgMatcher`], never hashed.
///
/// Settled entries expire after the configured TTL, or, when only a size bound is set, are
/// evicted least recently used first. Expiry and eviction happen in a sweep that runs at most
/// once per second, triggered by calls; lookups treat an expired entry as absent right away.
///
/// Every cache subscribes to its [`RevalidationBus`] under its tags, so entries can be dropped
/// from anywhere by tag. [`dispose`](Self::dispose) detaches the cache for good.
///
/// Cloning a cache yields another handle to the same entries. The cache unsubscribes from its
/// bus when the last handle is dropped.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use memoflight::{MergeCache, Outcome};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let cache = MergeCache::builder(Clock::new_frozen(), |name: String| {
///     Outcome::<usize, String>::deferred(async move { Ok(name.len()) })
/// })
/// .name("name_lengths")
/// .ttl(Duration::from_secs(30))
/// .build()?;
///
/// assert_eq!(cache.call("oxidizer".to_string()).await?, 8);
/// assert!(cache.contains(&"oxidizer".to_string()));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
pub struct MergeCache<A, V, E> {
    inner: Arc<Inner<A, V, E>>,
}

struct Inner<A, V, E> {
    name: CacheName,
    target: Box<Target<A, V, E>>,
    config: CacheConfig<A>,
    clock: Clock,
    telemetry: CacheTelemetry,
    bus: RevalidationBus,
    subscription: SubscriptionId,
    sweep_mode: SweepMode,
    state: Mutex<State<A, V, E>>,
}

struct State<A, V, E> {
    entries: EntryStore<A, V, E>,
    in_flight: InFlightRegistry<A, V, E>,
    sweep: SweepGuard,
    disposed: bool,
}

enum Lookup<V, E> {
    Hit(Result<V, E>),
    Expired,
    Miss,
}

impl MergeCache<(), (), ()> {
    /// Creates a builder for a cache around `target`, matching arguments with [`PartialEq`].
    ///
    /// Use [`MergeCacheBuilder::with_matcher`] for argument types that need another notion of
    /// equality.
    pub fn builder<A, V, E, F>(clock: Clock, target: F) -> MergeCacheBuilder<A, V, E>
    where
        A: PartialEq + 'static,
        F: Fn(A) -> Outcome<V, E> + Send + Sync + 'static,
    {
        MergeCacheBuilder::with_matcher(clock, ArgMatcher::deep_eq(), target)
    }
}

impl<A, V, E> MergeCache<A, V, E>
where
    A: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(parts: CacheParts<A, V, E>) -> Self {
        let CacheParts {
            name,
            target,
            config,
            clock,
            telemetry,
            bus,
            sweep_mode,
        } = parts;

        let inner = Arc::new_cyclic(|weak: &Weak<Inner<A, V, E>>| {
            let subscriber: Weak<dyn Subscriber> = weak.clone();
            let subscription = bus.subscribe(&config.tags, &subscriber);
            Inner {
                name,
                target,
                config,
                clock,
                telemetry,
                bus,
                subscription,
                sweep_mode,
                state: Mutex::new(State {
                    entries: EntryStore::default(),
                    in_flight: InFlightRegistry::default(),
                    sweep: SweepGuard::default(),
                    disposed: false,
                }),
            }
        });

        Self { inner }
    }

    /// Calls the wrapped function with `args`, or reuses a settled or in-flight outcome for
    /// matching arguments.
    ///
    /// The function runs synchronously inside this method when neither exists. A synchronous
    /// outcome is available from the returned [`Call`] immediately; a deferred one is shared
    /// with every caller whose arguments match until it settles.
    ///
    /// After [`dispose`](Self::dispose), every call resolves to [`CallError::Disposed`] without
    /// invoking the function.
    pub fn call(&self, args: A) -> Call<V, E> {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        if state.disposed {
            return Call::ready(Err(CallError::Disposed));
        }

        if inner.config.cache {
            let lookup = inner.lookup(&mut state, &args);
            match lookup {
                Lookup::Hit(result) => {
                    drop(state);
                    inner.record(CacheOperation::Call, CacheActivity::Hit, 1);
                    inner.request_sweep();
                    return Call::ready(result.map_err(CallError::Failed));
                }
                Lookup::Expired => inner.record(CacheOperation::Call, CacheActivity::Expired, 1),
                Lookup::Miss => inner.record(CacheOperation::Call, CacheActivity::Miss, 1),
            }
        }

        if let Some((id, call)) = state.in_flight.join(&inner.config.matcher, &args) {
            drop(state);
            let call = Call::in_flight(call, inner.waiter(id));
            inner.record(CacheOperation::Call, CacheActivity::Merged, 1);
            inner.request_sweep();
            return call;
        }

        // The target may call back into this cache.
        drop(state);

        inner.record(CacheOperation::Call, CacheActivity::Invoked, 1);
        let call = match (inner.target)(args.clone()) {
            Outcome::Ready(result) => {
                inner.settle_ready(args, &result);
                Call::ready(result.map_err(CallError::Failed))
            }
            Outcome::Deferred(future) => inner.start(args, future),
        };

        inner.request_sweep();
        call
    }

    /// Drops every settled entry.
    ///
    /// In-flight computations are unaffected and may store their outcome once they settle.
    pub fn revalidate(&self) {
        self.inner.clear_entries();
    }

    /// Permanently detaches the cache.
    ///
    /// Settled entries are dropped, the cache leaves its bus, and later calls are rejected with
    /// [`CallError::Disposed`]. In-flight computations still complete for their callers but their
    /// outcomes are no longer stored. Disposing twice has no further effect.
    pub fn dispose(&self) {
        let inner = &self.inner;
        let removed = {
            let mut state = inner.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.entries.clear()
        };

        inner.bus.unsubscribe(inner.subscription);
        inner.record(CacheOperation::Dispose, CacheActivity::Disposed, removed);
        inner.telemetry.record_size(inner.name, 0);
    }

    /// Runs an expiry and eviction sweep now, regardless of when the last one ran.
    pub fn sweep(&self) {
        self.inner.run_sweep();
    }

    /// Returns `true` if a settled, unexpired entry matches `args`.
    ///
    /// Unlike [`call`](Self::call) this does not count as a use of the entry.
    #[must_use]
    pub fn contains(&self, args: &A) -> bool {
        let now = self.inner.clock.instant();
        let state = self.inner.state.lock();
        state
            .entries
            .position(&self.inner.config.matcher, args)
            .and_then(|index| state.entries.get(index))
            .is_some_and(|entry| !self.inner.config.policy.is_expired(entry, now))
    }
}

impl<A, V, E> MergeCache<A, V, E> {
    /// Returns the name used in telemetry.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.inner.name
    }

    /// Returns the clock used to stamp and expire entries.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Returns the tags the cache subscribed to, not counting [`ALL_TAG`](crate::ALL_TAG).
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.inner.config.tags
    }

    /// Returns the number of settled entries, including any not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Returns `true` if there are no settled entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of deferred computations that have not settled yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }
}

impl<A, V, E> Clone for MergeCache<A, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, V, E> Debug for MergeCache<A, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MergeCache")
            .field("name", &self.inner.name)
            .field("tags", &self.inner.config.tags)
            .field("policy", &self.inner.config.policy)
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .field("disposed", &state.disposed)
            .finish_non_exhaustive()
    }
}

impl<A, V, E> Inner<A, V, E>
where
    A: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn lookup(&self, state: &mut State<A, V, E>, args: &A) -> Lookup<V, E> {
        let Some(index) = state.entries.position(&self.config.matcher, args) else {
            return Lookup::Miss;
        };

        let now = self.clock.instant();
        let policy = self.config.policy;
        let expired = state.entries.get(index).is_some_and(|entry| policy.is_expired(entry, now));
        if expired {
            state.entries.remove(index);
            return Lookup::Expired;
        }

        let entry = if policy.is_lru() {
            state.entries.touch(index, now)
        } else {
            state.entries.get(index)
        };
        entry.map_or(Lookup::Miss, |entry| Lookup::Hit(entry.outcome().clone()))
    }

    /// Registers a deferred computation, or joins one that a concurrent caller registered for
    /// matching arguments while the target was running.
    fn start(self: &Arc<Self>, args: A, future: BoxFuture<'static, Result<V, E>>) -> Call<V, E> {
        let mut state = self.state.lock();
        if let Some((id, call)) = state.in_flight.join(&self.config.matcher, &args) {
            drop(state);
            self.record(CacheOperation::Call, CacheActivity::Merged, 1);
            return Call::in_flight(call, self.waiter(id));
        }

        let id = state.in_flight.next_id();
        let cache = Arc::downgrade(self);
        let settle = async move {
            let result = future.await;
            if let Some(inner) = cache.upgrade() {
                inner.settle_deferred(id, &result);
            }
            result
        };

        let call = state.in_flight.register(id, args, settle.boxed().shared());
        Call::in_flight(call, self.waiter(id))
    }

    fn waiter(self: &Arc<Self>, id: CallId) -> Waiter {
        let registry: Weak<Self> = Arc::downgrade(self);
        let registry: Weak<dyn Waiters> = registry;
        Waiter::new(registry, id)
    }

    fn settle_ready(&self, key: A, result: &Result<V, E>) {
        if result.is_err() {
            self.record(CacheOperation::Call, CacheActivity::Failed, 1);
        }
        if !self.config.should_store(result) {
            return;
        }

        let now = self.clock.instant();
        let len = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state
                .entries
                .insert(&self.config.matcher, CacheEntry::new(key, result.clone(), now));
            state.entries.len()
        };

        self.record(CacheOperation::Settle, CacheActivity::Stored, 1);
        self.telemetry.record_size(self.name, len);
    }

    fn settle_deferred(&self, id: CallId, result: &Result<V, E>) {
        let now = self.clock.instant();
        let mut state = self.state.lock();
        let Some(pending) = state.in_flight.take(id) else {
            return;
        };

        let waiters = pending.waiters();
        let store = !state.disposed && self.config.should_store(result);
        if store {
            state
                .entries
                .insert(&self.config.matcher, CacheEntry::new(pending.into_key(), result.clone(), now));
        }
        let len = state.entries.len();
        drop(state);

        if result.is_err() {
            self.record(CacheOperation::Settle, CacheActivity::Failed, waiters);
        }
        if store {
            self.record(CacheOperation::Settle, CacheActivity::Stored, 1);
            self.telemetry.record_size(self.name, len);
        }
    }

    fn clear_entries(&self) {
        let removed = self.state.lock().entries.clear();
        self.record(CacheOperation::Revalidate, CacheActivity::Revalidated, removed);
        self.telemetry.record_size(self.name, 0);
    }

    /// Claims and runs a sweep if caching is bounded and one is due.
    fn request_sweep(self: &Arc<Self>) {
        if !self.config.cache || !self.config.policy.is_bounded() {
            return;
        }

        let now = self.clock.instant();
        if !self.state.lock().sweep.try_schedule(now) {
            return;
        }

        match self.sweep_mode {
            SweepMode::Inline => self.run_sweep(),
            #[cfg(feature = "tokio")]
            SweepMode::Background => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let mut task = SweepTask {
                        cache: Arc::downgrade(self),
                        done: false,
                    };
                    handle.spawn(async move {
                        if let Some(inner) = task.cache.upgrade() {
                            inner.run_sweep();
                        }
                        task.done = true;
                    });
                }
                Err(_) => self.run_sweep(),
            },
        }
    }

    fn run_sweep(&self) {
        let now = self.clock.instant();
        let (report, len) = {
            let mut state = self.state.lock();
            let report = state.entries.sweep(&self.config.policy, now);
            state.sweep.complete(now);
            (report, state.entries.len())
        };

        if report.expired > 0 {
            self.record(CacheOperation::Sweep, CacheActivity::Expired, report.expired);
        }
        if report.evicted > 0 {
            self.record(CacheOperation::Sweep, CacheActivity::Evicted, report.evicted);
        }
        if report.removed() > 0 {
            self.telemetry.record_size(self.name, len);
        }
    }
}

impl<A, V, E> Inner<A, V, E> {
    fn record(&self, operation: CacheOperation, activity: CacheActivity, count: usize) {
        self.telemetry.record(self.name, operation, activity, count);
    }
}

/// A sweep claimed for a spawned task.
///
/// A runtime shutting down may drop the task before it runs; the claim is then released so a
/// later call can schedule the sweep again.
#[cfg(feature = "tokio")]
struct SweepTask<A, V, E> {
    cache: Weak<Inner<A, V, E>>,
    done: bool,
}

#[cfg(feature = "tokio")]
impl<A, V, E> Drop for SweepTask<A, V, E> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Some(inner) = self.cache.upgrade() {
            inner.state.lock().sweep.abandon();
        }
    }
}

impl<A, V, E> Subscriber for Inner<A, V, E>
where
    A: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn revalidate(&self) {
        self.clear_entries();
    }
}

impl<A, V, E> Waiters for Inner<A, V, E>
where
    A: Send + Sync,
    V: Send + Sync,
    E: Send + Sync,
{
    fn release(&self, id: CallId) {
        let abandoned = self.state.lock().in_flight.release(id);
        // The abandoned future may run arbitrary drop code, so it is dropped unlocked.
        drop(abandoned);
    }
}

impl<A, V, E> Drop for Inner<A, V, E> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}
