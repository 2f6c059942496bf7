// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tag-based revalidation of merge caches.
//!
//! A [`RevalidationBus`] maps tag names to the caches that subscribed to them. Revalidating a
//! tag clears the settled entries of every cache subscribed to it, without the caller holding a
//! reference to any of those caches. Every cache is also subscribed to the reserved
//! [`ALL_TAG`], which [`RevalidationBus::revalidate_all`] targets.
//!
//! Caches use [`RevalidationBus::global`] unless the builder is given another bus.

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, LazyLock, Weak},
};

use parking_lot::Mutex;

/// The reserved tag every cache subscribes to.
///
/// Building a cache with this tag in its own tag list fails with
/// [`BuildError::ReservedTag`](crate::BuildError::ReservedTag).
pub const ALL_TAG: &str = "__all__";

static GLOBAL: LazyLock<RevalidationBus> = LazyLock::new(RevalidationBus::new);

/// Something that can be told to drop its settled entries.
pub(crate) trait Subscriber: Send + Sync {
    fn revalidate(&self);
}

/// Handle identifying one subscriber on one bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionId(u64);

/// Which tags to revalidate.
///
/// # Examples
///
/// ```
/// use memoflight::TagSelector;
///
/// assert_eq!(TagSelector::from("users"), TagSelector::Tags(vec!["users".to_string()]));
/// assert_eq!(TagSelector::from(["a", "b"]), TagSelector::Tags(vec!["a".to_string(), "b".to_string()]));
/// assert_eq!(TagSelector::from(None::<&str>), TagSelector::All);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagSelector {
    /// Every cache on the bus, regardless of its tags.
    All,

    /// Caches subscribed to any of these tags.
    Tags(Vec<String>),
}

impl From<&str> for TagSelector {
    fn from(tag: &str) -> Self {
        Self::Tags(vec![tag.to_string()])
    }
}

impl From<String> for TagSelector {
    fn from(tag: String) -> Self {
        Self::Tags(vec![tag])
    }
}

impl From<Vec<String>> for TagSelector {
    fn from(tags: Vec<String>) -> Self {
        Self::Tags(tags)
    }
}

impl From<&[&str]> for TagSelector {
    fn from(tags: &[&str]) -> Self {
        Self::Tags(tags.iter().map(ToString::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TagSelector {
    fn from(tags: [&str; N]) -> Self {
        Self::from(tags.as_slice())
    }
}

impl<T: Into<Self>> From<Option<T>> for TagSelector {
    fn from(tag: Option<T>) -> Self {
        tag.map_or(Self::All, Into::into)
    }
}

/// An in-process publish/subscribe channel for revalidating caches by tag.
///
/// Cloning a bus yields another handle to the same subscriber registry.
///
/// # Examples
///
/// ```
/// use memoflight::{MergeCache, Outcome, RevalidationBus};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let bus = RevalidationBus::new();
/// let cache = MergeCache::builder(Clock::new_frozen(), |id: u32| Outcome::<u32, String>::value(id * 2))
///     .bus(bus.clone())
///     .tag("users")
///     .build()?;
///
/// cache.call(1).await?;
/// assert_eq!(cache.len(), 1);
///
/// bus.revalidate_tag("users");
/// assert_eq!(cache.len(), 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Clone, Default)]
pub struct RevalidationBus {
    inner: Arc<Mutex<BusState>>,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    topics: HashMap<String, Vec<(SubscriptionId, Weak<dyn Subscriber>)>>,
}

impl RevalidationBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide bus, creating it on first use.
    ///
    /// It lives for the rest of the process. Caches built without an explicit bus subscribe here.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Subscribes `subscriber` to [`ALL_TAG`] and to each of `tags`.
    pub(crate) fn subscribe(&self, tags: &[String], subscriber: &Weak<dyn Subscriber>) -> SubscriptionId {
        let mut state = self.inner.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;

        for tag in std::iter::once(ALL_TAG).chain(tags.iter().map(String::as_str)) {
            let subscribers = state.topics.entry(tag.to_string()).or_default();
            if subscribers.iter().all(|(existing, _)| *existing != id) {
                subscribers.push((id, Weak::clone(subscriber)));
            }
        }

        id
    }

    /// Removes every subscription made under `id`. Unknown ids are ignored.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.inner.lock();
        state.topics.retain(|_, subscribers| {
            subscribers.retain(|(existing, _)| *existing != id);
            !subscribers.is_empty()
        });
    }

    /// Revalidates the caches selected by `selector`.
    ///
    /// A cache subscribed to several selected tags is revalidated once.
    pub fn revalidate(&self, selector: impl Into<TagSelector>) {
        let selector = selector.into();
        let targets = {
            let state = self.inner.lock();
            let mut seen = Vec::new();
            let mut targets = Vec::new();
            let tags: Vec<&str> = match &selector {
                TagSelector::All => vec![ALL_TAG],
                TagSelector::Tags(tags) => tags.iter().map(String::as_str).collect(),
            };

            for subscribers in tags.iter().filter_map(|tag| state.topics.get(*tag)) {
                for (id, subscriber) in subscribers {
                    if seen.contains(id) {
                        continue;
                    }
                    seen.push(*id);
                    // Caches dropped without disposal unsubscribe on drop; skip any mid-teardown.
                    if let Some(subscriber) = subscriber.upgrade() {
                        targets.push(subscriber);
                    }
                }
            }
            targets
        };

        tracing::debug!(selector = ?selector, subscribers = targets.len(), "revalidation.emit");

        // Notify without holding the bus lock so subscribers may use the bus themselves.
        for subscriber in targets {
            subscriber.revalidate();
        }
    }

    /// Revalidates the caches subscribed to `tag`.
    pub fn revalidate_tag(&self, tag: &str) {
        self.revalidate(tag);
    }

    /// Revalidates every cache on this bus.
    pub fn revalidate_all(&self) {
        self.revalidate(TagSelector::All);
    }

    /// Returns the number of live subscriptions to `tag`.
    #[must_use]
    pub fn subscribers(&self, tag: &str) -> usize {
        self.inner
            .lock()
            .topics
            .get(tag)
            .map_or(0, |subscribers| subscribers.iter().filter(|(_, s)| s.strong_count() > 0).count())
    }
}

impl Debug for RevalidationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("RevalidationBus")
            .field("topics", &state.topics.len())
            .finish_non_exhaustive()
    }
}

/// Revalidates caches on the [global bus](RevalidationBus::global).
///
/// Passing `None` revalidates every cache, regardless of its tags.
///
/// # Examples
///
/// ```
/// memoflight::revalidate_tag("users");
/// memoflight::revalidate_tag(["users", "orders"]);
/// memoflight::revalidate_tag(None::<&str>);
/// ```
pub fn revalidate_tag(selector: impl Into<TagSelector>) {
    RevalidationBus::global().revalidate(selector);
}

/// Revalidates every cache on the [global bus](RevalidationBus::global).
pub fn revalidate_all() {
    RevalidationBus::global().revalidate_all();
}
