// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Memoizes function calls by argument, merging concurrent duplicates and revalidating by tag.
//!
//! A [`MergeCache`] wraps a function. Calling it with arguments that match an earlier call
//! reuses the earlier outcome instead of running the function again:
//!
//! - **Settled outcomes** are stored and returned directly, until they expire (TTL), are
//!   evicted (size bound, least recently used first when there is no TTL), or the cache is
//!   revalidated.
//! - **In-flight outcomes** are shared. While a deferred computation is running, every caller
//!   with matching arguments joins it, so the function runs once and all of them receive a clone
//!   of the same result, success or failure. This merging happens even with caching disabled.
//!
//! Arguments are compared with an [`ArgMatcher`], [`PartialEq`] by default, and never hashed.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use memoflight::{MergeCache, Outcome};
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let cache = MergeCache::builder(Clock::new_frozen(), |user_id: u64| {
//!     Outcome::<String, String>::deferred(async move {
//!         // Expensive lookup, run once per user id.
//!         Ok(format!("user-{user_id}"))
//!     })
//! })
//! .ttl(Duration::from_secs(60))
//! .tag("users")
//! .build()?;
//!
//! let first = cache.call(7);
//! let second = cache.call(7);
//! assert_eq!(first.await?, "user-7");
//! assert_eq!(second.await?, "user-7");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! # Execution Shapes
//!
//! The wrapped function returns an [`Outcome`]: [`Outcome::Ready`] for a result it computed on
//! the spot, or [`Outcome::Deferred`] for a future. Only deferred outcomes can be merged, since a
//! ready outcome is complete before anyone else can ask for it. [`MergeCache::call`] itself is
//! synchronous and returns a [`Call`] future, so the function starts running before the caller
//! awaits anything.
//!
//! # Revalidation
//!
//! Each cache subscribes to a [`RevalidationBus`] under its tags plus the reserved [`ALL_TAG`].
//! Revalidating a tag clears the settled outcomes of every cache subscribed to it:
//!
//! ```
//! use memoflight::{MergeCache, Outcome, RevalidationBus};
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let bus = RevalidationBus::new();
//! let prices = MergeCache::builder(Clock::new_frozen(), |sku: &'static str| Outcome::<usize, String>::value(sku.len()))
//!     .bus(bus.clone())
//!     .tag("prices")
//!     .build()?;
//!
//! prices.call("A-100").await?;
//! bus.revalidate_tag("prices");
//! assert!(prices.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! Caches built without [`bus`](MergeCacheBuilder::bus) use the process-wide
//! [`RevalidationBus::global`], which the free functions [`revalidate_tag`] and
//! [`revalidate_all`] target.
//!
//! # Features
//!
//! - `metrics`: OpenTelemetry counters and gauges via [`CacheTelemetry::with_meter`].
//! - `serde`: `Serialize` and `Deserialize` for [`CacheOptions`].
//! - `tokio`: [`MergeCacheBuilder::background_sweep`] to sweep on the Tokio runtime.
//! - `test-util`: enables `tick`'s controllable clocks for tests.

mod builder;
mod bus;
mod cache;
mod call;
mod entry;
mod error;
mod inflight;
mod matcher;
mod options;
mod outcome;
mod store;
mod sweep;
mod telemetry;

pub use builder::MergeCacheBuilder;
pub use bus::{ALL_TAG, RevalidationBus, TagSelector, revalidate_all, revalidate_tag};
pub use cache::{CacheName, MergeCache};
pub use call::Call;
pub use error::{BuildError, CallError};
pub use matcher::ArgMatcher;
pub use options::CacheOptions;
pub use outcome::Outcome;
pub use telemetry::CacheTelemetry;
