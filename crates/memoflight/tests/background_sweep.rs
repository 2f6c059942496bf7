// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for sweeping on the Tokio runtime.

#![cfg(feature = "tokio")]

use std::time::Duration;

use memoflight::{MergeCache, MergeCacheBuilder, Outcome, RevalidationBus};
use tick::{Clock, ClockControl};

fn bounded(clock: Clock) -> MergeCacheBuilder<u32, u32, String> {
    MergeCache::builder(clock, |n: u32| Outcome::value(n))
        .max_cache_size(1)
        .background_sweep()
        .bus(RevalidationBus::new())
}

#[tokio::test]
async fn sweep_runs_on_a_spawned_task() {
    let cache = bounded(Clock::new_frozen()).build().unwrap();

    cache.call(1).await.unwrap();
    cache.call(2).await.unwrap();
    assert_eq!(cache.len(), 2);

    for _ in 0..100 {
        if cache.len() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&2));
}

#[test]
fn sweep_runs_inline_outside_a_runtime() {
    let control = ClockControl::new();
    let cache = bounded(control.to_clock()).build().unwrap();

    futures::executor::block_on(cache.call(1)).unwrap();
    futures::executor::block_on(cache.call(2)).unwrap();
    assert_eq!(cache.len(), 2);

    control.advance(Duration::from_secs(1));
    futures::executor::block_on(cache.call(3)).unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&3));
}

#[test]
fn sweep_dropped_with_its_runtime_is_claimed_again() {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let cache = bounded(Clock::new_frozen()).build().unwrap();

    {
        let _entered = runtime.enter();
        futures::executor::block_on(cache.call(1)).unwrap();
        futures::executor::block_on(cache.call(2)).unwrap();
    }
    drop(runtime);
    assert_eq!(cache.len(), 2);

    futures::executor::block_on(cache.call(3)).unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&3));
}
