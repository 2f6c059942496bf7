// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Merged Fetch Example
//!
//! Demonstrates concurrent requests for the same profile sharing a single fetch, and later
//! requests reusing the settled result until it expires.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use memoflight::{MergeCache, Outcome};
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fetches);

    let profiles = MergeCache::builder(Clock::new_tokio(), move |user_id: u64| {
        let counter = Arc::clone(&counter);
        Outcome::<String, String>::deferred(async move {
            let fetch = counter.fetch_add(1, Ordering::SeqCst) + 1;
            println!("  fetching profile {user_id} from the database (fetch #{fetch})");

            // Simulate a slow query
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(format!("Profile(id: {user_id}, name: Alice)"))
        })
    })
    .name("profiles")
    .ttl(Duration::from_secs(2))
    .max_cache_size(1_000)
    .background_sweep()
    .build()?;

    println!("Starting 5 concurrent requests for profile 42...\n");

    let mut handles = Vec::new();
    for request in 1..=5 {
        let profiles = profiles.clone();
        handles.push(tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let profile = profiles.call(42).await;
            println!("  [request {request}] got {profile:?} in {:?}", start.elapsed());
        }));

        // Stagger the requests slightly; they still land while the fetch is in flight
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    for handle in handles {
        handle.await?;
    }

    println!("\nA later request is answered from the cache:");
    let call = profiles.call(42);
    println!("  ready without waiting: {}", call.is_ready());
    println!("  {:?}", call.await);

    println!("\nAfter the TTL elapses the profile is fetched again:");
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    println!("  {:?}", profiles.call(42).await);

    println!("\nProfile fetched {} time(s) for 7 requests.", fetches.load(Ordering::SeqCst));
    Ok(())
}
