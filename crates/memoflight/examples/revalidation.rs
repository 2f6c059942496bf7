// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Revalidation Example
//!
//! Demonstrates clearing caches by tag without holding a reference to them, and disposing a
//! cache for good.

use memoflight::{MergeCache, Outcome, RevalidationBus};
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let clock = Clock::new_tokio();
    let bus = RevalidationBus::new();

    let prices = MergeCache::builder(clock.clone(), |sku: &'static str| {
        println!("  pricing {sku}");
        Outcome::<u32, String>::value(sku.bytes().map(u32::from).sum())
    })
    .name("prices")
    .tags(["catalog", "prices"])
    .bus(bus.clone())
    .build()?;

    let stock = MergeCache::builder(clock, |sku: &'static str| {
        println!("  counting stock for {sku}");
        Outcome::<u32, String>::value(u32::try_from(sku.len()).unwrap_or(u32::MAX))
    })
    .name("stock")
    .tag("catalog")
    .bus(bus.clone())
    .build()?;

    println!("First lookups run the functions:");
    prices.call("A-100").await?;
    stock.call("A-100").await?;

    println!("Repeated lookups are served from the caches:");
    prices.call("A-100").await?;
    stock.call("A-100").await?;

    println!("Revalidating `prices` clears only the price cache:");
    bus.revalidate_tag("prices");
    prices.call("A-100").await?;
    stock.call("A-100").await?;

    println!("Revalidating `catalog` clears both:");
    bus.revalidate_tag("catalog");
    prices.call("A-100").await?;
    stock.call("A-100").await?;

    stock.dispose();
    println!("After disposal the stock cache rejects calls: {:?}", stock.call("A-100").await);

    Ok(())
}
