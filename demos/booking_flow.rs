//! Walk through the cache & coordination layer as a booking service uses it.
//!
//! Runs against Redis when `REDIS_URL` is set and reachable, otherwise on the
//! local fallback.
//!
//! ```bash
//! cargo run --example booking_flow
//! REDIS_URL=redis://localhost:6379 cargo run --example booking_flow
//! ```

use cache_coord::{CacheConfig, CacheService, DriverLocation};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct FareQuote {
    zone: String,
    class: String,
    amount_cents: u64,
}

#[derive(Debug)]
struct PricingUnavailable;

/// Stand-in for the pricing service.
async fn quote(zone: &str, class: &str) -> Result<FareQuote, PricingUnavailable> {
    println!("  [pricing] computing fare for {}/{}", zone, class);
    Ok(FareQuote {
        zone: zone.to_string(),
        class: class.to_string(),
        amount_cents: 1250,
    })
}

#[tokio::main]
async fn main() -> Result<(), PricingUnavailable> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .ok();

    println!("\n=== cache-coord - Booking Flow ===\n");

    // 1. Composition root: build, init once, share by clone
    let cache: CacheService = CacheService::new(CacheConfig::from_env());
    let kind = cache.init().await;
    println!("1. Backend selected: {}\n", kind);

    // 2. Flight status
    println!("2. Flight status:");
    cache
        .flights()
        .set("ET500", &serde_json::json!({"status": "landed", "gate": "B4"}))
        .await;
    let status: Option<serde_json::Value> = cache.flights().get("ET500").await;
    println!("   ✓ flight:ET500 -> {:?}\n", status);

    // 3. Cache-aside pricing
    println!("3. Pricing (cache-aside):");
    for attempt in 1..=2 {
        let fare = cache
            .get_or_set_price("zone3", "standard", || quote("zone3", "standard"))
            .await?;
        println!("   attempt {}: {} cents", attempt, fare.amount_cents);
    }
    println!();

    // 4. Payment callback under a lock
    println!("4. Payment callback:");
    match cache.acquire_lock("payment:tx_991", 30).await {
        Some(lock) => {
            println!("   ✓ lock acquired, settling tx_991");
            let duplicate = cache.acquire_lock("payment:tx_991", 30).await;
            println!("   duplicate callback acquired lock: {}", duplicate.is_some());
            cache.release_lock(&lock).await;
        }
        None => println!("   another instance is settling tx_991"),
    }
    println!();

    // 5. Rate limiting
    println!("5. Rate limiting (3 per minute):");
    for _ in 0..4 {
        let decision = cache.check_rate_limit("10.0.0.7", 3, 60).await;
        println!(
            "   allowed={} current={} remaining={}",
            decision.allowed, decision.current, decision.remaining
        );
    }
    cache.reset_rate_limit("10.0.0.7").await;
    println!();

    // 6. Driver tracking
    println!("6. Driver location:");
    cache
        .set_driver_location("D17", &DriverLocation::new(9.0054, 38.7636).with_heading(90.0))
        .await;
    println!("   ✓ D17 -> {:?}\n", cache.driver_location("D17").await);

    // 7. Invalidation
    println!("7. Invalidation:");
    cache.bookings().set("ABC123", &"confirmed").await;
    cache.sessions().set("ABC123", &"session blob").await;
    let removed = cache.bookings().invalidate_all().await;
    println!(
        "   removed {} booking keys; session:ABC123 still cached: {}\n",
        removed,
        cache.sessions().exists("ABC123").await
    );

    // 8. Diagnostics
    let stats = cache.stats();
    println!(
        "8. Stats: {}",
        serde_json::to_string_pretty(&stats).unwrap_or_default()
    );

    Ok(())
}
