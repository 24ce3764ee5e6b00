//! Statistics that follow a live ping store.
//!
//! Run with: cargo run --example live_refresh

use std::sync::Arc;

use visit_analytics::{Ping, PingSource, PingStore, ReferenceData, StatsRefresher, VisitConfig};

fn main() {
    let store = Arc::new(PingStore::new());
    let refresher = Arc::new(StatsRefresher::new());

    let subscription = refresher.watch(
        &store,
        Arc::new(ReferenceData::default()),
        VisitConfig::default(),
    );

    let arrivals = [
        ("Oslo", 59.913, 10.752),
        ("Oslo", 59.915, 10.740),
        ("Bergen", 60.391, 5.322),
        ("Oslo", 59.911, 10.750),
    ];

    for (i, (city, lat, lng)) in arrivals.iter().enumerate() {
        store.append(Ping::new(*lat, *lng, Some(1_700_000_000_000 + i as i64 * 60_000)).with_city(city));

        if let Some(stats) = refresher.latest() {
            let summary: Vec<String> = stats
                .cities
                .iter()
                .map(|c| format!("{}x{}", c.key, c.visits))
                .collect();
            println!("after ping {}: {}", i + 1, summary.join(", "));
        }
    }

    drop(subscription);
    store.append(Ping::new(0.0, 0.0, None));
    println!(
        "\nstore has {} pings; published stats still cover {}",
        store.get_all().map(|p| p.len()).unwrap_or(0),
        refresher.latest().map(|s| s.totals.total_pings).unwrap_or(0)
    );
}
