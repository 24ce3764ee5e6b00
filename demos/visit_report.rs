//! Visit report for a short European trip.
//!
//! Run with: cargo run --example visit_report
//!
//! Optional arguments load real reference data:
//!   cargo run --example visit_report -- cities500.txt countries.geojson

use std::path::Path;

use geo::{polygon, MultiPolygon};

use visit_analytics::{
    compute_visit_stats, format_last_visited, CitySortKey, CountrySortKey, Gazetteer, Ping,
    ReferenceData, Region, RegionIndex, SortDirection, SortState, VisitConfig,
};

const HOUR_MS: i64 = 3_600_000;
/// 2024-05-01T08:00:00Z
const TRIP_START: i64 = 1_714_550_400_000;

fn box_region(name: &str, min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Region {
    Region::new(
        name,
        MultiPolygon::new(vec![polygon![
            (x: min_lng, y: min_lat),
            (x: min_lng, y: max_lat),
            (x: max_lng, y: max_lat),
            (x: max_lng, y: min_lat),
        ]]),
    )
}

/// Coarse boxes standing in for country borders when no file is given.
fn sample_countries() -> RegionIndex {
    RegionIndex::new(vec![
        box_region("France", -4.8, 42.3, 7.6, 51.1),
        box_region("Switzerland", 7.6, 45.8, 10.5, 47.8),
        box_region("Italy", 6.6, 36.6, 18.5, 45.8),
    ])
}

fn sample_gazetteer() -> Gazetteer {
    Gazetteer::parse(
        "2988507\tParis\tParis\t\t48.85341\t2.3488\tP\tPPLC\tFR\t\t11\n\
         4717560\tParis\tParis\t\t33.66094\t-95.55551\tP\tPPLA2\tUS\t\tTX\n\
         2996944\tLyon\tLyon\t\t45.74846\t4.84671\tP\tPPLA\tFR\t\t84\n\
         2657896\tZurich\tZurich\t\t47.36667\t8.55\tP\tPPLA\tCH\t\tZH\n\
         3173435\tMilan\tMilan\t\t45.46427\t9.18951\tP\tPPLA\tIT\t\t09\n",
    )
}

fn trip() -> Vec<Ping> {
    let stops = [
        ("Paris", 48.857, 2.352),
        ("Paris", 48.861, 2.336),
        ("Lyon", 45.764, 4.835),
        ("Zurich", 47.376, 8.541),
        ("Milan", 45.464, 9.190),
        ("Milan", 45.470, 9.180),
        ("Zurich", 47.370, 8.545),
        ("Paris", 48.853, 2.349),
    ];
    stops
        .iter()
        .enumerate()
        .map(|(i, (city, lat, lng))| {
            Ping::new(*lat, *lng, Some(TRIP_START + i as i64 * 20 * HOUR_MS)).with_city(city)
        })
        .collect()
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let reference = if args.is_empty() {
        ReferenceData {
            countries: sample_countries(),
            gazetteer: sample_gazetteer(),
            ..ReferenceData::default()
        }
    } else {
        ReferenceData::load_or_default(
            args.first().map(Path::new),
            args.get(1).map(Path::new),
        )
    };

    let config = VisitConfig::default();
    let stats = compute_visit_stats(&trip(), &reference, &config);

    println!("Visit Report\n");
    println!(
        "{} pings, {} cities, {} countries\n",
        stats.totals.total_pings, stats.totals.distinct_cities, stats.totals.distinct_countries
    );

    println!("Cities (by visits):");
    println!("  {:<10} {:>6} {:>5} {:>18}  {}", "City", "Visits", "Days", "Last visited", "Position");
    for city in SortState::<CitySortKey>::default().sort(&stats.cities) {
        let position = match (city.representative_lat, city.representative_lng) {
            (Some(lat), Some(lng)) => format!(
                "{:.4}, {:.4}{}",
                lat,
                lng,
                if city.resolved_from_gazetteer { " (gazetteer)" } else { "" }
            ),
            _ => "-".to_string(),
        };
        println!(
            "  {:<10} {:>6} {:>5} {:>18}  {}",
            city.key,
            city.visits,
            city.days_present,
            format_last_visited(city.last_visited_ts),
            position
        );
    }

    println!("\nCountries (by name):");
    let mut order = SortState::<CountrySortKey>::default();
    order.toggle(CountrySortKey::Country);
    assert_eq!(order.direction, SortDirection::Ascending);
    for country in order.sort(&stats.countries) {
        println!(
            "  {:<12} visits={} days={} cities={} last={}",
            country.country,
            country.visits,
            country.days_present,
            country.distinct_cities_visited,
            format_last_visited(country.last_visited_ts)
        );
    }
}
