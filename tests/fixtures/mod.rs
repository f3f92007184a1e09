//! Test fixtures for depot-tour-planner.
//!
//! Provides:
//! - The two-store reference network with hand-checked edge times
//! - Wellington depot and store sites with weekday/Saturday demand

#![allow(dead_code)]

pub mod wellington_stores;

pub use wellington_stores::*;

use depot_tour_planner::scenario::Scenario;
use depot_tour_planner::travel::TravelTimeTable;

/// Depot "D", stores A (3 boxes) and B (4 boxes).
pub fn two_store_scenario() -> Scenario {
    Scenario::new("reference", "D", [("D", 0), ("A", 3), ("B", 4)])
}

pub fn two_store_table() -> TravelTimeTable {
    let mut table = TravelTimeTable::new();
    for (origin, destination, seconds) in [
        ("D", "A", 600.0),
        ("A", "B", 300.0),
        ("B", "D", 500.0),
        ("D", "B", 500.0),
        ("B", "A", 300.0),
        ("A", "D", 600.0),
    ] {
        table.insert(origin, destination, seconds);
    }
    table
}
