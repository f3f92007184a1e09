//! Capacity-constrained tour enumeration.
//!
//! Tours are brute-forced: every ordered arrangement of up to
//! `max_intermediate` distinct stores. Travel times are asymmetric, so
//! `D->A->B->D` and `D->B->A->D` are distinct candidates. Growth is
//! factorial in the stop cap; this is fine for a couple of dozen stores.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Closed path `depot -> stores... -> depot`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Tour {
    stops: Vec<String>,
}

impl Tour {
    /// Builds `depot -> intermediates -> depot`.
    pub fn new(depot: &str, intermediates: &[&str]) -> Self {
        let mut stops = Vec::with_capacity(intermediates.len() + 2);
        stops.push(depot.to_string());
        stops.extend(intermediates.iter().map(|s| s.to_string()));
        stops.push(depot.to_string());
        Self { stops }
    }

    /// Full stop sequence, depot at both ends.
    pub fn stops(&self) -> &[String] {
        &self.stops
    }

    pub fn depot(&self) -> &str {
        &self.stops[0]
    }

    /// Stores visited, in order, without the depot.
    pub fn intermediates(&self) -> &[String] {
        &self.stops[1..self.stops.len() - 1]
    }

    pub fn visits(&self, store: &str) -> bool {
        self.intermediates().iter().any(|s| s == store)
    }

    /// Consecutive (origin, destination) pairs, including both depot legs.
    pub fn legs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stops
            .windows(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
    }

    /// Boxes carried on this tour. Stores missing from `demand` carry nothing.
    ///
    /// Summed in `i64` so any mix of `i32` demands fits.
    pub fn load(&self, demand: &BTreeMap<String, i32>) -> i64 {
        self.intermediates()
            .iter()
            .map(|store| i64::from(demand.get(store).copied().unwrap_or(0)))
            .sum()
    }
}

impl fmt::Display for Tour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stops.join("->"))
    }
}

/// Every tour from `depot` through 1..=`max_intermediate` distinct stores whose
/// total demand does not exceed `capacity`.
///
/// Tours come out grouped by stop count, then in the order of `stores`. A stop
/// count larger than the number of stores simply contributes nothing. Demand
/// must be non-negative; the depot is never counted even if listed in `stores`.
pub fn enumerate_tours(
    stores: &[String],
    depot: &str,
    demand: &BTreeMap<String, i32>,
    capacity: i32,
    max_intermediate: usize,
) -> Vec<Tour> {
    let stores: Vec<(&str, i64)> = stores
        .iter()
        .filter(|store| store.as_str() != depot)
        .map(|store| (store.as_str(), i64::from(demand.get(store).copied().unwrap_or(0))))
        .collect();

    let mut tours = Vec::new();
    let mut used = vec![false; stores.len()];
    let mut path = Vec::with_capacity(max_intermediate);

    for length in 1..=max_intermediate.min(stores.len()) {
        extend_arrangements(
            &stores,
            depot,
            i64::from(capacity),
            length,
            &mut used,
            &mut path,
            0,
            &mut tours,
        );
    }

    tracing::debug!(
        stores = stores.len(),
        capacity,
        max_intermediate,
        tours = tours.len(),
        "enumerated tours"
    );
    tours
}

#[allow(clippy::too_many_arguments)]
fn extend_arrangements<'a>(
    stores: &[(&'a str, i64)],
    depot: &str,
    capacity: i64,
    length: usize,
    used: &mut [bool],
    path: &mut Vec<&'a str>,
    load: i64,
    tours: &mut Vec<Tour>,
) {
    if path.len() == length {
        tours.push(Tour::new(depot, path));
        return;
    }

    for (index, &(store, boxes)) in stores.iter().enumerate() {
        // Demand is non-negative, so an overloaded prefix stays overloaded.
        if used[index] || load + boxes > capacity {
            continue;
        }
        used[index] = true;
        path.push(store);
        extend_arrangements(stores, depot, capacity, length, used, path, load + boxes, tours);
        path.pop();
        used[index] = false;
    }
}
