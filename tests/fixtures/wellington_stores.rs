//! Wellington region depot and supermarkets.
//!
//! Coordinates are approximate street locations; demand is boxes per day.

use depot_tour_planner::scenario::Scenario;
use depot_tour_planner::traits::Site;

pub const DEPOT: &str = "CentrePort Wellington";

/// Name the route layer uses for the depot.
pub const DEPOT_ALIAS: &str = "Centre Port";

/// (name, lat, lng, weekday boxes)
pub const STORES: &[(&str, f64, f64, i32)] = &[
    ("FreshChoice Cannons Creek", -41.1420, 174.8650, 3),
    ("FreshChoice Cuba Street", -41.2950, 174.7740, 2),
    ("FreshChoice Woburn", -41.2190, 174.9080, 2),
    ("Metro Cable Car Lane", -41.2840, 174.7750, 2),
    ("Woolworths Aotea", -41.1190, 174.8470, 3),
    ("Woolworths Crofton Downs", -41.2550, 174.7650, 4),
    ("Woolworths Johnsonville", -41.2230, 174.8050, 4),
    ("Woolworths Johnsonville Mall", -41.2220, 174.8060, 3),
    ("Woolworths Karori", -41.2846, 174.7390, 3),
    ("Woolworths Kilbirnie", -41.3170, 174.7940, 3),
    ("Woolworths Lower Hutt", -41.2090, 174.9030, 3),
    ("Woolworths Maidstone", -41.1260, 175.0650, 4),
    ("Woolworths Newtown", -41.3120, 174.7790, 3),
    ("Woolworths Petone", -41.2260, 174.8800, 3),
    ("Woolworths Porirua", -41.1340, 174.8400, 4),
    ("Woolworths Queensgate", -41.2100, 174.9060, 3),
    ("Woolworths Tawa", -41.1680, 174.8270, 2),
    ("Woolworths Upper Hutt", -41.1244, 175.0708, 3),
    ("Woolworths Wainuiomata", -41.2610, 174.9460, 4),
];

pub fn depot_site() -> Site {
    Site::new(DEPOT, -41.2790, 174.7850)
}

/// Depot first, then the first `count` stores.
pub fn sites(count: usize) -> Vec<Site> {
    let mut sites = vec![depot_site()];
    sites.extend(
        STORES
            .iter()
            .take(count)
            .map(|(name, lat, lng, _)| Site::new(*name, *lat, *lng)),
    );
    sites
}

/// Weekday demand for the first `count` stores.
pub fn weekday(count: usize) -> Scenario {
    let mut demand = vec![(DEPOT, 0)];
    demand.extend(STORES.iter().take(count).map(|(name, _, _, boxes)| (*name, *boxes)));
    Scenario::new("weekday", DEPOT, demand)
}

/// Saturday snapshot: every store at zero boxes.
pub fn saturday(count: usize) -> Scenario {
    let mut demand = vec![(DEPOT, 0)];
    demand.extend(STORES.iter().take(count).map(|(name, _, _, _)| (*name, 0)));
    Scenario::new("saturday", DEPOT, demand)
}
