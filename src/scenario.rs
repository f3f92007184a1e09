//! Daily demand snapshot for one planning run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

/// Depot, locations and per-store box demand for one kind of day
/// (weekday, Saturday, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub depot: String,
    /// Every location in the run, depot included.
    pub locations: Vec<String>,
    pub demand: BTreeMap<String, i32>,
}

impl Scenario {
    /// Scenario whose locations are the depot plus every store in `demand`.
    pub fn new<I, K>(name: impl Into<String>, depot: impl Into<String>, demand: I) -> Self
    where
        I: IntoIterator<Item = (K, i32)>,
        K: Into<String>,
    {
        let depot = depot.into();
        let demand: BTreeMap<String, i32> = demand.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let mut locations = vec![depot.clone()];
        locations.extend(demand.keys().filter(|name| **name != depot).cloned());
        Self {
            name: name.into(),
            depot,
            locations,
            demand,
        }
    }

    /// Locations other than the depot, sorted and de-duplicated.
    pub fn stores(&self) -> Vec<String> {
        let mut stores: Vec<String> = self
            .locations
            .iter()
            .filter(|name| **name != self.depot)
            .cloned()
            .collect();
        stores.sort();
        stores.dedup();
        stores
    }

    pub fn demand_of(&self, store: &str) -> i32 {
        self.demand.get(store).copied().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        if !self.locations.contains(&self.depot) {
            return Err(PlannerError::invalid(format!(
                "depot {} is not one of the scenario locations",
                self.depot
            )));
        }
        if let Some(&boxes) = self.demand.get(&self.depot) {
            if boxes != 0 {
                return Err(PlannerError::invalid(format!(
                    "depot {} must have zero demand, got {}",
                    self.depot, boxes
                )));
            }
        }
        for store in self.stores() {
            match self.demand.get(&store) {
                None => {
                    return Err(PlannerError::invalid(format!("store {} has no demand entry", store)));
                }
                Some(&boxes) if boxes < 0 => {
                    return Err(PlannerError::invalid(format!(
                        "store {} has negative demand {}",
                        store, boxes
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
