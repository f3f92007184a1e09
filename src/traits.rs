//! Seams between the planner core and its external collaborators.
//!
//! These are intentionally narrow. Travel data and integer-program solving
//! can be swapped without touching enumeration, costing or formulation.

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::program::{CancelToken, IntegerProgram, Solution};
use crate::travel::TravelTimeTable;

/// A named location with coordinates (lat, lng).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Site {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
        }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// Provides a directed travel-time table for a set of sites.
///
/// Pairs the provider has no data for must be left out of the table.
pub trait TravelTimeSource {
    fn table_for(&self, sites: &[Site]) -> Result<TravelTimeTable, PlannerError>;
}

/// Solves a minimising integer program.
///
/// Implementations return `Infeasible`, `Unbounded` or `Canceled` as a
/// [`SolveStatus`](crate::program::SolveStatus); `Err` is reserved for
/// backend failures.
pub trait IntegerProgramSolver {
    fn solve(&self, program: &IntegerProgram, cancel: &CancelToken) -> Result<Solution, PlannerError>;
}
