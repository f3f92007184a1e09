//! depot-tour-planner core
//!
//! Enumerates capacity-feasible depot tours, prices them with a shift and
//! overtime labour model, and picks the cheapest set-partitioning fleet plan
//! through a pluggable integer-program solver.

pub mod config;
pub mod cost;
pub mod error;
pub mod fleet;
pub mod haversine;
pub mod osrm;
pub mod program;
pub mod report;
pub mod scenario;
mod simplex;
pub mod solver;
pub mod tours;
pub mod traits;
pub mod travel;

pub use error::PlannerError;
