//! Serializable records of evaluated tours and solved plans.

use serde::Serialize;

use crate::error::PlannerError;
use crate::fleet::{Candidate, PlanOutcome};
use crate::program::SolveStatus;

/// One evaluated tour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourRecord {
    pub route: String,
    pub van_type: String,
    pub travel_seconds: f64,
    pub unloading_seconds: f64,
    pub total_time_seconds: f64,
    pub total_time_minutes: f64,
    pub base_minutes_billed: f64,
    pub overtime_minutes_billed: f64,
    pub base_cost: f64,
    pub overtime_cost: f64,
    /// Duration-based cost; hired vans are charged `route_cost` instead.
    pub total_cost: f64,
    pub route_cost: f64,
}

impl From<&Candidate> for TourRecord {
    fn from(candidate: &Candidate) -> Self {
        let breakdown = &candidate.breakdown;
        Self {
            route: candidate.tour.to_string(),
            van_type: candidate.class.name.clone(),
            travel_seconds: breakdown.travel_seconds,
            unloading_seconds: breakdown.unloading_seconds,
            total_time_seconds: breakdown.total_seconds,
            total_time_minutes: breakdown.total_minutes,
            base_minutes_billed: breakdown.base_minutes,
            overtime_minutes_billed: breakdown.overtime_minutes,
            base_cost: breakdown.base_cost,
            overtime_cost: breakdown.overtime_cost,
            total_cost: breakdown.total_cost,
            route_cost: candidate.cost,
        }
    }
}

/// Plan-level summary. Route fields are empty unless the solve was optimal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport {
    pub scenario: String,
    pub status: String,
    pub routes: Vec<TourRecord>,
    pub vehicles_retained: Option<u32>,
    pub total_cost: Option<f64>,
}

impl PlanReport {
    pub fn new(scenario: impl Into<String>, outcome: &PlanOutcome) -> Self {
        let status: SolveStatus = outcome.status();
        let plan = outcome.plan();
        Self {
            scenario: scenario.into(),
            status: status.to_string(),
            routes: plan
                .map(|plan| plan.routes.iter().map(TourRecord::from).collect())
                .unwrap_or_default(),
            vehicles_retained: plan.map(|plan| plan.vehicles_retained),
            total_cost: plan.map(|plan| plan.total_cost),
        }
    }

    pub fn to_json(&self) -> Result<String, PlannerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
