//! Tour duration and labour-cost evaluation.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::tours::Tour;
use crate::travel::TravelTimeTable;

/// Shift length, labour rates and unloading speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Minutes billed at the base rate before overtime applies.
    pub shift_minutes: f64,
    pub base_rate_per_hour: f64,
    /// Must be strictly greater than `base_rate_per_hour`.
    pub overtime_rate_per_hour: f64,
    pub unload_seconds_per_box: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            shift_minutes: 180.0,
            base_rate_per_hour: 200.0,
            overtime_rate_per_hour: 275.0,
            unload_seconds_per_box: 15.0 * 60.0,
        }
    }
}

impl CostModel {
    pub fn base_rate_per_minute(&self) -> f64 {
        self.base_rate_per_hour / 60.0
    }

    pub fn overtime_rate_per_minute(&self) -> f64 {
        self.overtime_rate_per_hour / 60.0
    }
}

/// Timing and billing of a single tour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub travel_seconds: f64,
    pub unloading_seconds: f64,
    pub total_seconds: f64,
    pub total_minutes: f64,
    pub base_minutes: f64,
    pub overtime_minutes: f64,
    pub base_cost: f64,
    pub overtime_cost: f64,
    pub total_cost: f64,
}

/// Sum of every leg's travel time.
///
/// Fails on the first leg without table data; a missing leg is never zero.
pub fn travel_seconds(tour: &Tour, table: &TravelTimeTable) -> Result<f64, PlannerError> {
    tour.legs().try_fold(0.0, |total, (origin, destination)| {
        table
            .lookup(origin, destination)
            .map(|seconds| total + seconds)
            .ok_or_else(|| PlannerError::MissingTravelData {
                origin: origin.to_string(),
                destination: destination.to_string(),
            })
    })
}

/// Unloading time at the stores of `tour`. The depot never unloads.
pub fn unloading_seconds(tour: &Tour, demand: &BTreeMap<String, i32>, model: &CostModel) -> f64 {
    tour.load(demand) as f64 * model.unload_seconds_per_box
}

/// Splits the tour duration into base and overtime minutes and prices them.
pub fn bill(travel_seconds: f64, unloading_seconds: f64, model: &CostModel) -> CostBreakdown {
    let total_seconds = travel_seconds + unloading_seconds;
    let total_minutes = total_seconds / 60.0;
    let base_minutes = total_minutes.min(model.shift_minutes);
    let overtime_minutes = (total_minutes - model.shift_minutes).max(0.0);
    let base_cost = base_minutes * model.base_rate_per_minute();
    let overtime_cost = overtime_minutes * model.overtime_rate_per_minute();

    CostBreakdown {
        travel_seconds,
        unloading_seconds,
        total_seconds,
        total_minutes,
        base_minutes,
        overtime_minutes,
        base_cost,
        overtime_cost,
        total_cost: base_cost + overtime_cost,
    }
}

pub fn evaluate(
    tour: &Tour,
    table: &TravelTimeTable,
    demand: &BTreeMap<String, i32>,
    model: &CostModel,
) -> Result<CostBreakdown, PlannerError> {
    let travel = travel_seconds(tour, table)?;
    Ok(bill(travel, unloading_seconds(tour, demand, model), model))
}

/// Evaluates `tours` in parallel, dropping the ones with missing travel data.
///
/// Each surviving tour stays paired with its own breakdown.
pub fn evaluate_all(
    tours: Vec<Tour>,
    table: &TravelTimeTable,
    demand: &BTreeMap<String, i32>,
    model: &CostModel,
) -> Vec<(Tour, CostBreakdown)> {
    let total = tours.len();
    let evaluated: Vec<(Tour, CostBreakdown)> = tours
        .into_par_iter()
        .filter_map(|tour| match evaluate(&tour, table, demand, model) {
            Ok(breakdown) => Some((tour, breakdown)),
            Err(err) => {
                tracing::debug!(tour = %tour, error = %err, "dropping tour");
                None
            }
        })
        .collect();

    if evaluated.len() < total {
        tracing::info!(
            dropped = total - evaluated.len(),
            kept = evaluated.len(),
            "tours dropped for missing travel data"
        );
    }
    evaluated
}
