//! Planning run configuration.
//!
//! Defaults reproduce the weekday Wellington setup: 9-box owned vans billed by
//! the minute, 4-box subcontracted vans at a flat $1000 per route, and a
//! $50,000/year van amortised over 312 working days.

use serde::{Deserialize, Serialize};

use crate::cost::{CostBreakdown, CostModel};
use crate::error::PlannerError;

/// How tours run by a vehicle class are paid for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VehicleKind {
    /// Owned fleet: duration-billed, and every tour needs a retained vehicle.
    Standard,
    /// Hired per tour at a flat fee regardless of duration.
    Subcontracted { flat_fee: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleClass {
    pub name: String,
    /// Maximum boxes on one tour.
    pub capacity: i32,
    pub kind: VehicleKind,
}

impl VehicleClass {
    pub fn standard(name: impl Into<String>, capacity: i32) -> Self {
        Self {
            name: name.into(),
            capacity,
            kind: VehicleKind::Standard,
        }
    }

    pub fn subcontracted(name: impl Into<String>, capacity: i32, flat_fee: f64) -> Self {
        Self {
            name: name.into(),
            capacity,
            kind: VehicleKind::Subcontracted { flat_fee },
        }
    }

    pub fn is_standard(&self) -> bool {
        matches!(self.kind, VehicleKind::Standard)
    }

    /// Price of one tour for this class.
    pub fn tour_cost(&self, breakdown: &CostBreakdown) -> f64 {
        match self.kind {
            VehicleKind::Standard => breakdown.total_cost,
            VehicleKind::Subcontracted { flat_fee } => flat_fee,
        }
    }
}

/// Fixed cost of keeping owned vehicles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub annual_vehicle_cost: f64,
    pub working_days_per_year: f64,
    /// Tours one retained vehicle can run per day.
    pub routes_per_vehicle: u32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            annual_vehicle_cost: 50_000.0,
            // 6 days a week, 52 weeks
            working_days_per_year: 312.0,
            routes_per_vehicle: 2,
        }
    }
}

impl FleetConfig {
    pub fn daily_vehicle_cost(&self) -> f64 {
        self.annual_vehicle_cost / self.working_days_per_year
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_intermediate_stops: usize,
    pub cost: CostModel,
    pub fleet: FleetConfig,
    pub classes: Vec<VehicleClass>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_intermediate_stops: 4,
            cost: CostModel::default(),
            fleet: FleetConfig::default(),
            classes: vec![
                VehicleClass::standard("WW", 9),
                VehicleClass::subcontracted("SUB60", 4, 1000.0),
            ],
        }
    }
}

impl PlannerConfig {
    /// Parses a JSON configuration; omitted fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, PlannerError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        let cost = &self.cost;
        if self.max_intermediate_stops == 0 {
            return Err(PlannerError::invalid("max_intermediate_stops must be at least 1"));
        }
        if !(cost.shift_minutes > 0.0) {
            return Err(PlannerError::invalid("shift_minutes must be positive"));
        }
        if !(cost.base_rate_per_hour >= 0.0) {
            return Err(PlannerError::invalid("base_rate_per_hour must be non-negative"));
        }
        if !(cost.overtime_rate_per_hour > cost.base_rate_per_hour) {
            return Err(PlannerError::invalid(format!(
                "overtime rate {} must exceed base rate {}",
                cost.overtime_rate_per_hour, cost.base_rate_per_hour
            )));
        }
        if !(cost.unload_seconds_per_box >= 0.0) {
            return Err(PlannerError::invalid("unload_seconds_per_box must be non-negative"));
        }

        let fleet = &self.fleet;
        if !(fleet.annual_vehicle_cost >= 0.0) {
            return Err(PlannerError::invalid("annual_vehicle_cost must be non-negative"));
        }
        if !(fleet.working_days_per_year > 0.0) {
            return Err(PlannerError::invalid("working_days_per_year must be positive"));
        }
        if fleet.routes_per_vehicle == 0 {
            return Err(PlannerError::invalid("routes_per_vehicle must be at least 1"));
        }

        if self.classes.is_empty() {
            return Err(PlannerError::invalid("at least one vehicle class is required"));
        }
        for (index, class) in self.classes.iter().enumerate() {
            if self.classes[..index].iter().any(|other| other.name == class.name) {
                return Err(PlannerError::invalid(format!("duplicate vehicle class {}", class.name)));
            }
            if class.capacity <= 0 {
                return Err(PlannerError::invalid(format!(
                    "capacity of {} must be positive, got {}",
                    class.name, class.capacity
                )));
            }
            if let VehicleKind::Subcontracted { flat_fee } = class.kind {
                if !(flat_fee >= 0.0) {
                    return Err(PlannerError::invalid(format!(
                        "flat fee of {} must be non-negative",
                        class.name
                    )));
                }
            }
        }
        Ok(())
    }
}
