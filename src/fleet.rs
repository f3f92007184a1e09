//! Fleet assignment: choose one tour per store and the owned fleet size.
//!
//! Every evaluated tour of every vehicle class becomes a binary column. Each
//! store gets a `= 1` cover row (set partitioning, never "at least one"), and
//! standard-class tours are tied to the retained vehicle count by
//! `sum(x_standard) <= routes_per_vehicle * vehicles`.

use std::collections::BTreeSet;

use crate::config::{FleetConfig, PlannerConfig, VehicleClass};
use crate::cost::{CostBreakdown, evaluate_all};
use crate::error::PlannerError;
use crate::program::{CancelToken, IntegerProgram, Relation, Solution, SolveStatus, VarId, VarKind};
use crate::scenario::Scenario;
use crate::tours::{Tour, enumerate_tours};
use crate::traits::IntegerProgramSolver;
use crate::travel::TravelTimeTable;

/// An evaluated tour offered to the optimiser under one vehicle class.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub class: VehicleClass,
    pub tour: Tour,
    pub breakdown: CostBreakdown,
    /// What selecting this tour costs, per the class pricing.
    pub cost: f64,
}

/// Selected tours and fleet size of an optimal assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetPlan {
    pub routes: Vec<Candidate>,
    pub vehicles_retained: u32,
    pub daily_vehicle_cost: f64,
    /// Route costs plus the amortised cost of the retained vehicles.
    pub total_cost: f64,
}

impl FleetPlan {
    pub fn route_cost(&self) -> f64 {
        self.routes.iter().map(|route| route.cost).sum()
    }

    pub fn standard_routes(&self) -> usize {
        self.routes.iter().filter(|route| route.class.is_standard()).count()
    }

    /// The selected route serving `store`, if any.
    pub fn route_for(&self, store: &str) -> Option<&Candidate> {
        self.routes.iter().find(|route| route.tour.visits(store))
    }
}

/// Terminal result of a planning run.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Optimal(FleetPlan),
    /// No combination of candidate tours satisfies every constraint.
    Infeasible,
    /// The solve was canceled or hit its time limit.
    Canceled,
}

impl PlanOutcome {
    pub fn status(&self) -> SolveStatus {
        match self {
            PlanOutcome::Optimal(_) => SolveStatus::Optimal,
            PlanOutcome::Infeasible => SolveStatus::Infeasible,
            PlanOutcome::Canceled => SolveStatus::Canceled,
        }
    }

    pub fn plan(&self) -> Option<&FleetPlan> {
        match self {
            PlanOutcome::Optimal(plan) => Some(plan),
            _ => None,
        }
    }
}

/// Enumerates and evaluates the tours of every vehicle class.
///
/// Tours with missing travel data are dropped.
pub fn build_candidates(
    scenario: &Scenario,
    table: &TravelTimeTable,
    config: &PlannerConfig,
) -> Vec<Candidate> {
    let stores = scenario.stores();
    let mut candidates = Vec::new();

    for class in &config.classes {
        let tours = enumerate_tours(
            &stores,
            &scenario.depot,
            &scenario.demand,
            class.capacity,
            config.max_intermediate_stops,
        );
        let enumerated = tours.len();
        let evaluated = evaluate_all(tours, table, &scenario.demand, &config.cost);

        tracing::info!(
            class = %class.name,
            capacity = class.capacity,
            enumerated,
            evaluated = evaluated.len(),
            "built candidate tours"
        );

        candidates.extend(evaluated.into_iter().map(|(tour, breakdown)| Candidate {
            cost: class.tour_cost(&breakdown),
            class: class.clone(),
            tour,
            breakdown,
        }));
    }
    candidates
}

/// Fails with [`PlannerError::UnreachableStore`] if some store is on no
/// candidate tour, which would make the partition rows unsatisfiable.
pub fn ensure_reachable(stores: &[String], candidates: &[Candidate]) -> Result<(), PlannerError> {
    let served: BTreeSet<&str> = candidates
        .iter()
        .flat_map(|candidate| candidate.tour.intermediates().iter().map(String::as_str))
        .collect();
    let unreachable: Vec<String> = stores
        .iter()
        .filter(|store| !served.contains(store.as_str()))
        .cloned()
        .collect();

    if unreachable.is_empty() {
        Ok(())
    } else {
        tracing::warn!(stores = ?unreachable, "stores have no feasible tour");
        Err(PlannerError::UnreachableStore { stores: unreachable })
    }
}

/// Integer program for one candidate set, with the handles needed to read
/// the solution back.
#[derive(Debug, Clone)]
pub struct Formulation {
    pub program: IntegerProgram,
    /// One selection variable per candidate, same order.
    pub route_vars: Vec<VarId>,
    pub vehicles: VarId,
    pub daily_vehicle_cost: f64,
}

pub fn formulate(stores: &[String], candidates: &[Candidate], fleet: &FleetConfig) -> Formulation {
    let daily_vehicle_cost = fleet.daily_vehicle_cost();
    let mut program = IntegerProgram::new("fleet_assignment");

    let route_vars: Vec<VarId> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| program.add_variable(format!("x_{index}"), VarKind::Binary, candidate.cost))
        .collect();
    let vehicles = program.add_variable(
        "vehicles_retained",
        VarKind::Integer { lower: 0, upper: None },
        daily_vehicle_cost,
    );

    for store in stores {
        let terms = candidates
            .iter()
            .zip(&route_vars)
            .filter(|(candidate, _)| candidate.tour.visits(store))
            .map(|(_, var)| (*var, 1.0))
            .collect();
        program.add_constraint(format!("cover_{store}"), terms, Relation::Eq, 1.0);
    }

    let mut capacity: Vec<(VarId, f64)> = candidates
        .iter()
        .zip(&route_vars)
        .filter(|(candidate, _)| candidate.class.is_standard())
        .map(|(_, var)| (*var, 1.0))
        .collect();
    capacity.push((vehicles, -f64::from(fleet.routes_per_vehicle)));
    program.add_constraint("standard_capacity", capacity, Relation::Le, 0.0);

    tracing::debug!(
        variables = program.variables.len(),
        constraints = program.constraints.len(),
        "formulated fleet assignment"
    );

    Formulation {
        program,
        route_vars,
        vehicles,
        daily_vehicle_cost,
    }
}

impl Formulation {
    /// Reads a solver answer back into a plan.
    ///
    /// `candidates` must be the slice this formulation was built from.
    pub fn interpret(&self, candidates: &[Candidate], solution: &Solution) -> Result<PlanOutcome, PlannerError> {
        match solution.status {
            SolveStatus::Infeasible => return Ok(PlanOutcome::Infeasible),
            SolveStatus::Canceled => return Ok(PlanOutcome::Canceled),
            SolveStatus::Unbounded => return Err(PlannerError::SolverUnbounded),
            SolveStatus::Optimal => {}
        }

        if solution.values.len() != self.program.variables.len() {
            return Err(PlannerError::Solver(format!(
                "solution has {} values for {} variables",
                solution.values.len(),
                self.program.variables.len()
            )));
        }

        let routes: Vec<Candidate> = candidates
            .iter()
            .zip(&self.route_vars)
            .filter(|(_, var)| solution.values[var.0] > 0.5)
            .map(|(candidate, _)| candidate.clone())
            .collect();
        let vehicles = solution.values[self.vehicles.0].round();
        if vehicles < 0.0 {
            return Err(PlannerError::Solver(format!("negative vehicle count {vehicles}")));
        }
        let vehicles_retained = vehicles as u32;
        let route_cost: f64 = routes.iter().map(|route| route.cost).sum();

        Ok(PlanOutcome::Optimal(FleetPlan {
            routes,
            vehicles_retained,
            daily_vehicle_cost: self.daily_vehicle_cost,
            total_cost: route_cost + f64::from(vehicles_retained) * self.daily_vehicle_cost,
        }))
    }
}

/// Runs the whole pipeline for one scenario against a solver backend.
pub struct FleetPlanner<S> {
    config: PlannerConfig,
    solver: S,
}

impl<S: IntegerProgramSolver> FleetPlanner<S> {
    pub fn new(config: PlannerConfig, solver: S) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Validates inputs, builds candidates, and solves the assignment.
    ///
    /// Configuration problems and unreachable stores fail before any solve.
    pub fn plan(
        &self,
        scenario: &Scenario,
        table: &TravelTimeTable,
        cancel: &CancelToken,
    ) -> Result<PlanOutcome, PlannerError> {
        let span = tracing::info_span!("plan", scenario = %scenario.name);
        let _guard = span.enter();

        self.config.validate()?;
        scenario.validate()?;

        let stores = scenario.stores();
        let candidates = build_candidates(scenario, table, &self.config);
        ensure_reachable(&stores, &candidates)?;

        let formulation = formulate(&stores, &candidates, &self.config.fleet);
        let solution = self.solver.solve(&formulation.program, cancel)?;
        let outcome = formulation.interpret(&candidates, &solution)?;

        match &outcome {
            PlanOutcome::Optimal(plan) => tracing::info!(
                routes = plan.routes.len(),
                vehicles = plan.vehicles_retained,
                total_cost = plan.total_cost,
                "fleet plan solved"
            ),
            other => tracing::info!(status = %other.status(), "fleet plan not solved"),
        }
        Ok(outcome)
    }
}
