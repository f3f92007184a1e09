//! Fleet assignment tests
//!
//! End-to-end planning with the built-in branch and bound, plus solver
//! doubles for outcomes a real instance rarely produces.

mod fixtures;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::time::Duration;

use proptest::prelude::*;

use depot_tour_planner::PlannerError;
use depot_tour_planner::config::{FleetConfig, PlannerConfig, VehicleClass};
use depot_tour_planner::fleet::{
    Candidate, FleetPlan, FleetPlanner, PlanOutcome, build_candidates, ensure_reachable, formulate,
};
use depot_tour_planner::haversine::HaversineTravelTimes;
use depot_tour_planner::program::{CancelToken, IntegerProgram, Relation, Solution, SolveStatus};
use depot_tour_planner::report::PlanReport;
use depot_tour_planner::scenario::Scenario;
use depot_tour_planner::solver::BranchAndBound;
use depot_tour_planner::traits::{IntegerProgramSolver, TravelTimeSource};
use depot_tour_planner::travel::TravelTimeTable;

const TOLERANCE: f64 = 0.01;

/// Returns a fixed status and counts how often it was asked.
struct ScriptedSolver {
    status: SolveStatus,
    calls: Cell<usize>,
}

impl ScriptedSolver {
    fn new(status: SolveStatus) -> Self {
        Self {
            status,
            calls: Cell::new(0),
        }
    }
}

impl IntegerProgramSolver for &ScriptedSolver {
    fn solve(&self, _program: &IntegerProgram, _cancel: &CancelToken) -> Result<Solution, PlannerError> {
        self.calls.set(self.calls.get() + 1);
        Ok(Solution::without_values(self.status))
    }
}

fn plan_with<S: IntegerProgramSolver>(
    config: PlannerConfig,
    solver: S,
    scenario: &Scenario,
    table: &TravelTimeTable,
) -> Result<PlanOutcome, PlannerError> {
    FleetPlanner::new(config, solver).plan(scenario, table, &CancelToken::new())
}

fn optimal(outcome: PlanOutcome) -> FleetPlan {
    match outcome {
        PlanOutcome::Optimal(plan) => plan,
        other => panic!("expected an optimal plan, got {:?}", other.status()),
    }
}

fn assert_partition(plan: &FleetPlan, stores: &[String]) {
    for store in stores {
        let serving = plan.routes.iter().filter(|route| route.tour.visits(store)).count();
        assert_eq!(serving, 1, "{store} is served by {serving} routes");
    }
    let visited: usize = plan.routes.iter().map(|route| route.tour.intermediates().len()).sum();
    assert_eq!(visited, stores.len());
}

fn assert_coupling(plan: &FleetPlan, config: &PlannerConfig) {
    let standard = plan.standard_routes() as u32;
    assert!(
        standard <= config.fleet.routes_per_vehicle * plan.vehicles_retained,
        "{standard} standard routes with {} vehicles",
        plan.vehicles_retained
    );
}

/// Cheapest partition found by exhaustive search, for cross-checking.
fn brute_force_cost(stores: &[String], candidates: &[Candidate], fleet: &FleetConfig) -> Option<f64> {
    fn search(
        stores: &[String],
        candidates: &[Candidate],
        fleet: &FleetConfig,
        covered: &mut Vec<String>,
        cost: f64,
        standard: u32,
        best: &mut Option<f64>,
    ) {
        let Some(next) = stores.iter().find(|store| !covered.contains(store)) else {
            let vehicles = standard.div_ceil(fleet.routes_per_vehicle);
            let total = cost + f64::from(vehicles) * fleet.daily_vehicle_cost();
            if best.is_none_or(|best| total < best) {
                *best = Some(total);
            }
            return;
        };
        for candidate in candidates.iter().filter(|c| c.tour.visits(next)) {
            let stops = candidate.tour.intermediates();
            if stops.iter().any(|stop| covered.contains(stop)) {
                continue;
            }
            covered.extend(stops.iter().cloned());
            let standard = standard + u32::from(candidate.class.is_standard());
            search(stores, candidates, fleet, covered, cost + candidate.cost, standard, best);
            covered.truncate(covered.len() - stops.len());
        }
    }

    let mut best = None;
    search(stores, candidates, fleet, &mut Vec::new(), 0.0, 0, &mut best);
    best
}

#[test]
fn reference_network_uses_one_combined_tour() {
    let scenario = fixtures::two_store_scenario();
    let config = PlannerConfig::default();
    let plan = optimal(plan_with(config.clone(), BranchAndBound::new(), &scenario, &fixtures::two_store_table()).unwrap());

    // D->A->B->D (427.78) and its reverse tie; one owned van covers it.
    assert_eq!(plan.routes.len(), 1);
    assert_eq!(plan.vehicles_retained, 1);
    let expected = 427.78 + 50_000.0 / 312.0;
    assert!((plan.total_cost - expected).abs() < TOLERANCE, "total {}", plan.total_cost);
    assert_partition(&plan, &scenario.stores());
    assert_coupling(&plan, &config);
}

#[test]
fn cheaper_single_tours_never_double_cover() {
    // Two single-store tours are each cheaper than the pair, and the pair
    // plus a single would be cheaper still if double service were allowed.
    let scenario = fixtures::two_store_scenario();
    let config = PlannerConfig::default();
    let table = fixtures::two_store_table();
    let candidates = build_candidates(&scenario, &table, &config);
    let formulation = formulate(&scenario.stores(), &candidates, &config.fleet);
    let solution = BranchAndBound::new().solve(&formulation.program, &CancelToken::new()).unwrap();
    let plan = optimal(formulation.interpret(&candidates, &solution).unwrap());

    assert_partition(&plan, &scenario.stores());
    assert!(formulation.program.is_feasible(&solution.values, 1e-9));
    assert!((solution.objective.unwrap() - plan.total_cost).abs() < 1e-6);
}

#[test]
fn expensive_fleet_switches_to_subcontractors() {
    let scenario = fixtures::two_store_scenario();
    let mut config = PlannerConfig::default();
    config.fleet.annual_vehicle_cost = 10_000_000.0;

    let plan = optimal(plan_with(config, BranchAndBound::new(), &scenario, &fixtures::two_store_table()).unwrap());

    assert_eq!(plan.vehicles_retained, 0);
    assert_eq!(plan.routes.len(), 2);
    assert!(plan.routes.iter().all(|route| route.class.name == "SUB60"));
    assert!((plan.total_cost - 2000.0).abs() < TOLERANCE);
}

#[test]
fn formulation_shape() {
    let scenario = fixtures::two_store_scenario();
    let config = PlannerConfig::default();
    let candidates = build_candidates(&scenario, &fixtures::two_store_table(), &config);
    // WW: A, B, AB, BA. SUB60 (4 boxes): A, B.
    assert_eq!(candidates.len(), 6);

    let formulation = formulate(&scenario.stores(), &candidates, &config.fleet);
    let program = &formulation.program;
    assert_eq!(program.variables.len(), 7);
    assert_eq!(program.constraints.len(), 3);

    let cover_a = &program.constraints[0];
    assert_eq!(cover_a.name, "cover_A");
    assert_eq!(cover_a.relation, Relation::Eq);
    assert_eq!(cover_a.terms.len(), 4);

    let capacity = program.constraints.last().unwrap();
    assert_eq!(capacity.relation, Relation::Le);
    // four standard tours plus the vehicle term
    assert_eq!(capacity.terms.len(), 5);
    assert_eq!(capacity.terms.last(), Some(&(formulation.vehicles, -2.0)));
    assert!((program.objective[formulation.vehicles.0] - 50_000.0 / 312.0).abs() < 1e-9);
}

#[test]
fn oversized_store_is_unreachable_before_solving() {
    let scenario = Scenario::new("weekday", "D", [("D", 0), ("A", 3), ("BIG", 10)]);
    let mut table = fixtures::two_store_table();
    table.insert("D", "BIG", 100.0);
    table.insert("BIG", "D", 100.0);
    let solver = ScriptedSolver::new(SolveStatus::Optimal);

    let err = plan_with(PlannerConfig::default(), &solver, &scenario, &table).unwrap_err();

    match err {
        PlannerError::UnreachableStore { stores } => assert_eq!(stores, vec!["BIG".to_string()]),
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(solver.calls.get(), 0);
}

#[test]
fn missing_travel_data_can_strand_a_store() {
    let scenario = Scenario::new("weekday", "D", [("D", 0), ("A", 3), ("B", 4), ("C", 1)]);
    let mut table = fixtures::two_store_table();
    // C can be reached but there is no way back to anything.
    table.insert("D", "C", 100.0);
    let solver = ScriptedSolver::new(SolveStatus::Optimal);

    let err = plan_with(PlannerConfig::default(), &solver, &scenario, &table).unwrap_err();
    assert!(matches!(err, PlannerError::UnreachableStore { ref stores } if stores == &["C".to_string()]));
    assert_eq!(solver.calls.get(), 0);
}

#[test]
fn ensure_reachable_accepts_full_coverage() {
    let scenario = fixtures::two_store_scenario();
    let config = PlannerConfig::default();
    let candidates = build_candidates(&scenario, &fixtures::two_store_table(), &config);
    ensure_reachable(&scenario.stores(), &candidates).unwrap();
}

#[test]
fn invalid_configuration_fails_fast() {
    let scenario = fixtures::two_store_scenario();
    let solver = ScriptedSolver::new(SolveStatus::Optimal);

    let mut config = PlannerConfig::default();
    config.cost.overtime_rate_per_hour = 150.0;
    let err = plan_with(config, &solver, &scenario, &fixtures::two_store_table()).unwrap_err();
    assert!(matches!(err, PlannerError::InvalidConfiguration(_)));

    let negative = Scenario::new("weekday", "D", [("D", 0), ("A", -3)]);
    let err = plan_with(PlannerConfig::default(), &solver, &negative, &fixtures::two_store_table()).unwrap_err();
    assert!(matches!(err, PlannerError::InvalidConfiguration(_)));

    assert_eq!(solver.calls.get(), 0);
}

#[test]
fn solver_infeasibility_is_an_outcome() {
    let scenario = fixtures::two_store_scenario();
    let solver = ScriptedSolver::new(SolveStatus::Infeasible);

    let outcome = plan_with(PlannerConfig::default(), &solver, &scenario, &fixtures::two_store_table()).unwrap();

    assert_eq!(outcome, PlanOutcome::Infeasible);
    assert_eq!(solver.calls.get(), 1);
    let report = PlanReport::new(&scenario.name, &outcome);
    assert_eq!(report.status, "infeasible");
}

#[test]
fn unbounded_solve_is_an_error() {
    let scenario = fixtures::two_store_scenario();
    let solver = ScriptedSolver::new(SolveStatus::Unbounded);

    let err = plan_with(PlannerConfig::default(), &solver, &scenario, &fixtures::two_store_table()).unwrap_err();
    assert!(matches!(err, PlannerError::SolverUnbounded));
}

#[test]
fn canceled_solve_reports_canceled() {
    let scenario = fixtures::two_store_scenario();
    let cancel = CancelToken::new();
    cancel.cancel();

    let outcome = FleetPlanner::new(PlannerConfig::default(), BranchAndBound::new())
        .plan(&scenario, &fixtures::two_store_table(), &cancel)
        .unwrap();
    assert_eq!(outcome, PlanOutcome::Canceled);
}

#[test]
fn wellington_weekday_subset_matches_exhaustive_search() {
    let scenario = fixtures::weekday(5);
    let config = PlannerConfig::default();
    let table = HaversineTravelTimes::default().table_for(&fixtures::sites(5)).unwrap();

    let candidates = build_candidates(&scenario, &table, &config);
    let plan = optimal(plan_with(config.clone(), BranchAndBound::new(), &scenario, &table).unwrap());
    let expected = brute_force_cost(&scenario.stores(), &candidates, &config.fleet).unwrap();

    assert!((plan.total_cost - expected).abs() < 1e-6, "{} vs {}", plan.total_cost, expected);
    assert_partition(&plan, &scenario.stores());
    assert_coupling(&plan, &config);

    let report = PlanReport::new(&scenario.name, &PlanOutcome::Optimal(plan.clone()));
    assert_eq!(report.routes.len(), plan.routes.len());
    assert_eq!(report.vehicles_retained, Some(plan.vehicles_retained));
}

#[test]
fn full_wellington_weekday_solves_to_optimal() {
    let scenario = fixtures::weekday(fixtures::STORES.len());
    let config = PlannerConfig::default();
    let table = HaversineTravelTimes::default()
        .table_for(&fixtures::sites(fixtures::STORES.len()))
        .unwrap();
    let solver = BranchAndBound::with_time_limit(Duration::from_secs(120));

    let plan = optimal(plan_with(config.clone(), solver, &scenario, &table).unwrap());

    assert_partition(&plan, &scenario.stores());
    assert_coupling(&plan, &config);
    let standard = plan.standard_routes() as u32;
    assert_eq!(plan.vehicles_retained, standard.div_ceil(config.fleet.routes_per_vehicle));
    let expected = plan.route_cost() + f64::from(plan.vehicles_retained) * config.fleet.daily_vehicle_cost();
    assert!((plan.total_cost - expected).abs() < 1e-6);
    assert!((plan.total_cost - 4584.24).abs() < TOLERANCE, "total {}", plan.total_cost);
}

#[test]
fn route_for_finds_the_serving_tour() {
    let scenario = fixtures::two_store_scenario();
    let plan = optimal(
        plan_with(PlannerConfig::default(), BranchAndBound::new(), &scenario, &fixtures::two_store_table()).unwrap(),
    );
    let route = plan.route_for("A").unwrap();
    assert!(route.tour.visits("B"));
    assert!(plan.route_for("D").is_none());
}

fn random_network(boxes: &[i32], seconds: &[f64]) -> (Scenario, TravelTimeTable) {
    let names: Vec<String> = (0..boxes.len()).map(|i| format!("S{i}")).collect();
    let mut demand: BTreeMap<String, i32> = names.iter().cloned().zip(boxes.iter().copied()).collect();
    demand.insert("D".to_string(), 0);
    let scenario = Scenario::new("random", "D", demand);

    let mut locations = vec!["D".to_string()];
    locations.extend(names);
    let mut table = TravelTimeTable::new();
    let mut edge = seconds.iter().cycle();
    for origin in &locations {
        for destination in &locations {
            if origin != destination {
                table.insert(origin, destination, *edge.next().unwrap_or(&600.0));
            }
        }
    }
    (scenario, table)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn optimal_plans_partition_stores_and_respect_coupling(
        boxes in prop::collection::vec(0i32..6, 1..5),
        seconds in prop::collection::vec(60.0f64..5_000.0, 20),
        fee in 200.0f64..1_500.0,
    ) {
        let (scenario, table) = random_network(&boxes, &seconds);
        let mut config = PlannerConfig::default();
        config.classes[1] = VehicleClass::subcontracted("SUB60", 6, fee);

        let candidates = build_candidates(&scenario, &table, &config);
        let outcome = plan_with(config.clone(), BranchAndBound::new(), &scenario, &table).unwrap();
        let plan = match outcome {
            PlanOutcome::Optimal(plan) => plan,
            other => return Err(TestCaseError::fail(format!("status {:?}", other.status()))),
        };

        let stores = scenario.stores();
        for store in &stores {
            let serving = plan.routes.iter().filter(|route| route.tour.visits(store)).count();
            prop_assert_eq!(serving, 1);
        }
        let standard = plan.standard_routes() as u32;
        prop_assert!(standard <= config.fleet.routes_per_vehicle * plan.vehicles_retained);

        let expected = brute_force_cost(&stores, &candidates, &config.fleet).unwrap();
        prop_assert!((plan.total_cost - expected).abs() < 1e-6, "{} vs {}", plan.total_cost, expected);
    }
}
