//! Built-in integer-program backend for set-partitioning programs.
//!
//! Handles the shape the fleet formulation produces: binary columns with
//! `sum(x) = 1` rows, plus general integer variables that only ever appear
//! one per row next to binaries (e.g. `sum(x) - 2 * vehicles <= 0`).
//!
//! Columns that match a cheaper column on every row are dropped up front.
//! Each combination of integer values the side rows can require is then
//! relaxed to an LP, and the combinations are searched cheapest bound first.
//! Within one combination the search is depth-first over the uncovered row
//! with the fewest compatible columns, lowest reduced cost first, pruned by
//! the Lagrangian bound the LP duals give.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use crate::error::PlannerError;
use crate::program::{CancelToken, Constraint, IntegerProgram, Relation, Solution, SolveStatus, VarId, VarKind};
use crate::simplex::{self, LpOutcome, LpRow};
use crate::traits::IntegerProgramSolver;

const EPS: f64 = 1e-9;

/// How many nodes are explored between cancellation checks.
const CHECK_INTERVAL: u64 = 256;

/// Most integer value combinations one solve will relax.
const MAX_ASSIGNMENTS: u128 = 4096;

#[derive(Debug, Clone, Default)]
pub struct BranchAndBound {
    /// Give up with [`SolveStatus::Canceled`] after this long.
    pub time_limit: Option<Duration>,
}

impl BranchAndBound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_limit(time_limit: Duration) -> Self {
        Self {
            time_limit: Some(time_limit),
        }
    }
}

impl IntegerProgramSolver for BranchAndBound {
    fn solve(&self, program: &IntegerProgram, cancel: &CancelToken) -> Result<Solution, PlannerError> {
        let model = Model::build(program)?;
        tracing::debug!(
            program = %program.name,
            rows = model.row_count,
            columns = model.columns.len(),
            dominated = model.dominated,
            integers = model.integers.len(),
            "starting branch and bound"
        );

        let ranges = match model.integer_ranges() {
            Domains::Ranges(ranges) => ranges,
            Domains::Empty => return Ok(Solution::without_values(SolveStatus::Infeasible)),
            Domains::Unbounded => {
                tracing::debug!(program = %program.name, "negative-cost integer variable has no upper limit");
                return Ok(Solution::without_values(SolveStatus::Unbounded));
            }
        };
        let assignments = assignments(&ranges)?;

        let mut search = Search::new(&model, program, cancel, self.time_limit.map(|limit| Instant::now() + limit));
        search.run(assignments)?;

        let solution = if search.canceled {
            Solution::without_values(SolveStatus::Canceled)
        } else {
            match search.best {
                Some((objective, values)) => Solution {
                    status: SolveStatus::Optimal,
                    values,
                    objective: Some(objective),
                },
                None => Solution::without_values(SolveStatus::Infeasible),
            }
        };

        tracing::debug!(
            program = %program.name,
            status = %solution.status,
            relaxations = search.relaxations,
            nodes = search.nodes,
            objective = ?solution.objective,
            "branch and bound finished"
        );
        Ok(solution)
    }
}

struct Column {
    var: usize,
    cost: f64,
    /// Partition rows this column covers.
    rows: Vec<usize>,
    /// (side row, coefficient) pairs, one per row.
    side: Vec<(usize, f64)>,
}

struct IntegerVar {
    var: usize,
    cost: f64,
    lower: i64,
    upper: Option<i64>,
}

/// A constraint that is not a partition row.
struct SideRow {
    relation: Relation,
    rhs: f64,
    /// (column, coefficient) pairs.
    columns: Vec<(usize, f64)>,
    /// (integer index, coefficient), if an integer variable appears.
    integer: Option<(usize, f64)>,
    /// Column activity range reachable with at most one column per partition row.
    activity: (f64, f64),
    nonnegative: bool,
    nonpositive: bool,
}

impl SideRow {
    /// Adding columns can only push the activity past `rhs` from below.
    fn limits_above(&self) -> bool {
        matches!(self.relation, Relation::Le | Relation::Eq) && self.nonnegative
    }

    fn limits_below(&self) -> bool {
        matches!(self.relation, Relation::Ge | Relation::Eq) && self.nonpositive
    }

    /// Largest integer value this row can ask for, over every column choice.
    fn reach(&self, coef: f64) -> f64 {
        let (low, high) = self.activity;
        ((self.rhs - low) / coef).max((self.rhs - high) / coef)
    }

    /// Whether this row puts a lower limit on an integer with `coef`.
    fn floors(&self, coef: f64) -> bool {
        match self.relation {
            Relation::Le => coef < 0.0,
            Relation::Ge => coef > 0.0,
            Relation::Eq => true,
        }
    }

    fn caps(&self, coef: f64) -> bool {
        match self.relation {
            Relation::Le => coef > 0.0,
            Relation::Ge => coef < 0.0,
            Relation::Eq => true,
        }
    }
}

struct Model {
    row_count: usize,
    columns: Vec<Column>,
    /// Columns covering each partition row.
    row_columns: Vec<Vec<usize>>,
    integers: Vec<IntegerVar>,
    side_rows: Vec<SideRow>,
    /// Values of binaries that never enter the search.
    fixed: Vec<(usize, f64)>,
    fixed_cost: f64,
    dominated: usize,
}

enum Domains {
    Ranges(Vec<RangeInclusive<i64>>),
    Empty,
    Unbounded,
}

fn is_binary(program: &IntegerProgram, var: VarId) -> bool {
    matches!(program.variables[var.0].kind, VarKind::Binary)
}

/// `sum(x) = 1` over binaries with unit coefficients.
fn is_partition_row(program: &IntegerProgram, row: &Constraint) -> bool {
    row.relation == Relation::Eq
        && (row.rhs - 1.0).abs() < EPS
        && !row.terms.is_empty()
        && row
            .terms
            .iter()
            .all(|&(var, coef)| is_binary(program, var) && (coef - 1.0).abs() < EPS)
}

/// Sorts by row and sums repeated rows.
fn merge_terms(mut terms: Vec<(usize, f64)>) -> Vec<(usize, f64)> {
    terms.sort_by_key(|&(row, _)| row);
    let mut merged: Vec<(usize, f64)> = Vec::with_capacity(terms.len());
    for (row, coef) in terms {
        match merged.last_mut() {
            Some((last, total)) if *last == row => *total += coef,
            _ => merged.push((row, coef)),
        }
    }
    merged
}

impl Model {
    fn build(program: &IntegerProgram) -> Result<Self, PlannerError> {
        let var_count = program.variables.len();
        for row in &program.constraints {
            if let Some((var, _)) = row.terms.iter().find(|(var, _)| var.0 >= var_count) {
                return Err(PlannerError::Solver(format!(
                    "constraint {} references unknown variable {}",
                    row.name, var.0
                )));
            }
        }

        let mut integers = Vec::new();
        let mut integer_index = vec![None; var_count];
        for (var, variable) in program.variables.iter().enumerate() {
            if let VarKind::Integer { lower, upper } = variable.kind {
                if upper.is_some_and(|upper| upper < lower) {
                    return Err(PlannerError::Solver(format!(
                        "variable {} has an empty domain",
                        variable.name
                    )));
                }
                integer_index[var] = Some(integers.len());
                integers.push(IntegerVar {
                    var,
                    cost: program.objective.get(var).copied().unwrap_or(0.0),
                    lower,
                    upper,
                });
            }
        }

        let mut var_rows: Vec<Vec<usize>> = vec![Vec::new(); var_count];
        let mut var_side: Vec<Vec<(usize, f64)>> = vec![Vec::new(); var_count];
        let mut side_rows = Vec::new();
        let mut side_names = Vec::new();
        let mut row_count = 0;

        for row in &program.constraints {
            if is_partition_row(program, row) {
                for (var, _) in &row.terms {
                    var_rows[var.0].push(row_count);
                }
                row_count += 1;
                continue;
            }

            let side = side_rows.len();
            let mut integer: Option<(usize, f64)> = None;
            for &(var, coef) in &row.terms {
                let Some(index) = integer_index[var.0] else {
                    var_side[var.0].push((side, coef));
                    continue;
                };
                if let Some((seen, total)) = &mut integer {
                    if *seen != index {
                        return Err(PlannerError::Solver(format!(
                            "constraint {} couples several integer variables",
                            row.name
                        )));
                    }
                    *total += coef;
                } else {
                    integer = Some((index, coef));
                }
            }
            side_rows.push(SideRow {
                relation: row.relation,
                rhs: row.rhs,
                columns: Vec::new(),
                integer: integer.filter(|&(_, coef)| coef.abs() >= EPS),
                activity: (0.0, 0.0),
                nonnegative: true,
                nonpositive: true,
            });
            side_names.push(row.name.as_str());
        }

        let mut columns: Vec<Column> = Vec::new();
        let mut signatures: HashMap<(Vec<usize>, Vec<(usize, u64)>), usize> = HashMap::new();
        let mut fixed = Vec::new();
        let mut fixed_cost = 0.0;
        let mut dominated = 0;

        for (var, variable) in program.variables.iter().enumerate() {
            if !matches!(variable.kind, VarKind::Binary) {
                continue;
            }
            let cost = program.objective.get(var).copied().unwrap_or(0.0);
            let side = merge_terms(std::mem::take(&mut var_side[var]));
            let mut rows = std::mem::take(&mut var_rows[var]);

            if rows.is_empty() {
                if let Some(&(row, _)) = side.iter().find(|(_, coef)| coef.abs() >= EPS) {
                    return Err(PlannerError::Solver(format!(
                        "binary {} in constraint {} is not in any partition row",
                        variable.name, side_names[row]
                    )));
                }
                // Free binary: its cost sign settles it.
                if cost < 0.0 {
                    fixed_cost += cost;
                    fixed.push((var, 1.0));
                } else {
                    fixed.push((var, 0.0));
                }
                continue;
            }

            rows.sort_unstable();
            let signature = (
                rows.clone(),
                side.iter().map(|&(row, coef)| (row, coef.to_bits())).collect(),
            );
            let column = Column { var, cost, rows, side };
            match signatures.get(&signature) {
                Some(&kept) => {
                    dominated += 1;
                    if cost < columns[kept].cost {
                        fixed.push((columns[kept].var, 0.0));
                        columns[kept] = column;
                    } else {
                        fixed.push((var, 0.0));
                    }
                }
                None => {
                    signatures.insert(signature, columns.len());
                    columns.push(column);
                }
            }
        }

        let mut row_columns = vec![Vec::new(); row_count];
        for (index, column) in columns.iter().enumerate() {
            for &row in &column.rows {
                row_columns[row].push(index);
            }
            for &(side, coef) in &column.side {
                side_rows[side].columns.push((index, coef));
            }
        }

        for row in &mut side_rows {
            let mut coefs: Vec<f64> = row.columns.iter().map(|&(_, coef)| coef).collect();
            coefs.sort_by(f64::total_cmp);
            let low: f64 = coefs.iter().take(row_count).filter(|&&coef| coef < 0.0).sum();
            let high: f64 = coefs.iter().rev().take(row_count).filter(|&&coef| coef > 0.0).sum();
            row.activity = (low, high);
            row.nonnegative = coefs.iter().all(|&coef| coef >= 0.0);
            row.nonpositive = coefs.iter().all(|&coef| coef <= 0.0);
        }

        Ok(Self {
            row_count,
            columns,
            row_columns,
            integers,
            side_rows,
            fixed,
            fixed_cost,
            dominated,
        })
    }

    /// Values each integer variable can take in some optimal solution.
    ///
    /// A non-negative cost wants the smallest value the side rows allow, which
    /// never exceeds what the rows can ask for. A negative cost wants the
    /// largest, so it needs a cap.
    fn integer_ranges(&self) -> Domains {
        let mut ranges = Vec::with_capacity(self.integers.len());
        for (index, int) in self.integers.iter().enumerate() {
            let rows = || {
                self.side_rows.iter().filter_map(move |row| match row.integer {
                    Some((owner, coef)) if owner == index => Some((row, coef)),
                    _ => None,
                })
            };

            let top = if int.cost >= 0.0 {
                let needed = rows()
                    .filter(|(row, coef)| row.floors(*coef))
                    .map(|(row, coef)| (row.reach(coef) - EPS).ceil() as i64)
                    .fold(int.lower, i64::max);
                int.upper.map_or(needed, |upper| upper.min(needed))
            } else {
                let cap = rows()
                    .filter(|(row, coef)| row.caps(*coef))
                    .map(|(row, coef)| (row.reach(coef) + EPS).floor() as i64)
                    .min();
                match (int.upper, cap) {
                    (None, None) => return Domains::Unbounded,
                    (Some(upper), None) => upper,
                    (None, Some(cap)) => cap,
                    (Some(upper), Some(cap)) => upper.min(cap),
                }
            };

            if top < int.lower {
                return Domains::Empty;
            }
            ranges.push(int.lower..=top);
        }
        Domains::Ranges(ranges)
    }
}

/// Every combination of values from `ranges`, first variable slowest.
fn assignments(ranges: &[RangeInclusive<i64>]) -> Result<Vec<Vec<i64>>, PlannerError> {
    let total = ranges.iter().try_fold(1u128, |total, range| {
        let width = (i128::from(*range.end()) - i128::from(*range.start()) + 1) as u128;
        total.checked_mul(width).filter(|&total| total <= MAX_ASSIGNMENTS)
    });
    if total.is_none() {
        return Err(PlannerError::Solver(format!(
            "integer variables admit more than {MAX_ASSIGNMENTS} value combinations"
        )));
    }

    let mut combinations = vec![Vec::new()];
    for range in ranges {
        combinations = combinations
            .into_iter()
            .flat_map(|prefix: Vec<i64>| {
                range.clone().map(move |value| {
                    let mut next = prefix.clone();
                    next.push(value);
                    next
                })
            })
            .collect();
    }
    Ok(combinations)
}

/// LP relaxation of the partition problem with the integers held fixed.
struct Relaxation {
    assignment: Vec<i64>,
    /// Side-row right-hand sides with the integer terms moved across.
    rhs: Vec<f64>,
    /// Objective contribution of the fixed binaries and integers.
    constant: f64,
    row_duals: Vec<f64>,
    side_duals: Vec<f64>,
    reduced: Vec<f64>,
    negative_reduced: f64,
    bound: f64,
}

/// Partial cover explored by the depth-first search.
struct Dive {
    covered: Vec<bool>,
    chosen: Vec<usize>,
    chosen_cost: f64,
    /// Column activity of each side row.
    activity: Vec<f64>,
    /// Columns covering each partition row, lowest reduced cost first.
    row_columns: Vec<Vec<usize>>,
}

impl Dive {
    fn new(model: &Model, relaxation: &Relaxation) -> Self {
        let mut row_columns = model.row_columns.clone();
        for list in &mut row_columns {
            list.sort_by(|&a, &b| {
                relaxation.reduced[a]
                    .total_cmp(&relaxation.reduced[b])
                    .then(model.columns[a].var.cmp(&model.columns[b].var))
            });
        }
        Self {
            covered: vec![false; model.row_count],
            chosen: Vec::new(),
            chosen_cost: 0.0,
            activity: vec![0.0; model.side_rows.len()],
            row_columns,
        }
    }

    fn select(&mut self, index: usize, column: &Column) {
        for &row in &column.rows {
            self.covered[row] = true;
        }
        for &(side, coef) in &column.side {
            self.activity[side] += coef;
        }
        self.chosen_cost += column.cost;
        self.chosen.push(index);
    }

    fn deselect(&mut self, column: &Column) {
        for &row in &column.rows {
            self.covered[row] = false;
        }
        for &(side, coef) in &column.side {
            self.activity[side] -= coef;
        }
        self.chosen_cost -= column.cost;
        self.chosen.pop();
    }
}

struct Search<'a> {
    model: &'a Model,
    program: &'a IntegerProgram,
    cancel: &'a CancelToken,
    deadline: Option<Instant>,
    best: Option<(f64, Vec<f64>)>,
    relaxations: usize,
    nodes: u64,
    canceled: bool,
}

impl<'a> Search<'a> {
    fn new(model: &'a Model, program: &'a IntegerProgram, cancel: &'a CancelToken, deadline: Option<Instant>) -> Self {
        Self {
            model,
            program,
            cancel,
            deadline,
            best: None,
            relaxations: 0,
            nodes: 0,
            canceled: false,
        }
    }

    fn run(&mut self, assignments: Vec<Vec<i64>>) -> Result<(), PlannerError> {
        let mut relaxations = Vec::new();
        for assignment in assignments {
            if self.expired() {
                self.canceled = true;
                return Ok(());
            }
            if let Some(relaxation) = self.relax(assignment)? {
                relaxations.push(relaxation);
            }
        }
        self.relaxations = relaxations.len();
        relaxations.sort_by(|a, b| a.bound.total_cmp(&b.bound));

        for relaxation in &relaxations {
            if self.prunes(relaxation.bound) {
                break;
            }
            tracing::trace!(
                assignment = ?relaxation.assignment,
                bound = relaxation.bound,
                "searching integer assignment"
            );
            let mut dive = Dive::new(self.model, relaxation);
            self.branch(relaxation, &mut dive);
            if self.canceled {
                break;
            }
        }
        Ok(())
    }

    fn expired(&self) -> bool {
        self.cancel.is_canceled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn should_stop(&mut self) -> bool {
        if !self.canceled && self.nodes % CHECK_INTERVAL == 1 && self.expired() {
            self.canceled = true;
        }
        self.canceled
    }

    /// Whether no solution with objective `bound` or more can beat the incumbent.
    fn prunes(&self, bound: f64) -> bool {
        self.best
            .as_ref()
            .is_some_and(|(best, _)| bound >= best - EPS * best.abs().max(1.0))
    }

    fn relax(&self, assignment: Vec<i64>) -> Result<Option<Relaxation>, PlannerError> {
        let model = self.model;
        let rhs: Vec<f64> = model
            .side_rows
            .iter()
            .map(|row| match row.integer {
                Some((index, coef)) => row.rhs - coef * assignment[index] as f64,
                None => row.rhs,
            })
            .collect();
        let constant = model.fixed_cost
            + model
                .integers
                .iter()
                .zip(&assignment)
                .map(|(int, &value)| int.cost * value as f64)
                .sum::<f64>();

        let mut rows: Vec<LpRow> = model
            .row_columns
            .iter()
            .map(|columns| LpRow {
                terms: columns.iter().map(|&column| (column, 1.0)).collect(),
                relation: Relation::Eq,
                rhs: 1.0,
            })
            .collect();
        rows.extend(model.side_rows.iter().zip(&rhs).map(|(row, &rhs)| LpRow {
            terms: row.columns.clone(),
            relation: row.relation,
            rhs,
        }));

        let costs: Vec<f64> = model.columns.iter().map(|column| column.cost).collect();
        let duals = match simplex::minimize(model.columns.len(), &costs, &rows)? {
            LpOutcome::Infeasible => return Ok(None),
            LpOutcome::Optimal { value, duals } => {
                tracing::trace!(assignment = ?assignment, lp = value, "relaxation solved");
                duals
            }
            LpOutcome::Unbounded => vec![0.0; rows.len()],
        };

        let row_duals = duals[..model.row_count].to_vec();
        // Sign-correct duals keep the bound valid whatever their accuracy.
        let side_duals: Vec<f64> = model
            .side_rows
            .iter()
            .zip(&duals[model.row_count..])
            .map(|(row, &dual)| match row.relation {
                Relation::Le => dual.min(0.0),
                Relation::Ge => dual.max(0.0),
                Relation::Eq => dual,
            })
            .collect();

        let reduced: Vec<f64> = model
            .columns
            .iter()
            .map(|column| {
                column.cost
                    - column.rows.iter().map(|&row| row_duals[row]).sum::<f64>()
                    - column
                        .side
                        .iter()
                        .map(|&(side, coef)| side_duals[side] * coef)
                        .sum::<f64>()
            })
            .collect();
        let negative_reduced: f64 = reduced.iter().map(|&rc| rc.min(0.0)).sum();
        let bound = constant
            + row_duals.iter().sum::<f64>()
            + side_duals.iter().zip(&rhs).map(|(dual, rhs)| dual * rhs).sum::<f64>()
            + negative_reduced;

        Ok(Some(Relaxation {
            assignment,
            rhs,
            constant,
            row_duals,
            side_duals,
            reduced,
            negative_reduced,
            bound,
        }))
    }

    fn node_bound(&self, relaxation: &Relaxation, dive: &Dive) -> f64 {
        let uncovered: f64 = relaxation
            .row_duals
            .iter()
            .zip(&dive.covered)
            .filter(|(_, covered)| !**covered)
            .map(|(dual, _)| dual)
            .sum();
        let slack: f64 = relaxation
            .side_duals
            .iter()
            .zip(relaxation.rhs.iter().zip(&dive.activity))
            .map(|(dual, (rhs, activity))| dual * (rhs - activity))
            .sum();
        relaxation.constant + dive.chosen_cost + uncovered + slack + relaxation.negative_reduced
    }

    fn fits(&self, relaxation: &Relaxation, dive: &Dive, column: usize) -> bool {
        let column = &self.model.columns[column];
        column.rows.iter().all(|&row| !dive.covered[row])
            && column.side.iter().all(|&(side, coef)| {
                let row = &self.model.side_rows[side];
                let after = dive.activity[side] + coef;
                let rhs = relaxation.rhs[side];
                !(row.limits_above() && after > rhs + 1e-6) && !(row.limits_below() && after < rhs - 1e-6)
            })
    }

    fn branch(&mut self, relaxation: &Relaxation, dive: &mut Dive) {
        let model = self.model;
        self.nodes += 1;
        if self.should_stop() {
            return;
        }

        let bound = self.node_bound(relaxation, dive);
        if self.prunes(bound) {
            return;
        }

        // Most constrained uncovered row.
        let mut target: Option<(usize, usize)> = None;
        for row in 0..model.row_count {
            if dive.covered[row] {
                continue;
            }
            let count = dive.row_columns[row]
                .iter()
                .filter(|&&column| self.fits(relaxation, dive, column))
                .count();
            if count == 0 {
                return;
            }
            if target.is_none_or(|(_, best)| count < best) {
                target = Some((row, count));
            }
        }

        let Some((row, _)) = target else {
            self.complete(relaxation, dive);
            return;
        };

        let candidates: Vec<usize> = dive.row_columns[row]
            .iter()
            .copied()
            .filter(|&column| self.fits(relaxation, dive, column))
            .collect();

        for index in candidates {
            // Candidates are sorted, so every later one prunes too.
            if self.prunes(bound + relaxation.reduced[index].max(0.0)) {
                break;
            }
            let column = &model.columns[index];
            dive.select(index, column);
            self.branch(relaxation, dive);
            dive.deselect(column);
            if self.canceled {
                return;
            }
        }
    }

    /// Every partition row is covered: check the full program and keep the best.
    fn complete(&mut self, relaxation: &Relaxation, dive: &Dive) {
        let mut values = vec![0.0; self.program.variables.len()];
        for &column in &dive.chosen {
            values[self.model.columns[column].var] = 1.0;
        }
        for &(var, value) in &self.model.fixed {
            values[var] = value;
        }
        for (int, &value) in self.model.integers.iter().zip(&relaxation.assignment) {
            values[int.var] = value as f64;
        }

        if !self.program.is_feasible(&values, 1e-6) {
            return;
        }
        let objective = self.program.objective_value(&values);
        if self.best.as_ref().is_none_or(|(best, _)| objective < best - EPS) {
            tracing::trace!(objective, nodes = self.nodes, "new incumbent");
            self.best = Some((objective, values));
        }
    }
}
