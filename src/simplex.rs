//! Dense two-phase simplex for the LP relaxations used by the branch and bound.
//!
//! Sized for a few dozen rows and a few thousand columns. Bland's rule picks
//! the pivots, so degenerate set-partitioning relaxations cannot cycle.

use crate::error::PlannerError;
use crate::program::Relation;

const PIVOT_EPS: f64 = 1e-9;
const FEASIBILITY_TOLERANCE: f64 = 1e-7;
const MAX_PIVOTS: usize = 200_000;

/// One row of `minimize`: `sum(coef * x[column]) <relation> rhs`.
#[derive(Debug, Clone)]
pub(crate) struct LpRow {
    pub terms: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LpOutcome {
    /// `duals[i]` is the shadow price of row `i` in the caller's orientation.
    Optimal { value: f64, duals: Vec<f64> },
    Infeasible,
    Unbounded,
}

struct Tableau {
    /// `width` coefficients then the right-hand side.
    rows: Vec<Vec<f64>>,
    /// Reduced costs, then minus the objective value.
    objective: Vec<f64>,
    basis: Vec<usize>,
    enterable: Vec<bool>,
    width: usize,
    pivots: usize,
}

impl Tableau {
    fn price(&mut self, costs: &[f64]) {
        self.objective = costs.to_vec();
        self.objective.push(0.0);
        for (row, &basic) in self.rows.iter().zip(&self.basis) {
            let cost = costs[basic];
            if cost != 0.0 {
                for (reduced, &cell) in self.objective.iter_mut().zip(row) {
                    *reduced -= cost * cell;
                }
            }
        }
    }

    fn pivot(&mut self, leave: usize, enter: usize) -> Result<(), PlannerError> {
        self.pivots += 1;
        if self.pivots > MAX_PIVOTS {
            return Err(PlannerError::Solver(format!(
                "LP relaxation did not converge within {MAX_PIVOTS} pivots"
            )));
        }

        let pivot = self.rows[leave][enter];
        for cell in &mut self.rows[leave] {
            *cell /= pivot;
        }
        let pivot_row = self.rows[leave].clone();
        for (index, row) in self.rows.iter_mut().enumerate() {
            let factor = row[enter];
            if index != leave && factor != 0.0 {
                for (cell, &p) in row.iter_mut().zip(&pivot_row) {
                    *cell -= factor * p;
                }
            }
        }
        let factor = self.objective[enter];
        if factor != 0.0 {
            for (cell, &p) in self.objective.iter_mut().zip(&pivot_row) {
                *cell -= factor * p;
            }
        }
        self.basis[leave] = enter;
        Ok(())
    }

    /// Pivots to optimality. `Ok(false)` means the objective is unbounded.
    fn optimize(&mut self) -> Result<bool, PlannerError> {
        loop {
            let Some(enter) = (0..self.width).find(|&j| self.enterable[j] && self.objective[j] < -PIVOT_EPS) else {
                return Ok(true);
            };

            let mut leave: Option<(usize, f64)> = None;
            for (index, row) in self.rows.iter().enumerate() {
                let coef = row[enter];
                if coef <= PIVOT_EPS {
                    continue;
                }
                let ratio = row[self.width] / coef;
                let better = leave.is_none_or(|(current, best)| {
                    ratio < best - PIVOT_EPS
                        || (ratio <= best + PIVOT_EPS && self.basis[index] < self.basis[current])
                });
                if better {
                    leave = Some((index, ratio));
                }
            }

            let Some((leave, _)) = leave else {
                return Ok(false);
            };
            self.pivot(leave, enter)?;
        }
    }
}

fn flipped(relation: Relation) -> Relation {
    match relation {
        Relation::Le => Relation::Ge,
        Relation::Ge => Relation::Le,
        Relation::Eq => Relation::Eq,
    }
}

/// Minimises `costs . x` subject to `rows` and `x >= 0`.
///
/// Every term must reference a column below `columns`.
pub(crate) fn minimize(columns: usize, costs: &[f64], rows: &[LpRow]) -> Result<LpOutcome, PlannerError> {
    let count = rows.len();
    // Rows are negated where needed so every right-hand side is non-negative.
    let signs: Vec<f64> = rows.iter().map(|row| if row.rhs < 0.0 { -1.0 } else { 1.0 }).collect();
    let relations: Vec<Relation> = rows
        .iter()
        .zip(&signs)
        .map(|(row, &sign)| if sign < 0.0 { flipped(row.relation) } else { row.relation })
        .collect();

    let slacks = relations.iter().filter(|&&relation| relation != Relation::Eq).count();
    let first_artificial = columns + slacks;
    let width = first_artificial + count;

    let mut cells = vec![vec![0.0; width + 1]; count];
    let mut basis = vec![0; count];
    let mut enterable = vec![true; width];
    let mut slack = columns;
    for (index, (row, &sign)) in rows.iter().zip(&signs).enumerate() {
        let line = &mut cells[index];
        for &(column, coef) in &row.terms {
            line[column] += sign * coef;
        }
        line[width] = sign * row.rhs;

        // Every row gets an artificial column; it doubles as the B^-1 column
        // the duals are read from.
        let artificial = first_artificial + index;
        line[artificial] = 1.0;
        basis[index] = artificial;
        match relations[index] {
            Relation::Le => {
                line[slack] = 1.0;
                basis[index] = slack;
                enterable[artificial] = false;
                slack += 1;
            }
            Relation::Ge => {
                line[slack] = -1.0;
                slack += 1;
            }
            Relation::Eq => {}
        }
    }

    let mut tableau = Tableau {
        rows: cells,
        objective: Vec::new(),
        basis,
        enterable,
        width,
        pivots: 0,
    };

    // Phase one: drive the artificials to zero.
    let phase_one: Vec<f64> = (0..width)
        .map(|column| if column >= first_artificial { 1.0 } else { 0.0 })
        .collect();
    tableau.price(&phase_one);
    tableau.optimize()?;
    let infeasibility: f64 = tableau
        .rows
        .iter()
        .zip(&tableau.basis)
        .filter(|&(_, &basic)| basic >= first_artificial)
        .map(|(row, _)| row[width])
        .sum();
    if infeasibility > FEASIBILITY_TOLERANCE {
        return Ok(LpOutcome::Infeasible);
    }

    for index in 0..count {
        if tableau.basis[index] < first_artificial {
            continue;
        }
        // A row with no such column is redundant; its artificial stays basic at zero.
        if let Some(enter) = (0..first_artificial).find(|&j| tableau.rows[index][j].abs() > PIVOT_EPS) {
            tableau.pivot(index, enter)?;
        }
    }
    for enterable in &mut tableau.enterable[first_artificial..] {
        *enterable = false;
    }

    let mut phase_two = costs.to_vec();
    phase_two.resize(width, 0.0);
    tableau.price(&phase_two);
    if !tableau.optimize()? {
        return Ok(LpOutcome::Unbounded);
    }

    // With a zero cost, an artificial's reduced cost is minus its row's dual.
    let duals = signs
        .iter()
        .enumerate()
        .map(|(index, &sign)| -tableau.objective[first_artificial + index] * sign)
        .collect();
    Ok(LpOutcome::Optimal {
        value: -tableau.objective[width],
        duals,
    })
}
