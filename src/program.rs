//! Integer-program model handed to a solver backend.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Index of a variable within its [`IntegerProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    /// 0 or 1.
    Binary,
    /// Any integer in `lower..=upper` (unbounded above when `upper` is `None`).
    Integer { lower: i64, upper: Option<i64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Relation::Eq => "=",
            Relation::Le => "<=",
            Relation::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// Linear row `sum(coefficient * var) <relation> rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    /// Whether `values` satisfy this row within `tolerance`.
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs: f64 = self.terms.iter().map(|(var, coef)| coef * values[var.0]).sum();
        match self.relation {
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
            Relation::Le => lhs <= self.rhs + tolerance,
            Relation::Ge => lhs >= self.rhs - tolerance,
        }
    }
}

/// A minimisation problem over integer variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegerProgram {
    pub name: String,
    pub variables: Vec<Variable>,
    /// Objective coefficient per variable, aligned with `variables`.
    pub objective: Vec<f64>,
    pub constraints: Vec<Constraint>,
}

impl IntegerProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_variable(&mut self, name: impl Into<String>, kind: VarKind, cost: f64) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name: name.into(),
            kind,
        });
        self.objective.push(cost);
        id
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        relation: Relation,
        rhs: f64,
    ) {
        self.constraints.push(Constraint {
            name: name.into(),
            terms,
            relation,
            rhs,
        });
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.iter().zip(values).map(|(c, v)| c * v).sum()
    }

    /// Whether `values` respect every variable domain and constraint.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let in_domain = self.variables.iter().zip(values).all(|(var, &value)| {
            if (value - value.round()).abs() > tolerance {
                return false;
            }
            match var.kind {
                VarKind::Binary => value >= -tolerance && value <= 1.0 + tolerance,
                VarKind::Integer { lower, upper } => {
                    value >= lower as f64 - tolerance
                        && upper.is_none_or(|upper| value <= upper as f64 + tolerance)
                }
            }
        });
        in_domain && self.constraints.iter().all(|row| row.is_satisfied(values, tolerance))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Canceled,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Canceled => "canceled",
        };
        f.write_str(label)
    }
}

/// Solver answer. `values` is aligned with the program's variables and is
/// only meaningful for `Optimal`.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: SolveStatus,
    pub values: Vec<f64>,
    pub objective: Option<f64>,
}

impl Solution {
    pub fn without_values(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: None,
        }
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(var.0).copied()
    }
}

/// Cooperative cancellation flag shared between the caller and a running solve.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
