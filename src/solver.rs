//! The interface to mixed-integer solvers.
//!
//! A [`Solver`] takes a [`Program`], with optional per-attempt bound overrides and a subset of
//! active rows, and reports a [`SolveStatus`] with column values on optimality. The retry logic
//! ([`adapter`]) and infeasibility diagnosis ([`conflict`]) are written against this trait only.
use crate::error::ModelError;
use crate::formulation::program::{Column, ColumnId, Program};
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt::Display;

pub mod adapter;
pub mod conflict;
pub mod highs;

/// Name of the bundled solver
pub const DEFAULT_SOLVER: &str = "highs";

/// Options for the solver and the adapter around it (the `[solver]` table of `model.toml`)
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct SolverOptions {
    /// Which solver to use
    pub name: String,
    /// Time limit per solve, in seconds
    pub time_limit: Option<f64>,
    /// Relative MIP optimality gap
    pub mip_rel_gap: Option<f64>,
    /// Whether to run the solver's presolve
    pub presolve: bool,
    /// Upper bound on grid trade, generation and consumption when retrying an unbounded program
    pub max_grid: f64,
    /// Upper bound on production when retrying an unbounded program
    pub max_production: f64,
    /// Maximum number of conflicting constraints (and bounds) to report
    pub max_reported_conflicts: usize,
    /// Maximum number of solves spent on conflict analysis
    pub conflict_solve_budget: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_SOLVER.into(),
            time_limit: None,
            mip_rel_gap: None,
            presolve: true,
            max_grid: 1000.0,
            max_production: 10000.0,
            max_reported_conflicts: 20,
            conflict_solve_budget: 200,
        }
    }
}

impl SolverOptions {
    /// Check that the options are valid
    pub fn validate(&self) -> Result<()> {
        if let Some(time_limit) = self.time_limit {
            ensure!(
                time_limit.is_finite() && time_limit > 0.0,
                "time_limit must be a finite number greater than zero"
            );
        }
        if let Some(gap) = self.mip_rel_gap {
            ensure!((0.0..1.0).contains(&gap), "mip_rel_gap must be >= 0 and < 1");
        }
        for (name, value) in [
            ("max_grid", self.max_grid),
            ("max_production", self.max_production),
        ] {
            ensure!(
                value.is_finite() && value > 0.0,
                "{name} must be a finite number greater than zero"
            );
        }
        ensure!(
            self.conflict_solve_budget > 0,
            "conflict_solve_budget must be greater than zero"
        );

        Ok(())
    }
}

/// Bounds which replace a column's own bounds for one solve.
///
/// The program itself is never changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundOverrides(IndexMap<ColumnId, (f64, f64)>);

impl BoundOverrides {
    /// Override the bounds of a column
    pub fn set(&mut self, column: ColumnId, lower: f64, upper: f64) {
        self.0.insert(column, (lower, upper));
    }

    /// Remove the override for a column
    pub fn clear(&mut self, column: ColumnId) {
        self.0.shift_remove(&column);
    }

    /// Whether the column's bounds are overridden
    pub fn contains(&self, column: ColumnId) -> bool {
        self.0.contains_key(&column)
    }

    /// The bounds to use for a column
    pub fn bounds(&self, id: ColumnId, column: &Column) -> (f64, f64) {
        self.0
            .get(&id)
            .copied()
            .unwrap_or((column.lower, column.upper))
    }

    /// Iterate over the overridden columns and their bounds
    pub fn iter(&self) -> impl Iterator<Item = (ColumnId, (f64, f64))> + '_ {
        self.0.iter().map(|(id, bounds)| (*id, *bounds))
    }

    /// Number of overridden columns
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no column is overridden
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single request to a solver
#[derive(Clone, Copy, Debug)]
pub struct SolveRequest<'a> {
    /// The program to solve
    pub program: &'a Program,
    /// Bounds replacing those of the program
    pub overrides: &'a BoundOverrides,
    /// Which rows to include (all if `None`)
    pub active_rows: Option<&'a [bool]>,
    /// Whether to drop the objective and only look for a feasible point
    pub feasibility_only: bool,
    /// Solver options
    pub options: &'a SolverOptions,
}

impl<'a> SolveRequest<'a> {
    /// A request to solve the program as built
    pub fn new(
        program: &'a Program,
        overrides: &'a BoundOverrides,
        options: &'a SolverOptions,
    ) -> Self {
        Self {
            program,
            overrides,
            active_rows: None,
            feasibility_only: false,
            options,
        }
    }

    /// Whether the row with the given index is part of this request
    pub fn is_row_active(&self, row: usize) -> bool {
        self.active_rows.is_none_or(|active| active[row])
    }
}

/// The outcome of a solve, as reported by the solver
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// An optimal solution was found
    Optimal,
    /// The program has no feasible solution
    Infeasible,
    /// The objective is unbounded below
    Unbounded,
    /// The solver could not tell infeasibility and unboundedness apart
    UnboundedOrInfeasible,
    /// Any other status (time limit, numerical trouble, ...)
    Other(String),
}

impl Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::Infeasible => write!(f, "infeasible"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::UnboundedOrInfeasible => write!(f, "unbounded or infeasible"),
            Self::Other(status) => write!(f, "{status}"),
        }
    }
}

/// What a solver returns for a request
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOutput {
    /// Status of the solve
    pub status: SolveStatus,
    /// Column values, present when the status is optimal
    pub values: Option<Vec<f64>>,
}

/// A mixed-integer solver
pub trait Solver {
    /// The solver's name
    fn name(&self) -> &str;

    /// Minimise the program described by the request.
    ///
    /// Returns an error only if the solver could not be run at all; an infeasible or unbounded
    /// program is reported through [`SolverOutput::status`].
    fn solve(&self, request: &SolveRequest) -> Result<SolverOutput, ModelError>;
}

/// Get the solver named in the options
pub fn solver_for(options: &SolverOptions) -> Result<Box<dyn Solver>, ModelError> {
    if options.name.eq_ignore_ascii_case(DEFAULT_SOLVER) {
        return Ok(Box::new(highs::HighsSolver));
    }

    Err(ModelError::SolverUnavailable(format!(
        "Solver '{}' is not available; this build supports '{DEFAULT_SOLVER}'. \
         Set `name = \"{DEFAULT_SOLVER}\"` in the [solver] table of model.toml.",
        options.name
    )))
}
