//! Solving a program: status classification, the bounded retry and infeasibility diagnosis.
//!
//! ```text
//! Built -> Solving -> Optimal                      -> solution
//!                  -> Unbounded / UnboundedOrInf.  -> retry with bounds patch -> Optimal | UnboundedModel
//!                                                     (retry infeasible -> conflict analysis)
//!                  -> Infeasible                   -> conflict analysis -> InfeasibleModel
//!                  -> anything else                -> SolverFailure
//! ```
use super::conflict::find_conflicts;
use super::{BoundOverrides, SolveRequest, SolveStatus, Solver, SolverOptions};
use crate::error::ModelError;
use crate::formulation::keys::{OperationKind, Trade, VariableKind};
use crate::formulation::program::Program;
use log::{info, warn};
use std::fmt::Display;

/// Upper bounds imposed on a retry after an unbounded solve.
///
/// Held as an override layer; the program's own bounds are untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundsPatch {
    /// The bound on grid trade, generation and consumption
    pub max_grid: f64,
    /// The bound on production
    pub max_production: f64,
    /// The overridden bounds
    pub overrides: BoundOverrides,
}

impl BoundsPatch {
    /// Bound every trade (electricity and natural gas), generation, consumption and production column of the program
    pub fn new(program: &Program, options: &SolverOptions) -> Self {
        let mut overrides = BoundOverrides::default();
        for (id, key, column) in program.columns() {
            let limit = match key.kind() {
                VariableKind::Trade(
                    Trade::GridPurchase | Trade::GridSale | Trade::NaturalGasPurchase,
                )
                | VariableKind::Operation(OperationKind::Generation | OperationKind::Consumption) => {
                    options.max_grid
                }
                VariableKind::Operation(OperationKind::Production) => options.max_production,
                _ => continue,
            };
            overrides.set(id, column.lower, column.upper.min(limit));
        }

        Self {
            max_grid: options.max_grid,
            max_production: options.max_production,
            overrides,
        }
    }
}

impl Display for BoundsPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} variables bounded (grid and gas trade, generation and consumption <= {}; \
             production <= {})",
            self.overrides.len(),
            self.max_grid,
            self.max_production
        )
    }
}

/// A record of one call to the solver
#[derive(Clone, Debug, PartialEq)]
pub struct SolveAttempt {
    /// Attempt number, from 1
    pub number: u32,
    /// The bounds patch in force, if any
    pub patch: Option<BoundsPatch>,
    /// The status the solver reported
    pub status: SolveStatus,
}

impl Display for SolveAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Attempt {}: {}", self.number, self.status)?;
        if let Some(patch) = &self.patch {
            write!(f, " [{patch}]")?;
        }
        Ok(())
    }
}

/// A successful solve
#[derive(Clone, Debug, PartialEq)]
pub struct SolveOutcome {
    /// Column values, indexed by [`ColumnId`](crate::formulation::program::ColumnId)
    pub values: Vec<f64>,
    /// Objective value of the program (its own objective, whatever bounds were patched)
    pub objective: f64,
    /// All attempts made, in order
    pub attempts: Vec<SolveAttempt>,
}

fn record(attempts: &mut Vec<SolveAttempt>, patch: Option<BoundsPatch>, status: &SolveStatus) {
    let attempt = SolveAttempt {
        number: attempts.len() as u32 + 1,
        patch,
        status: status.clone(),
    };
    info!("{attempt}");
    attempts.push(attempt);
}

fn into_outcome(
    program: &Program,
    values: Option<Vec<f64>>,
    attempts: Vec<SolveAttempt>,
) -> Result<SolveOutcome, ModelError> {
    let values = values.ok_or_else(|| {
        ModelError::SolverFailure("Solver reported optimality but returned no solution".into())
    })?;
    let objective = program.objective_value(&values);

    Ok(SolveOutcome {
        values,
        objective,
        attempts,
    })
}

/// Solve a program.
///
/// # Arguments
///
/// * `program` - The program, which is never modified
/// * `solver` - The solver to use
/// * `options` - Solver options, including the retry bounds and conflict-analysis budget
///
/// # Returns
///
/// The optimal solution with a record of every attempt, or one of
/// [`ModelError::UnboundedModel`], [`ModelError::InfeasibleModel`] or
/// [`ModelError::SolverFailure`].
pub fn solve(
    program: &Program,
    solver: &dyn Solver,
    options: &SolverOptions,
) -> Result<SolveOutcome, ModelError> {
    let mut attempts = Vec::new();
    let base = BoundOverrides::default();
    let output = solver.solve(&SolveRequest::new(program, &base, options))?;
    record(&mut attempts, None, &output.status);

    match output.status {
        SolveStatus::Optimal => into_outcome(program, output.values, attempts),
        SolveStatus::Unbounded | SolveStatus::UnboundedOrInfeasible => {
            let patch = BoundsPatch::new(program, options);
            warn!(
                "Program is {}; retrying with {patch}",
                output.status
            );
            let retry = solver.solve(&SolveRequest::new(program, &patch.overrides, options))?;
            record(&mut attempts, Some(patch), &retry.status);

            let unbounded = || {
                ModelError::UnboundedModel(format!(
                    "solver reported '{}', and '{}' after bounding trade, generation, \
                     consumption and production",
                    output.status, retry.status
                ))
            };
            match &retry.status {
                SolveStatus::Optimal => into_outcome(program, retry.values, attempts),
                SolveStatus::Infeasible | SolveStatus::UnboundedOrInfeasible => {
                    // Either status may hide an infeasible program
                    warn!("Bounded program is {}; checking for infeasibility", retry.status);
                    let report = find_conflicts(program, solver, options)?;
                    if report.is_empty() {
                        Err(unbounded())
                    } else {
                        Err(ModelError::InfeasibleModel(report))
                    }
                }
                _ => Err(unbounded()),
            }
        }
        SolveStatus::Infeasible => {
            warn!("Program is infeasible; searching for conflicting constraints");
            let report = find_conflicts(program, solver, options)?;
            Err(ModelError::InfeasibleModel(report))
        }
        SolveStatus::Other(status) => Err(ModelError::SolverFailure(format!(
            "{} stopped with status {status}",
            solver.name()
        ))),
    }
}
