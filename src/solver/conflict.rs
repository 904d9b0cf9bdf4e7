//! Diagnosis of infeasible programs.
//!
//! A deletion filter on the feasibility version of the program (objective dropped): an element
//! (a group of rows, a row, the bounds of a group of columns, or one column's bounds) is removed
//! and kept out if the rest is still infeasible. What survives is an irreducible infeasible subset,
//! unless the solve budget runs out first.
use super::{BoundOverrides, SolveRequest, SolveStatus, Solver, SolverOptions};
use crate::error::ModelError;
use crate::formulation::keys::{ConstraintGroup, VariableKind};
use crate::formulation::program::{ColumnId, Program, Row};
use indexmap::IndexMap;
use log::{debug, info};
use std::fmt::Display;
use strum::IntoEnumIterator;

/// The conflicting constraints and bounds of an infeasible program
#[derive(Clone, Debug, PartialEq)]
pub struct ConflictReport {
    /// Conflicting constraints, e.g. `heat_balance[winter_h00, base] >= 5`
    pub constraints: Vec<String>,
    /// Conflicting variable bounds, e.g. `capacity[pv] in [0, 200]`
    pub bounds: Vec<String>,
    /// Number of conflicts found but not listed
    pub omitted: usize,
    /// Whether the conflict set is irreducible
    pub minimal: bool,
    /// Number of solves used
    pub solves: usize,
}

impl ConflictReport {
    /// Whether no conflict was found, i.e. the program is feasible without its objective
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.bounds.is_empty() && self.omitted == 0
    }
}

impl Display for ConflictReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Conflicting constraints:")?;
        if self.constraints.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for constraint in &self.constraints {
            writeln!(f, "  {constraint}")?;
        }
        writeln!(f, "Conflicting variable bounds:")?;
        if self.bounds.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for bound in &self.bounds {
            writeln!(f, "  {bound}")?;
        }
        if self.omitted > 0 {
            writeln!(f, "  ... and {} more", self.omitted)?;
        }
        if self.minimal {
            write!(f, "The conflict set is minimal ({} solves)", self.solves)
        } else {
            write!(
                f,
                "The conflict set may not be minimal (stopped after {} solves)",
                self.solves
            )
        }
    }
}

fn describe_row(row: &Row) -> String {
    if row.lower == row.upper {
        format!("{} = {}", row.key, row.upper)
    } else if row.lower == f64::NEG_INFINITY {
        format!("{} <= {}", row.key, row.upper)
    } else if row.upper == f64::INFINITY {
        format!("{} >= {}", row.key, row.lower)
    } else {
        format!("{} in [{}, {}]", row.key, row.lower, row.upper)
    }
}

/// The state of the deletion filter
struct Filter<'a> {
    program: &'a Program,
    solver: &'a dyn Solver,
    options: &'a SolverOptions,
    active_rows: Vec<bool>,
    relaxed: BoundOverrides,
    solves: usize,
    exhausted: bool,
}

impl<'a> Filter<'a> {
    fn new(program: &'a Program, solver: &'a dyn Solver, options: &'a SolverOptions) -> Self {
        Self {
            program,
            solver,
            options,
            active_rows: vec![true; program.num_rows()],
            relaxed: BoundOverrides::default(),
            solves: 0,
            exhausted: false,
        }
    }

    /// Whether the current subset is infeasible.
    ///
    /// `None` once the budget is spent. Statuses other than infeasible count as feasible, so the
    /// element under test is kept.
    fn is_infeasible(&mut self) -> Result<Option<bool>, ModelError> {
        if self.solves >= self.options.conflict_solve_budget {
            self.exhausted = true;
            return Ok(None);
        }
        self.solves += 1;

        let request = SolveRequest {
            active_rows: Some(self.active_rows.as_slice()),
            feasibility_only: true,
            ..SolveRequest::new(self.program, &self.relaxed, self.options)
        };
        let output = self.solver.solve(&request)?;
        Ok(Some(matches!(
            output.status,
            SolveStatus::Infeasible | SolveStatus::UnboundedOrInfeasible
        )))
    }

    /// Drop the given rows if the rest is still infeasible
    fn try_drop_rows(&mut self, rows: &[usize]) -> Result<bool, ModelError> {
        for &row in rows {
            self.active_rows[row] = false;
        }
        if self.is_infeasible()? == Some(true) {
            return Ok(true);
        }
        for &row in rows {
            self.active_rows[row] = true;
        }

        Ok(false)
    }

    /// Relax the bounds of the given columns if the rest is still infeasible
    fn try_relax_columns(&mut self, columns: &[ColumnId]) -> Result<bool, ModelError> {
        for &column in columns {
            self.relaxed.set(column, f64::NEG_INFINITY, f64::INFINITY);
        }
        if self.is_infeasible()? == Some(true) {
            return Ok(true);
        }
        for &column in columns {
            self.relaxed.clear(column);
        }

        Ok(false)
    }

    fn active_row_indices(&self) -> Vec<usize> {
        (0..self.active_rows.len())
            .filter(|&row| self.active_rows[row])
            .collect()
    }

    fn filter_groups(&mut self) -> Result<(), ModelError> {
        for group in ConstraintGroup::iter() {
            let rows: Vec<_> = self
                .active_row_indices()
                .into_iter()
                .filter(|&row| self.program.rows()[row].key.group() == group)
                .collect();
            if !rows.is_empty() && self.try_drop_rows(&rows)? {
                debug!("Dropped constraint group {group}");
            }
            if self.exhausted {
                break;
            }
        }

        Ok(())
    }

    fn filter_rows(&mut self) -> Result<(), ModelError> {
        for row in self.active_row_indices() {
            if self.exhausted {
                break;
            }
            self.try_drop_rows(&[row])?;
        }

        Ok(())
    }

    /// Relax the bounds of columns which appear in no active row; they cannot conflict
    fn relax_unused_columns(&mut self) {
        let mut used = vec![false; self.program.num_columns()];
        for (row, active) in self.program.rows().iter().zip(&self.active_rows) {
            if *active {
                for (column, _) in &row.terms {
                    used[column.0] = true;
                }
            }
        }
        for (column, _, _) in self.program.columns() {
            if !used[column.0] {
                self.relaxed.set(column, f64::NEG_INFINITY, f64::INFINITY);
            }
        }
    }

    fn filter_bound_groups(&mut self) -> Result<(), ModelError> {
        let mut groups: IndexMap<VariableKind, Vec<ColumnId>> = IndexMap::new();
        for (column, key, _) in self.program.columns() {
            if !self.relaxed.contains(column) {
                groups.entry(key.kind()).or_default().push(column);
            }
        }

        for (kind, columns) in groups {
            if self.exhausted {
                break;
            }
            if self.try_relax_columns(&columns)? {
                debug!("Relaxed bounds of all {kind} variables");
            }
        }

        Ok(())
    }

    fn filter_columns(&mut self) -> Result<(), ModelError> {
        let columns: Vec<_> = self
            .program
            .columns()
            .map(|(column, _, _)| column)
            .filter(|column| !self.relaxed.contains(*column))
            .collect();
        for column in columns {
            if self.exhausted {
                break;
            }
            self.try_relax_columns(&[column])?;
        }

        Ok(())
    }

    fn into_report(self) -> ConflictReport {
        let max = self.options.max_reported_conflicts;
        let constraints: Vec<_> = self
            .program
            .rows()
            .iter()
            .zip(&self.active_rows)
            .filter(|(_, active)| **active)
            .map(|(row, _)| describe_row(row))
            .collect();
        let bounds: Vec<_> = self
            .program
            .columns()
            .filter(|(column, _, _)| !self.relaxed.contains(*column))
            .map(|(_, key, column)| format!("{key} in [{}, {}]", column.lower, column.upper))
            .collect();
        let total = constraints.len() + bounds.len();

        let constraints: Vec<_> = constraints.into_iter().take(max).collect();
        let bounds: Vec<_> = bounds.into_iter().take(max).collect();
        let omitted = total - constraints.len() - bounds.len();

        ConflictReport {
            constraints,
            bounds,
            omitted,
            minimal: !self.exhausted,
            solves: self.solves,
        }
    }
}

/// Find a small set of constraints and bounds which together make the program infeasible.
///
/// # Arguments
///
/// * `program` - An infeasible program
/// * `solver` - The solver to test subsets with
/// * `options` - Solver options, giving the solve budget and how many conflicts to report
pub fn find_conflicts(
    program: &Program,
    solver: &dyn Solver,
    options: &SolverOptions,
) -> Result<ConflictReport, ModelError> {
    let mut filter = Filter::new(program, solver, options);

    // The objective can make a feasible program look infeasible-or-unbounded, so check first
    if filter.is_infeasible()? == Some(false) {
        info!("Program is feasible once the objective is dropped");
        return Ok(ConflictReport {
            constraints: Vec::new(),
            bounds: Vec::new(),
            omitted: 0,
            minimal: false,
            solves: filter.solves,
        });
    }

    filter.filter_groups()?;
    filter.filter_rows()?;
    filter.relax_unused_columns();
    filter.filter_bound_groups()?;
    filter.filter_columns()?;

    let report = filter.into_report();
    info!(
        "Conflict analysis used {} solves and found {} constraints and {} bounds",
        report.solves,
        report.constraints.len(),
        report.bounds.len()
    );

    Ok(report)
}
