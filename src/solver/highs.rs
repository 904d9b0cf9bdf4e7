//! The HiGHS solver.
use super::{SolveRequest, SolveStatus, Solver, SolverOptions, SolverOutput};
use crate::error::ModelError;
use crate::log::is_solver_output_enabled;
use ::highs::{Col, HighsModelStatus, RowProblem, Sense};
use log::debug;

/// Solves programs with HiGHS, via the `highs` crate
#[derive(Clone, Copy, Debug, Default)]
pub struct HighsSolver;

fn status_from_highs(status: HighsModelStatus) -> SolveStatus {
    match status {
        HighsModelStatus::Optimal => SolveStatus::Optimal,
        HighsModelStatus::Infeasible => SolveStatus::Infeasible,
        HighsModelStatus::Unbounded => SolveStatus::Unbounded,
        HighsModelStatus::UnboundedOrInfeasible => SolveStatus::UnboundedOrInfeasible,
        status => SolveStatus::Other(format!("{status:?}")),
    }
}

/// Set HiGHS options from ours
fn apply_options(model: &mut ::highs::Model, options: &SolverOptions) {
    let output = is_solver_output_enabled();
    model.set_option("output_flag", output);
    model.set_option("log_to_console", output);
    model.set_option("presolve", if options.presolve { "on" } else { "off" });
    if let Some(time_limit) = options.time_limit {
        model.set_option("time_limit", time_limit);
    }
    if let Some(gap) = options.mip_rel_gap {
        model.set_option("mip_rel_gap", gap);
    }
}

impl Solver for HighsSolver {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(&self, request: &SolveRequest) -> Result<SolverOutput, ModelError> {
        let mut problem = RowProblem::default();

        let mut columns: Vec<Col> = Vec::with_capacity(request.program.num_columns());
        for (id, _, column) in request.program.columns() {
            let (lower, upper) = request.overrides.bounds(id, column);
            let cost = if request.feasibility_only {
                0.0
            } else {
                column.cost
            };
            let col = if column.integer {
                problem.add_integer_column(cost, lower..=upper)
            } else {
                problem.add_column(cost, lower..=upper)
            };
            columns.push(col);
        }

        let mut num_rows = 0;
        for (idx, row) in request.program.rows().iter().enumerate() {
            if !request.is_row_active(idx) {
                continue;
            }
            problem.add_row(
                row.lower..=row.upper,
                row.terms
                    .iter()
                    .map(|(column, coeff)| (columns[column.0], *coeff)),
            );
            num_rows += 1;
        }
        debug!(
            "Passing {} columns and {num_rows} rows to HiGHS",
            columns.len()
        );

        let mut model = problem.optimise(Sense::Minimise);
        apply_options(&mut model, request.options);

        let solved = model
            .try_solve()
            .map_err(|status| ModelError::SolverFailure(format!("HiGHS failed: {status:?}")))?;
        let status = status_from_highs(solved.status());
        let values = (status == SolveStatus::Optimal)
            .then(|| solved.get_solution().columns().to_vec());

        Ok(SolverOutput { status, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::keys::{ConstraintKey, ConstraintKind, VariableKey};
    use crate::formulation::program::{ColumnId, Program};
    use crate::solver::BoundOverrides;
    use float_cmp::assert_approx_eq;

    fn capacity(id: &str) -> VariableKey {
        VariableKey::Capacity(id.into())
    }

    /// min -x - y  s.t.  x + y <= 1.5, y binary, x in [0, 1]
    fn small_program() -> Program {
        let mut program = Program::default();
        let x = program.add_continuous(capacity("x"), 0.0, 1.0);
        let y = program.add_binary(capacity("y"));
        program.add_cost(x, -1.0);
        program.add_cost(y, -2.0);
        program.add_le(
            ConstraintKey::global(ConstraintKind::EmissionCap),
            [(x, 1.0), (y, 1.0)],
            1.5,
        );
        program
    }

    #[test]
    fn test_solve_optimal() {
        let program = small_program();
        let overrides = BoundOverrides::default();
        let options = SolverOptions::default();
        let output = HighsSolver
            .solve(&SolveRequest::new(&program, &overrides, &options))
            .unwrap();
        assert_eq!(output.status, SolveStatus::Optimal);
        let values = output.values.unwrap();
        assert_approx_eq!(f64, values[0], 0.5, epsilon = 1e-6);
        assert_approx_eq!(f64, values[1], 1.0, epsilon = 1e-6);
        assert_approx_eq!(f64, program.objective_value(&values), -2.5, epsilon = 1e-6);
    }

    #[test]
    fn test_solve_with_overrides_and_inactive_rows() {
        let program = small_program();
        let mut overrides = BoundOverrides::default();
        overrides.set(ColumnId(0), 0.0, 0.25);
        let options = SolverOptions::default();
        let request = SolveRequest {
            active_rows: Some(&[false]),
            ..SolveRequest::new(&program, &overrides, &options)
        };
        let values = HighsSolver.solve(&request).unwrap().values.unwrap();
        assert_approx_eq!(f64, values[0], 0.25, epsilon = 1e-6);
        assert_approx_eq!(f64, values[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_solve_infeasible() {
        let mut program = small_program();
        let x = program.col(&capacity("x"));
        program.add_ge(
            ConstraintKey::global(ConstraintKind::EmissionCap),
            [(x, 1.0)],
            2.0,
        );
        let overrides = BoundOverrides::default();
        let options = SolverOptions::default();
        let output = HighsSolver
            .solve(&SolveRequest::new(&program, &overrides, &options))
            .unwrap();
        assert!(matches!(
            output.status,
            SolveStatus::Infeasible | SolveStatus::UnboundedOrInfeasible
        ));
        assert!(output.values.is_none());
    }
}
