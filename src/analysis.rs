//! Planning runs: a single run, a carbon-policy sweep and a comparison of objectives.
use crate::error::ModelError;
use crate::formulation::{ObjectiveKind, PlanningOptions, build_program};
use crate::model::Model;
use crate::output::{write_comparison, write_run, write_sensitivity};
use crate::results::{RunResults, extract_results};
use crate::solver::adapter::solve;
use crate::solver::solver_for;
use crate::units::MoneyPerEmissions;
use anyhow::{Context, Result, bail};
use log::{error, info};
use std::fs;
use std::path::Path;

/// Build, solve and extract the results of one run, without writing anything
pub fn plan(model: &Model, options: &PlanningOptions) -> Result<RunResults, ModelError> {
    info!("Planning run: {}", options.run_name());
    let program = build_program(model, options)?;
    let solver = solver_for(&model.parameters.solver)?;
    let outcome = solve(&program, solver.as_ref(), &model.parameters.solver)?;

    Ok(extract_results(model, &program, options, outcome))
}

/// The carbon policy used when none is given: the first one listed in the model file
pub fn default_carbon_policy(model: &Model) -> &str {
    model
        .parameters
        .carbon_policies
        .first()
        .map(|policy| policy.name.as_str())
        .expect("Model has no carbon policies")
}

/// Plan a run and write its outputs to a subfolder of `output_dir` named after the run
fn plan_and_write(
    model: &Model,
    options: &PlanningOptions,
    output_dir: &Path,
    visualise: bool,
) -> Result<RunResults> {
    let results = plan(model, options)?;

    let run_dir = output_dir.join(options.run_name());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;
    write_run(&run_dir, &results, visualise)
        .with_context(|| format!("Failed to write outputs to {}", run_dir.display()))?;
    info!(
        "Run {} complete: total cost {:.2} $, emissions {:.2} t CO2",
        options.run_name(),
        results.kpis.total_cost.value(),
        results.kpis.emissions.value()
    );

    Ok(results)
}

/// Perform a single planning run.
///
/// # Arguments
///
/// * `model` - The model to plan
/// * `carbon_policy` - The carbon-policy tag, which must be defined by the model
/// * `objective` - What to minimise
/// * `output_dir` - Where to write results (must exist)
/// * `visualise` - Whether to write the plot-ready operating series
pub fn run_single(
    model: &Model,
    carbon_policy: &str,
    objective: ObjectiveKind,
    output_dir: &Path,
    visualise: bool,
) -> Result<RunResults> {
    let options = PlanningOptions::new(model, carbon_policy, objective)?;
    plan_and_write(model, &options, output_dir, visualise)
}

/// Plan the cost-minimising investment under every carbon policy of the model.
///
/// A failed run is logged and the sweep carries on; the sweep as a whole fails if any run did,
/// after `sensitivity.csv` has been written for the runs which succeeded.
pub fn run_sweep(model: &Model, output_dir: &Path, visualise: bool) -> Result<Vec<RunResults>> {
    let mut points = Vec::new();
    let mut failed = Vec::new();
    for policy in &model.parameters.carbon_policies {
        let options = PlanningOptions {
            carbon_policy: policy.name.clone(),
            carbon_tax: policy.tax,
            objective: ObjectiveKind::MinimizeCost,
        };
        match plan_and_write(model, &options, output_dir, visualise) {
            Ok(results) => points.push(results),
            Err(err) => {
                error!("Run {} failed: {err:?}", options.run_name());
                failed.push(policy.name.as_str());
            }
        }
    }

    write_sensitivity(output_dir, &points).context("Failed to write sensitivity results")?;
    if !failed.is_empty() {
        bail!(
            "{} of {} carbon-policy runs failed: {}",
            failed.len(),
            model.parameters.carbon_policies.len(),
            failed.join(", ")
        );
    }

    Ok(points)
}

/// The cost-optimal and emission-optimal plans under one carbon policy
#[derive(Debug, Clone)]
pub struct ObjectiveComparison {
    /// The plan which minimises expected annualised cost
    pub cost_optimal: RunResults,
    /// The plan which minimises expected annual emissions
    pub emission_optimal: RunResults,
}

impl ObjectiveComparison {
    /// Emission reduction of the emission-optimal plan, as a percentage of the cost-optimal plan's
    /// emissions. `None` if the cost-optimal plan has no emissions.
    pub fn emission_reduction(&self) -> Option<f64> {
        let baseline = self.cost_optimal.kpis.emissions.value();
        let emissions = self.emission_optimal.kpis.emissions.value();
        (baseline > 0.0).then(|| 100.0 * (baseline - emissions) / baseline)
    }

    /// Extra cost per tonne of emissions avoided by the emission-optimal plan.
    ///
    /// `None` unless the emission-optimal plan actually emits less.
    pub fn abatement_cost(&self) -> Option<MoneyPerEmissions> {
        let avoided = self.cost_optimal.kpis.emissions - self.emission_optimal.kpis.emissions;
        (avoided.value() > 0.0).then(|| {
            (self.emission_optimal.kpis.total_cost - self.cost_optimal.kpis.total_cost) / avoided
        })
    }
}

/// Plan under the same carbon policy twice, minimising cost and then emissions
pub fn compare_objectives(
    model: &Model,
    carbon_policy: &str,
    output_dir: &Path,
    visualise: bool,
) -> Result<ObjectiveComparison> {
    let cost_optimal = run_single(
        model,
        carbon_policy,
        ObjectiveKind::MinimizeCost,
        output_dir,
        visualise,
    )?;
    let emission_optimal = run_single(
        model,
        carbon_policy,
        ObjectiveKind::MinimizeEmissions,
        output_dir,
        visualise,
    )?;

    let comparison = ObjectiveComparison {
        cost_optimal,
        emission_optimal,
    };
    write_comparison(output_dir, &comparison).context("Failed to write objective comparison")?;
    if let Some(reduction) = comparison.emission_reduction() {
        info!("Emission-optimal plan reduces emissions by {reduction:.1}%");
    }

    Ok(comparison)
}
