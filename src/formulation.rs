//! Builds the two-stage stochastic mixed-integer program for a model.
//!
//! First-stage decisions (which technologies to build and their capacity) are shared by every
//! scenario. Second-stage decisions (dispatch, storage, conversion, trade) are made per period and
//! scenario, and the objective weights each scenario's operating cost by its probability.
//!
//! All constraints are linear; products of capacity and a binary commitment decision are
//! linearised exactly with the technology's maximum capacity as big-M.
use crate::error::ModelError;
use crate::model::Model;
use crate::technology::Technology;
use crate::units::MoneyPerEmissions;
use log::{debug, info};

pub mod balance;
pub mod constraints;
pub mod keys;
pub mod objective;
pub mod program;
pub mod variables;

use keys::{OperationKey, PeriodKey};
pub use objective::ObjectiveKind;
pub use program::Program;

/// The choices which define a single planning run
#[derive(Clone, Debug, PartialEq)]
pub struct PlanningOptions {
    /// The carbon-policy tag
    pub carbon_policy: String,
    /// The carbon tax of the policy
    pub carbon_tax: MoneyPerEmissions,
    /// What to minimise
    pub objective: ObjectiveKind,
}

impl PlanningOptions {
    /// Create options for the given carbon policy, which must be defined by the model
    pub fn new(
        model: &Model,
        carbon_policy: &str,
        objective: ObjectiveKind,
    ) -> Result<Self, ModelError> {
        let carbon_tax = model.parameters.carbon_tax(carbon_policy)?;
        Ok(Self {
            carbon_policy: carbon_policy.to_string(),
            carbon_tax,
            objective,
        })
    }

    /// A name for the run, e.g. `high_tax_minimize_cost`
    pub fn run_name(&self) -> String {
        format!("{}_{}", self.carbon_policy, self.objective)
    }
}

/// Every (period, scenario) pair, scenario by scenario
pub fn period_keys(model: &Model) -> impl Iterator<Item = PeriodKey> + '_ {
    model.scenarios.keys().flat_map(move |scenario| {
        model.time_index.iter().map(move |period| PeriodKey {
            period,
            scenario: scenario.clone(),
        })
    })
}

/// Every technology for each (period, scenario) pair
pub fn operation_keys(model: &Model) -> impl Iterator<Item = (&Technology, OperationKey)> + '_ {
    period_keys(model).flat_map(move |slot| {
        model.technologies.values().map(move |tech| {
            let key = OperationKey::new(&tech.id, &slot.period, &slot.scenario);
            (tech, key)
        })
    })
}

/// Build the program for a model.
///
/// # Arguments
///
/// * `model` - The model
/// * `options` - Carbon policy and objective of the run
///
/// # Returns
///
/// The program, ready to be handed to a solver, or a [`ModelError::Configuration`] if the
/// objective needs a parameter the model does not define.
pub fn build_program(model: &Model, options: &PlanningOptions) -> Result<Program, ModelError> {
    let mut program = Program::default();
    variables::add_variables(&mut program, model);
    constraints::add_technology_constraints(&mut program, model);
    balance::add_balance_constraints(&mut program, model);
    objective::set_objective(&mut program, model, options.objective, options.carbon_tax)?;

    info!(
        "Built program for {} with {} variables and {} constraints",
        options.run_name(),
        program.num_columns(),
        program.num_rows()
    );
    debug!(
        "{} binary variables",
        program.columns().filter(|(_, _, col)| col.integer).count()
    );

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use rstest::rstest;

    #[rstest]
    fn test_planning_options(model: Model) {
        let options = PlanningOptions::new(&model, "high_tax", ObjectiveKind::MinimizeCost).unwrap();
        assert_eq!(options.carbon_tax, MoneyPerEmissions(60.0));
        assert_eq!(options.run_name(), "high_tax_minimize_cost");

        assert!(matches!(
            PlanningOptions::new(&model, "zero_carbon", ObjectiveKind::MinimizeCost),
            Err(ModelError::Configuration(_))
        ));
    }

    #[rstest]
    fn test_build_program(model: Model) {
        let options = PlanningOptions::new(&model, "no_tax", ObjectiveKind::MinimizeCost).unwrap();
        let program = build_program(&model, &options).unwrap();
        assert!(program.num_columns() > 0);

        let keys: Vec<_> = program.columns().map(|(_, key, _)| key.clone()).collect();
        let rebuilt = build_program(&model, &options).unwrap();
        let rebuilt_keys: Vec<_> = rebuilt.columns().map(|(_, key, _)| key.clone()).collect();
        assert_eq!(keys, rebuilt_keys);
        assert_eq!(program.rows(), rebuilt.rows());
    }

    #[rstest]
    fn test_operation_keys(model: Model) {
        // Two technologies, one period, one scenario
        assert_eq!(period_keys(&model).count(), 1);
        assert_eq!(operation_keys(&model).count(), 2);
    }
}
