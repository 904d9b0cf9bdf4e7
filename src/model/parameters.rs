//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::error::ModelError;
use crate::input::{deserialise_proportion, input_err_msg, read_toml};
use crate::solver::SolverOptions;
use crate::time_period::Season;
use crate::units::{Dimensionless, Emissions, MoneyPerEmissions};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_hours_per_day, u8, 24);
define_param_default!(default_unmet_demand_penalty, f64, 1000.0);
define_param_default!(default_slack_upper_bound, f64, 1000.0);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// Version string of the input data set, reported in outputs
    pub version: Option<String>,
    /// Seasons, each represented by one day
    pub seasons: Vec<Season>,
    /// Number of hourly periods in each representative day
    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: u8,
    /// Discount rate used to annualise capital costs
    #[serde(deserialize_with = "deserialise_proportion")]
    pub discount_rate: Dimensionless,
    /// Carbon-policy tags with their carbon tax, in the order they are swept
    pub carbon_policies: Vec<CarbonPolicy>,
    /// Penalty per unit of unmet heat, hydrogen or nitrogen demand
    #[serde(default = "default_unmet_demand_penalty")]
    pub unmet_demand_penalty: f64,
    /// Upper bound on each unmet-demand slack variable
    #[serde(default = "default_slack_upper_bound")]
    pub slack_upper_bound: f64,
    /// Cap on expected annual emissions for the capped objective
    pub emission_cap: Option<Emissions>,
    /// Baseline annual emissions for the cost-per-tonne-avoided KPI
    pub reference_emissions: Option<Emissions>,
    /// Physical conversion constants
    #[serde(default)]
    pub conversions: Conversions,
    /// Emission factors of purchased energy
    #[serde(default)]
    pub emission_factors: EmissionFactors,
    /// Options passed to the solver
    #[serde(default)]
    pub solver: SolverOptions,
}

/// A named carbon policy
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CarbonPolicy {
    /// The policy tag, e.g. `high_tax`
    pub name: String,
    /// The carbon tax ($/t CO2)
    pub tax: MoneyPerEmissions,
}

/// Physical conversion constants
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(default, deny_unknown_fields)]
pub struct Conversions {
    /// Heating value of natural gas and biogas methane (MWh/m³)
    pub gas_heating_value: f64,
    /// Heating value of hydrogen (MWh/t)
    pub hydrogen_heating_value: f64,
    /// Mass fraction of nitrogen in ammonia
    pub ammonia_nitrogen_fraction: f64,
}

impl Default for Conversions {
    fn default() -> Self {
        Self {
            gas_heating_value: 0.00997,
            hydrogen_heating_value: 33.33,
            ammonia_nitrogen_fraction: 0.82,
        }
    }
}

/// Emission factors of purchased energy carriers
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(default, deny_unknown_fields)]
pub struct EmissionFactors {
    /// Grid electricity (t CO2/MWh)
    pub grid: f64,
    /// Natural gas (t CO2/m³)
    pub natural_gas: f64,
}

impl Default for EmissionFactors {
    fn default() -> Self {
        Self {
            grid: 0.442,
            natural_gas: 0.000202,
        }
    }
}

/// Check that the carbon policies are valid
fn check_carbon_policies(policies: &[CarbonPolicy]) -> Result<()> {
    ensure!(!policies.is_empty(), "`carbon_policies` is empty");

    let mut names = HashSet::new();
    for policy in policies {
        ensure!(
            names.insert(policy.name.as_str()),
            "Duplicate carbon policy: {}",
            policy.name
        );
        ensure!(
            policy.tax.is_finite() && policy.tax >= MoneyPerEmissions(0.0),
            "Carbon tax for policy {} must be a finite number >= 0",
            policy.name
        );
    }

    Ok(())
}

/// Check that a parameter is finite and strictly positive
fn check_positive(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "{name} must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the conversion constants are valid
fn check_conversions(conversions: &Conversions) -> Result<()> {
    check_positive("gas_heating_value", conversions.gas_heating_value)?;
    check_positive("hydrogen_heating_value", conversions.hydrogen_heating_value)?;
    ensure!(
        conversions.ammonia_nitrogen_fraction > 0.0 && conversions.ammonia_nitrogen_fraction <= 1.0,
        "ammonia_nitrogen_fraction must be > 0 and <= 1"
    );

    Ok(())
}

/// Check that the emission factors are valid
fn check_emission_factors(factors: &EmissionFactors) -> Result<()> {
    for (name, value) in [("grid", factors.grid), ("natural_gas", factors.natural_gas)] {
        ensure!(
            value.is_finite() && value >= 0.0,
            "Emission factor {name} must be a finite number >= 0"
        );
    }

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        // seasons and hours_per_day are checked when the time index is built
        check_carbon_policies(&self.carbon_policies)?;
        check_positive("unmet_demand_penalty", self.unmet_demand_penalty)?;
        check_positive("slack_upper_bound", self.slack_upper_bound)?;
        if let Some(cap) = self.emission_cap {
            ensure!(
                cap.is_finite() && cap >= Emissions(0.0),
                "emission_cap must be a finite number >= 0"
            );
        }
        if let Some(reference) = self.reference_emissions {
            check_positive("reference_emissions", reference.value())?;
        }
        check_conversions(&self.conversions)?;
        check_emission_factors(&self.emission_factors)?;
        self.solver.validate().context("Invalid [solver] options")?;

        Ok(())
    }

    /// Look up the carbon tax for the given policy tag
    pub fn carbon_tax(&self, policy: &str) -> Result<MoneyPerEmissions, ModelError> {
        self.carbon_policies
            .iter()
            .find(|p| p.name == policy)
            .map(|p| p.tax)
            .ok_or_else(|| {
                ModelError::Configuration(format!(
                    "Unknown carbon policy '{policy}'. Known policies: {}",
                    self.carbon_policies.iter().map(|p| &p.name).join(", ")
                ))
            })
    }
}
