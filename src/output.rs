//! The module responsible for writing output data to disk.
use crate::analysis::ObjectiveComparison;
use crate::results::{OperationRow, RunResults};
use crate::technology::TechnologyID;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "wfe_nexus_results";

/// The output file name for the run report
const REPORT_FILE_NAME: &str = "report.txt";

/// The output file name for investment decisions
const INVESTMENTS_FILE_NAME: &str = "investments.csv";

/// The output file name for the plot-ready operating series
const OPERATIONS_FILE_NAME: &str = "operations.csv";

/// The output file name for the carbon-policy sweep
const SENSITIVITY_FILE_NAME: &str = "sensitivity.csv";

/// The output file name for the objective comparison
const COMPARISON_FILE_NAME: &str = "objective_comparison.txt";

/// Get the default output directory for the model at the specified path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory.
///
/// A non-empty existing directory is only replaced if `allow_overwrite` is set.
///
/// # Returns
///
/// Whether an existing directory was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut entries) = fs::read_dir(output_dir) {
        if entries.next().is_none() {
            // Empty folder
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete the folder or pass the \
             --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row of the investments CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct InvestmentRow {
    technology: TechnologyID,
    category: String,
    built: bool,
    capacity: f64,
    units: String,
    capital_cost: f64,
    annual_capital_cost: f64,
}

/// Represents a row of the sensitivity CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SensitivityRow {
    carbon_policy: String,
    carbon_tax: f64,
    total_cost: f64,
    emissions: f64,
    renewable_capacity: f64,
    battery_capacity: f64,
    electrolysis_capacity: f64,
    hydrogen_storage_capacity: f64,
}

impl SensitivityRow {
    fn new(results: &RunResults) -> Self {
        let kpis = &results.kpis;
        Self {
            carbon_policy: results.options.carbon_policy.clone(),
            carbon_tax: results.options.carbon_tax.value(),
            total_cost: kpis.total_cost.value(),
            emissions: kpis.emissions.value(),
            renewable_capacity: kpis.renewable_capacity.value(),
            battery_capacity: kpis.battery_capacity.value(),
            electrolysis_capacity: kpis.electrolysis_capacity.value(),
            hydrogen_storage_capacity: kpis.hydrogen_storage_capacity.value(),
        }
    }
}

fn write_heading(f: &mut Formatter<'_>, heading: &str) -> fmt::Result {
    writeln!(f, "\n{heading}")?;
    writeln!(f, "{}", "-".repeat(heading.chars().count()))
}

/// The text report of a run
struct Report<'a>(&'a RunResults);

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let results = self.0;
        let options = &results.options;
        let kpis = &results.kpis;

        writeln!(f, "WFE nexus planning results")?;
        writeln!(f, "==========================")?;
        writeln!(
            f,
            "Carbon policy: {} (tax: {} $/t CO2)",
            options.carbon_policy, options.carbon_tax
        )?;
        writeln!(f, "Objective: {}", options.objective)?;
        if let Some(version) = &results.data_version {
            writeln!(f, "Data version: {version}")?;
        }
        writeln!(f, "Objective value: {:.2}", results.objective_value)?;

        write_heading(f, "Investment decisions (first stage)")?;
        writeln!(f, "{:<24} {:<6} {:>14}  Units", "Technology", "Built", "Capacity")?;
        for investment in results.investments.iter().filter(|i| i.built) {
            writeln!(
                f,
                "{:<24} {:<6} {:>14.2}  {}",
                investment.technology.to_string(),
                "yes",
                investment.capacity.value(),
                investment.units
            )?;
        }
        let not_built = results.investments.iter().filter(|i| !i.built).count();
        if not_built > 0 {
            writeln!(f, "({not_built} technologies not built)")?;
        }

        write_heading(f, "Key performance indicators")?;
        writeln!(
            f,
            "Renewable capacity: {:.2} MW",
            kpis.renewable_capacity.value()
        )?;
        if let Some(share) = kpis.renewable_share {
            writeln!(f, "Renewable share of generation capacity: {share:.1}%")?;
        }
        for (name, value, units) in [
            ("H2 production", kpis.hydrogen_production, "t/year"),
            ("NH3 production", kpis.ammonia_production, "t/year"),
            ("Water reclaimed", kpis.water_reclaimed, "m³/year"),
            ("N recovery", kpis.nitrogen_recovered, "t/year"),
            ("P recovery", kpis.phosphorus_recovered, "t/year"),
            ("CO2 emissions", kpis.emissions.value(), "t/year"),
        ] {
            writeln!(f, "Annual {name}: {value:.2} {units}")?;
        }
        if let Some(cost) = kpis.cost_per_tonne_avoided {
            writeln!(f, "Cost per tonne CO2 avoided: {:.2} $/t", cost.value())?;
        }

        write_heading(f, "Cost breakdown (expected annualised, $)")?;
        for (component, cost) in &results.costs {
            writeln!(f, "{:<24} {:>16.2}", component.to_string(), cost.value())?;
        }
        writeln!(f, "{:<24} {:>16.2}", "total", kpis.total_cost.value())?;
        writeln!(
            f,
            "Capital investment: {:.2} $ (annualised: {:.2} $/year)",
            kpis.capital_investment.value(),
            kpis.annual_capital_cost.value()
        )?;

        write_heading(f, "Unmet demand (expected annual)")?;
        for (commodity, unmet) in &results.unmet_demand {
            writeln!(f, "{:<24} {unmet:>16.2}", commodity.to_string())?;
        }
        writeln!(
            f,
            "Largest electricity balance residual: {:e}",
            results.electricity_balance_residual
        )?;

        write_heading(f, "Solve attempts")?;
        for attempt in &results.attempts {
            writeln!(f, "{attempt}")?;
        }

        write_heading(
            f,
            &format!(
                "Operating profile: scenario {}, first representative day",
                results.profile_scenario
            ),
        )?;
        writeln!(
            f,
            "{:<14} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "Period", "PV", "Wind", "Dispatch", "Battery", "Grid buy", "Grid sell", "Emissions"
        )?;
        for row in &results.profile {
            writeln!(
                f,
                "{:<14} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
                row.period.to_string(),
                row.pv,
                row.wind,
                row.dispatchable,
                row.battery,
                row.grid_purchase,
                row.grid_sale,
                row.emissions
            )?;
        }

        Ok(())
    }
}

/// Render the text report for a run
pub fn render_report(results: &RunResults) -> String {
    Report(results).to_string()
}

/// Write the outputs of a single run.
///
/// # Arguments
///
/// * `run_dir` - Folder where files will be saved (must exist)
/// * `results` - Results of the run
/// * `visualise` - Whether to also write the plot-ready operating series
pub fn write_run(run_dir: &Path, results: &RunResults, visualise: bool) -> Result<()> {
    fs::write(run_dir.join(REPORT_FILE_NAME), render_report(results))?;
    write_investments(run_dir, results)?;
    if visualise {
        write_operations(run_dir, &results.operations)?;
    }

    Ok(())
}

fn write_investments(run_dir: &Path, results: &RunResults) -> Result<()> {
    let mut writer = csv::Writer::from_path(run_dir.join(INVESTMENTS_FILE_NAME))?;
    for investment in &results.investments {
        writer.serialize(InvestmentRow {
            technology: investment.technology.clone(),
            category: investment.category.to_string(),
            built: investment.built,
            capacity: investment.capacity.value(),
            units: investment.units.to_string(),
            capital_cost: investment.capital_cost.value(),
            annual_capital_cost: investment.annual_capital_cost.value(),
        })?;
    }
    writer.flush()?;

    Ok(())
}

fn write_operations(run_dir: &Path, operations: &[OperationRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(run_dir.join(OPERATIONS_FILE_NAME))?;
    for row in operations {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the results of a carbon-policy sweep to `sensitivity.csv`
pub fn write_sensitivity(output_dir: &Path, points: &[RunResults]) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_dir.join(SENSITIVITY_FILE_NAME))?;
    for results in points {
        writer.serialize(SensitivityRow::new(results))?;
    }
    writer.flush()?;

    Ok(())
}

impl Display for ObjectiveComparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let cost = &self.cost_optimal.kpis;
        let emission = &self.emission_optimal.kpis;

        writeln!(f, "Cost minimisation vs emission minimisation")?;
        writeln!(
            f,
            "Carbon policy: {}",
            self.cost_optimal.options.carbon_policy
        )?;

        write_heading(f, "Cost-optimal plan")?;
        writeln!(f, "Total annual cost: {:.2} $", cost.total_cost.value())?;
        writeln!(f, "Annual CO2 emissions: {:.2} t", cost.emissions.value())?;

        write_heading(f, "Emission-optimal plan")?;
        writeln!(f, "Total annual cost: {:.2} $", emission.total_cost.value())?;
        writeln!(f, "Annual CO2 emissions: {:.2} t", emission.emissions.value())?;
        match self.emission_reduction() {
            Some(reduction) => writeln!(f, "Emission reduction: {reduction:.1}%")?,
            None => writeln!(f, "Emission reduction: n/a (cost-optimal plan emits nothing)")?,
        }
        if let Some(price) = self.abatement_cost() {
            writeln!(f, "Implied abatement cost: {:.2} $/t CO2", price.value())?;
        }

        Ok(())
    }
}

/// Write the objective comparison to `objective_comparison.txt`
pub fn write_comparison(output_dir: &Path, comparison: &ObjectiveComparison) -> Result<()> {
    fs::write(output_dir.join(COMPARISON_FILE_NAME), comparison.to_string())?;

    Ok(())
}
