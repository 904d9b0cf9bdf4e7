//! Scenarios of renewable availability, demand and prices.
//!
//! Each scenario has a probability and three series indexed by [`TimePeriod`], read from
//! `renewable_<scenario>.csv`, `demand_<scenario>.csv` and `price_<scenario>.csv`. Every series must
//! cover each period of the [`TimeIndex`] exactly once.
use crate::error::ModelError;
use crate::id::{define_id_getter, define_id_type};
use crate::input::{input_err_msg, read_csv};
use crate::technology::RenewableResource;
use crate::time_period::{TimeIndex, TimePeriod};
use crate::units::Dimensionless;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

const SCENARIOS_FILE_NAME: &str = "scenarios.csv";

/// Allowed deviation of the sum of scenario probabilities from one
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

define_id_type! {ScenarioID}

/// A map of scenarios, keyed by ID, in input order
pub type ScenarioMap = IndexMap<ScenarioID, Scenario>;

/// A realisation of the uncertain inputs
#[derive(PartialEq, Debug, Clone)]
pub struct Scenario {
    /// Unique identifier (e.g. `high_renewable`)
    pub id: ScenarioID,
    /// Probability of the scenario
    pub probability: Dimensionless,
    /// Inputs for each period, in time-index order
    pub periods: IndexMap<TimePeriod, PeriodData>,
}
define_id_getter! {Scenario, ScenarioID}

impl Scenario {
    /// The inputs for the given period
    pub fn period(&self, period: &TimePeriod) -> &PeriodData {
        &self.periods[period]
    }
}

/// The inputs of a scenario for a single period
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct PeriodData {
    /// Renewable availability
    pub availability: Availability,
    /// Demand
    pub demand: Demand,
    /// Prices
    pub prices: Prices,
}

/// Renewable availability as a fraction of installed capacity
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Availability {
    /// Solar photovoltaic
    pub pv: f64,
    /// Wind
    pub wind: f64,
}

impl Availability {
    /// The availability of the given resource
    pub fn for_resource(&self, resource: RenewableResource) -> f64 {
        match resource {
            RenewableResource::Pv => self.pv,
            RenewableResource::Wind => self.wind,
        }
    }
}

/// Demand per period
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Demand {
    /// Electricity (MWh)
    pub electricity: f64,
    /// Heat (MWh)
    pub heat: f64,
    /// Water (m³)
    pub water: f64,
    /// Nitrogen fertiliser (t)
    pub fertilizer_n: f64,
    /// Hydrogen (t)
    pub hydrogen: f64,
}

/// Prices per unit of each traded commodity
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Prices {
    /// Grid electricity purchase ($/MWh)
    pub electricity_buy: f64,
    /// Grid electricity sale ($/MWh)
    pub electricity_sell: f64,
    /// Natural gas ($/m³)
    pub natural_gas: f64,
    /// Ammonia ($/t)
    pub ammonia: f64,
    /// Reclaimed water ($/m³)
    pub reclaimed_water: f64,
    /// Nitrogen fertiliser ($/t)
    pub fertilizer_n: f64,
    /// Phosphorus fertiliser ($/t)
    pub fertilizer_p: f64,
}

/// A row of `scenarios.csv`
#[derive(PartialEq, Debug, Deserialize)]
struct ScenarioRaw {
    scenario: ScenarioID,
    probability: f64,
}

/// A row of `renewable_<scenario>.csv`
#[derive(Deserialize)]
struct AvailabilityRow {
    time_period: TimePeriod,
    pv_availability: f64,
    wind_availability: f64,
}

/// A row of `demand_<scenario>.csv`
#[derive(Deserialize)]
struct DemandRow {
    time_period: TimePeriod,
    electricity_demand: f64,
    heat_demand: f64,
    water_demand: f64,
    fertilizer_n_demand: f64,
    hydrogen_demand: f64,
}

impl DemandRow {
    fn into_demand(self) -> (TimePeriod, Demand) {
        let demand = Demand {
            electricity: self.electricity_demand,
            heat: self.heat_demand,
            water: self.water_demand,
            fertilizer_n: self.fertilizer_n_demand,
            hydrogen: self.hydrogen_demand,
        };
        (self.time_period, demand)
    }
}

/// A row of `price_<scenario>.csv`
#[derive(Deserialize)]
struct PriceRow {
    time_period: TimePeriod,
    electricity_buy_price: f64,
    electricity_sell_price: f64,
    natural_gas_price: f64,
    ammonia_price: f64,
    reclaimed_water_price: f64,
    fertilizer_n_price: f64,
    fertilizer_p_price: f64,
}

impl PriceRow {
    fn into_prices(self) -> (TimePeriod, Prices) {
        let prices = Prices {
            electricity_buy: self.electricity_buy_price,
            electricity_sell: self.electricity_sell_price,
            natural_gas: self.natural_gas_price,
            ammonia: self.ammonia_price,
            reclaimed_water: self.reclaimed_water_price,
            fertilizer_n: self.fertilizer_n_price,
            fertilizer_p: self.fertilizer_p_price,
        };
        (self.time_period, prices)
    }
}

/// Check that scenario probabilities are valid and sum to one.
///
/// # Returns
///
/// A [`ModelError::DataShape`] if any probability lies outside `[0, 1]` or the sum deviates from
/// one by more than [`PROBABILITY_TOLERANCE`].
pub fn check_probabilities<'a, I>(probabilities: I) -> Result<(), ModelError>
where
    I: IntoIterator<Item = (&'a ScenarioID, f64)>,
{
    let mut total = 0.0;
    for (id, probability) in probabilities {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ModelError::DataShape(format!(
                "Probability of scenario {id} must be between 0 and 1, got {probability}"
            )));
        }
        total += probability;
    }

    if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(ModelError::DataShape(format!(
            "Scenario probabilities must sum to 1, but sum to {total}"
        )));
    }

    Ok(())
}

/// Arrange per-period values in time-index order, checking they cover the index exactly once.
///
/// Any missing, unknown or repeated period is a [`ModelError::DataShape`].
fn index_by_period<T>(
    rows: impl IntoIterator<Item = (TimePeriod, T)>,
    time_index: &TimeIndex,
) -> Result<IndexMap<TimePeriod, T>, ModelError> {
    let mut by_period = IndexMap::new();
    for (period, value) in rows {
        if !time_index.contains(&period) {
            return Err(ModelError::DataShape(format!(
                "Unknown time period {period}"
            )));
        }
        if by_period.insert(period.clone(), value).is_some() {
            return Err(ModelError::DataShape(format!(
                "Time period {period} appears more than once"
            )));
        }
    }

    let missing: Vec<_> = time_index
        .iter()
        .filter(|period| !by_period.contains_key(period))
        .map(|period| period.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ModelError::DataShape(format!(
            "Expected {} time periods, found {} (missing: {})",
            time_index.len(),
            by_period.len(),
            missing.join(", ")
        )));
    }

    // Reorder to match the time index
    Ok(time_index
        .iter()
        .filter_map(|period| {
            let value = by_period.shift_remove(&period)?;
            Some((period, value))
        })
        .collect())
}

fn check_availability(row: &AvailabilityRow) -> Result<()> {
    for (name, value) in [
        ("pv_availability", row.pv_availability),
        ("wind_availability", row.wind_availability),
    ] {
        ensure!(
            (0.0..=1.0).contains(&value),
            "{name} for {} must be between 0 and 1",
            row.time_period
        );
    }

    Ok(())
}

fn check_demand(period: &TimePeriod, demand: &Demand) -> Result<()> {
    ensure!(
        [
            demand.electricity,
            demand.heat,
            demand.water,
            demand.fertilizer_n,
            demand.hydrogen
        ]
        .iter()
        .all(|value| value.is_finite() && *value >= 0.0),
        "Demand for {period} must be finite and non-negative"
    );

    Ok(())
}

fn check_prices(period: &TimePeriod, prices: &Prices) -> Result<()> {
    ensure!(
        [
            prices.electricity_buy,
            prices.electricity_sell,
            prices.natural_gas,
            prices.ammonia,
            prices.reclaimed_water,
            prices.fertilizer_n,
            prices.fertilizer_p
        ]
        .iter()
        .all(|value| value.is_finite()),
        "Prices for {period} must be finite"
    );

    Ok(())
}

/// Read a per-period series for one scenario
fn read_series<R, T, F>(
    file_path: &Path,
    time_index: &TimeIndex,
    convert: F,
) -> Result<IndexMap<TimePeriod, T>>
where
    R: serde::de::DeserializeOwned,
    F: Fn(R) -> Result<(TimePeriod, T)>,
{
    let rows: Vec<R> = read_csv(file_path)?;
    let rows = rows
        .into_iter()
        .map(convert)
        .collect::<Result<Vec<_>>>()
        .with_context(|| input_err_msg(file_path))?;

    Ok(index_by_period(rows, time_index).with_context(|| input_err_msg(file_path))?)
}

/// Read the three series of a single scenario
fn read_scenario_series(
    model_dir: &Path,
    id: &ScenarioID,
    time_index: &TimeIndex,
) -> Result<IndexMap<TimePeriod, PeriodData>> {
    let availability = read_series(
        &model_dir.join(format!("renewable_{id}.csv")),
        time_index,
        |row: AvailabilityRow| {
            check_availability(&row)?;
            Ok((
                row.time_period,
                Availability {
                    pv: row.pv_availability,
                    wind: row.wind_availability,
                },
            ))
        },
    )?;
    let demand = read_series(
        &model_dir.join(format!("demand_{id}.csv")),
        time_index,
        |row: DemandRow| {
            let (period, demand) = row.into_demand();
            check_demand(&period, &demand)?;
            Ok((period, demand))
        },
    )?;
    let prices = read_series(
        &model_dir.join(format!("price_{id}.csv")),
        time_index,
        |row: PriceRow| {
            let (period, prices) = row.into_prices();
            check_prices(&period, &prices)?;
            Ok((period, prices))
        },
    )?;

    // All three series are in time-index order
    Ok(availability
        .into_iter()
        .zip(demand.into_values())
        .zip(prices.into_values())
        .map(|(((period, availability), demand), prices)| {
            let data = PeriodData {
                availability,
                demand,
                prices,
            };
            (period, data)
        })
        .collect())
}

/// Read scenarios and their series from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `time_index` - The periods each series must cover
///
/// # Returns
///
/// The scenarios keyed by ID, in the order they appear in `scenarios.csv`
pub fn read_scenarios(model_dir: &Path, time_index: &TimeIndex) -> Result<ScenarioMap> {
    let file_path = model_dir.join(SCENARIOS_FILE_NAME);
    let raw: Vec<ScenarioRaw> = read_csv(&file_path)?;

    let mut ids = HashSet::new();
    for row in &raw {
        ensure!(
            ids.insert(row.scenario.clone()),
            "{}: duplicate scenario {}",
            input_err_msg(&file_path),
            row.scenario
        );
    }
    check_probabilities(raw.iter().map(|row| (&row.scenario, row.probability)))
        .with_context(|| input_err_msg(&file_path))?;

    let mut scenarios = ScenarioMap::new();
    for row in raw {
        let periods = read_scenario_series(model_dir, &row.scenario, time_index)
            .with_context(|| format!("Failed to read series for scenario {}", row.scenario))?;
        scenarios.insert(
            row.scenario.clone(),
            Scenario {
                id: row.scenario,
                probability: Dimensionless(row.probability),
                periods,
            },
        );
    }

    Ok(scenarios)
}
