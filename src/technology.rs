//! Technologies which can be built at the facility.
//!
//! Each technology has a tagged [`TechnologyKind`] carrying exactly the parameters its role needs.
//! Operational parameters come from `technologies.toml` and economic parameters from
//! `technology_parameters.csv`; both are validated when loaded.
use crate::error::ModelError;
use crate::id::{check_unique_ids, define_id_getter, define_id_type};
use crate::input::{input_err_msg, read_csv};
use crate::units::{Capacity, Dimensionless, MoneyPerCapacity};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

const TECHNOLOGIES_FILE_NAME: &str = "technologies.toml";
const TECHNOLOGY_PARAMETERS_FILE_NAME: &str = "technology_parameters.csv";

define_id_type! {TechnologyID}

/// A map of technologies, keyed by ID, in input order
pub type TechnologyMap = IndexMap<TechnologyID, Technology>;

/// A technology which can be built
#[derive(PartialEq, Debug, Clone)]
pub struct Technology {
    /// Unique identifier (e.g. `pv`)
    pub id: TechnologyID,
    /// The role of the technology and its operational parameters
    pub kind: TechnologyKind,
    /// Bounds on installed capacity
    pub capacity_limits: CapacityLimits,
    /// Economic parameters
    pub economics: Economics,
}
define_id_getter! {Technology, TechnologyID}

impl Technology {
    /// The category of the technology
    pub fn category(&self) -> TechnologyCategory {
        self.kind.category()
    }
}

/// Broad grouping of technologies, derived from [`TechnologyKind`]
#[derive(PartialEq, Eq, Debug, Clone, Copy, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TechnologyCategory {
    /// Electricity generation
    Generation,
    /// Storage of electricity, hydrogen or ammonia
    Storage,
    /// Conversion of one commodity into another
    Conversion,
    /// Recovery of resources from wastewater
    Recovery,
    /// Carbon capture
    Capture,
}

/// Bounds on installed capacity
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct CapacityLimits {
    /// Minimum capacity if the technology is built
    pub min: Capacity,
    /// Maximum capacity
    pub max: Capacity,
}

/// Economic parameters of a technology
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Economics {
    /// Capital cost per unit of capacity
    pub capex: MoneyPerCapacity,
    /// Lifespan in years
    pub lifespan: u32,
    /// Fixed operating cost as a fraction of capex per year
    pub fixed_opex_rate: Dimensionless,
    /// Variable operating cost per unit of activity
    pub variable_opex: f64,
}

/// The role of a technology, with the parameters that role requires
#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TechnologyKind {
    /// Weather-dependent generation
    Renewable {
        /// Which availability series drives the output
        resource: RenewableResource,
    },
    /// Fuel-fired generation with unit commitment
    Dispatchable(DispatchParameters),
    /// Storage of a commodity
    Storage(StorageParameters),
    /// Electricity to hydrogen
    Electrolysis {
        /// Electricity used per unit of hydrogen (MWh/t)
        specific_energy: f64,
    },
    /// Hydrogen to ammonia
    AmmoniaSynthesis {
        /// Hydrogen used per unit of ammonia (t/t)
        hydrogen_per_ammonia: f64,
    },
    /// Biogas from wastewater sludge
    AnaerobicDigestion,
    /// Recovery of a product from wastewater
    Recovery {
        /// The recovered product
        product: RecoveredProduct,
    },
    /// Carbon capture, sized in the first stage only
    Capture {
        /// Fraction of emissions captured
        capture_rate: f64,
    },
}

/// The resource driving a renewable technology
#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RenewableResource {
    /// Solar photovoltaic
    Pv,
    /// Wind
    Wind,
}

/// Fuel burned by a dispatchable technology
#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Fuel {
    /// Natural gas, partly offset by biogas (m³)
    NaturalGas,
    /// Hydrogen from the facility's hydrogen balance (t)
    Hydrogen,
}

/// The commodity held by a storage technology
#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageCommodity {
    /// Battery storage (MWh)
    Electricity,
    /// Hydrogen tank (t)
    Hydrogen,
    /// Ammonia tank (t)
    Ammonia,
}

/// A product recovered from wastewater
#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecoveredProduct {
    /// Reclaimed water (m³)
    Water,
    /// Nitrogen fertiliser (t)
    Nitrogen,
    /// Phosphorus fertiliser (t)
    Phosphorus,
}

fn default_min_load_fraction() -> f64 {
    0.3
}

/// Operational parameters of a dispatchable technology
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct DispatchParameters {
    /// Fuel burned
    pub fuel: Fuel,
    /// Electricity output per unit of fuel energy
    pub electric_efficiency: f64,
    /// Heat output per unit of fuel energy (combined heat and power only)
    pub thermal_efficiency: Option<f64>,
    /// Minimum stable output as a fraction of committed capacity
    #[serde(default = "default_min_load_fraction")]
    pub min_load_fraction: f64,
    /// Maximum increase in output per period as a fraction of capacity
    pub ramp_up: Option<f64>,
    /// Maximum decrease in output per period as a fraction of capacity
    pub ramp_down: Option<f64>,
    /// Minimum number of periods to stay on after a startup
    #[serde(default)]
    pub min_up_time: u8,
    /// Minimum number of periods to stay off after a shutdown
    #[serde(default)]
    pub min_down_time: u8,
}

/// Operational parameters of a storage technology
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct StorageParameters {
    /// The stored commodity
    pub commodity: StorageCommodity,
    /// Maximum charge per period as a fraction of capacity
    pub charge_rate: f64,
    /// Maximum discharge per period as a fraction of capacity
    pub discharge_rate: f64,
    /// Fraction of the stored amount lost per period
    pub self_discharge: f64,
    /// Minimum state of charge as a fraction of capacity
    pub min_level: f64,
    /// Maximum state of charge as a fraction of capacity
    pub max_level: f64,
    /// Fraction of charged amount which is stored
    pub charge_efficiency: f64,
    /// Fraction of withdrawn amount which is delivered
    pub discharge_efficiency: f64,
}

/// Check that a value lies in `(0, 1]`
fn check_fraction_nonzero(name: &str, value: f64) -> Result<()> {
    ensure!(value > 0.0 && value <= 1.0, "{name} must be > 0 and <= 1");
    Ok(())
}

/// Check that a value lies in `[0, 1]`
fn check_fraction(name: &str, value: f64) -> Result<()> {
    ensure!((0.0..=1.0).contains(&value), "{name} must be between 0 and 1");
    Ok(())
}

impl DispatchParameters {
    fn validate(&self, hours_per_day: u8) -> Result<()> {
        check_fraction_nonzero("electric_efficiency", self.electric_efficiency)?;
        if let Some(thermal) = self.thermal_efficiency {
            check_fraction("thermal_efficiency", thermal)?;
        }
        check_fraction("min_load_fraction", self.min_load_fraction)?;
        for (name, ramp) in [("ramp_up", self.ramp_up), ("ramp_down", self.ramp_down)] {
            if let Some(ramp) = ramp {
                check_fraction_nonzero(name, ramp)?;
            }
        }
        ensure!(
            self.min_up_time <= hours_per_day && self.min_down_time <= hours_per_day,
            "min_up_time and min_down_time cannot exceed the length of a day"
        );

        Ok(())
    }
}

impl StorageParameters {
    fn validate(&self) -> Result<()> {
        check_fraction_nonzero("charge_rate", self.charge_rate)?;
        check_fraction_nonzero("discharge_rate", self.discharge_rate)?;
        ensure!(
            (0.0..1.0).contains(&self.self_discharge),
            "self_discharge must be >= 0 and < 1"
        );
        check_fraction("min_level", self.min_level)?;
        check_fraction("max_level", self.max_level)?;
        ensure!(
            self.min_level <= self.max_level,
            "min_level cannot be greater than max_level"
        );
        ensure!(
            (self.min_level..=self.max_level).contains(&0.5),
            "The initial state of charge (0.5) must lie between min_level and max_level"
        );
        check_fraction_nonzero("charge_efficiency", self.charge_efficiency)?;
        check_fraction_nonzero("discharge_efficiency", self.discharge_efficiency)?;

        Ok(())
    }
}

impl TechnologyKind {
    /// The category this kind of technology belongs to
    pub fn category(&self) -> TechnologyCategory {
        match self {
            Self::Renewable { .. } | Self::Dispatchable(_) => TechnologyCategory::Generation,
            Self::Storage(_) => TechnologyCategory::Storage,
            Self::Electrolysis { .. } | Self::AmmoniaSynthesis { .. } | Self::AnaerobicDigestion => {
                TechnologyCategory::Conversion
            }
            Self::Recovery { .. } => TechnologyCategory::Recovery,
            Self::Capture { .. } => TechnologyCategory::Capture,
        }
    }

    /// Whether operating the technology depends on wastewater-plant data
    pub fn requires_wastewater_data(&self) -> bool {
        matches!(self, Self::AnaerobicDigestion | Self::Recovery { .. })
    }

    fn validate(&self, hours_per_day: u8) -> Result<()> {
        match self {
            Self::Renewable { .. } | Self::AnaerobicDigestion | Self::Recovery { .. } => {}
            Self::Dispatchable(params) => params.validate(hours_per_day)?,
            Self::Storage(params) => params.validate()?,
            Self::Electrolysis { specific_energy } => ensure!(
                specific_energy.is_finite() && *specific_energy > 0.0,
                "specific_energy must be a finite number greater than zero"
            ),
            Self::AmmoniaSynthesis {
                hydrogen_per_ammonia,
            } => check_fraction_nonzero("hydrogen_per_ammonia", *hydrogen_per_ammonia)?,
            Self::Capture { capture_rate } => check_fraction("capture_rate", *capture_rate)?,
        }

        Ok(())
    }
}

/// A technology as read from `technologies.toml`
#[derive(PartialEq, Debug, Deserialize)]
struct TechnologyRaw {
    id: TechnologyID,
    #[serde(flatten)]
    kind: TechnologyKind,
    #[serde(default)]
    min_capacity: f64,
    max_capacity: f64,
    #[serde(default)]
    variable_opex: f64,
}
define_id_getter! {TechnologyRaw, TechnologyID}

/// The contents of `technologies.toml`
#[derive(Deserialize)]
struct TechnologiesFile {
    technologies: Vec<TechnologyRaw>,
}

/// A row of `technology_parameters.csv`
#[derive(PartialEq, Debug, Deserialize)]
struct EconomicsRaw {
    technology: String,
    capex: f64,
    lifespan: u32,
    fixed_opex_rate: f64,
}

impl EconomicsRaw {
    fn into_economics(self, variable_opex: f64) -> Result<Economics> {
        ensure!(
            self.capex.is_finite() && self.capex >= 0.0,
            "capex must be a finite number >= 0"
        );
        ensure!(self.lifespan > 0, "lifespan must be greater than zero");
        check_fraction("fixed_opex_rate", self.fixed_opex_rate)?;
        ensure!(
            variable_opex.is_finite() && variable_opex >= 0.0,
            "variable_opex must be a finite number >= 0"
        );

        Ok(Economics {
            capex: MoneyPerCapacity(self.capex),
            lifespan: self.lifespan,
            fixed_opex_rate: Dimensionless(self.fixed_opex_rate),
            variable_opex,
        })
    }
}

fn check_capacity_limits(min: f64, max: f64) -> Result<CapacityLimits> {
    ensure!(
        max.is_finite() && max > 0.0,
        "max_capacity must be a finite number greater than zero"
    );
    ensure!(
        (0.0..=max).contains(&min),
        "min_capacity must be between 0 and max_capacity"
    );

    Ok(CapacityLimits {
        min: Capacity(min),
        max: Capacity(max),
    })
}

/// Combine technology records with their economic parameters
fn build_technologies(
    raw: Vec<TechnologyRaw>,
    economics: Vec<EconomicsRaw>,
    hours_per_day: u8,
) -> Result<TechnologyMap> {
    let ids = check_unique_ids(&raw)?;

    let mut economics: IndexMap<String, EconomicsRaw> = economics
        .into_iter()
        .map(|row| (row.technology.clone(), row))
        .collect();
    if let Some(unknown) = economics.keys().find(|id| !ids.contains(id.as_str())) {
        Err(ModelError::Configuration(format!(
            "Economic parameters given for unknown technology {unknown}"
        )))?;
    }

    let mut technologies = TechnologyMap::new();
    for tech in raw {
        let id = tech.id;
        let economics = economics.shift_remove(&*id.0).ok_or_else(|| {
            ModelError::Configuration(format!(
                "Missing economic parameters for technology {id} in {TECHNOLOGY_PARAMETERS_FILE_NAME}"
            ))
        })?;
        let economics = economics
            .into_economics(tech.variable_opex)
            .with_context(|| format!("Invalid economic parameters for technology {id}"))?;
        let capacity_limits = check_capacity_limits(tech.min_capacity, tech.max_capacity)
            .with_context(|| format!("Invalid capacity limits for technology {id}"))?;
        tech.kind
            .validate(hours_per_day)
            .with_context(|| format!("Invalid parameters for technology {id}"))?;

        technologies.insert(
            id.clone(),
            Technology {
                id,
                kind: tech.kind,
                capacity_limits,
                economics,
            },
        );
    }

    Ok(technologies)
}

/// Parse the contents of `technologies.toml`.
///
/// Missing or unexpected fields are reported as [`ModelError::Configuration`].
fn parse_technologies_file(contents: &str) -> Result<Vec<TechnologyRaw>> {
    let file: TechnologiesFile =
        toml::from_str(contents).map_err(|err| ModelError::Configuration(err.to_string()))?;
    Ok(file.technologies)
}

/// Read technologies from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `hours_per_day` - Length of a representative day, bounding min up/down times
///
/// # Returns
///
/// The technologies keyed by ID, in the order they appear in `technologies.toml`
pub fn read_technologies(model_dir: &Path, hours_per_day: u8) -> Result<TechnologyMap> {
    let file_path = model_dir.join(TECHNOLOGIES_FILE_NAME);
    let contents = fs::read_to_string(&file_path).with_context(|| input_err_msg(&file_path))?;
    let raw = parse_technologies_file(&contents).with_context(|| input_err_msg(&file_path))?;
    ensure!(
        !raw.is_empty(),
        "{}: no technologies defined",
        input_err_msg(&file_path)
    );

    let economics_path = model_dir.join(TECHNOLOGY_PARAMETERS_FILE_NAME);
    let economics = read_csv(&economics_path)?;

    build_technologies(raw, economics, hours_per_day)
        .with_context(|| input_err_msg(&economics_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const TECHNOLOGIES_TOML: &str = r#"
[[technologies]]
id = "pv"
kind = "renewable"
resource = "pv"
max_capacity = 100.0

[[technologies]]
id = "chp"
kind = "dispatchable"
fuel = "natural_gas"
electric_efficiency = 0.4
thermal_efficiency = 0.45
ramp_up = 0.3
ramp_down = 0.3
min_up_time = 3
min_down_time = 2
max_capacity = 20.0

[[technologies]]
id = "battery"
kind = "storage"
commodity = "electricity"
charge_rate = 0.5
discharge_rate = 0.5
self_discharge = 0.0001
min_level = 0.1
max_level = 0.9
charge_efficiency = 0.95
discharge_efficiency = 0.95
max_capacity = 200.0

[[technologies]]
id = "digester"
kind = "anaerobic_digestion"
max_capacity = 50.0
"#;

    fn economics(ids: &[&str]) -> Vec<EconomicsRaw> {
        ids.iter()
            .map(|id| EconomicsRaw {
                technology: id.to_string(),
                capex: 1000.0,
                lifespan: 20,
                fixed_opex_rate: 0.02,
            })
            .collect()
    }

    #[test]
    fn test_build_technologies() {
        let raw = parse_technologies_file(TECHNOLOGIES_TOML).unwrap();
        let technologies =
            build_technologies(raw, economics(&["pv", "chp", "battery", "digester"]), 24)
                .unwrap();

        let ids: Vec<_> = technologies.keys().map(ToString::to_string).collect();
        assert_eq!(ids, ["pv", "chp", "battery", "digester"]);

        let chp = &technologies["chp"];
        assert_eq!(chp.category(), TechnologyCategory::Generation);
        let TechnologyKind::Dispatchable(params) = &chp.kind else {
            panic!("Expected dispatchable technology");
        };
        assert_eq!(params.fuel, Fuel::NaturalGas);
        assert_eq!(params.min_load_fraction, 0.3); // default
        assert_eq!(params.min_up_time, 3);

        assert_eq!(
            technologies["battery"].category(),
            TechnologyCategory::Storage
        );
        assert!(technologies["digester"].kind.requires_wastewater_data());
        assert_eq!(
            technologies["pv"].capacity_limits,
            CapacityLimits {
                min: Capacity(0.0),
                max: Capacity(100.0)
            }
        );
    }

    #[test]
    fn test_build_technologies_missing_economics() {
        let raw = parse_technologies_file(TECHNOLOGIES_TOML).unwrap();
        let result = build_technologies(raw, economics(&["pv", "chp", "battery"]), 24);
        let error = result.unwrap_err();
        assert!(matches!(
            ModelError::find(&error),
            Some(ModelError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_technologies_unknown_economics() {
        let raw = parse_technologies_file(TECHNOLOGIES_TOML).unwrap();
        let result = build_technologies(
            raw,
            economics(&["pv", "chp", "battery", "digester", "wind"]),
            24,
        );
        assert_error!(
            result,
            "Configuration error: Economic parameters given for unknown technology wind"
        );
    }

    #[test]
    fn test_parse_technologies_missing_field() {
        // Dispatchable technologies need an electric efficiency
        let toml = r#"
[[technologies]]
id = "fuel_cell"
kind = "dispatchable"
fuel = "hydrogen"
max_capacity = 10.0
"#;
        let error = parse_technologies_file(toml).unwrap_err();
        assert!(matches!(
            ModelError::find(&error),
            Some(ModelError::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_technologies_unknown_kind() {
        let toml = r#"
[[technologies]]
id = "reactor"
kind = "fusion"
max_capacity = 10.0
"#;
        assert!(parse_technologies_file(toml).is_err());
    }

    #[test]
    fn test_storage_validate() {
        let mut params = StorageParameters {
            commodity: StorageCommodity::Hydrogen,
            charge_rate: 0.2,
            discharge_rate: 0.2,
            self_discharge: 0.001,
            min_level: 0.05,
            max_level: 0.95,
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
        };
        assert!(params.validate().is_ok());

        params.min_level = 0.96;
        assert!(params.validate().is_err());

        params.min_level = 0.6;
        assert!(params.validate().is_err()); // initial level below minimum
    }

    #[test]
    fn test_dispatch_validate() {
        let params = DispatchParameters {
            fuel: Fuel::Hydrogen,
            electric_efficiency: 0.6,
            thermal_efficiency: None,
            min_load_fraction: 0.3,
            ramp_up: Some(0.5),
            ramp_down: Some(0.5),
            min_up_time: 1,
            min_down_time: 1,
        };
        assert!(params.validate(24).is_ok());
        assert!(params.validate(0).is_err());

        let params = DispatchParameters {
            ramp_up: Some(0.0),
            ..params
        };
        assert!(params.validate(24).is_err());
    }

    #[test]
    fn test_check_capacity_limits() {
        assert!(check_capacity_limits(0.0, 10.0).is_ok());
        assert!(check_capacity_limits(10.0, 10.0).is_ok());
        assert!(check_capacity_limits(11.0, 10.0).is_err());
        assert!(check_capacity_limits(0.0, f64::INFINITY).is_err());
        assert!(check_capacity_limits(0.0, 0.0).is_err());
    }

    #[test]
    fn test_read_technologies() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(TECHNOLOGIES_FILE_NAME), TECHNOLOGIES_TOML).unwrap();
        {
            let mut file = File::create(dir.path().join(TECHNOLOGY_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "technology,capex,lifespan,fixed_opex_rate
pv,900,25,0.01
chp,1200,20,0.03
battery,228,10,0.02
digester,3000,20,0.05"
            )
            .unwrap();
        }

        let technologies = read_technologies(dir.path(), 24).unwrap();
        assert_eq!(technologies.len(), 4);
        assert_eq!(
            technologies["battery"].economics,
            Economics {
                capex: MoneyPerCapacity(228.0),
                lifespan: 10,
                fixed_opex_rate: Dimensionless(0.02),
                variable_opex: 0.0
            }
        );
    }
}
