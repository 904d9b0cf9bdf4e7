//! Summary data for the wastewater-treatment plant the facility is attached to.
//!
//! The plant's influent is a fixed input stream: it sets the biogas available from anaerobic
//! digestion, the resources which can be recovered and the plant's own electricity use.
use crate::input::{input_err_msg, read_csv_optional};
use crate::technology::RecoveredProduct;
use anyhow::{Result, ensure};
use serde::Deserialize;
use std::path::Path;

const WASTEWATER_FILE_NAME: &str = "wwtp_data.csv";

/// Grams per tonne, converting concentration (mg/L = g/m³) × flow (m³) into tonnes
const GRAMS_PER_TONNE: f64 = 1e6;

/// Kilograms per tonne
const KG_PER_TONNE: f64 = 1000.0;

/// kWh per MWh
const KWH_PER_MWH: f64 = 1000.0;

/// The single record of `wwtp_data.csv`
#[derive(PartialEq, Debug, Clone, Copy, Deserialize)]
pub struct WastewaterData {
    /// Daily influent flow (m³/day)
    pub influent_flow: f64,
    /// Total nitrogen concentration of the influent (mg/L)
    pub tn_concentration: f64,
    /// Total phosphorus concentration of the influent (mg/L)
    pub tp_concentration: f64,
    /// Fraction of nitrogen which can be recovered
    pub tn_removal: f64,
    /// Fraction of phosphorus which can be recovered
    pub tp_removal: f64,
    /// Dry sludge produced per m³ of influent (t/m³)
    pub sludge_production: f64,
    /// Volatile-solids fraction of the sludge
    pub vs_content: f64,
    /// Biogas yield per kg of volatile solids (m³/kg)
    pub biogas_yield: f64,
    /// Methane fraction of the biogas
    pub ch4_content: f64,
    /// Electricity used by the plant per m³ of influent (kWh/m³)
    pub energy_consumption: f64,
}

impl WastewaterData {
    /// Biogas produced per day (m³/day)
    pub fn biogas_per_day(&self) -> f64 {
        self.influent_flow
            * self.sludge_production
            * self.vs_content
            * KG_PER_TONNE
            * self.biogas_yield
    }

    /// Biogas produced per hourly period (m³)
    pub fn biogas_per_period(&self) -> f64 {
        self.biogas_per_day() / 24.0
    }

    /// Electricity consumed by the plant in each hourly period (MWh)
    pub fn internal_electricity(&self) -> f64 {
        self.energy_consumption * self.influent_flow / 24.0 / KWH_PER_MWH
    }

    /// The amount of a product available for recovery in each hourly period.
    ///
    /// Water is measured in m³; nitrogen and phosphorus in tonnes.
    pub fn recoverable_per_period(&self, product: RecoveredProduct) -> f64 {
        let hourly_flow = self.influent_flow / 24.0;
        match product {
            RecoveredProduct::Water => hourly_flow,
            RecoveredProduct::Nitrogen => {
                hourly_flow * self.tn_concentration * self.tn_removal / GRAMS_PER_TONNE
            }
            RecoveredProduct::Phosphorus => {
                hourly_flow * self.tp_concentration * self.tp_removal / GRAMS_PER_TONNE
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("influent_flow", self.influent_flow),
            ("tn_concentration", self.tn_concentration),
            ("tp_concentration", self.tp_concentration),
            ("sludge_production", self.sludge_production),
            ("biogas_yield", self.biogas_yield),
            ("energy_consumption", self.energy_consumption),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "{name} must be a finite number >= 0"
            );
        }
        for (name, value) in [
            ("tn_removal", self.tn_removal),
            ("tp_removal", self.tp_removal),
            ("vs_content", self.vs_content),
            ("ch4_content", self.ch4_content),
        ] {
            ensure!((0.0..=1.0).contains(&value), "{name} must be between 0 and 1");
        }

        Ok(())
    }
}

/// Read the wastewater-plant record from the model directory, if present
pub fn read_wastewater_data(model_dir: &Path) -> Result<Option<WastewaterData>> {
    let file_path = model_dir.join(WASTEWATER_FILE_NAME);
    let Some(records) = read_csv_optional::<WastewaterData>(&file_path)? else {
        return Ok(None);
    };

    let [record] = records.as_slice() else {
        anyhow::bail!(
            "{}: expected exactly one record, found {}",
            input_err_msg(&file_path),
            records.len()
        );
    };
    record
        .validate()
        .map_err(|err| err.context(input_err_msg(&file_path)))?;

    Ok(Some(*record))
}
