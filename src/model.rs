//! The model: all validated inputs for a planning run.
use crate::error::ModelError;
use crate::scenario::{ScenarioMap, read_scenarios};
use crate::technology::{TechnologyMap, read_technologies};
use crate::time_period::TimeIndex;
use crate::wastewater::{WastewaterData, read_wastewater_data};
use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition.
///
/// Immutable once loaded; passed by reference to the program builder and results extraction.
#[derive(Debug, Clone)]
pub struct Model {
    /// Parameters from the model file
    pub parameters: ModelParameters,
    /// The representative periods
    pub time_index: TimeIndex,
    /// Technologies which can be built
    pub technologies: TechnologyMap,
    /// Scenarios with their series
    pub scenarios: ScenarioMap,
    /// Data for the attached wastewater-treatment plant
    pub wastewater: Option<WastewaterData>,
}

impl Model {
    /// Read a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        let model_dir = model_dir.as_ref();
        let parameters = ModelParameters::from_path(model_dir)?;
        let time_index = TimeIndex::new(&parameters.seasons, parameters.hours_per_day)
            .context("Invalid seasons in model.toml")?;
        let technologies = read_technologies(model_dir, parameters.hours_per_day)?;
        let scenarios = read_scenarios(model_dir, &time_index)?;
        let wastewater = read_wastewater_data(model_dir)?;

        let model = Model {
            parameters,
            time_index,
            technologies,
            scenarios,
            wastewater,
        };
        model.check_wastewater_data()?;

        debug!(
            "Model has {} technologies, {} scenarios and {} periods",
            model.technologies.len(),
            model.scenarios.len(),
            model.time_index.len()
        );

        Ok(model)
    }

    /// Check that wastewater data is present if any technology depends on it
    fn check_wastewater_data(&self) -> Result<(), ModelError> {
        if self.wastewater.is_some() {
            return Ok(());
        }

        match self
            .technologies
            .values()
            .find(|tech| tech.kind.requires_wastewater_data())
        {
            Some(tech) => Err(ModelError::Configuration(format!(
                "Technology {} requires wastewater-plant data, but wwtp_data.csv is missing",
                tech.id
            ))),
            None => Ok(()),
        }
    }
}
