//! Two-stage stochastic investment planning for water-food-energy nexus facilities.
//!
//! A model directory is loaded into an immutable [`model::Model`], translated into a linear
//! mixed-integer program by [`formulation`], solved through the [`solver`] adapter and turned into
//! reports by [`results`] and [`output`]. [`analysis`] strings these together for single runs,
//! carbon-policy sweeps and objective comparisons.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod analysis;
pub mod cli;
pub mod error;
pub mod finance;
pub mod formulation;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod results;
pub mod scenario;
pub mod settings;
pub mod solver;
pub mod technology;
pub mod time_period;
pub mod units;
pub mod wastewater;

#[cfg(test)]
mod fixture;

/// Get the config folder for the program
pub fn get_wfe_nexus_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir on this platform; use the current folder
        return PathBuf::new();
    };
    config_dir.push("wfe-nexus");
    config_dir
}
