//! Common routines for handling input data.
use anyhow::{Context, Result, ensure};
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read a series of type `T`s from a CSV file.
///
/// Returns an error if the file cannot be read, a row cannot be parsed or the file has no rows.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = read_csv_internal(file_path).with_context(|| input_err_msg(file_path))?;
    ensure!(
        !vec.is_empty(),
        "{}: CSV file cannot be empty",
        input_err_msg(file_path)
    );

    Ok(vec)
}

/// Read a series of type `T`s from a CSV file, if the file exists.
///
/// Returns `Ok(None)` if the file is not present.
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<Option<Vec<T>>> {
    if !file_path.exists() {
        return Ok(None);
    }

    read_csv(file_path).map(Some)
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D, T>(deserialiser: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<f64>,
{
    let value: f64 = Deserialize::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value must be between 0 and 1"))?;
    }

    Ok(T::from(value))
}
