//! Code for loading program settings.
use crate::get_wfe_nexus_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for wfe-nexus
# Uncomment a setting to change it from its default value
";

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_wfe_nexus_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// The default program log level
    pub log_level: Option<String>,
    /// Whether to overwrite output folders by default
    #[serde(default)]
    pub overwrite: bool,
    /// Whether to write plot-ready operating series by default
    #[serde(default)]
    pub visualise: bool,
}

impl Settings {
    /// Read the program settings file.
    ///
    /// If the file is not present, default values for settings will be used
    ///
    /// # Returns
    ///
    /// The program settings as a `Settings` struct or an error if the file is invalid
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read from the specified path, falling back to defaults if there is no file
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// The contents of the default settings file, with every setting commented out
    pub fn default_file_contents() -> String {
        format!(
            "{DEFAULT_SETTINGS_FILE_HEADER}
# # The program log level (error, warn, info, debug, trace or off). The WFE_NEXUS_LOG_LEVEL
# # environment variable takes precedence.
# log_level = \"{DEFAULT_LOG_LEVEL}\"

# # Whether to overwrite output folders by default
# overwrite = false

# # Whether to write plot-ready operating series (operations.csv) by default
# visualise = false
"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_settings_load_from_path_no_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME); // NB: doesn't exist
        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_settings_load_from_path() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "log_level = \"warn\"").unwrap();
            writeln!(file, "visualise = true").unwrap();
        }

        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings {
                log_level: Some("warn".to_string()),
                overwrite: false,
                visualise: true,
            }
        );
    }

    #[test]
    fn test_settings_load_unknown_field() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&file_path, "debug_model = true\n").unwrap();
        assert!(Settings::load_from_path(&file_path).is_err());
    }

    #[test]
    fn test_default_file_contents() {
        // Everything is commented out, so the defaults are read back
        let contents = Settings::default_file_contents();
        assert!(contents.contains("# log_level = \"info\""));
        let settings: Settings = toml::from_str(&contents).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
