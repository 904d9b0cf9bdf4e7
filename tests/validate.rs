//! Integration tests for the `validate` command.
use std::path::{Path, PathBuf};
use wfe_nexus::cli::handle_validate_command;
use wfe_nexus::log::is_logger_initialised;
use wfe_nexus::settings::Settings;

/// Get the path to the example model.
fn get_model_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join("corlu")
}

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("WFE_NEXUS_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_validate_command(&get_model_dir(), Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());
}
