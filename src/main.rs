//! Provides the main entry point to the program.
use human_panic::{metadata, setup_panic};
use log::{Level, error, log_enabled};
use wfe_nexus::cli::run_cli;
use wfe_nexus::log::is_logger_initialised;

fn main() {
    setup_panic!(metadata!().support("Please report this crash to the wfe-nexus developers"));

    if let Err(err) = run_cli() {
        // Errors are printed even when logging is switched off
        if is_logger_initialised() && log_enabled!(Level::Error) {
            error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        // Terminate program, signalling an error
        std::process::exit(1);
    }
}
