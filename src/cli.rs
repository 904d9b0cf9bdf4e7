//! The command line interface for the planner.
use crate::analysis::{compare_objectives, default_carbon_policy, run_single, run_sweep};
use crate::error::ModelError;
use crate::formulation::ObjectiveKind;
use crate::log;
use crate::model::Model;
use crate::output::{create_output_directory, get_output_dir};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the planner.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options shared by the commands which write results
#[derive(Args, Default)]
pub struct OutputOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write plot-ready operating series (operations.csv)
    #[arg(long)]
    pub visualise: bool,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// The carbon-policy tag (defaults to the first policy in model.toml)
    #[arg(long)]
    pub carbon_policy: Option<String>,
    /// What to minimise
    #[arg(long, value_enum, default_value_t)]
    pub objective: ObjectiveKind,
    /// Output options
    #[command(flatten)]
    pub output: OutputOpts,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Plan investment for a model under one carbon policy.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Plan cost-optimal investment under every carbon policy of a model.
    Sweep {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Output options
        #[command(flatten)]
        opts: OutputOpts,
    },
    /// Compare cost-optimal and emission-optimal plans under one carbon policy.
    Compare {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// The carbon-policy tag (defaults to the first policy in model.toml)
        #[arg(long)]
        carbon_policy: Option<String>,
        /// Output options
        #[command(flatten)]
        opts: OutputOpts,
    },
    /// Manage example models.
    Example {
        /// The available subcommands for managing example models.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Sweep { model_dir, opts } => handle_sweep_command(&model_dir, &opts, None),
            Self::Compare {
                model_dir,
                carbon_policy,
                opts,
            } => handle_compare_command(&model_dir, carbon_policy.as_deref(), &opts, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the planner
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ wfe-nexus --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help in markdown format
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    if let Some(settings) = settings {
        Ok(settings)
    } else {
        Settings::load().context("Failed to load settings.")
    }
}

/// Set up the output folder and logger, then load the model.
///
/// # Returns
///
/// The model, the output folder and whether operating series should be written
fn prepare_run(
    model_path: &Path,
    opts: &OutputOpts,
    settings: Option<Settings>,
) -> Result<(Model, PathBuf, bool)> {
    let settings = load_settings(settings)?;

    // Get path to output folder
    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(model_path)?,
    };

    // These settings can be overridden by command-line arguments
    let allow_overwrite = opts.overwrite || settings.overwrite;
    let visualise = opts.visualise || settings.visualise;

    let overwrite = create_output_directory(&output_path, allow_overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    // Initialise program logger
    log::init(settings.log_level.as_deref(), Some(&output_path))
        .context("Failed to initialise logging.")?;

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    // Load the model to run
    let model = Model::from_path(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    info!("Output folder: {}", output_path.display());

    Ok((model, output_path, visualise))
}

/// Attach the conflicting constraints and bounds of an infeasible model to the error, so that
/// they are printed even if logging is switched off
fn explain_failure(err: anyhow::Error) -> anyhow::Error {
    if let Some(ModelError::InfeasibleModel(_)) = ModelError::find(&err) {
        return err.context("No feasible plan exists. Relax the constraints listed below.");
    }

    err
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let (model, output_path, visualise) = prepare_run(model_path, &opts.output, settings)?;
    let carbon_policy = opts
        .carbon_policy
        .as_deref()
        .unwrap_or_else(|| default_carbon_policy(&model));

    run_single(
        &model,
        carbon_policy,
        opts.objective,
        &output_path,
        visualise,
    )
    .map_err(explain_failure)?;
    info!("Planning complete!");

    Ok(())
}

/// Handle the `sweep` command.
pub fn handle_sweep_command(
    model_path: &Path,
    opts: &OutputOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let (model, output_path, visualise) = prepare_run(model_path, opts, settings)?;
    let points = run_sweep(&model, &output_path, visualise)?;
    info!("Sweep complete: {} carbon policies planned", points.len());

    Ok(())
}

/// Handle the `compare` command.
pub fn handle_compare_command(
    model_path: &Path,
    carbon_policy: Option<&str>,
    opts: &OutputOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let (model, output_path, visualise) = prepare_run(model_path, opts, settings)?;
    let carbon_policy = carbon_policy.unwrap_or_else(|| default_carbon_policy(&model));

    compare_objectives(&model, carbon_policy, &output_path, visualise).map_err(explain_failure)?;
    info!("Comparison complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(settings.log_level.as_deref(), None).context("Failed to initialise logging.")?;

    // Load/validate the model
    Model::from_path(model_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_failure() {
        let err = anyhow::Error::from(ModelError::SolverFailure("time limit".into()));
        assert_eq!(explain_failure(err).to_string(), "Solver failure: time limit");

        let err = anyhow::Error::from(ModelError::UnboundedModel("still unbounded".into()));
        assert!(
            explain_failure(err)
                .to_string()
                .starts_with("Model is unbounded")
        );
    }

    #[test]
    fn test_cli_parses_run_options() {
        let cli = Cli::try_parse_from([
            "wfe-nexus",
            "run",
            "model",
            "--carbon-policy",
            "high_tax",
            "--objective",
            "minimize_emissions",
            "--visualise",
        ])
        .unwrap();
        let Some(Commands::Run { model_dir, opts }) = cli.command else {
            panic!("Expected run command");
        };
        assert_eq!(model_dir, PathBuf::from("model"));
        assert_eq!(opts.carbon_policy.as_deref(), Some("high_tax"));
        assert_eq!(opts.objective, ObjectiveKind::MinimizeEmissions);
        assert!(opts.output.visualise);
        assert!(!opts.output.overwrite);
    }

    #[test]
    fn test_cli_default_objective() {
        let cli = Cli::try_parse_from(["wfe-nexus", "run", "model"]).unwrap();
        let Some(Commands::Run { opts, .. }) = cli.command else {
            panic!("Expected run command");
        };
        assert_eq!(opts.objective, ObjectiveKind::MinimizeCost);
        assert!(opts.carbon_policy.is_none());
    }
}
