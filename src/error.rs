//! The typed error taxonomy for the planner.
//!
//! Loaders return [`anyhow::Result`] so that file and field context can be attached as the error
//! propagates. Where a failure belongs to one of the categories below, the root cause is a
//! [`ModelError`], which callers can recover with [`anyhow::Error::downcast_ref`].
use crate::solver::conflict::ConflictReport;
use thiserror::Error;

/// Errors which can occur while loading, building or solving a model
#[derive(Error, Debug)]
pub enum ModelError {
    /// A parameter required by a referenced technology or policy is missing or unknown
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A time series or scenario table has the wrong shape
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// The requested solver cannot be used
    #[error("Solver unavailable: {0}")]
    SolverUnavailable(String),

    /// The program has no feasible solution
    #[error("Model is infeasible\n{0}")]
    InfeasibleModel(ConflictReport),

    /// The program is unbounded, even after retrying with bounded trade and production
    #[error("Model is unbounded: {0}")]
    UnboundedModel(String),

    /// The solver stopped without a usable status (time limit, numerical trouble, ...)
    #[error("Solver failure: {0}")]
    SolverFailure(String),
}

impl ModelError {
    /// Find a [`ModelError`] anywhere in an [`anyhow::Error`] chain
    pub fn find(error: &anyhow::Error) -> Option<&ModelError> {
        error.chain().find_map(|cause| cause.downcast_ref::<ModelError>())
    }
}
