use std::io;
use std::path::PathBuf;

use cdp_session::DriverError;
use thiserror::Error;

use crate::navigator::FormState;

/// Rejected run inputs, reported before any browser is started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CriteriaError {
    #[error("invalid {field} '{value}': expected dd-mm-yyyy")]
    InvalidDate { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create run folder {path}: {source}")]
    CreateFolder { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to encode csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures that end a run.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("browser launch failed: {0}")]
    Launch(DriverError),
    #[error("search portal could not be loaded: {0}")]
    Navigation(DriverError),
    #[error("form discovery failed: reveal control {selector} not found")]
    FormNotFound { selector: String },
    #[error("search submit control {selector} not found")]
    SubmitNotFound { selector: String },
    #[error("form step out of order: {from:?} -> {to:?}")]
    OutOfOrder { from: FormState, to: FormState },
    #[error("browser error: {0}")]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

pub type FlowResult<T> = Result<T, FlowError>;
