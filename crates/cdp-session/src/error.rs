use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by the driver.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DriverErrorKind {
    #[error("browser failed to start")]
    LaunchFailed,
    #[error("navigation timed out")]
    NavTimeout,
    #[error("navigation failed")]
    Navigation,
    #[error("target element not found")]
    ElementNotFound,
    #[error("element is stale")]
    StaleElement,
    #[error("option not found")]
    OptionNotFound,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("artifact write failed")]
    Artifact,
    #[error("session closed")]
    Closed,
    #[error("internal error")]
    Internal,
}

/// Enriched error passed back to the flow layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

impl DriverError {
    pub fn new(kind: DriverErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn is_launch_failure(&self) -> bool {
        self.kind == DriverErrorKind::LaunchFailed
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        DriverError::new(DriverErrorKind::Artifact).with_hint(err.to_string())
    }
}
