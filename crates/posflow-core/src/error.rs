//! Errors that end a run.

use crate::ports::PortError;
use crate::GeometryError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("unknown monitor {0}")]
    UnknownMonitor(u32),
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
    #[error("condition not met within {0:?}")]
    ConditionTimeout(Duration),
    #[error("input injection unavailable: {0}")]
    InjectionUnavailable(String),
    #[error("screen capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("a run is already active")]
    AlreadyRunning,
}

impl ExecError {
    /// Only a condition timeout may be continued past, and only by policy.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::ConditionTimeout(_))
    }
}

impl From<GeometryError> for ExecError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::UnknownMonitor(id) => ExecError::UnknownMonitor(id),
            GeometryError::OutOfBounds(msg) => ExecError::OutOfBounds(msg),
        }
    }
}

impl From<PortError> for ExecError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::InjectionUnavailable(msg) => ExecError::InjectionUnavailable(msg),
            PortError::CaptureUnavailable(msg) => ExecError::CaptureUnavailable(msg),
            PortError::RecognitionFailed(msg) => ExecError::CaptureUnavailable(msg),
            PortError::TemplateUnavailable(msg) => {
                ExecError::InvalidAction(format!("template unavailable: {msg}"))
            }
        }
    }
}
