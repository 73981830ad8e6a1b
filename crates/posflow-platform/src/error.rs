//! Common error types for posflow-platform.

use posflow_core::ports::PortError;
use thiserror::Error;

/// Platform-level errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("not supported on this platform: {0}")]
    Unsupported(&'static str),
    #[error("injection failed: {0}")]
    InjectionFailed(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("input hook failed: {0}")]
    HookFailed(String),
    #[error("OCR request failed: {0}")]
    Ocr(#[from] reqwest::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

impl From<PlatformError> for PortError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::InjectionFailed(_) | PlatformError::InvalidKey(_) => {
                PortError::InjectionUnavailable(err.to_string())
            }
            PlatformError::Ocr(_) => PortError::RecognitionFailed(err.to_string()),
            PlatformError::Image(_) => PortError::TemplateUnavailable(err.to_string()),
            PlatformError::Unsupported(_)
            | PlatformError::CaptureFailed(_)
            | PlatformError::HookFailed(_) => PortError::CaptureUnavailable(err.to_string()),
        }
    }
}
