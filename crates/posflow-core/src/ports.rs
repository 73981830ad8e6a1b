//! Capability ports: the executor's only way to touch the outside world.
//!
//! `posflow-platform` implements these against the real OS; tests implement
//! them with in-memory fakes.

use crate::{AbsRect, MonitorGeometry, MouseButton};
use image::RgbImage;
use std::sync::Arc;
use thiserror::Error;

/// Captured pixels, row-major RGB.
pub type PixelBuffer = RgbImage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("input injection unavailable: {0}")]
    InjectionUnavailable(String),
    #[error("screen capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("text recognition failed: {0}")]
    RecognitionFailed(String),
    #[error("template unavailable: {0}")]
    TemplateUnavailable(String),
}

/// Mouse/keyboard injection. Coordinates are absolute screen pixels.
pub trait InputInjector: Send + Sync {
    fn move_to(&self, x: i32, y: i32) -> Result<(), PortError>;
    fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), PortError>;
    /// Tap a named key, or a `+` joined chord such as `ctrl+shift+s`.
    fn key_press(&self, key: &str) -> Result<(), PortError>;
    fn type_text(&self, text: &str) -> Result<(), PortError>;
}

pub trait ScreenCapture: Send + Sync {
    /// Capture `rect` (absolute pixels) from the given monitor.
    fn capture_region(&self, monitor_id: u32, rect: AbsRect) -> Result<PixelBuffer, PortError>;
}

pub trait TextRecognizer: Send + Sync {
    /// Recognize text in `image`. No text found is `Ok("")`, not an error.
    fn recognize(&self, image: &PixelBuffer) -> Result<String, PortError>;
}

pub trait MonitorSource: Send + Sync {
    /// Enumerate attached monitors. Called once at run start.
    fn enumerate_monitors(&self) -> Result<MonitorGeometry, PortError>;
}

pub trait TemplateStore: Send + Sync {
    /// Resolve a reference image identifier.
    fn load(&self, id: &str) -> Result<PixelBuffer, PortError>;
}

/// The full set of ports an executor runs against.
#[derive(Clone)]
pub struct Ports {
    pub injector: Arc<dyn InputInjector>,
    pub capture: Arc<dyn ScreenCapture>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub monitors: Arc<dyn MonitorSource>,
    pub templates: Arc<dyn TemplateStore>,
}

/// Monitor source backed by a fixed table (tests, replays on a known layout).
#[derive(Debug, Clone)]
pub struct FixedMonitors(pub MonitorGeometry);

impl MonitorSource for FixedMonitors {
    fn enumerate_monitors(&self) -> Result<MonitorGeometry, PortError> {
        Ok(self.0.clone())
    }
}

/// Recognizer used when OCR is disabled: never sees any text.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTextRecognizer;

impl TextRecognizer for NoTextRecognizer {
    fn recognize(&self, _image: &PixelBuffer) -> Result<String, PortError> {
        Ok(String::new())
    }
}
