//! posflow-platform: the OS side of posflow's capability ports.
//!
//! This crate provides:
//! - Input injection via `enigo`
//! - Monitor enumeration and region capture (GDI on Windows, CoreGraphics on macOS)
//! - An HTTP text recognizer and a directory-backed template store
//! - A global input hook via `rdev`, and the hotkey listener built on it
//!
//! [`system_ports`] wires the real implementations into a [`Ports`] bundle.

mod capture;
mod error;
mod hotkey;
mod injector;
mod input_hook;
mod monitors;
mod ocr;
mod templates;

use posflow_core::ports::{NoTextRecognizer, Ports, TextRecognizer};
use posflow_core::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub use capture::SystemCapture;
pub use error::{PlatformError, PlatformResult};
pub use hotkey::{signal_for, Hotkey, HotkeyListener, HotkeyMatcher};
pub use injector::EnigoInjector;
pub use input_hook::{start_input_hook, HookEvent, InputHookHandle};
pub use monitors::{set_dpi_aware, SystemMonitors};
pub use ocr::HttpTextRecognizer;
pub use templates::DirTemplateStore;

/// Directory holding reference images for template waits.
pub fn templates_dir(settings: &Settings) -> PathBuf {
    settings
        .templates_dir
        .clone()
        .unwrap_or_else(|| posflow_core::data_dir().join("templates"))
}

/// Build the live port bundle described by `settings`.
pub fn system_ports(settings: &Settings) -> PlatformResult<Ports> {
    let recognizer: Arc<dyn TextRecognizer> = if settings.ocr.enabled {
        info!(base_url = %settings.ocr.base_url, "OCR enabled");
        Arc::new(HttpTextRecognizer::new(&settings.ocr)?)
    } else {
        Arc::new(NoTextRecognizer)
    };

    Ok(Ports {
        injector: Arc::new(EnigoInjector::new()?),
        capture: Arc::new(SystemCapture::new()),
        recognizer,
        monitors: Arc::new(SystemMonitors::new()),
        templates: Arc::new(DirTemplateStore::new(templates_dir(settings))),
    })
}
