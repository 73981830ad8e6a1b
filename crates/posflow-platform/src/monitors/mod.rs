//! Monitor enumeration.
//!
//! Platform implementations:
//! - Windows: `EnumDisplayMonitors` with Per-Monitor V2 DPI awareness (`windows.rs`)
//! - macOS: CoreGraphics active displays (`macos.rs`)
//! - Elsewhere: a single monitor sized from `enigo`'s main display

use posflow_core::ports::{MonitorSource, PortError};
use posflow_core::{MonitorBox, MonitorGeometry};
use tracing::debug;

#[cfg(windows)]
mod windows;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(windows)]
pub use windows::set_dpi_aware;

#[cfg(not(windows))]
pub fn set_dpi_aware() {}

/// A display as reported by the OS, before ids are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Display {
    pub bounds: MonitorBox,
    pub primary: bool,
}

/// Assign ids: the primary display is 1, the rest follow left to right,
/// then top to bottom.
pub(crate) fn order_displays(mut displays: Vec<Display>) -> MonitorGeometry {
    displays.sort_by_key(|d| (!d.primary, d.bounds.left, d.bounds.top));
    MonitorGeometry::from_boxes(displays.into_iter().map(|d| d.bounds))
}

/// Monitor source backed by the live display configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMonitors;

impl SystemMonitors {
    pub fn new() -> Self {
        set_dpi_aware();
        Self
    }
}

impl MonitorSource for SystemMonitors {
    fn enumerate_monitors(&self) -> Result<MonitorGeometry, PortError> {
        let displays = list_displays()?;
        let geometry = order_displays(displays);
        for (id, bounds) in geometry.iter() {
            debug!(id, ?bounds, "Enumerated monitor");
        }
        Ok(geometry)
    }
}

#[cfg(windows)]
fn list_displays() -> Result<Vec<Display>, PortError> {
    windows::list_displays().map_err(PortError::from)
}

#[cfg(target_os = "macos")]
fn list_displays() -> Result<Vec<Display>, PortError> {
    macos::list_displays().map_err(PortError::from)
}

#[cfg(not(any(windows, target_os = "macos")))]
fn list_displays() -> Result<Vec<Display>, PortError> {
    use crate::PlatformError;
    use enigo::{Enigo, Mouse, Settings};

    let enigo = Enigo::new(&Settings::default())
        .map_err(|e| PlatformError::CaptureFailed(format!("failed to open display: {e}")))?;
    let (width, height) = enigo
        .main_display()
        .map_err(|e| PlatformError::CaptureFailed(e.to_string()))?;
    Ok(vec![Display {
        bounds: MonitorBox::new(0, 0, width.max(0) as u32, height.max(0) as u32),
        primary: true,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(left: i32, top: i32, primary: bool) -> Display {
        Display {
            bounds: MonitorBox::new(left, top, 1920, 1080),
            primary,
        }
    }

    #[test]
    fn test_primary_gets_id_one() {
        let geometry = order_displays(vec![
            display(-1920, 0, false),
            display(1920, 0, false),
            display(0, 0, true),
        ]);
        assert_eq!(geometry.len(), 3);
        assert_eq!(geometry.get(1).unwrap().left, 0);
        assert_eq!(geometry.get(2).unwrap().left, -1920);
        assert_eq!(geometry.get(3).unwrap().left, 1920);
    }

    #[test]
    fn test_stacked_displays_ordered_top_down() {
        let geometry = order_displays(vec![
            display(0, 1080, false),
            display(0, -1080, false),
            display(0, 0, true),
        ]);
        assert_eq!(geometry.get(2).unwrap().top, -1080);
        assert_eq!(geometry.get(3).unwrap().top, 1080);
    }
}
