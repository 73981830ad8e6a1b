//! macOS monitor enumeration. Bounds are in global display points.

use super::Display;
use crate::{PlatformError, PlatformResult};
use core_graphics::display::CGDisplay;
use posflow_core::MonitorBox;

pub(super) fn list_displays() -> PlatformResult<Vec<Display>> {
    let ids = CGDisplay::active_displays()
        .map_err(|e| PlatformError::CaptureFailed(format!("CGGetActiveDisplayList failed: {e}")))?;

    Ok(ids
        .into_iter()
        .map(|id| {
            let display = CGDisplay::new(id);
            let bounds = display.bounds();
            Display {
                bounds: MonitorBox::new(
                    bounds.origin.x.round() as i32,
                    bounds.origin.y.round() as i32,
                    bounds.size.width.round() as u32,
                    bounds.size.height.round() as u32,
                ),
                primary: display.is_main(),
            }
        })
        .collect())
}
