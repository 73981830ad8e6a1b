//! Windows monitor enumeration and DPI awareness.

use super::Display;
use crate::{PlatformError, PlatformResult};
use posflow_core::MonitorBox;
use std::ptr;
use std::sync::Once;
use tracing::{info, warn};
use windows_sys::Win32::Foundation::{BOOL, LPARAM, RECT};
use windows_sys::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO, MONITORINFOF_PRIMARY,
};

static DPI_INIT: Once = Once::new();

/// Set the process DPI awareness to Per-Monitor V2 so monitor bounds, hook
/// positions and injected coordinates all use physical pixels.
///
/// Must run before any window or monitor query.
pub fn set_dpi_aware() {
    DPI_INIT.call_once(|| unsafe {
        const DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2: isize = -4;

        #[link(name = "user32")]
        extern "system" {
            fn SetProcessDpiAwarenessContext(value: isize) -> i32;
        }

        if SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) != 0 {
            info!("Set Per-Monitor V2 DPI awareness");
        } else {
            warn!("Failed to set Per-Monitor V2 DPI awareness, coordinates may be scaled");
        }
    });
}

unsafe extern "system" fn enum_monitor(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let displays = &mut *(lparam as *mut Vec<Display>);

    let mut info: MONITORINFO = std::mem::zeroed();
    info.cbSize = std::mem::size_of::<MONITORINFO>() as u32;
    if GetMonitorInfoW(hmonitor, &mut info) != 0 {
        let rect = info.rcMonitor;
        displays.push(Display {
            bounds: MonitorBox::new(
                rect.left,
                rect.top,
                (rect.right - rect.left).max(0) as u32,
                (rect.bottom - rect.top).max(0) as u32,
            ),
            primary: info.dwFlags & MONITORINFOF_PRIMARY != 0,
        });
    }
    1
}

pub(super) fn list_displays() -> PlatformResult<Vec<Display>> {
    let mut displays: Vec<Display> = Vec::new();
    let ok = unsafe {
        EnumDisplayMonitors(
            ptr::null_mut(),
            ptr::null(),
            Some(enum_monitor),
            &mut displays as *mut Vec<Display> as LPARAM,
        )
    };
    if ok == 0 {
        return Err(PlatformError::CaptureFailed(
            "EnumDisplayMonitors failed".into(),
        ));
    }
    Ok(displays)
}
