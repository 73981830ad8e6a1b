//! Windows region capture using GDI.

use super::bgra_to_rgb;
use crate::{PlatformError, PlatformResult};
use posflow_core::ports::PixelBuffer;
use posflow_core::AbsRect;
use std::ptr;
use windows_sys::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT, DIB_RGB_COLORS,
    SRCCOPY,
};

pub(super) fn grab(rect: AbsRect) -> PlatformResult<PixelBuffer> {
    let width = rect.width as i32;
    let height = rect.height as i32;

    unsafe {
        // The screen DC spans the virtual desktop with the primary monitor at (0, 0).
        let hdc_screen = GetDC(ptr::null_mut());
        if hdc_screen.is_null() {
            return Err(PlatformError::CaptureFailed("GetDC failed".into()));
        }

        let hdc_mem = CreateCompatibleDC(hdc_screen);
        if hdc_mem.is_null() {
            ReleaseDC(ptr::null_mut(), hdc_screen);
            return Err(PlatformError::CaptureFailed("CreateCompatibleDC failed".into()));
        }

        let hbitmap = CreateCompatibleBitmap(hdc_screen, width, height);
        if hbitmap.is_null() {
            DeleteDC(hdc_mem);
            ReleaseDC(ptr::null_mut(), hdc_screen);
            return Err(PlatformError::CaptureFailed("CreateCompatibleBitmap failed".into()));
        }

        let old_bitmap = SelectObject(hdc_mem, hbitmap);
        let copied = BitBlt(
            hdc_mem,
            0,
            0,
            width,
            height,
            hdc_screen,
            rect.left,
            rect.top,
            SRCCOPY | CAPTUREBLT,
        );

        let mut buffer = vec![0u8; rect.width as usize * rect.height as usize * 4];
        let mut lines = 0;
        if copied != 0 {
            let mut bmi: BITMAPINFO = std::mem::zeroed();
            bmi.bmiHeader.biSize = std::mem::size_of::<BITMAPINFOHEADER>() as u32;
            bmi.bmiHeader.biWidth = width;
            // Negative height: top-down rows.
            bmi.bmiHeader.biHeight = -height;
            bmi.bmiHeader.biPlanes = 1;
            bmi.bmiHeader.biBitCount = 32;
            bmi.bmiHeader.biCompression = BI_RGB;

            lines = GetDIBits(
                hdc_mem,
                hbitmap,
                0,
                rect.height,
                buffer.as_mut_ptr().cast(),
                &mut bmi,
                DIB_RGB_COLORS,
            );
        }

        SelectObject(hdc_mem, old_bitmap);
        DeleteObject(hbitmap);
        DeleteDC(hdc_mem);
        ReleaseDC(ptr::null_mut(), hdc_screen);

        if copied == 0 {
            return Err(PlatformError::CaptureFailed("BitBlt failed".into()));
        }
        if lines == 0 {
            return Err(PlatformError::CaptureFailed("GetDIBits failed".into()));
        }

        bgra_to_rgb(&buffer, rect.width, rect.height, rect.width as usize * 4)
            .ok_or_else(|| PlatformError::CaptureFailed("short pixel buffer".into()))
    }
}
