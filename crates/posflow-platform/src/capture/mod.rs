//! Region capture.
//!
//! Platform implementations:
//! - Windows: GDI `BitBlt` from the screen DC (`windows.rs`)
//! - macOS: CoreGraphics display screenshot (`macos.rs`)
//! - Elsewhere: unavailable

use posflow_core::ports::{PixelBuffer, PortError, ScreenCapture};
use posflow_core::AbsRect;
use tracing::trace;

#[cfg(windows)]
mod windows;

#[cfg(target_os = "macos")]
mod macos;

/// Screen capture over the whole virtual desktop.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCapture;

impl SystemCapture {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenCapture for SystemCapture {
    fn capture_region(&self, monitor_id: u32, rect: AbsRect) -> Result<PixelBuffer, PortError> {
        if rect.width == 0 || rect.height == 0 {
            return Err(PortError::CaptureUnavailable(format!(
                "empty capture rectangle {rect:?}"
            )));
        }
        trace!(monitor_id, ?rect, "Capturing region");
        grab(rect).map_err(PortError::from)
    }
}

#[cfg(windows)]
fn grab(rect: AbsRect) -> crate::PlatformResult<PixelBuffer> {
    windows::grab(rect)
}

#[cfg(target_os = "macos")]
fn grab(rect: AbsRect) -> crate::PlatformResult<PixelBuffer> {
    macos::grab(rect)
}

#[cfg(not(any(windows, target_os = "macos")))]
fn grab(_rect: AbsRect) -> crate::PlatformResult<PixelBuffer> {
    Err(crate::PlatformError::Unsupported("screen capture"))
}

/// Convert 32-bit BGRA rows (with `stride` bytes per row) to RGB.
pub(crate) fn bgra_to_rgb(bgra: &[u8], width: u32, height: u32, stride: usize) -> Option<PixelBuffer> {
    let row_bytes = width as usize * 4;
    if stride < row_bytes || bgra.len() < stride * height.saturating_sub(1) as usize + row_bytes {
        return None;
    }
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for row in 0..height as usize {
        let line = &bgra[row * stride..row * stride + row_bytes];
        for px in line.chunks_exact(4) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
    }
    PixelBuffer::from_raw(width, height, rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_bgra_to_rgb_with_padding() {
        // 2x2 image, rows padded to 12 bytes.
        let bgra = [
            0, 0, 255, 255, 0, 255, 0, 255, 9, 9, 9, 9, //
            255, 0, 0, 255, 10, 20, 30, 255, 9, 9, 9, 9,
        ];
        let image = bgra_to_rgb(&bgra, 2, 2, 12).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([0, 255, 0]));
        assert_eq!(image.get_pixel(0, 1), &Rgb([0, 0, 255]));
        assert_eq!(image.get_pixel(1, 1), &Rgb([30, 20, 10]));
    }

    #[test]
    fn test_bgra_to_rgb_short_buffer() {
        assert!(bgra_to_rgb(&[0; 7], 2, 1, 8).is_none());
    }

    #[test]
    fn test_empty_rect_rejected() {
        let capture = SystemCapture::new();
        assert!(matches!(
            capture.capture_region(1, AbsRect::new(0, 0, 0, 10)),
            Err(PortError::CaptureUnavailable(_))
        ));
    }
}
