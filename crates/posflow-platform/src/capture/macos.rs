//! macOS region capture using CoreGraphics.

use super::bgra_to_rgb;
use crate::{PlatformError, PlatformResult};
use core_graphics::display::CGDisplay;
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use core_graphics::window::{
    kCGNullWindowID, kCGWindowImageDefault, kCGWindowListOptionOnScreenOnly,
};
use image::imageops::{self, FilterType};
use posflow_core::ports::PixelBuffer;
use posflow_core::AbsRect;

pub(super) fn grab(rect: AbsRect) -> PlatformResult<PixelBuffer> {
    let bounds = CGRect::new(
        &CGPoint::new(rect.left as f64, rect.top as f64),
        &CGSize::new(rect.width as f64, rect.height as f64),
    );
    let image = CGDisplay::screenshot(
        bounds,
        kCGWindowListOptionOnScreenOnly,
        kCGNullWindowID,
        kCGWindowImageDefault,
    )
    .ok_or_else(|| {
        PlatformError::CaptureFailed("screenshot denied (screen recording permission?)".into())
    })?;

    if image.bits_per_pixel() != 32 {
        return Err(PlatformError::CaptureFailed(format!(
            "unexpected pixel format: {} bits per pixel",
            image.bits_per_pixel()
        )));
    }

    let width = image.width() as u32;
    let height = image.height() as u32;
    let data = image.data();
    let pixels = bgra_to_rgb(data.bytes(), width, height, image.bytes_per_row())
        .ok_or_else(|| PlatformError::CaptureFailed("short pixel buffer".into()))?;

    // Retina displays return backing pixels; scale back to the point grid.
    if (width, height) != (rect.width, rect.height) {
        return Ok(imageops::resize(
            &pixels,
            rect.width,
            rect.height,
            FilterType::Triangle,
        ));
    }
    Ok(pixels)
}
