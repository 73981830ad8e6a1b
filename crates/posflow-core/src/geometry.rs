//! Monitor geometry and relative <-> absolute coordinate conversion.
//!
//! All functions here are pure: a synthetic [`MonitorGeometry`] is enough to
//! exercise them, no display required.

use crate::RelRect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Slack allowed on relative values before they count as out of range.
const REL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("unknown monitor {0}")]
    UnknownMonitor(u32),
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
}

/// Absolute bounding box of one monitor, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorBox {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl MonitorBox {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.left as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.top as i64 + self.height as i64
    }

    /// Half-open containment: the right and bottom edges belong to the neighbour.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (x as i64, y as i64);
        x >= self.left as i64 && x < self.right() && y >= self.top as i64 && y < self.bottom()
    }

    pub fn contains_rect(&self, rect: &AbsRect) -> bool {
        rect.left as i64 >= self.left as i64
            && rect.top as i64 >= self.top as i64
            && rect.left as i64 + rect.width as i64 <= self.right()
            && rect.top as i64 + rect.height as i64 <= self.bottom()
    }

    /// The whole monitor as a rectangle.
    pub fn as_rect(&self) -> AbsRect {
        AbsRect::new(self.left, self.top, self.width, self.height)
    }

    /// Clamp a point onto the last pixel row/column of this box.
    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        let max_x = self.left as i64 + self.width.saturating_sub(1) as i64;
        let max_y = self.top as i64 + self.height.saturating_sub(1) as i64;
        (
            (x as i64).clamp(self.left as i64, max_x) as i32,
            (y as i64).clamp(self.top as i64, max_y) as i32,
        )
    }
}

/// Absolute rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl AbsRect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Snapshot of monitor id (1-based) to absolute bounds, taken once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorGeometry {
    monitors: BTreeMap<u32, MonitorBox>,
}

impl MonitorGeometry {
    /// Build a geometry table, numbering boxes 1.. in the given order.
    pub fn from_boxes(boxes: impl IntoIterator<Item = MonitorBox>) -> Self {
        let monitors = boxes
            .into_iter()
            .enumerate()
            .map(|(i, b)| (i as u32 + 1, b))
            .collect();
        Self { monitors }
    }

    pub fn insert(&mut self, id: u32, bounds: MonitorBox) {
        self.monitors.insert(id, bounds);
    }

    pub fn get(&self, id: u32) -> Result<&MonitorBox, GeometryError> {
        self.monitors
            .get(&id)
            .ok_or(GeometryError::UnknownMonitor(id))
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Monitors in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &MonitorBox)> {
        self.monitors.iter().map(|(id, b)| (*id, b))
    }
}

fn scale(rel: f64, size: u32) -> i64 {
    (rel * size as f64).round() as i64
}

/// Widen an empty `[start, end)` span to one pixel, staying inside `[0, extent)`.
fn at_least_one(start: i64, end: i64, extent: u32) -> (i64, i64) {
    if end > start || extent == 0 {
        (start, end)
    } else if start < extent as i64 {
        (start, start + 1)
    } else {
        (start - 1, start)
    }
}

/// Convert a monitor-relative point to absolute screen pixels.
///
/// `rel = 1.0` lands on the last pixel of the monitor rather than on the
/// first pixel of its neighbour.
pub fn to_absolute(
    monitor_id: u32,
    rel_x: f64,
    rel_y: f64,
    geometry: &MonitorGeometry,
) -> Result<(i32, i32), GeometryError> {
    let bounds = geometry.get(monitor_id)?;
    if !(-REL_EPSILON..=1.0 + REL_EPSILON).contains(&rel_x)
        || !(-REL_EPSILON..=1.0 + REL_EPSILON).contains(&rel_y)
    {
        return Err(GeometryError::OutOfBounds(format!(
            "relative point ({rel_x}, {rel_y}) outside [0, 1]"
        )));
    }

    let x = bounds.left as i64 + scale(rel_x, bounds.width);
    let y = bounds.top as i64 + scale(rel_y, bounds.height);
    Ok(bounds.clamp(
        x.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        y.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
    ))
}

/// Convert a monitor-relative rectangle to an absolute one.
///
/// Width and height are scaled independently by the monitor's width and
/// height. The right/bottom edges are computed from the summed ratio so
/// rounding never pushes an in-range rectangle past the monitor edge, and a
/// rectangle that rounds to nothing still covers one pixel per axis.
pub fn to_absolute_rect(
    monitor_id: u32,
    rect: &RelRect,
    geometry: &MonitorGeometry,
) -> Result<AbsRect, GeometryError> {
    let bounds = geometry.get(monitor_id)?;
    let in_unit = |v: f64| (-REL_EPSILON..=1.0 + REL_EPSILON).contains(&v);
    if !in_unit(rect.left)
        || !in_unit(rect.top)
        || rect.width < 0.0
        || rect.height < 0.0
        || !in_unit(rect.left + rect.width)
        || !in_unit(rect.top + rect.height)
    {
        return Err(GeometryError::OutOfBounds(format!(
            "relative rect {rect:?} exceeds monitor {monitor_id}"
        )));
    }

    let left = scale(rect.left.max(0.0), bounds.width);
    let top = scale(rect.top.max(0.0), bounds.height);
    let right = scale((rect.left + rect.width).min(1.0), bounds.width).max(left);
    let bottom = scale((rect.top + rect.height).min(1.0), bounds.height).max(top);
    let (left, right) = at_least_one(left, right, bounds.width);
    let (top, bottom) = at_least_one(top, bottom, bounds.height);

    let abs = AbsRect {
        left: (bounds.left as i64 + left) as i32,
        top: (bounds.top as i64 + top) as i32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    };
    debug_assert!(bounds.contains_rect(&abs));
    Ok(abs)
}

/// Map an absolute point back to `(monitor_id, rel_x, rel_y)`.
///
/// Overlapping (mirrored) monitors resolve to the lowest id.
pub fn from_absolute(
    x: i32,
    y: i32,
    geometry: &MonitorGeometry,
) -> Result<(u32, f64, f64), GeometryError> {
    let (id, bounds) = geometry
        .iter()
        .find(|(_, b)| b.contains(x, y))
        .ok_or_else(|| GeometryError::OutOfBounds(format!("point ({x}, {y}) is on no monitor")))?;

    let rel_x = (x as i64 - bounds.left as i64) as f64 / bounds.width as f64;
    let rel_y = (y as i64 - bounds.top as i64) as f64 / bounds.height as f64;
    Ok((id, rel_x, rel_y))
}
