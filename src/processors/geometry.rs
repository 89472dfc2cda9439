//! Geometric utilities for detection post-processing.
//!
//! This module provides the axis-aligned rectangle primitive used by the
//! detection pipeline, with conversion between the network's center-size
//! box encoding and corner format, plus intersection-over-union computation.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in corner format, in image-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X-coordinate of the top-left corner.
    pub x1: f32,
    /// Y-coordinate of the top-left corner.
    pub y1: f32,
    /// X-coordinate of the bottom-right corner.
    pub x2: f32,
    /// Y-coordinate of the bottom-right corner.
    pub y2: f32,
}

impl Rect {
    /// Creates a new rectangle from corner coordinates.
    ///
    /// # Arguments
    ///
    /// * `x1` - The x-coordinate of the top-left corner.
    /// * `y1` - The y-coordinate of the top-left corner.
    /// * `x2` - The x-coordinate of the bottom-right corner.
    /// * `y2` - The y-coordinate of the bottom-right corner.
    ///
    /// # Returns
    ///
    /// A new `Rect` instance.
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Creates a rectangle from the center-size encoding used by detection
    /// networks.
    ///
    /// # Arguments
    ///
    /// * `cx` - The x-coordinate of the box center.
    /// * `cy` - The y-coordinate of the box center.
    /// * `w` - The box width.
    /// * `h` - The box height.
    ///
    /// # Returns
    ///
    /// A new `Rect` instance in corner format.
    pub fn from_center_size(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    /// Returns the width of the rectangle, clamped to zero for degenerate
    /// coordinates.
    #[inline]
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    /// Returns the height of the rectangle, clamped to zero for degenerate
    /// coordinates.
    #[inline]
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Returns the area of the rectangle.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Returns the area of the intersection with another rectangle.
    ///
    /// # Arguments
    ///
    /// * `other` - The rectangle to intersect with.
    ///
    /// # Returns
    ///
    /// The intersection area, zero when the rectangles do not overlap.
    pub fn intersection_area(&self, other: &Rect) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }

    /// Calculates the intersection-over-union with another rectangle.
    ///
    /// Defined as intersection area / (areaA + areaB - intersection area).
    /// Returns zero when the rectangles do not overlap, and zero for
    /// zero-area rectangles rather than dividing by zero.
    ///
    /// # Arguments
    ///
    /// * `other` - The rectangle to compare against.
    ///
    /// # Returns
    ///
    /// The IoU value in [0, 1].
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Returns the corner coordinates as a `[x1, y1, x2, y2]` array.
    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}
