//! Screen geometry: points, rectangles and region validation

use std::ops::{Add, Sub};
use thiserror::Error;

use crate::constants::region::COORDINATE_BOUND;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle in root window (virtual screen) coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("region size must be positive, got {width}x{height}")]
    EmptySize { width: i32, height: i32 },
    #[error("region origin ({x}, {y}) is outside the accepted range of ±{bound}")]
    OutOfBounds { x: i32, y: i32, bound: i32 },
}

impl Region {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build a rectangle spanning two corners in any order.
    /// The extent is exclusive, so identical corners give a zero-sized region.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn translated(&self, delta: Point) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            ..*self
        }
    }

    /// Inclusive of the top/left edge, exclusive of the bottom/right edge
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Check that the region can host a shield: positive size and an origin
    /// within ±10000 (multi-monitor edge cases sometimes report garbage)
    pub fn validate(&self) -> Result<(), RegionError> {
        if self.is_empty() {
            return Err(RegionError::EmptySize {
                width: self.width,
                height: self.height,
            });
        }
        if self.x.abs() > COORDINATE_BOUND || self.y.abs() > COORDINATE_BOUND {
            return Err(RegionError::OutOfBounds {
                x: self.x,
                y: self.y,
                bound: COORDINATE_BOUND,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
