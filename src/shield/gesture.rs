//! Pointer gestures on the interaction window: move and edge resize

use crate::constants::shield::{MIN_SIZE, RESIZE_MARGIN};
use crate::region::{Point, Region};

/// Which edges a resize gesture drags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Edges {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

impl Edges {
    /// Edges within the resize margin of a point given in window-local coordinates
    pub fn hit(local: Point, width: i32, height: i32) -> Self {
        // Keep the margin usable on very small shields
        let margin = RESIZE_MARGIN.min(width / 4).min(height / 4).max(1);
        Self {
            left: local.x < margin,
            right: local.x >= width - margin,
            top: local.y < margin,
            bottom: local.y >= height - margin,
        }
    }

    pub fn any(&self) -> bool {
        self.left || self.right || self.top || self.bottom
    }

    /// Apply a total cursor offset to the anchor region, never shrinking below
    /// the minimum size. Dragging a left/top edge keeps the opposite edge fixed.
    pub fn resize(&self, anchor: Region, offset: Point) -> Region {
        let mut region = anchor;
        if self.left {
            let width = (anchor.width - offset.x).max(MIN_SIZE);
            region.x = anchor.right() - width;
            region.width = width;
        } else if self.right {
            region.width = (anchor.width + offset.x).max(MIN_SIZE);
        }
        if self.top {
            let height = (anchor.height - offset.y).max(MIN_SIZE);
            region.y = anchor.bottom() - height;
            region.height = height;
        } else if self.bottom {
            region.height = (anchor.height + offset.y).max(MIN_SIZE);
        }
        region
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Incremental move: `last` is the cursor position already applied
    Move { last: Point },
    /// Resize anchored at the geometry and cursor position of the press
    Resize { edges: Edges, anchor: Region, start: Point },
}

impl Gesture {
    /// Advance a move gesture to `cursor`, returning the delta to apply
    pub fn step(&mut self, cursor: Point) -> Option<Point> {
        match self {
            Gesture::Move { last } => {
                let delta = cursor - *last;
                *last = cursor;
                (delta != Point::default()).then_some(delta)
            }
            Gesture::Resize { .. } => None,
        }
    }

    /// Region a resize gesture would produce at `cursor`
    pub fn resized(&self, cursor: Point) -> Option<Region> {
        match self {
            Gesture::Resize { edges, anchor, start } => Some(edges.resize(*anchor, cursor - *start)),
            Gesture::Move { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_steps_are_incremental() {
        let mut gesture = Gesture::Move { last: Point::new(100, 100) };
        assert_eq!(gesture.step(Point::new(110, 95)), Some(Point::new(10, -5)));
        assert_eq!(gesture.step(Point::new(111, 95)), Some(Point::new(1, 0)));
        // Same position again → nothing to apply
        assert_eq!(gesture.step(Point::new(111, 95)), None);
    }

    #[test]
    fn test_edges_hit_detection() {
        let center = Edges::hit(Point::new(50, 50), 100, 100);
        assert!(!center.any());

        let corner = Edges::hit(Point::new(98, 99), 100, 100);
        assert_eq!(corner, Edges { right: true, bottom: true, ..Default::default() });

        let left = Edges::hit(Point::new(2, 50), 100, 100);
        assert_eq!(left, Edges { left: true, ..Default::default() });
    }

    #[test]
    fn test_edges_margin_shrinks_on_small_shields() {
        // 24px wide → margin 6, so x=7 is already inside
        let edges = Edges::hit(Point::new(7, 12), 24, 24);
        assert!(!edges.any());
    }

    #[test]
    fn test_resize_right_bottom() {
        let edges = Edges { right: true, bottom: true, ..Default::default() };
        let region = edges.resize(Region::new(10, 10, 100, 80), Point::new(25, -30));
        assert_eq!(region, Region::new(10, 10, 125, 50));
    }

    #[test]
    fn test_resize_left_keeps_right_edge() {
        let edges = Edges { left: true, ..Default::default() };
        let anchor = Region::new(100, 50, 200, 100);
        let region = edges.resize(anchor, Point::new(-40, 0));
        assert_eq!(region, Region::new(60, 50, 240, 100));
        assert_eq!(region.right(), anchor.right());
    }

    #[test]
    fn test_resize_clamps_to_minimum() {
        let edges = Edges { left: true, top: true, ..Default::default() };
        let anchor = Region::new(0, 0, 100, 100);
        let region = edges.resize(anchor, Point::new(500, 500));
        assert_eq!(region, Region::new(100 - MIN_SIZE, 100 - MIN_SIZE, MIN_SIZE, MIN_SIZE));
    }

    #[test]
    fn test_resize_gesture_is_anchored() {
        let gesture = Gesture::Resize {
            edges: Edges { right: true, ..Default::default() },
            anchor: Region::new(0, 0, 100, 100),
            start: Point::new(100, 50),
        };
        // Positions are relative to the press, not to the previous motion
        assert_eq!(gesture.resized(Point::new(130, 50)), Some(Region::new(0, 0, 130, 100)));
        assert_eq!(gesture.resized(Point::new(120, 70)), Some(Region::new(0, 0, 120, 100)));
    }
}
